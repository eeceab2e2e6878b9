//! Cross-session identity resolution
//!
//! - gallery: `PlayerIdentity` records and the `Gallery` store interface
//! - resolver: weighted multi-modal fusion against gallery candidates
//! - adaptive: threshold and weight tuning from reported performance
//! - feedback: user corrections turned into exclusions and similarity bias
//!
//! The three stores are shared between sessions through `Arc` and hand out
//! immutable snapshots to readers.

mod adaptive;
mod feedback;
mod gallery;
mod resolver;

pub use adaptive::{
    AdaptiveState, AdaptiveThresholdController, PerformanceSample, REID_THRESHOLD_RANGE,
    SIMILARITY_THRESHOLD_RANGE,
};
pub use feedback::{Correction, CorrectionContext, FeedbackLearner, FeedbackState, EXCLUSION_REPEATS};
pub use gallery::{Gallery, InMemoryGallery, PlayerIdentity, StoredFeatures};
pub use resolver::{
    corroborate, cosine_similarity, fused_similarity, modality_similarity, IdentityQuery,
    IdentityResolver, ScoredMatch, FACE_BONUS, JERSEY_BONUS,
};
