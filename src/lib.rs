//! Track continuity and identity resolution for tracked player detections
//!
//! This crate turns a per-frame stream of already-tracked detections into
//! stable, smoothed trajectories with optional cross-session identities:
//! - TrackContinuityManager: duplicate suppression and occlusion-aware id recovery
//! - KalmanSmoother / EmaSmoother: streaming per-track smoothing
//! - BatchGpSmoother: offline gap interpolation + Gaussian process smoothing
//! - IdentityResolver: multi-modal gallery matching with adaptive thresholds
//!   and user-correction feedback
//!
//! # Session usage
//!
//! ```rust,ignore
//! use track_continuity::{Bbox, Detection, SessionConfig, SessionStores, TrackingSession};
//!
//! let config = SessionConfig::new(25.0, 2.0, 150.0, 20);
//! let mut session = TrackingSession::open(config, SessionStores::default())?;
//!
//! let detections = vec![Detection::new(7, Bbox::from_xywh(10.0, 20.0, 40.0, 90.0), 0.9)];
//! let resolved = session.process_frame(0, &detections);
//!
//! let closed = session.close();
//! if let Some(job) = closed.batch {
//!     let (smoothed, report) = job.run();
//! }
//! ```

pub mod bbox;
pub mod config;
pub mod continuity;
pub mod error;
pub mod gap_filler;
pub mod identity;
pub mod persist;
pub mod session;
pub mod smoothing;
pub mod table;
pub mod types;

pub use bbox::{calculate_iou, Bbox};
pub use config::{
    AdaptiveConfig, ContinuityConfig, EmaSmootherConfig, GsiConfig, KalmanSmootherConfig, SessionConfig,
    SmoothingMethod,
};
pub use continuity::{suppress_duplicates, ContinuityFrame, IdRemap, LostTrack, Track, TrackContinuityManager};
pub use error::{Result, TrackingError};
pub use gap_filler::GapFillReport;
pub use identity::{
    AdaptiveState, AdaptiveThresholdController, Correction, FeedbackLearner, Gallery, IdentityResolver,
    InMemoryGallery, PerformanceSample, PlayerIdentity,
};
pub use session::{BatchSmoothingJob, ClosedSession, SessionStats, SessionStores, TrackingSession};
pub use smoothing::{smooth_track_table, BatchGpSmoother, EmaSmoother, KalmanSmoother, SmoothOutcome};
pub use table::{format_track_table, parse_track_table, TrackRow};
pub use types::{
    Detection, FaceConsensus, FeatureSet, IdentityMatch, JerseyConsensus, Modality, ResolvedDetection, TrackId,
};
