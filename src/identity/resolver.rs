//! Multi-modal gallery matching
//!
//! Per candidate identity: cosine similarity per shared modality, fused by
//! the adaptive weights renormalized over the shared modalities, plus
//! jersey/face corroboration bonuses and the feedback adjustment.

use super::adaptive::{AdaptiveState, AdaptiveThresholdController};
use super::feedback::{FeedbackLearner, FeedbackState};
use super::gallery::{Gallery, PlayerIdentity};
use crate::error::Result;
use crate::types::{Detection, FaceConsensus, FeatureSet, IdentityMatch, JerseyConsensus, Modality, TrackId};
use std::cmp::Ordering;
use std::sync::Arc;

/// Added when the jersey OCR consensus equals the identity's number
pub const JERSEY_BONUS: f32 = 0.10;
/// Added when the face recognition consensus names the identity
pub const FACE_BONUS: f32 = 0.15;

/// Cosine similarity clamped to [0, 1]; `None` for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !(denom.is_finite() && denom > 0.0) || !dot.is_finite() {
        return None;
    }
    Some((dot / denom).clamp(0.0, 1.0))
}

/// Best similarity of `query` against any stored vector of one modality
pub fn modality_similarity(query: &[f32], stored: &[Vec<f32>]) -> Option<f32> {
    stored
        .iter()
        .filter_map(|s| cosine_similarity(query, s))
        .max_by(f32::total_cmp)
}

/// Weighted fusion over the modalities both sides carry
///
/// Weights are renormalized over those modalities only. `None` when the two
/// sides share no comparable modality.
pub fn fused_similarity(features: &FeatureSet, identity: &PlayerIdentity, weights: &[f32; 3]) -> Option<f32> {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    let mut plain = Vec::new();
    for modality in Modality::ALL {
        let Some(query) = features.get(modality) else {
            continue;
        };
        let Some(similarity) = modality_similarity(query, identity.features.get(modality)) else {
            continue;
        };
        let weight = weights[modality.index()].max(0.0);
        weighted += weight * similarity;
        weight_sum += weight;
        plain.push(similarity);
    }
    if plain.is_empty() {
        return None;
    }
    let fused = if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        plain.iter().sum::<f32>() / plain.len() as f32
    };
    Some(fused.clamp(0.0, 1.0))
}

/// What a track brings to a gallery lookup
#[derive(Debug, Clone, Copy)]
pub struct IdentityQuery<'a> {
    pub track_id: TrackId,
    pub features: &'a FeatureSet,
    pub jersey: Option<&'a JerseyConsensus>,
    pub face: Option<&'a FaceConsensus>,
}

impl<'a> IdentityQuery<'a> {
    pub fn from_detection(track_id: TrackId, detection: &'a Detection) -> Self {
        Self {
            track_id,
            features: &detection.features,
            jersey: detection.jersey.as_ref(),
            face: detection.face.as_ref(),
        }
    }
}

/// Apply the corroboration bonuses, capped at 1
pub fn corroborate(similarity: f32, query: &IdentityQuery<'_>, identity: &PlayerIdentity) -> f32 {
    let mut boosted = similarity;
    if let (Some(jersey), Some(number)) = (query.jersey, identity.jersey_number) {
        if jersey.number == number {
            boosted += JERSEY_BONUS;
        }
    }
    if query.face.is_some_and(|face| face.identity_id == identity.identity_id) {
        boosted += FACE_BONUS;
    }
    boosted.min(1.0)
}

/// Accepted match plus the fields used to rank it against others
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub identity: IdentityMatch,
    pub reference_frames: usize,
}

fn rank(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.identity
        .similarity
        .total_cmp(&a.identity.similarity)
        .then(b.reference_frames.cmp(&a.reference_frames))
        .then(a.identity.identity_id.cmp(&b.identity.identity_id))
}

/// Gallery matcher consulting the adaptive thresholds and user feedback
#[derive(Clone)]
pub struct IdentityResolver {
    gallery: Arc<dyn Gallery>,
    adaptive: Arc<AdaptiveThresholdController>,
    feedback: Arc<FeedbackLearner>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("adaptive", &self.adaptive)
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(
        gallery: Arc<dyn Gallery>,
        adaptive: Arc<AdaptiveThresholdController>,
        feedback: Arc<FeedbackLearner>,
    ) -> Self {
        Self {
            gallery,
            adaptive,
            feedback,
        }
    }

    pub fn gallery(&self) -> &Arc<dyn Gallery> {
        &self.gallery
    }

    pub fn adaptive(&self) -> &Arc<AdaptiveThresholdController> {
        &self.adaptive
    }

    pub fn feedback(&self) -> &Arc<FeedbackLearner> {
        &self.feedback
    }

    /// Best identity for one track against fresh store snapshots
    pub fn match_track(&self, query: &IdentityQuery<'_>) -> Result<Option<IdentityMatch>> {
        let adaptive = self.adaptive.snapshot();
        let feedback = self.feedback.snapshot();
        Ok(self
            .match_with(query, &adaptive, &feedback)?
            .map(|scored| scored.identity))
    }

    /// Best identity for one track against the given snapshots
    ///
    /// Readers within one frame share the same snapshots so every track is
    /// judged by the same thresholds.
    pub fn match_with(
        &self,
        query: &IdentityQuery<'_>,
        adaptive: &AdaptiveState,
        feedback: &FeedbackState,
    ) -> Result<Option<ScoredMatch>> {
        if query.features.is_empty() {
            return Ok(None);
        }

        let candidates = self.gallery.match_candidates(query.features)?;
        let mut best: Option<ScoredMatch> = None;
        for identity in &candidates {
            let Some(fused) = fused_similarity(query.features, identity, &adaptive.weights) else {
                continue;
            };
            let adjustment = feedback.adjustment(&identity.identity_id);
            let similarity = (corroborate(fused, query, identity) + adjustment).clamp(0.0, 1.0);

            if feedback.should_exclude(&identity.identity_id, query.track_id) {
                log::debug!(
                    "Track {} excluded from identity {} by feedback",
                    query.track_id,
                    identity.identity_id
                );
                continue;
            }
            if similarity < adaptive.similarity_threshold {
                continue;
            }

            let scored = ScoredMatch {
                identity: IdentityMatch {
                    identity_id: identity.identity_id.clone(),
                    name: identity.name.clone(),
                    similarity,
                },
                reference_frames: identity.reference_frames.len(),
            };
            let better = best
                .as_ref()
                .map_or(true, |current| rank(&scored, current) == Ordering::Less);
            if better {
                best = Some(scored);
            }
        }

        if let Some(found) = &best {
            log::debug!(
                "Track {} matched identity {} (similarity={:.3}, {} candidates)",
                query.track_id,
                found.identity.identity_id,
                found.identity.similarity,
                candidates.len()
            );
        }
        Ok(best)
    }
}
