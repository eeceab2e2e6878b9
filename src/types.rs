//! Type definitions for detections entering the engine and resolved output

use crate::bbox::Bbox;
use crate::error::{Result, TrackingError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track identifier (transient upstream id or canonical session id)
pub type TrackId = u32;

/// Durable gallery identity identifier
pub type IdentityId = String;

/// Feature channel used for identity matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Whole-body appearance embedding
    General,
    /// Jersey crop embedding
    Jersey,
    /// Foot/shoe crop embedding
    Foot,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::General, Modality::Jersey, Modality::Foot];

    pub fn index(self) -> usize {
        match self {
            Self::General => 0,
            Self::Jersey => 1,
            Self::Foot => 2,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Jersey => write!(f, "jersey"),
            Self::Foot => write!(f, "foot"),
        }
    }
}

/// Optional feature vectors, one per modality
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jersey: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foot: Option<Vec<f32>>,
}

impl FeatureSet {
    pub fn get(&self, modality: Modality) -> Option<&[f32]> {
        match modality {
            Modality::General => self.general.as_deref(),
            Modality::Jersey => self.jersey.as_deref(),
            Modality::Foot => self.foot.as_deref(),
        }
        .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, modality: Modality, vector: Vec<f32>) {
        match modality {
            Modality::General => self.general = Some(vector),
            Modality::Jersey => self.jersey = Some(vector),
            Modality::Foot => self.foot = Some(vector),
        }
    }

    pub fn with(mut self, modality: Modality, vector: Vec<f32>) -> Self {
        self.set(modality, vector);
        self
    }

    /// Modalities carrying a non-empty vector
    pub fn modalities(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modalities().is_empty()
    }
}

/// Multi-frame voted jersey number from the OCR collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JerseyConsensus {
    pub number: u16,
    pub confidence: f32,
    pub support_frames: u32,
}

/// Multi-frame voted face match from the face recognition collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceConsensus {
    pub identity_id: IdentityId,
    pub confidence: f32,
    pub support_frames: u32,
}

/// Single upstream detection with its transient track id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub bbox: Bbox,
    pub confidence: f32,
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub jersey: Option<JerseyConsensus>,
    #[serde(default)]
    pub face: Option<FaceConsensus>,
}

impl Detection {
    pub fn new(track_id: TrackId, bbox: Bbox, confidence: f32) -> Self {
        Self {
            track_id,
            bbox,
            confidence,
            features: FeatureSet::default(),
            jersey: None,
            face: None,
        }
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    pub fn with_jersey(mut self, jersey: JerseyConsensus) -> Self {
        self.jersey = Some(jersey);
        self
    }

    pub fn with_face(mut self, face: FaceConsensus) -> Self {
        self.face = Some(face);
        self
    }

    /// Reject boxes with non-finite or inverted corners and confidences outside [0, 1]
    pub fn validate(&self) -> Result<()> {
        if !self.bbox.is_valid() {
            return Err(TrackingError::malformed(format!(
                "track {} has invalid bbox {}",
                self.track_id, self.bbox
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(TrackingError::malformed(format!(
                "track {} has confidence {} outside [0, 1]",
                self.track_id, self.confidence
            )));
        }
        Ok(())
    }
}

/// Identity attached to a resolved detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub identity_id: IdentityId,
    pub name: String,
    /// Combined similarity after bonuses and feedback adjustment, in [0, 1]
    pub similarity: f32,
}

/// Detection after continuity, smoothing and identity resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDetection {
    /// Canonical session track id (after remapping)
    pub track_id: TrackId,
    /// Transient id the upstream associator assigned
    pub source_track_id: TrackId,
    /// Output box, smoothed when a streaming smoother is configured
    pub bbox: Bbox,
    pub raw_bbox: Bbox,
    pub confidence: f32,
    pub identity: Option<IdentityMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_set_modalities() {
        let features = FeatureSet::default()
            .with(Modality::General, vec![1.0, 0.0])
            .with(Modality::Foot, vec![0.5]);
        assert_eq!(features.modalities(), vec![Modality::General, Modality::Foot]);
        assert!(features.get(Modality::Jersey).is_none());

        let empty = FeatureSet::default().with(Modality::Jersey, vec![]);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_detection_validation() {
        let ok = Detection::new(1, Bbox::new(0.0, 0.0, 10.0, 20.0), 0.9);
        assert!(ok.validate().is_ok());

        let inverted = Detection::new(1, Bbox::new(10.0, 0.0, 0.0, 20.0), 0.9);
        assert!(matches!(
            inverted.validate(),
            Err(TrackingError::MalformedInput(_))
        ));

        let bad_conf = Detection::new(1, Bbox::new(0.0, 0.0, 10.0, 20.0), f32::NAN);
        assert!(bad_conf.validate().is_err());
    }

    #[test]
    fn test_detection_deserializes_without_optional_fields() {
        let json = r#"{"track_id":3,"bbox":{"xmin":0,"ymin":0,"xmax":5,"ymax":5},"confidence":0.5}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.track_id, 3);
        assert!(det.features.is_empty());
        assert!(det.jersey.is_none());
    }
}
