//! Player gallery: durable cross-session identities and the store interface

use crate::error::Result;
use crate::persist;
use crate::types::{FeatureSet, IdentityId, Modality, TrackId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Stored feature vectors for one identity, zero or more per modality
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFeatures {
    #[serde(default)]
    pub general: Vec<Vec<f32>>,
    #[serde(default)]
    pub jersey: Vec<Vec<f32>>,
    #[serde(default)]
    pub foot: Vec<Vec<f32>>,
}

impl StoredFeatures {
    pub fn get(&self, modality: Modality) -> &[Vec<f32>] {
        match modality {
            Modality::General => &self.general,
            Modality::Jersey => &self.jersey,
            Modality::Foot => &self.foot,
        }
    }

    pub fn push(&mut self, modality: Modality, vector: Vec<f32>) {
        if vector.is_empty() {
            return;
        }
        match modality {
            Modality::General => self.general.push(vector),
            Modality::Jersey => self.jersey.push(vector),
            Modality::Foot => self.foot.push(vector),
        }
    }

    /// Add every vector present in `features`
    pub fn extend_from(&mut self, features: &FeatureSet) {
        for modality in Modality::ALL {
            if let Some(vector) = features.get(modality) {
                self.push(modality, vector.to_vec());
            }
        }
    }

    pub fn has(&self, modality: Modality) -> bool {
        !self.get(modality).is_empty()
    }
}

/// Gallery entry identifying one physical player across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub identity_id: IdentityId,
    pub name: String,
    #[serde(default)]
    pub jersey_number: Option<u16>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub features: StoredFeatures,
    /// Frames the stored features were taken from
    #[serde(default)]
    pub reference_frames: Vec<u64>,
    /// How many frames each session track was matched to this identity
    #[serde(default)]
    pub track_history: BTreeMap<TrackId, u32>,
}

impl PlayerIdentity {
    pub fn new(identity_id: impl Into<IdentityId>, name: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            name: name.into(),
            jersey_number: None,
            team: None,
            features: StoredFeatures::default(),
            reference_frames: Vec::new(),
            track_history: BTreeMap::new(),
        }
    }

    pub fn with_jersey_number(mut self, number: u16) -> Self {
        self.jersey_number = Some(number);
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Store a reference observation taken at `frame`
    pub fn add_reference(&mut self, frame: u64, features: &FeatureSet) {
        self.features.extend_from(features);
        self.reference_frames.push(frame);
    }

    /// Modalities present both in the gallery entry and in `features`
    pub fn shared_modalities(&self, features: &FeatureSet) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| self.features.has(*m) && features.get(*m).is_some())
            .collect()
    }

    /// Add per-track match counts from a finished session
    pub fn merge_track_history(&mut self, counts: &BTreeMap<TrackId, u32>) {
        for (track_id, count) in counts {
            *self.track_history.entry(*track_id).or_insert(0) += count;
        }
    }
}

/// Narrow interface to the identity store
///
/// Implementations are shared between sessions and must tolerate concurrent
/// readers. Any method may fail with `TrackingError::GalleryUnavailable`.
pub trait Gallery: Send + Sync {
    fn get(&self, identity_id: &str) -> Result<Option<PlayerIdentity>>;

    /// Insert or replace an identity
    fn put(&self, identity: PlayerIdentity) -> Result<()>;

    /// Add per-track match counts to an identity as one read-modify-write
    ///
    /// Concurrent merges for the same identity must all be kept. Returns
    /// `false` when the identity is not in the gallery.
    fn merge_track_history(&self, identity_id: &str, counts: &BTreeMap<TrackId, u32>) -> Result<bool>;

    /// Identities sharing at least one modality with `features`, most shared first
    fn match_candidates(&self, features: &FeatureSet) -> Result<Vec<PlayerIdentity>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GalleryDocument {
    identities: Vec<PlayerIdentity>,
}

/// Gallery held in memory behind an atomically swapped snapshot
#[derive(Debug, Default)]
pub struct InMemoryGallery {
    snapshot: RwLock<Arc<BTreeMap<IdentityId, PlayerIdentity>>>,
    writer: Mutex<()>,
}

impl InMemoryGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_identities(identities: impl IntoIterator<Item = PlayerIdentity>) -> Self {
        let map: BTreeMap<_, _> = identities
            .into_iter()
            .map(|identity| (identity.identity_id.clone(), identity))
            .collect();
        Self {
            snapshot: RwLock::new(Arc::new(map)),
            writer: Mutex::new(()),
        }
    }

    /// Load a gallery document; a missing file gives an empty gallery
    pub fn load(path: &Path) -> Result<Self> {
        let document: GalleryDocument = persist::read_json(path)?.unwrap_or_default();
        log::info!(
            "Loaded gallery with {} identities from {}",
            document.identities.len(),
            path.display()
        );
        Ok(Self::from_identities(document.identities))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let document = GalleryDocument {
            identities: snapshot.values().cloned().collect(),
        };
        persist::write_json_atomic(path, &document)
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<IdentityId, PlayerIdentity>> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }
}

impl Gallery for InMemoryGallery {
    fn get(&self, identity_id: &str) -> Result<Option<PlayerIdentity>> {
        Ok(self.snapshot().get(identity_id).cloned())
    }

    fn put(&self, identity: PlayerIdentity) -> Result<()> {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        next.insert(identity.identity_id.clone(), identity);
        *self.snapshot.write() = Arc::new(next);
        Ok(())
    }

    fn merge_track_history(&self, identity_id: &str, counts: &BTreeMap<TrackId, u32>) -> Result<bool> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let Some(identity) = current.get(identity_id) else {
            return Ok(false);
        };
        let mut updated = identity.clone();
        updated.merge_track_history(counts);
        let mut next = (*current).clone();
        next.insert(updated.identity_id.clone(), updated);
        *self.snapshot.write() = Arc::new(next);
        Ok(true)
    }

    fn match_candidates(&self, features: &FeatureSet) -> Result<Vec<PlayerIdentity>> {
        let snapshot = self.snapshot();
        let mut ranked: Vec<(usize, &PlayerIdentity)> = snapshot
            .values()
            .map(|identity| (identity.shared_modalities(features).len(), identity))
            .filter(|(shared, _)| *shared > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.identity_id.cmp(&b.1.identity_id)));
        Ok(ranked.into_iter().map(|(_, identity)| identity.clone()).collect())
    }
}
