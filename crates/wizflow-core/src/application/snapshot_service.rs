use tracing::{debug, instrument};

use crate::application::subject::SubjectApi;
use crate::domain::snapshot::{SnapshotPayloads, StateSnapshot};
use crate::error::CoreResult;

/// Reads every state endpoint of one subject into a [`StateSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotService {
    api: SubjectApi,
}

impl SnapshotService {
    pub fn new(api: SubjectApi) -> Self {
        Self { api }
    }

    #[instrument(skip(self))]
    pub async fn capture(&self, subject_id: u64) -> CoreResult<StateSnapshot> {
        let raw = SnapshotPayloads {
            character: self.api.character(subject_id).await?,
            stats: self.api.stats(subject_id).await?,
            pending_choices: self.api.pending_choices(subject_id).await?,
            spells: self.api.spells(subject_id).await?,
            equipment: self.api.equipment(subject_id).await?,
            languages: self.api.languages(subject_id).await?,
            proficiencies: self.api.proficiencies(subject_id).await?,
            features: self.api.features(subject_id).await?,
        };
        let snapshot = StateSnapshot::new(subject_id, raw);
        debug!(
            race = ?snapshot.derived.race_slug,
            classes = ?snapshot.derived.class_slugs,
            pending = snapshot.derived.pending_choice_count,
            "Captured snapshot"
        );
        Ok(snapshot)
    }
}
