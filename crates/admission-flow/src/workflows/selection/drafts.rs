use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantId, TemplateId, UnitId};
use super::template::AnswerSet;

/// An in-progress answer set an applicant can resume later. Advisory
/// only: losing every draft at once must never corrupt durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub template_id: TemplateId,
    pub template_version: u32,
    pub answers: AnswerSet,
    pub updated_at: DateTime<Utc>,
}

/// Failure of the buffer itself. Callers treat draft operations as
/// best-effort wherever durable state is also involved.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("draft buffer unavailable: {0}")]
    Unavailable(String),
}

/// Volatile per-(applicant, unit) scratch buffer with a TTL. Last write
/// wins; concurrent saves from two tabs may race and that is accepted.
pub trait DraftStore: Send + Sync {
    /// Upsert the draft and reset its TTL. No validation beyond what the
    /// caller already did; partial answer sets are expected.
    fn save(&self, applicant: ApplicantId, unit: UnitId, draft: Draft) -> Result<(), DraftError>;

    fn get(&self, applicant: ApplicantId, unit: UnitId) -> Result<Option<Draft>, DraftError>;

    /// Time until the draft silently disappears, or `None` if absent.
    fn remaining_ttl(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
    ) -> Result<Option<Duration>, DraftError>;

    /// Remove the draft. Discarding an absent draft is not an error.
    fn discard(&self, applicant: ApplicantId, unit: UnitId) -> Result<(), DraftError>;
}

struct StoredDraft {
    draft: Draft,
    expires_at: Instant,
}

/// Process-local draft buffer. Entries expire lazily on read, which is
/// indistinguishable from eager expiry to callers since an expired draft
/// behaves exactly like one that was never saved.
pub struct InMemoryDraftStore {
    ttl: Duration,
    entries: Mutex<HashMap<(ApplicantId, UnitId), StoredDraft>>,
}

impl InMemoryDraftStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl DraftStore for InMemoryDraftStore {
    fn save(&self, applicant: ApplicantId, unit: UnitId, draft: Draft) -> Result<(), DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::Unavailable("draft mutex poisoned".to_string()))?;
        entries.insert(
            (applicant, unit),
            StoredDraft {
                draft,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    fn get(&self, applicant: ApplicantId, unit: UnitId) -> Result<Option<Draft>, DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::Unavailable("draft mutex poisoned".to_string()))?;
        match entries.get(&(applicant, unit)) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(Some(stored.draft.clone())),
            Some(_) => {
                entries.remove(&(applicant, unit));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn remaining_ttl(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
    ) -> Result<Option<Duration>, DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::Unavailable("draft mutex poisoned".to_string()))?;
        match entries.get(&(applicant, unit)) {
            Some(stored) => {
                let now = Instant::now();
                if stored.expires_at > now {
                    Ok(Some(stored.expires_at - now))
                } else {
                    entries.remove(&(applicant, unit));
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn discard(&self, applicant: ApplicantId, unit: UnitId) -> Result<(), DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::Unavailable("draft mutex poisoned".to_string()))?;
        entries.remove(&(applicant, unit));
        Ok(())
    }
}
