use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{OrganizationalUnit, Stage, StageStatus, TemplateId, UnitId};
use super::repository::{
    LedgerRepository, RepositoryError, ScheduleRepository, TemplateRepository, UnitRepository,
};
use super::template::{FormTemplate, Question};

static UNIT_SEQUENCE: AtomicI64 = AtomicI64::new(1);
static TEMPLATE_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_unit_id() -> UnitId {
    UnitId(UNIT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn next_template_id() -> TemplateId {
    TemplateId(TEMPLATE_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Error raised by stage and unit administration.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("organizational unit not found")]
    UnitNotFound,
    #[error("unit still referenced by {submissions} submission(s) and {bookings} booking(s)")]
    UnitInUse { submissions: u32, bookings: u32 },
    #[error("a template needs at least one question")]
    EmptyTemplate,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Admin-side coordinator for a unit's (stage, status) pair and its
/// question templates. Transitions are a flat overwrite: which sequences
/// are sensible is enforced by the admin surface, not here. The two
/// video-intake side effects are mandatory regardless.
pub struct StageOrchestrator<R> {
    store: Arc<R>,
}

impl<R> StageOrchestrator<R>
where
    R: UnitRepository + TemplateRepository + LedgerRepository + ScheduleRepository + 'static,
{
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub fn create_unit(
        &self,
        name: String,
        now: DateTime<Utc>,
    ) -> Result<OrganizationalUnit, OrchestratorError> {
        let unit = self.store.insert_unit(OrganizationalUnit {
            id: next_unit_id(),
            name,
            current_stage: None,
            stage_status: StageStatus::NotStarted,
            video_intake_open: false,
            video_chat_id: None,
            created_at: now,
        })?;
        Ok(unit)
    }

    /// Overwrite the unit's (stage, status) pair. Entering the open
    /// home-video stage opens video intake; closing it closes intake.
    pub fn set_stage(
        &self,
        unit_id: UnitId,
        stage: Option<Stage>,
        status: StageStatus,
    ) -> Result<OrganizationalUnit, OrchestratorError> {
        let mut unit = self
            .store
            .fetch_unit(unit_id)?
            .ok_or(OrchestratorError::UnitNotFound)?;

        unit.current_stage = stage;
        unit.stage_status = status;

        if stage == Some(Stage::HomeVideo) {
            match status {
                StageStatus::Open => unit.video_intake_open = true,
                StageStatus::Closed => unit.video_intake_open = false,
                _ => {}
            }
        }

        self.store.update_unit(unit.clone())?;
        info!(
            unit = unit_id.0,
            stage = stage.map(Stage::label).unwrap_or("none"),
            status = status.label(),
            "stage transition applied"
        );
        Ok(unit)
    }

    /// Point home-video delivery at a group chat (or detach it).
    pub fn set_video_chat(
        &self,
        unit_id: UnitId,
        chat_id: Option<i64>,
    ) -> Result<OrganizationalUnit, OrchestratorError> {
        let mut unit = self
            .store
            .fetch_unit(unit_id)?
            .ok_or(OrchestratorError::UnitNotFound)?;
        unit.video_chat_id = chat_id;
        self.store.update_unit(unit.clone())?;
        Ok(unit)
    }

    /// Publish a new question set for (unit, stage). The new version
    /// becomes the only active one; drafts written against the old
    /// version are refused at submit time.
    pub fn publish_template(
        &self,
        unit_id: UnitId,
        stage: Stage,
        questions: Vec<Question>,
    ) -> Result<FormTemplate, OrchestratorError> {
        self.store
            .fetch_unit(unit_id)?
            .ok_or(OrchestratorError::UnitNotFound)?;

        if questions.is_empty() {
            return Err(OrchestratorError::EmptyTemplate);
        }

        let version = self
            .store
            .active_template(unit_id, stage)?
            .map(|template| template.version + 1)
            .unwrap_or(1);

        let template = self.store.publish_template(FormTemplate {
            id: next_template_id(),
            unit: unit_id,
            stage,
            version,
            is_active: true,
            questions,
        })?;

        info!(
            unit = unit_id.0,
            stage = stage.label(),
            version = template.version,
            "question template published"
        );
        Ok(template)
    }

    /// Units disappear only while nothing references them; a unit with
    /// submissions or live bookings is kept.
    pub fn delete_unit(&self, unit_id: UnitId) -> Result<(), OrchestratorError> {
        self.store
            .fetch_unit(unit_id)?
            .ok_or(OrchestratorError::UnitNotFound)?;

        let submissions = self.store.submission_count(unit_id)?;
        let bookings = self.store.booking_count_for_unit(unit_id)?;
        if submissions > 0 || bookings > 0 {
            return Err(OrchestratorError::UnitInUse {
                submissions,
                bookings,
            });
        }

        self.store.delete_unit(unit_id)?;
        Ok(())
    }

    pub fn unit(&self, unit_id: UnitId) -> Result<OrganizationalUnit, OrchestratorError> {
        self.store
            .fetch_unit(unit_id)?
            .ok_or(OrchestratorError::UnitNotFound)
    }

    pub fn units(&self) -> Result<Vec<OrganizationalUnit>, OrchestratorError> {
        Ok(self.store.list_units()?)
    }
}
