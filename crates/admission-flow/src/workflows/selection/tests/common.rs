//! In-memory doubles and fixtures shared by the selection tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::selection::domain::{
    ApplicantId, ApplicantProgress, AuthContext, AvailabilityMark, Booking, BookingId,
    Capability, InterviewSlot, OrganizationalUnit, ReviewTicket, ReviewerId, SlotId, Stage,
    StageStatus, TicketId, UnitId,
};
use crate::workflows::selection::drafts::{Draft, DraftError, DraftStore, InMemoryDraftStore};
use crate::workflows::selection::ledger::SubmissionLedger;
use crate::workflows::selection::orchestrator::StageOrchestrator;
use crate::workflows::selection::repository::{
    ApplicantNotice, BookingAttempt, CapabilityDirectory, FinalSubmission, LedgerRepository,
    NotifyError, Notifier, RepositoryError, ScheduleRepository, TemplateRepository,
    UnitRepository,
};
use crate::workflows::selection::schedule::CapacityScheduler;
use crate::workflows::selection::template::{
    AnswerSet, AnswerValue, FormTemplate, Question, QuestionKind,
};

// Fixture rows inserted directly into the store use ids far above
// anything the service-side sequences hand out.
static FIXTURE_SEQUENCE: AtomicI64 = AtomicI64::new(10_000);

pub fn fixture_id() -> i64 {
    FIXTURE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, hour, 0, 0).single().unwrap()
}

#[derive(Default)]
struct Inner {
    units: HashMap<UnitId, OrganizationalUnit>,
    templates: Vec<FormTemplate>,
    submissions: HashMap<(ApplicantId, UnitId, Stage), FinalSubmission>,
    tickets: HashMap<TicketId, ReviewTicket>,
    progress: HashMap<(ApplicantId, UnitId, Stage), ApplicantProgress>,
    slots: HashMap<SlotId, InterviewSlot>,
    bookings: HashMap<BookingId, Booking>,
    availability: HashMap<(ReviewerId, SlotId), AvailabilityMark>,
}

impl Inner {
    fn occupancy(&self, slot: SlotId) -> u32 {
        self.bookings
            .values()
            .filter(|booking| booking.slot == slot && booking.status.occupies_seat())
            .count() as u32
    }
}

/// One mutex over the whole dataset so the multi-row writes the traits
/// promise to be atomic actually are.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl UnitRepository for MemoryStore {
    fn insert_unit(
        &self,
        unit: OrganizationalUnit,
    ) -> Result<OrganizationalUnit, RepositoryError> {
        let mut inner = self.lock()?;
        if inner.units.contains_key(&unit.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    fn update_unit(&self, unit: OrganizationalUnit) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        if !inner.units.contains_key(&unit.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.units.insert(unit.id, unit);
        Ok(())
    }

    fn fetch_unit(&self, id: UnitId) -> Result<Option<OrganizationalUnit>, RepositoryError> {
        Ok(self.lock()?.units.get(&id).cloned())
    }

    fn delete_unit(&self, id: UnitId) -> Result<(), RepositoryError> {
        self.lock()?.units.remove(&id);
        Ok(())
    }

    fn list_units(&self) -> Result<Vec<OrganizationalUnit>, RepositoryError> {
        let inner = self.lock()?;
        let mut units: Vec<_> = inner.units.values().cloned().collect();
        units.sort_by_key(|unit| unit.id);
        Ok(units)
    }
}

impl TemplateRepository for MemoryStore {
    fn publish_template(&self, template: FormTemplate) -> Result<FormTemplate, RepositoryError> {
        let mut inner = self.lock()?;
        for existing in inner.templates.iter_mut() {
            if existing.unit == template.unit && existing.stage == template.stage {
                existing.is_active = false;
            }
        }
        inner.templates.push(template.clone());
        Ok(template)
    }

    fn active_template(
        &self,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<FormTemplate>, RepositoryError> {
        Ok(self
            .lock()?
            .templates
            .iter()
            .find(|template| template.unit == unit && template.stage == stage && template.is_active)
            .cloned())
    }
}

impl LedgerRepository for MemoryStore {
    fn progress_for(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<ApplicantProgress>, RepositoryError> {
        Ok(self.lock()?.progress.get(&(applicant, unit, stage)).cloned())
    }

    fn record_submission(
        &self,
        submission: FinalSubmission,
        ticket: ReviewTicket,
        progress: ApplicantProgress,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        let key = (submission.applicant, submission.unit, submission.stage);
        if inner.submissions.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        inner.submissions.insert(key, submission);
        inner.tickets.insert(ticket.id, ticket);
        inner.progress.insert(key, progress);
        Ok(())
    }

    fn submission(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<FinalSubmission>, RepositoryError> {
        Ok(self
            .lock()?
            .submissions
            .get(&(applicant, unit, stage))
            .cloned())
    }

    fn submission_count(&self, unit: UnitId) -> Result<u32, RepositoryError> {
        Ok(self
            .lock()?
            .submissions
            .values()
            .filter(|submission| submission.unit == unit)
            .count() as u32)
    }

    fn ticket(&self, id: TicketId) -> Result<Option<ReviewTicket>, RepositoryError> {
        Ok(self.lock()?.tickets.get(&id).cloned())
    }

    fn resolve_ticket(
        &self,
        ticket: ReviewTicket,
        progress: ApplicantProgress,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        if !inner.tickets.contains_key(&ticket.id) {
            return Err(RepositoryError::NotFound);
        }
        let key = (progress.applicant, progress.unit, progress.stage);
        inner.tickets.insert(ticket.id, ticket);
        inner.progress.insert(key, progress);
        Ok(())
    }

    fn pending_tickets(
        &self,
        unit: UnitId,
        limit: usize,
    ) -> Result<Vec<ReviewTicket>, RepositoryError> {
        let inner = self.lock()?;
        let mut pending: Vec<_> = inner
            .tickets
            .values()
            .filter(|ticket| {
                ticket.unit == unit
                    && ticket.status
                        == crate::workflows::selection::domain::TicketStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|ticket| ticket.submitted_at);
        pending.truncate(limit);
        Ok(pending)
    }
}

impl ScheduleRepository for MemoryStore {
    fn insert_slot(&self, slot: InterviewSlot) -> Result<InterviewSlot, RepositoryError> {
        let mut inner = self.lock()?;
        if inner.slots.contains_key(&slot.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    fn update_slot(&self, slot: InterviewSlot) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        if !inner.slots.contains_key(&slot.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.slots.insert(slot.id, slot);
        Ok(())
    }

    fn fetch_slot(&self, id: SlotId) -> Result<Option<InterviewSlot>, RepositoryError> {
        Ok(self.lock()?.slots.get(&id).cloned())
    }

    fn delete_slot(&self, id: SlotId) -> Result<(), RepositoryError> {
        self.lock()?.slots.remove(&id);
        Ok(())
    }

    fn slots_for_unit(&self, unit: UnitId) -> Result<Vec<InterviewSlot>, RepositoryError> {
        Ok(self
            .lock()?
            .slots
            .values()
            .filter(|slot| slot.unit == unit)
            .cloned()
            .collect())
    }

    fn occupancy(&self, slot: SlotId) -> Result<u32, RepositoryError> {
        Ok(self.lock()?.occupancy(slot))
    }

    fn booking_for(
        &self,
        applicant: ApplicantId,
        slot: SlotId,
    ) -> Result<Option<Booking>, RepositoryError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .find(|booking| {
                booking.applicant == applicant
                    && booking.slot == slot
                    && booking.status.occupies_seat()
            })
            .cloned())
    }

    fn fetch_booking(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.lock()?.bookings.get(&id).cloned())
    }

    fn insert_booking_if_capacity(
        &self,
        booking: Booking,
        max_participants: u32,
    ) -> Result<BookingAttempt, RepositoryError> {
        let mut inner = self.lock()?;
        let duplicate = inner.bookings.values().any(|existing| {
            existing.applicant == booking.applicant
                && existing.slot == booking.slot
                && existing.status.occupies_seat()
        });
        if duplicate {
            return Ok(BookingAttempt::AlreadyBooked);
        }
        let current = inner.occupancy(booking.slot);
        if current >= max_participants {
            return Ok(BookingAttempt::CapacityExhausted { current });
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(BookingAttempt::Created(booking))
    }

    fn update_booking(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut inner = self.lock()?;
        if !inner.bookings.contains_key(&booking.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.bookings.insert(booking.id, booking);
        Ok(())
    }

    fn booking_count_for_unit(&self, unit: UnitId) -> Result<u32, RepositoryError> {
        let inner = self.lock()?;
        let count = inner
            .bookings
            .values()
            .filter(|booking| {
                booking.status.occupies_seat()
                    && inner
                        .slots
                        .get(&booking.slot)
                        .is_some_and(|slot| slot.unit == unit)
            })
            .count();
        Ok(count as u32)
    }

    fn upsert_availability(&self, mark: AvailabilityMark) -> Result<(), RepositoryError> {
        self.lock()?
            .availability
            .insert((mark.reviewer, mark.slot), mark);
        Ok(())
    }

    fn remove_availability(
        &self,
        reviewer: ReviewerId,
        slot: SlotId,
    ) -> Result<(), RepositoryError> {
        self.lock()?.availability.remove(&(reviewer, slot));
        Ok(())
    }

    fn availability_mark(
        &self,
        reviewer: ReviewerId,
        slot: SlotId,
    ) -> Result<Option<AvailabilityMark>, RepositoryError> {
        Ok(self.lock()?.availability.get(&(reviewer, slot)).copied())
    }

    fn availability_for_slot(
        &self,
        slot: SlotId,
    ) -> Result<Vec<AvailabilityMark>, RepositoryError> {
        Ok(self
            .lock()?
            .availability
            .values()
            .filter(|mark| mark.slot == slot)
            .copied()
            .collect())
    }
}

/// Records every notice instead of delivering it.
#[derive(Default)]
pub struct MemoryNotices {
    sent: Mutex<Vec<ApplicantNotice>>,
}

impl MemoryNotices {
    pub fn sent(&self) -> Vec<ApplicantNotice> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for MemoryNotices {
    fn notify(&self, notice: ApplicantNotice) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Always-failing transport for the best-effort isolation tests.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notice: ApplicantNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("transport down".to_string()))
    }
}

/// Draft buffer whose every operation fails, standing in for an
/// unreachable cache.
pub struct FailingDraftStore;

impl DraftStore for FailingDraftStore {
    fn save(&self, _: ApplicantId, _: UnitId, _: Draft) -> Result<(), DraftError> {
        Err(DraftError::Unavailable("buffer down".to_string()))
    }

    fn get(&self, _: ApplicantId, _: UnitId) -> Result<Option<Draft>, DraftError> {
        Err(DraftError::Unavailable("buffer down".to_string()))
    }

    fn remaining_ttl(&self, _: ApplicantId, _: UnitId) -> Result<Option<Duration>, DraftError> {
        Err(DraftError::Unavailable("buffer down".to_string()))
    }

    fn discard(&self, _: ApplicantId, _: UnitId) -> Result<(), DraftError> {
        Err(DraftError::Unavailable("buffer down".to_string()))
    }
}

/// Fixed actor-to-capability table for router tests.
#[derive(Default)]
pub struct StaticDirectory {
    contexts: HashMap<i64, AuthContext>,
}

impl StaticDirectory {
    pub fn with(mut self, actor: i64, capabilities: Vec<Capability>) -> Self {
        self.contexts.insert(actor, AuthContext::new(actor, capabilities));
        self
    }
}

impl CapabilityDirectory for StaticDirectory {
    fn context_for(&self, actor: i64) -> Result<Option<AuthContext>, RepositoryError> {
        Ok(self.contexts.get(&actor).cloned())
    }
}

// --- fixtures ---

pub fn open_unit(store: &MemoryStore, stage: Stage) -> OrganizationalUnit {
    unit_with(store, Some(stage), StageStatus::Open)
}

pub fn unit_with(
    store: &MemoryStore,
    stage: Option<Stage>,
    status: StageStatus,
) -> OrganizationalUnit {
    let unit = OrganizationalUnit {
        id: UnitId(fixture_id()),
        name: "Design Faculty".to_string(),
        current_stage: stage,
        stage_status: status,
        video_intake_open: false,
        video_chat_id: None,
        created_at: at(8),
    };
    store.insert_unit(unit.clone()).unwrap()
}

pub fn questionnaire_template(store: &MemoryStore, unit: UnitId) -> FormTemplate {
    store
        .publish_template(FormTemplate {
            id: crate::workflows::selection::domain::TemplateId(fixture_id()),
            unit,
            stage: Stage::Questionnaire,
            version: 1,
            is_active: true,
            questions: vec![
                Question {
                    id: "motivation".to_string(),
                    text: "Why do you want to join?".to_string(),
                    kind: QuestionKind::Text,
                    required: true,
                    order: 1,
                    options: vec![],
                    max_length: Some(500),
                    min_value: None,
                    max_value: None,
                },
                Question {
                    id: "track".to_string(),
                    text: "Preferred track".to_string(),
                    kind: QuestionKind::SingleChoice,
                    required: true,
                    order: 2,
                    options: vec!["design".to_string(), "media".to_string()],
                    max_length: None,
                    min_value: None,
                    max_value: None,
                },
            ],
        })
        .unwrap()
}

pub fn complete_answers() -> AnswerSet {
    let mut answers = AnswerSet::new();
    answers.insert(
        "motivation".to_string(),
        AnswerValue::Text("I want to build things.".to_string()),
    );
    answers.insert(
        "track".to_string(),
        AnswerValue::Choice("design".to_string()),
    );
    answers
}

pub fn future_slot(store: &MemoryStore, unit: UnitId, seats: u32) -> InterviewSlot {
    store
        .insert_slot(InterviewSlot {
            id: SlotId(fixture_id()),
            unit,
            starts_at: at(14),
            ends_at: at(15),
            max_participants: seats,
            location: Some("Room 101".to_string()),
            is_active: true,
            created_by: ReviewerId(1),
            created_at: at(8),
        })
        .unwrap()
}

// --- service harness ---

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub drafts: Arc<InMemoryDraftStore>,
    pub notices: Arc<MemoryNotices>,
    pub ledger: SubmissionLedger<MemoryStore, InMemoryDraftStore, MemoryNotices>,
    pub scheduler: CapacityScheduler<MemoryStore, MemoryNotices>,
    pub orchestrator: StageOrchestrator<MemoryStore>,
}

pub fn harness() -> Harness {
    harness_with_ttl(Duration::from_secs(3600))
}

/// Actor ids the router tests register in the capability directory.
pub const ADMIN_ACTOR: i64 = 100;
pub const REVIEWER_ACTOR: i64 = 200;
pub const POWERLESS_ACTOR: i64 = 300;

pub struct RouterHarness {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
    pub drafts: Arc<InMemoryDraftStore>,
    pub notices: Arc<MemoryNotices>,
}

pub fn router_harness() -> RouterHarness {
    let h = harness();
    let directory = StaticDirectory::default()
        .with(
            ADMIN_ACTOR,
            vec![Capability::ConfigureUnit, Capability::Review],
        )
        .with(REVIEWER_ACTOR, vec![Capability::Review])
        .with(POWERLESS_ACTOR, vec![Capability::Book]);

    let state = crate::workflows::selection::router::SelectionState {
        ledger: Arc::new(h.ledger),
        scheduler: Arc::new(h.scheduler),
        orchestrator: Arc::new(h.orchestrator),
        drafts: h.drafts.clone(),
        store: h.store.clone(),
        directory: Arc::new(directory),
    };

    RouterHarness {
        router: crate::workflows::selection::router::selection_router(state),
        store: h.store,
        drafts: h.drafts,
        notices: h.notices,
    }
}

pub async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub fn harness_with_ttl(ttl: Duration) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let drafts = Arc::new(InMemoryDraftStore::new(ttl));
    let notices = Arc::new(MemoryNotices::default());
    Harness {
        ledger: SubmissionLedger::new(store.clone(), drafts.clone(), notices.clone()),
        scheduler: CapacityScheduler::new(store.clone(), notices.clone()),
        orchestrator: StageOrchestrator::new(store.clone()),
        store,
        drafts,
        notices,
    }
}
