use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicantProgress, AuthContext, AvailabilityMark, Booking, BookingId,
    InterviewSlot, OrganizationalUnit, ReviewTicket, ReviewerId, SlotId, Stage, TicketId, UnitId,
};
use super::template::FormTemplate;

/// Error enumeration for storage failures. `Conflict` carries the
/// uniqueness guarantees the services lean on (one submission per
/// applicant/unit/stage, seats never oversold).
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Organizational unit rows. Deletion here is unconditional; the
/// orchestrator performs the in-use checks first.
pub trait UnitRepository: Send + Sync {
    fn insert_unit(&self, unit: OrganizationalUnit)
        -> Result<OrganizationalUnit, RepositoryError>;
    fn update_unit(&self, unit: OrganizationalUnit) -> Result<(), RepositoryError>;
    fn fetch_unit(&self, id: UnitId) -> Result<Option<OrganizationalUnit>, RepositoryError>;
    fn delete_unit(&self, id: UnitId) -> Result<(), RepositoryError>;
    fn list_units(&self) -> Result<Vec<OrganizationalUnit>, RepositoryError>;
}

/// Versioned question schemas. Publishing deactivates the previous
/// active version for the same (unit, stage) in the same transaction.
pub trait TemplateRepository: Send + Sync {
    fn publish_template(&self, template: FormTemplate) -> Result<FormTemplate, RepositoryError>;
    fn active_template(
        &self,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<FormTemplate>, RepositoryError>;
}

/// Finalized submission returned to callers after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSubmission {
    pub applicant: ApplicantId,
    pub unit: UnitId,
    pub stage: Stage,
    pub template_id: super::domain::TemplateId,
    pub template_version: u32,
    pub answers: super::template::AnswerSet,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Durable records written by the submission ledger. `record_submission`
/// and `resolve_ticket` are each one atomic unit: every row lands or
/// none does.
pub trait LedgerRepository: Send + Sync {
    fn progress_for(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<ApplicantProgress>, RepositoryError>;

    /// Insert the immutable submission, open its review ticket, and
    /// upsert progress, atomically. Returns `Conflict` when a submission
    /// for (applicant, unit, stage) already exists; the uniqueness check
    /// and the insert are the same atomic step.
    fn record_submission(
        &self,
        submission: FinalSubmission,
        ticket: ReviewTicket,
        progress: ApplicantProgress,
    ) -> Result<(), RepositoryError>;

    fn submission(
        &self,
        applicant: ApplicantId,
        unit: UnitId,
        stage: Stage,
    ) -> Result<Option<FinalSubmission>, RepositoryError>;

    /// Non-draft submissions referencing the unit, any stage.
    fn submission_count(&self, unit: UnitId) -> Result<u32, RepositoryError>;

    fn ticket(&self, id: TicketId) -> Result<Option<ReviewTicket>, RepositoryError>;

    /// Store the resolved ticket and the matching progress row as one
    /// atomic update.
    fn resolve_ticket(
        &self,
        ticket: ReviewTicket,
        progress: ApplicantProgress,
    ) -> Result<(), RepositoryError>;

    fn pending_tickets(
        &self,
        unit: UnitId,
        limit: usize,
    ) -> Result<Vec<ReviewTicket>, RepositoryError>;
}

/// Result of the conditional booking insert. The duplicate check, the
/// occupancy comparison, and the row write happen under one
/// lock/transaction so two racing bookings can never both claim the last
/// seat, and the same applicant can never land two seats in one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingAttempt {
    Created(Booking),
    AlreadyBooked,
    CapacityExhausted { current: u32 },
}

/// Interview slots, bookings, and the reviewer-availability overlay.
pub trait ScheduleRepository: Send + Sync {
    fn insert_slot(&self, slot: InterviewSlot) -> Result<InterviewSlot, RepositoryError>;
    fn update_slot(&self, slot: InterviewSlot) -> Result<(), RepositoryError>;
    fn fetch_slot(&self, id: SlotId) -> Result<Option<InterviewSlot>, RepositoryError>;
    fn delete_slot(&self, id: SlotId) -> Result<(), RepositoryError>;
    fn slots_for_unit(&self, unit: UnitId) -> Result<Vec<InterviewSlot>, RepositoryError>;

    /// Seats currently taken: bookings for the slot in any non-cancelled
    /// status.
    fn occupancy(&self, slot: SlotId) -> Result<u32, RepositoryError>;

    /// The applicant's non-cancelled booking in this slot, if any.
    fn booking_for(
        &self,
        applicant: ApplicantId,
        slot: SlotId,
    ) -> Result<Option<Booking>, RepositoryError>;

    fn fetch_booking(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;

    /// Atomic conditional insert: create the booking only while the
    /// slot's occupancy is below `max_participants` and the applicant
    /// holds no non-cancelled booking in the slot.
    fn insert_booking_if_capacity(
        &self,
        booking: Booking,
        max_participants: u32,
    ) -> Result<BookingAttempt, RepositoryError>;

    fn update_booking(&self, booking: Booking) -> Result<(), RepositoryError>;

    /// Non-cancelled bookings across every slot of the unit.
    fn booking_count_for_unit(&self, unit: UnitId) -> Result<u32, RepositoryError>;

    fn upsert_availability(&self, mark: AvailabilityMark) -> Result<(), RepositoryError>;

    /// Removing an absent mark succeeds as a no-op.
    fn remove_availability(&self, reviewer: ReviewerId, slot: SlotId)
        -> Result<(), RepositoryError>;

    fn availability_mark(
        &self,
        reviewer: ReviewerId,
        slot: SlotId,
    ) -> Result<Option<AvailabilityMark>, RepositoryError>;

    /// Every reviewer's mark for the slot.
    fn availability_for_slot(&self, slot: SlotId) -> Result<Vec<AvailabilityMark>, RepositoryError>;
}

/// Everything the HTTP boundary needs from one storage backend.
pub trait SelectionStore:
    UnitRepository + TemplateRepository + LedgerRepository + ScheduleRepository
{
}

impl<T> SelectionStore for T where
    T: UnitRepository + TemplateRepository + LedgerRepository + ScheduleRepository
{
}

/// Kinds of applicant-facing outcome notices the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SubmissionReceived,
    SubmissionApproved,
    SubmissionRejected,
    InterviewBooked,
}

/// Fire-and-forget payload for the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantNotice {
    pub applicant: ApplicantId,
    pub kind: NoticeKind,
    pub context: String,
}

/// Notice dispatch error. Delivery failure never rolls back the mutation
/// that produced the notice.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing the outbound notification hook (chat message,
/// e-mail adapter).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: ApplicantNotice) -> Result<(), NotifyError>;
}

/// Maps an already-authenticated actor to their capability set, once per
/// request at the boundary.
pub trait CapabilityDirectory: Send + Sync {
    fn context_for(&self, actor: i64) -> Result<Option<AuthContext>, RepositoryError>;
}
