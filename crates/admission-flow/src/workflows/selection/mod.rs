//! Stage/submission state machine for the admission workflow.
//!
//! Applicant writes flow draft buffer → stage gate → submission ledger
//! or capacity scheduler; admin commands flow into the stage
//! orchestrator, which mutates the unit state the gate reads. Durable
//! storage and notification delivery sit behind the traits in
//! [`repository`], so the same services run against the in-memory
//! adapters used in tests and against a transactional SQL store in
//! production.

pub mod domain;
pub mod drafts;
pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod template;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicantId, ApplicantProgress, AuthContext, AvailabilityMark, Booking, BookingId,
    BookingStatus, Capability, CapabilityRefused, InterviewSlot, OrganizationalUnit,
    ProgressStatus, ReviewTicket, ReviewerId, SlotId, Stage, StageStatus, TemplateId, TicketId,
    TicketStatus, UnitId,
};
pub use drafts::{Draft, DraftError, DraftStore, InMemoryDraftStore};
pub use gate::{can_write, GateRefusal};
pub use ledger::{
    ReviewDecision, SubmissionError, SubmissionIntent, SubmissionLedger, SubmissionReceipt,
};
pub use orchestrator::{OrchestratorError, StageOrchestrator};
pub use repository::{
    ApplicantNotice, BookingAttempt, CapabilityDirectory, FinalSubmission, LedgerRepository,
    NoticeKind, Notifier, NotifyError, RepositoryError, ScheduleRepository, SelectionStore,
    TemplateRepository, UnitRepository,
};
pub use router::{selection_router, SelectionState};
pub use schedule::{CapacityScheduler, ScheduleError, SlotDraft, SlotView};
pub use template::{
    AnswerIssue, AnswerProblem, AnswerSet, AnswerValue, FormTemplate, Question, QuestionKind,
};
