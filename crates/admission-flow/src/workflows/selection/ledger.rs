use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    ApplicantId, ApplicantProgress, ProgressStatus, ReviewTicket, ReviewerId, Stage, TemplateId,
    TicketId, TicketStatus, UnitId,
};
use super::drafts::DraftStore;
use super::gate::{self, GateRefusal};
use super::repository::{
    ApplicantNotice, FinalSubmission, LedgerRepository, NoticeKind, Notifier, RepositoryError,
    TemplateRepository, UnitRepository,
};
use super::template::{AnswerIssue, AnswerSet};

static TICKET_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_ticket_id() -> TicketId {
    TicketId(TICKET_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// What an applicant hands in: the answers plus the template version
/// they were written against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionIntent {
    pub applicant: ApplicantId,
    pub unit: UnitId,
    pub stage: Stage,
    pub template_id: TemplateId,
    pub answers: AnswerSet,
}

/// Confirmation returned once the durable triple write committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub ticket: TicketId,
    pub submitted_at: DateTime<Utc>,
}

/// Reviewer verdict on a pending ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

/// Error raised by the submission ledger.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Gate(#[from] GateRefusal),
    #[error("{} answer(s) missing or invalid", .issues.len())]
    Validation { issues: Vec<AnswerIssue> },
    #[error("answers reference a stale template version; refresh the form")]
    TemplateOutdated { active: TemplateId },
    #[error("no active template for this stage")]
    TemplateMissing,
    #[error("organizational unit not found")]
    UnitNotFound,
    #[error("review ticket not found")]
    TicketNotFound,
    #[error("ticket is already resolved")]
    AlreadyResolved,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Durable record of finalized submissions plus the review worklist.
/// The triple write (submission, ticket, progress) commits atomically;
/// draft discard and the applicant notice stay outside that boundary.
pub struct SubmissionLedger<R, D, N> {
    store: Arc<R>,
    drafts: Arc<D>,
    notices: Arc<N>,
}

impl<R, D, N> SubmissionLedger<R, D, N>
where
    R: UnitRepository + TemplateRepository + LedgerRepository + 'static,
    D: DraftStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<R>, drafts: Arc<D>, notices: Arc<N>) -> Self {
        Self {
            store,
            drafts,
            notices,
        }
    }

    /// Finalize an applicant's answers for the unit's current stage.
    ///
    /// The gate is re-checked here even though callers usually checked it
    /// already: time may have passed since, and only the check adjacent to
    /// the write counts.
    pub fn submit(
        &self,
        intent: SubmissionIntent,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let unit = self
            .store
            .fetch_unit(intent.unit)?
            .ok_or(SubmissionError::UnitNotFound)?;
        let template = self
            .store
            .active_template(intent.unit, intent.stage)?
            .ok_or(SubmissionError::TemplateMissing)?;

        if template.id != intent.template_id {
            return Err(SubmissionError::TemplateOutdated {
                active: template.id,
            });
        }

        let progress = self
            .store
            .progress_for(intent.applicant, intent.unit, intent.stage)?;
        gate::can_write(&unit, intent.stage, progress.as_ref())?;

        template
            .validate(&intent.answers)
            .map_err(|issues| SubmissionError::Validation { issues })?;

        let submission = FinalSubmission {
            applicant: intent.applicant,
            unit: intent.unit,
            stage: intent.stage,
            template_id: template.id,
            template_version: template.version,
            answers: intent.answers.clone(),
            submitted_at: now,
        };
        let ticket = ReviewTicket {
            id: next_ticket_id(),
            applicant: intent.applicant,
            unit: intent.unit,
            stage: intent.stage,
            answers: intent.answers,
            status: TicketStatus::Pending,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            notes: None,
        };
        let mut progress = progress
            .unwrap_or_else(|| ApplicantProgress::initial(intent.applicant, intent.unit, intent.stage));
        progress.status = ProgressStatus::Submitted;
        progress.submitted_at = Some(now);

        let receipt = SubmissionReceipt {
            ticket: ticket.id,
            submitted_at: now,
        };

        match self.store.record_submission(submission, ticket, progress) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => return Err(GateRefusal::AlreadySubmitted.into()),
            Err(err) => return Err(err.into()),
        }

        // Best-effort from here on; the submission already committed.
        if let Err(err) = self.drafts.discard(intent.applicant, intent.unit) {
            warn!(applicant = intent.applicant.0, unit = intent.unit.0, %err, "draft discard after submit failed");
        }
        if let Err(err) = self.notices.notify(ApplicantNotice {
            applicant: intent.applicant,
            kind: NoticeKind::SubmissionReceived,
            context: format!("{} submission received", intent.stage.label()),
        }) {
            warn!(applicant = intent.applicant.0, %err, "submission notice delivery failed");
        }

        Ok(receipt)
    }

    /// Resolve a pending ticket. The first resolution stands; a second
    /// caller is refused.
    pub fn resolve(
        &self,
        ticket_id: TicketId,
        decision: ReviewDecision,
        reviewer: ReviewerId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ReviewTicket, SubmissionError> {
        let mut ticket = self
            .store
            .ticket(ticket_id)?
            .ok_or(SubmissionError::TicketNotFound)?;

        if ticket.status != TicketStatus::Pending {
            return Err(SubmissionError::AlreadyResolved);
        }

        let mut progress = self
            .store
            .progress_for(ticket.applicant, ticket.unit, ticket.stage)?
            .unwrap_or_else(|| {
                ApplicantProgress::initial(ticket.applicant, ticket.unit, ticket.stage)
            });

        let notice_kind = match &decision {
            ReviewDecision::Approve => {
                ticket.status = TicketStatus::Approved;
                progress.status = ProgressStatus::Approved;
                progress.approved_at = Some(now);
                NoticeKind::SubmissionApproved
            }
            ReviewDecision::Reject { reason } => {
                ticket.status = TicketStatus::Rejected;
                progress.status = ProgressStatus::Rejected;
                progress.rejected_at = Some(now);
                progress.rejection_reason = Some(reason.clone());
                NoticeKind::SubmissionRejected
            }
        };
        ticket.reviewed_at = Some(now);
        ticket.reviewed_by = Some(reviewer);
        ticket.notes = notes;

        self.store.resolve_ticket(ticket.clone(), progress)?;

        if let Err(err) = self.notices.notify(ApplicantNotice {
            applicant: ticket.applicant,
            kind: notice_kind,
            context: format!(
                "{} submission {}",
                ticket.stage.label(),
                ticket.status.label()
            ),
        }) {
            warn!(applicant = ticket.applicant.0, %err, "review notice delivery failed");
        }

        Ok(ticket)
    }

    /// Review worklist for a unit, oldest submissions first.
    pub fn pending(&self, unit: UnitId, limit: usize) -> Result<Vec<ReviewTicket>, SubmissionError> {
        Ok(self.store.pending_tickets(unit, limit)?)
    }
}
