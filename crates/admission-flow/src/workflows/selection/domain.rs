use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::AnswerSet;

/// Identifier wrapper for applicants (students going through selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantId(pub i64);

/// Identifier wrapper for organizational units (faculties).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub i64);

/// Identifier wrapper for reviewers and head administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReviewerId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

/// The fixed set of selection stages a unit runs its applicants through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Questionnaire,
    HomeVideo,
    Interview,
}

impl Stage {
    pub const fn label(self) -> &'static str {
        match self {
            Stage::Questionnaire => "questionnaire",
            Stage::HomeVideo => "home_video",
            Stage::Interview => "interview",
        }
    }
}

/// Intake state of a unit's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    Open,
    Closed,
    Completed,
}

impl StageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::Open => "open",
            StageStatus::Closed => "closed",
            StageStatus::Completed => "completed",
        }
    }
}

/// A faculty running its own selection. `current_stage` is `None` until
/// an administrator starts the first stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub id: UnitId,
    pub name: String,
    pub current_stage: Option<Stage>,
    pub stage_status: StageStatus,
    pub video_intake_open: bool,
    /// Group chat that receives home-video submissions, once configured.
    pub video_chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Where an applicant stands within one stage of one unit's selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

impl ProgressStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Submitted => "submitted",
            ProgressStatus::Approved => "approved",
            ProgressStatus::Rejected => "rejected",
        }
    }
}

/// One row per (applicant, unit, stage). Transitions move forward only;
/// there is no un-submitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProgress {
    pub applicant: ApplicantId,
    pub unit: UnitId,
    pub stage: Stage,
    pub status: ProgressStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ApplicantProgress {
    /// Default row used when an applicant has no recorded progress yet.
    pub fn initial(applicant: ApplicantId, unit: UnitId, stage: Stage) -> Self {
        Self {
            applicant,
            unit,
            stage,
            status: ProgressStatus::NotStarted,
            submitted_at: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Approved,
    Rejected,
}

impl TicketStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Approved => "approved",
            TicketStatus::Rejected => "rejected",
        }
    }
}

/// Review worklist entry carrying a denormalized copy of the answers as
/// they were at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTicket {
    pub id: TicketId,
    pub applicant: ApplicantId,
    pub unit: UnitId,
    pub stage: Stage,
    pub answers: AnswerSet,
    pub status: TicketStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<ReviewerId>,
    pub notes: Option<String>,
}

/// An interview time window with an admin-set seat count. Occupancy is
/// derived from non-cancelled bookings and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSlot {
    pub id: SlotId,
    pub unit: UnitId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_by: ReviewerId,
    pub created_at: DateTime<Utc>,
}

/// A reviewer's declaration that they can staff a slot. Existence of the
/// row is the mark; unmarking removes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityMark {
    pub reviewer: ReviewerId,
    pub slot: SlotId,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    NoShow,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub const fn occupies_seat(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

/// An applicant's claim on one seat in an interview slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub applicant: ApplicantId,
    pub slot: SlotId,
    pub assigned_reviewer: Option<ReviewerId>,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
}

/// What a caller is allowed to do. Resolved once at the request boundary;
/// core operations never inspect roles themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ConfigureUnit,
    Review,
    Book,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Capability::ConfigureUnit => "configure_unit",
            Capability::Review => "review",
            Capability::Book => "book",
        }
    }
}

/// Capability set attached to the caller's identity for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub actor: i64,
    capabilities: BTreeSet<Capability>,
}

/// Refusal returned when the caller lacks a required capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("caller lacks the '{}' capability", .capability.label())]
pub struct CapabilityRefused {
    pub capability: Capability,
}

impl AuthContext {
    pub fn new(actor: i64, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            actor,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), CapabilityRefused> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(CapabilityRefused { capability })
        }
    }
}
