use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    ApplicantId, AvailabilityMark, Booking, BookingId, BookingStatus, InterviewSlot, ReviewerId,
    SlotId, UnitId,
};
use super::repository::{
    ApplicantNotice, BookingAttempt, NoticeKind, Notifier, RepositoryError, ScheduleRepository,
    UnitRepository,
};

static SLOT_SEQUENCE: AtomicI64 = AtomicI64::new(1);
static BOOKING_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_slot_id() -> SlotId {
    SlotId(SLOT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

fn next_booking_id() -> BookingId {
    BookingId(BOOKING_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Error raised by the capacity scheduler.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("slot has no seats left")]
    SlotFull,
    #[error("slot time has already elapsed")]
    SlotInPast,
    #[error("slot is deactivated")]
    SlotInactive,
    #[error("applicant already holds a booking in this slot")]
    AlreadyBooked,
    #[error("cannot shrink capacity below the {booked} existing booking(s)")]
    BelowCurrentOccupancy { booked: u32 },
    #[error("slot still has {booked} booking(s); deactivate it instead")]
    HasBookings { booked: u32 },
    #[error("cannot change availability for an elapsed slot")]
    PastSlot,
    #[error("slot must start before it ends")]
    InvalidWindow,
    #[error("slot capacity must be at least one seat")]
    ZeroCapacity,
    #[error("interview slot not found")]
    SlotNotFound,
    #[error("booking not found")]
    BookingNotFound,
    #[error("organizational unit not found")]
    UnitNotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Admin request for a new slot, either an hourly bucket of an interview
/// day or an ad-hoc range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDraft {
    pub unit: UnitId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
    pub location: Option<String>,
}

/// One slot as shown to admins and reviewers, with derived occupancy and
/// the viewer's own availability overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub slot: InterviewSlot,
    pub current_participants: u32,
    pub available_places: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_availability: Option<bool>,
}

/// Manages interview-slot capacity: seat counts, bookings, and the
/// reviewer-availability overlay. Occupancy checks and booking writes
/// share one atomic repository operation, so seats cannot be oversold by
/// concurrent callers.
pub struct CapacityScheduler<R, N> {
    store: Arc<R>,
    notices: Arc<N>,
}

impl<R, N> CapacityScheduler<R, N>
where
    R: ScheduleRepository + UnitRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<R>, notices: Arc<N>) -> Self {
        Self { store, notices }
    }

    /// Create a slot and mark its creator as available in it.
    pub fn create_slot(
        &self,
        draft: SlotDraft,
        created_by: ReviewerId,
        now: DateTime<Utc>,
    ) -> Result<InterviewSlot, ScheduleError> {
        self.store
            .fetch_unit(draft.unit)?
            .ok_or(ScheduleError::UnitNotFound)?;

        if draft.starts_at >= draft.ends_at {
            return Err(ScheduleError::InvalidWindow);
        }
        if draft.starts_at < now {
            return Err(ScheduleError::SlotInPast);
        }
        if draft.max_participants == 0 {
            return Err(ScheduleError::ZeroCapacity);
        }

        let slot = self.store.insert_slot(InterviewSlot {
            id: next_slot_id(),
            unit: draft.unit,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            max_participants: draft.max_participants,
            location: draft.location,
            is_active: true,
            created_by,
            created_at: now,
        })?;

        self.store.upsert_availability(AvailabilityMark {
            reviewer: created_by,
            slot: slot.id,
            updated_at: now,
        })?;

        Ok(slot)
    }

    /// Change the seat count. Never allowed below current occupancy.
    pub fn set_capacity(
        &self,
        slot_id: SlotId,
        new_max: u32,
    ) -> Result<InterviewSlot, ScheduleError> {
        let mut slot = self
            .store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;
        let booked = self.store.occupancy(slot_id)?;

        if new_max < booked {
            return Err(ScheduleError::BelowCurrentOccupancy { booked });
        }

        slot.max_participants = new_max;
        self.store.update_slot(slot.clone())?;
        Ok(slot)
    }

    /// Deactivation is the soft alternative to deleting a slot that
    /// already carries bookings.
    pub fn set_active(&self, slot_id: SlotId, active: bool) -> Result<InterviewSlot, ScheduleError> {
        let mut slot = self
            .store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;
        slot.is_active = active;
        self.store.update_slot(slot.clone())?;
        Ok(slot)
    }

    /// Claim one seat for the applicant. The duplicate check, the seat
    /// count check, and the booking insert are a single atomic store
    /// operation; re-running a successful book returns `AlreadyBooked`
    /// rather than silently succeeding twice. The `booking_for` read
    /// here is only the fast path.
    pub fn book(
        &self,
        applicant: ApplicantId,
        slot_id: SlotId,
        now: DateTime<Utc>,
    ) -> Result<Booking, ScheduleError> {
        let slot = self
            .store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;

        if slot.starts_at < now {
            return Err(ScheduleError::SlotInPast);
        }
        if !slot.is_active {
            return Err(ScheduleError::SlotInactive);
        }
        if self.store.booking_for(applicant, slot_id)?.is_some() {
            return Err(ScheduleError::AlreadyBooked);
        }

        let attempt = self.store.insert_booking_if_capacity(
            Booking {
                id: next_booking_id(),
                applicant,
                slot: slot_id,
                assigned_reviewer: None,
                status: BookingStatus::Scheduled,
                booked_at: now,
            },
            slot.max_participants,
        )?;

        let booking = match attempt {
            BookingAttempt::Created(booking) => booking,
            BookingAttempt::AlreadyBooked => return Err(ScheduleError::AlreadyBooked),
            BookingAttempt::CapacityExhausted { .. } => return Err(ScheduleError::SlotFull),
        };

        if let Err(err) = self.notices.notify(ApplicantNotice {
            applicant,
            kind: NoticeKind::InterviewBooked,
            context: format!("interview booked for {}", slot.starts_at.to_rfc3339()),
        }) {
            warn!(applicant = applicant.0, %err, "booking notice delivery failed");
        }

        Ok(booking)
    }

    /// Release the seat. Cancelling an already-cancelled booking is a
    /// no-op success.
    pub fn cancel(&self, booking_id: BookingId) -> Result<Booking, ScheduleError> {
        let mut booking = self
            .store
            .fetch_booking(booking_id)?
            .ok_or(ScheduleError::BookingNotFound)?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        booking.status = BookingStatus::Cancelled;
        self.store.update_booking(booking.clone())?;
        Ok(booking)
    }

    /// Set or clear the reviewer's availability mark. Idempotent in both
    /// directions; clearing an absent mark succeeds.
    pub fn mark_availability(
        &self,
        reviewer: ReviewerId,
        slot_id: SlotId,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        let slot = self
            .store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;

        if slot.starts_at < now {
            return Err(ScheduleError::PastSlot);
        }

        if available {
            self.store.upsert_availability(AvailabilityMark {
                reviewer,
                slot: slot_id,
                updated_at: now,
            })?;
        } else {
            self.store.remove_availability(reviewer, slot_id)?;
        }
        Ok(())
    }

    /// Hard delete, only while nothing non-cancelled references the slot.
    pub fn delete_slot(&self, slot_id: SlotId) -> Result<(), ScheduleError> {
        self.store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;
        let booked = self.store.occupancy(slot_id)?;

        if booked > 0 {
            return Err(ScheduleError::HasBookings { booked });
        }

        self.store.delete_slot(slot_id)?;
        Ok(())
    }

    /// Every reviewer marked available for the slot, ordered by reviewer
    /// id. This is the roster admins consult when staffing a slot.
    pub fn slot_availability(
        &self,
        slot_id: SlotId,
    ) -> Result<Vec<AvailabilityMark>, ScheduleError> {
        self.store
            .fetch_slot(slot_id)?
            .ok_or(ScheduleError::SlotNotFound)?;

        let mut marks = self.store.availability_for_slot(slot_id)?;
        marks.sort_by_key(|mark| mark.reviewer);
        Ok(marks)
    }

    /// All of a unit's slots ordered by start time, with occupancy and,
    /// when a viewer is given, that reviewer's availability overlay.
    pub fn slot_overview(
        &self,
        unit: UnitId,
        viewer: Option<ReviewerId>,
    ) -> Result<Vec<SlotView>, ScheduleError> {
        self.store
            .fetch_unit(unit)?
            .ok_or(ScheduleError::UnitNotFound)?;

        let mut slots = self.store.slots_for_unit(unit)?;
        slots.sort_by_key(|slot| slot.starts_at);

        let mut views = Vec::with_capacity(slots.len());
        for slot in slots {
            let current_participants = self.store.occupancy(slot.id)?;
            let available_places = slot.max_participants.saturating_sub(current_participants);
            let my_availability = match viewer {
                Some(reviewer) => Some(self.store.availability_mark(reviewer, slot.id)?.is_some()),
                None => None,
            };
            views.push(SlotView {
                slot,
                current_participants,
                available_places,
                my_availability,
            });
        }

        Ok(views)
    }
}
