use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use admission_flow::workflows::selection::domain::{
    ApplicantId, ApplicantProgress, AuthContext, AvailabilityMark, Booking, BookingId,
    Capability, InterviewSlot, OrganizationalUnit, ReviewTicket, ReviewerId, SlotId, Stage,
    TicketId, TicketStatus, UnitId,
};
use admission_flow::workflows::selection::repository::{
    ApplicantNotice, BookingAttempt, CapabilityDirectory, FinalSubmission, LedgerRepository,
    NotifyError, Notifier, RepositoryError, ScheduleRepository, TemplateRepository,
    UnitRepository,
};
use admission_flow::workflows::selection::template::FormTemplate;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreInner {
    units: HashMap<UnitId, OrganizationalUnit>,
    templates: Vec<FormTemplate>,
    submissions: HashMap<(ApplicantId, UnitId, Stage), FinalSubmission>,
    tickets: HashMap<TicketId, ReviewTicket>,
    progress: HashMap<(ApplicantId, UnitId, Stage), ApplicantProgress>,
    slots: HashMap<SlotId, InterviewSlot>,
    bookings: HashMap<BookingId, Booking>,
    availability: HashMap<(ReviewerId, SlotId), AvailabilityMark>,
}

impl StoreInner {
    fn occupancy(&self, slot: SlotId) -> u32 {
        self.bookings
            .values()
            .filter(|booking| booking.slot == slot && booking.status.occupies_seat())
            .count() as u32
    }
}

/// Process-local storage backend. One mutex guards the whole dataset, so
/// the multi-row operations the repository traits declare atomic really
/// are.
#[derive(Default)]
pub(crate) struct InMemorySelectionStore {
    inner: Mutex<StoreInner>,
}

impl InMemorySelectionStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl UnitRepository for InMemorySelectionStore {
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

impl TemplateRepository for InMemorySelectionStore {
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

impl LedgerRepository for InMemorySelectionStore {
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
            .filter(|ticket| ticket.unit == unit && ticket.status == TicketStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|ticket| ticket.submitted_at);
        pending.truncate(limit);
        Ok(pending)
    }
}

impl ScheduleRepository for InMemorySelectionStore {
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

/// Notice transport that writes to the service log. Stands in for the
/// chat or e-mail adapter a deployment would plug in here.
#[derive(Default)]
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: ApplicantNotice) -> Result<(), NotifyError> {
        info!(
            applicant = notice.applicant.0,
            kind = ?notice.kind,
            context = %notice.context,
            "applicant notice"
        );
        Ok(())
    }
}

/// Static actor roster. A deployment would back this with its identity
/// provider; the bundled server grants one head-admin account and one
/// reviewer account.
#[derive(Default)]
pub(crate) struct StaticRoster {
    contexts: HashMap<i64, AuthContext>,
}

impl StaticRoster {
    pub(crate) fn grant(mut self, actor: i64, capabilities: Vec<Capability>) -> Self {
        self.contexts
            .insert(actor, AuthContext::new(actor, capabilities));
        self
    }
}

impl CapabilityDirectory for StaticRoster {
    fn context_for(&self, actor: i64) -> Result<Option<AuthContext>, RepositoryError> {
        Ok(self.contexts.get(&actor).cloned())
    }
}

pub(crate) fn default_roster() -> StaticRoster {
    StaticRoster::default()
        .grant(
            1,
            vec![
                Capability::ConfigureUnit,
                Capability::Review,
                Capability::Book,
            ],
        )
        .grant(2, vec![Capability::Review])
}
