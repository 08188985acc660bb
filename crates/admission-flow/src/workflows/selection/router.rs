use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    ApplicantId, AuthContext, BookingId, Capability, ReviewerId, SlotId, Stage, StageStatus,
    TemplateId, TicketId, UnitId,
};
use super::drafts::{Draft, DraftStore};
use super::gate::{self, GateRefusal};
use super::ledger::{ReviewDecision, SubmissionError, SubmissionIntent, SubmissionLedger};
use super::orchestrator::{OrchestratorError, StageOrchestrator};
use super::repository::{CapabilityDirectory, RepositoryError, SelectionStore};
use super::schedule::{CapacityScheduler, ScheduleError, SlotDraft};
use super::template::{AnswerSet, FormTemplate, Question};

/// Shared handler state: the three services plus direct seams the form
/// endpoints need.
pub struct SelectionState<R, D, N> {
    pub ledger: Arc<SubmissionLedger<R, D, N>>,
    pub scheduler: Arc<CapacityScheduler<R, N>>,
    pub orchestrator: Arc<StageOrchestrator<R>>,
    pub drafts: Arc<D>,
    pub store: Arc<R>,
    pub directory: Arc<dyn CapabilityDirectory>,
}

impl<R, D, N> Clone for SelectionState<R, D, N> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            scheduler: self.scheduler.clone(),
            orchestrator: self.orchestrator.clone(),
            drafts: self.drafts.clone(),
            store: self.store.clone(),
            directory: self.directory.clone(),
        }
    }
}

/// Router builder exposing the selection workflow over HTTP. Capability
/// checks happen exactly once here; the services underneath stay
/// capability-agnostic.
pub fn selection_router<R, D, N>(state: SelectionState<R, D, N>) -> Router
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    Router::new()
        .route("/api/v1/selection/units", get(list_units_handler::<R, D, N>))
        .route(
            "/api/v1/selection/units",
            post(create_unit_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id",
            delete(delete_unit_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/stage",
            put(set_stage_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/video-chat",
            put(set_video_chat_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/templates",
            post(publish_template_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/form",
            get(form_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/draft",
            put(save_draft_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/draft",
            delete(discard_draft_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/submissions",
            post(submit_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/tickets",
            get(pending_tickets_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/tickets/:ticket_id/resolve",
            post(resolve_ticket_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/slots",
            get(slot_overview_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/units/:unit_id/slots",
            post(create_slot_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id/capacity",
            put(set_capacity_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id/active",
            put(set_active_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id",
            delete(delete_slot_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id/availability",
            put(availability_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id/availability",
            get(slot_availability_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/slots/:slot_id/bookings",
            post(book_handler::<R, D, N>),
        )
        .route(
            "/api/v1/selection/bookings/:booking_id/cancel",
            post(cancel_booking_handler::<R, D, N>),
        )
        .with_state(state)
}

// --- identity and capability plumbing ---

fn header_id(headers: &HeaderMap, name: &str) -> Result<i64, Response> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            let payload = json!({ "error": format!("missing or invalid {name} header") });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        })
}

fn applicant_identity(headers: &HeaderMap) -> Result<ApplicantId, Response> {
    header_id(headers, "x-applicant-id").map(ApplicantId)
}

fn authorize(
    directory: &Arc<dyn CapabilityDirectory>,
    headers: &HeaderMap,
    capability: Capability,
) -> Result<AuthContext, Response> {
    let actor = header_id(headers, "x-actor-id")?;
    let context = match directory.context_for(actor) {
        Ok(Some(context)) => context,
        Ok(None) => {
            let payload = json!({ "error": "unknown actor" });
            return Err((StatusCode::FORBIDDEN, Json(payload)).into_response());
        }
        Err(err) => return Err(repository_error_response(err)),
    };

    if let Err(refused) = context.require(capability) {
        let payload = json!({ "error": refused.to_string() });
        return Err((StatusCode::FORBIDDEN, Json(payload)).into_response());
    }

    Ok(context)
}

// --- error mapping ---

fn repository_error_response(err: RepositoryError) -> Response {
    let status = match &err {
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn submission_error_response(err: SubmissionError) -> Response {
    match err {
        SubmissionError::Validation { issues } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "answers failed validation",
                "issues": issues,
            })),
        )
            .into_response(),
        SubmissionError::Gate(GateRefusal::AlreadySubmitted) | SubmissionError::AlreadyResolved => {
            (
                StatusCode::CONFLICT,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
        SubmissionError::Gate(_) | SubmissionError::TemplateOutdated { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        SubmissionError::UnitNotFound
        | SubmissionError::TicketNotFound
        | SubmissionError::TemplateMissing => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        SubmissionError::Repository(err) => repository_error_response(err),
    }
}

fn schedule_error_response(err: ScheduleError) -> Response {
    match err {
        ScheduleError::SlotFull | ScheduleError::AlreadyBooked => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        ScheduleError::SlotNotFound
        | ScheduleError::BookingNotFound
        | ScheduleError::UnitNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        ScheduleError::Repository(err) => repository_error_response(err),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

fn orchestrator_error_response(err: OrchestratorError) -> Response {
    match err {
        OrchestratorError::UnitNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        OrchestratorError::UnitInUse { .. } => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        OrchestratorError::EmptyTemplate => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        OrchestratorError::Repository(err) => repository_error_response(err),
    }
}

// --- unit administration ---

#[derive(Debug, Deserialize)]
struct CreateUnitRequest {
    name: String,
}

async fn create_unit_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Json(request): Json<CreateUnitRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state.orchestrator.create_unit(request.name, Utc::now()) {
        Ok(unit) => (StatusCode::CREATED, Json(unit)).into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

async fn list_units_handler<R, D, N>(State(state): State<SelectionState<R, D, N>>) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    match state.orchestrator.units() {
        Ok(units) => (StatusCode::OK, Json(units)).into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

async fn delete_unit_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state.orchestrator.delete_unit(UnitId(unit_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SetStageRequest {
    stage: Option<Stage>,
    status: StageStatus,
}

async fn set_stage_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<SetStageRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state
        .orchestrator
        .set_stage(UnitId(unit_id), request.stage, request.status)
    {
        Ok(unit) => (StatusCode::OK, Json(unit)).into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SetVideoChatRequest {
    chat_id: Option<i64>,
}

async fn set_video_chat_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<SetVideoChatRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state
        .orchestrator
        .set_video_chat(UnitId(unit_id), request.chat_id)
    {
        Ok(unit) => (StatusCode::OK, Json(unit)).into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct PublishTemplateRequest {
    stage: Stage,
    questions: Vec<Question>,
}

async fn publish_template_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<PublishTemplateRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state
        .orchestrator
        .publish_template(UnitId(unit_id), request.stage, request.questions)
    {
        Ok(template) => (StatusCode::CREATED, Json(template)).into_response(),
        Err(err) => orchestrator_error_response(err),
    }
}

// --- applicant form, drafts, submission ---

#[derive(Debug, Deserialize)]
struct FormQuery {
    #[serde(default = "default_form_stage")]
    stage: Stage,
}

fn default_form_stage() -> Stage {
    Stage::Questionnaire
}

#[derive(Debug, Serialize)]
struct DraftView {
    template_id: TemplateId,
    template_version: u32,
    answers: AnswerSet,
    updated_at: DateTime<Utc>,
    ttl_seconds: u64,
}

#[derive(Debug, Serialize)]
struct FormView {
    template: FormTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<DraftView>,
    stage_status: &'static str,
    can_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    refusal: Option<String>,
}

async fn form_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Query(query): Query<FormQuery>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let applicant = match applicant_identity(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };
    let unit_id = UnitId(unit_id);

    let unit = match state.store.fetch_unit(unit_id) {
        Ok(Some(unit)) => unit,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "organizational unit not found" })),
            )
                .into_response()
        }
        Err(err) => return repository_error_response(err),
    };
    let template = match state.store.active_template(unit_id, query.stage) {
        Ok(Some(template)) => template,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no active template for this stage" })),
            )
                .into_response()
        }
        Err(err) => return repository_error_response(err),
    };

    let progress = match state.store.progress_for(applicant, unit_id, query.stage) {
        Ok(progress) => progress,
        Err(err) => return repository_error_response(err),
    };
    let decision = gate::can_write(&unit, query.stage, progress.as_ref());

    let draft = match state.drafts.get(applicant, unit_id) {
        Ok(Some(draft)) => {
            let ttl = state
                .drafts
                .remaining_ttl(applicant, unit_id)
                .ok()
                .flatten()
                .map(|ttl| ttl.as_secs())
                .unwrap_or(0);
            Some(DraftView {
                template_id: draft.template_id,
                template_version: draft.template_version,
                answers: draft.answers,
                updated_at: draft.updated_at,
                ttl_seconds: ttl,
            })
        }
        Ok(None) => None,
        Err(_) => None,
    };

    let view = FormView {
        template,
        draft,
        stage_status: unit.stage_status.label(),
        can_submit: decision.is_ok(),
        refusal: decision.err().map(|refusal| refusal.to_string()),
    };
    (StatusCode::OK, Json(view)).into_response()
}

#[derive(Debug, Deserialize)]
struct SaveDraftRequest {
    #[serde(default = "default_form_stage")]
    stage: Stage,
    template_id: TemplateId,
    answers: AnswerSet,
}

async fn save_draft_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<SaveDraftRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let applicant = match applicant_identity(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };
    let unit_id = UnitId(unit_id);

    // Drafts are permissive, but they must be written against the
    // template version currently live for the stage.
    let template = match state.store.active_template(unit_id, request.stage) {
        Ok(Some(template)) => template,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no active template for this stage" })),
            )
                .into_response()
        }
        Err(err) => return repository_error_response(err),
    };
    if template.id != request.template_id {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "draft references a stale template version" })),
        )
            .into_response();
    }

    let draft = Draft {
        template_id: template.id,
        template_version: template.version,
        answers: request.answers,
        updated_at: Utc::now(),
    };
    match state.drafts.save(applicant, unit_id, draft) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn discard_draft_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let applicant = match applicant_identity(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };

    match state.drafts.discard(applicant, UnitId(unit_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    #[serde(default = "default_form_stage")]
    stage: Stage,
    template_id: TemplateId,
    answers: AnswerSet,
}

async fn submit_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<SubmitRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let applicant = match applicant_identity(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };

    let intent = SubmissionIntent {
        applicant,
        unit: UnitId(unit_id),
        stage: request.stage,
        template_id: request.template_id,
        answers: request.answers,
    };
    match state.ledger.submit(intent, Utc::now()) {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => submission_error_response(err),
    }
}

// --- review ---

#[derive(Debug, Deserialize)]
struct PendingQuery {
    #[serde(default = "default_pending_limit")]
    limit: usize,
}

fn default_pending_limit() -> usize {
    50
}

async fn pending_tickets_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Query(query): Query<PendingQuery>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::Review) {
        return response;
    }

    match state.ledger.pending(UnitId(unit_id), query.limit) {
        Ok(tickets) => (StatusCode::OK, Json(tickets)).into_response(),
        Err(err) => submission_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    #[serde(flatten)]
    decision: ReviewDecision,
    #[serde(default)]
    notes: Option<String>,
}

async fn resolve_ticket_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(ticket_id): Path<i64>,
    Json(request): Json<ResolveRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let context = match authorize(&state.directory, &headers, Capability::Review) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.ledger.resolve(
        TicketId(ticket_id),
        request.decision,
        ReviewerId(context.actor),
        request.notes,
        Utc::now(),
    ) {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(err) => submission_error_response(err),
    }
}

// --- interview scheduling ---

async fn slot_overview_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let context = match authorize(&state.directory, &headers, Capability::Review) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state
        .scheduler
        .slot_overview(UnitId(unit_id), Some(ReviewerId(context.actor)))
    {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct CreateSlotRequest {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    max_participants: u32,
    #[serde(default)]
    location: Option<String>,
}

async fn create_slot_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(unit_id): Path<i64>,
    Json(request): Json<CreateSlotRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let context = match authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let draft = SlotDraft {
        unit: UnitId(unit_id),
        starts_at: request.starts_at,
        ends_at: request.ends_at,
        max_participants: request.max_participants,
        location: request.location,
    };
    match state
        .scheduler
        .create_slot(draft, ReviewerId(context.actor), Utc::now())
    {
        Ok(slot) => (StatusCode::CREATED, Json(slot)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SetCapacityRequest {
    max_participants: u32,
}

async fn set_capacity_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
    Json(request): Json<SetCapacityRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state
        .scheduler
        .set_capacity(SlotId(slot_id), request.max_participants)
    {
        Ok(slot) => (StatusCode::OK, Json(slot)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct SetActiveRequest {
    is_active: bool,
}

async fn set_active_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state.scheduler.set_active(SlotId(slot_id), request.is_active) {
        Ok(slot) => (StatusCode::OK, Json(slot)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

async fn delete_slot_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::ConfigureUnit) {
        return response;
    }

    match state.scheduler.delete_slot(SlotId(slot_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => schedule_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    available: bool,
}

async fn availability_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
    Json(request): Json<AvailabilityRequest>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let context = match authorize(&state.directory, &headers, Capability::Review) {
        Ok(context) => context,
        Err(response) => return response,
    };

    match state.scheduler.mark_availability(
        ReviewerId(context.actor),
        SlotId(slot_id),
        request.available,
        Utc::now(),
    ) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => schedule_error_response(err),
    }
}

/// The staffing roster: every reviewer currently marked available for
/// the slot.
async fn slot_availability_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    if let Err(response) = authorize(&state.directory, &headers, Capability::Review) {
        return response;
    }

    match state.scheduler.slot_availability(SlotId(slot_id)) {
        Ok(marks) => (StatusCode::OK, Json(marks)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

async fn book_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let applicant = match applicant_identity(&headers) {
        Ok(applicant) => applicant,
        Err(response) => return response,
    };

    match state.scheduler.book(applicant, SlotId(slot_id), Utc::now()) {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}

/// Applicants cancel their own bookings; staff carrying the book
/// capability may cancel on anyone's behalf.
async fn cancel_booking_handler<R, D, N>(
    State(state): State<SelectionState<R, D, N>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
) -> Response
where
    R: SelectionStore + 'static,
    D: DraftStore + 'static,
    N: super::repository::Notifier + 'static,
{
    let booking_id = BookingId(booking_id);
    let booking = match state.store.fetch_booking(booking_id) {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "booking not found" })),
            )
                .into_response()
        }
        Err(err) => return repository_error_response(err),
    };

    let is_owner = matches!(applicant_identity(&headers), Ok(applicant) if applicant == booking.applicant);
    if !is_owner {
        if let Err(response) = authorize(&state.directory, &headers, Capability::Book) {
            return response;
        }
    }

    match state.scheduler.cancel(booking_id) {
        Ok(booking) => (StatusCode::OK, Json(booking)).into_response(),
        Err(err) => schedule_error_response(err),
    }
}
