use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::catalog::TargetSubjectPatch;
use super::domain::{
    CandidateId, CandidateStatus, MappingId, SuggestionId, SuggestionStatus, TargetSubject,
};
use super::export::ExportKind;
use super::repository::EquivalencyRepository;
use super::service::{EquivalencyService, ServiceError};
use super::settings::{HotCacheSettings, SettingsError, ThresholdSettings, WeightSettings};
use crate::error::AppError;

type SharedService<R> = State<Arc<EquivalencyService<R>>>;

/// Router builder exposing the review console endpoints.
pub fn equivalency_router<R>(service: Arc<EquivalencyService<R>>) -> Router
where
    R: EquivalencyRepository + 'static,
{
    Router::new()
        .route("/api/v1/candidates", get(list_candidates::<R>))
        .route("/api/v1/candidates/:id", get(get_candidate::<R>))
        .route(
            "/api/v1/candidates/:id/status",
            post(update_candidate_status::<R>),
        )
        .route(
            "/api/v1/candidates/:id/mappings",
            get(candidate_mappings::<R>),
        )
        .route(
            "/api/v1/candidates/:id/mappings/accept",
            post(accept_by_threshold::<R>),
        )
        .route(
            "/api/v1/candidates/:id/mappings/reject",
            post(reject_below_threshold::<R>),
        )
        .route(
            "/api/v1/candidates/:id/score",
            get(score_report::<R>).post(refresh_score::<R>),
        )
        .route("/api/v1/mappings/:id/target", put(set_mapping_target::<R>))
        .route(
            "/api/v1/catalog",
            get(list_catalog::<R>).post(create_target_subject::<R>),
        )
        .route("/api/v1/catalog/:code", put(update_target_subject::<R>))
        .route("/api/v1/suggestions", get(list_suggestions::<R>))
        .route(
            "/api/v1/suggestions/approve-confident",
            post(approve_confident::<R>),
        )
        .route(
            "/api/v1/suggestions/:id/approve",
            post(approve_suggestion::<R>),
        )
        .route(
            "/api/v1/suggestions/:id/reject",
            post(reject_suggestion::<R>),
        )
        .route(
            "/api/v1/suggestions/:id/snooze",
            post(snooze_suggestion::<R>),
        )
        .route(
            "/api/v1/settings/thresholds",
            get(get_thresholds::<R>).put(put_thresholds::<R>),
        )
        .route(
            "/api/v1/settings/weights",
            get(get_weights::<R>).put(put_weights::<R>),
        )
        .route(
            "/api/v1/settings/hot-cache",
            get(get_hot_cache::<R>).put(put_hot_cache::<R>),
        )
        .route("/api/v1/audit", get(audit_log::<R>))
        .route("/api/v1/export/:kind", get(export_csv::<R>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CandidateFilter {
    status: Option<CandidateStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SuggestionFilter {
    status: Option<SuggestionStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRequest {
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: CandidateStatus,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThresholdRequest {
    threshold: f64,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfidenceRequest {
    min_confidence: f64,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TargetRequest {
    #[serde(default)]
    target_subject_code: Option<String>,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTargetRequest {
    target: TargetSubject,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatchTargetRequest {
    #[serde(default)]
    patch: TargetSubjectPatch,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SettingsRequest<T> {
    settings: T,
    actor: String,
}

fn rejected(error: SettingsError) -> AppError {
    AppError::from(ServiceError::Invalid(error))
}

pub(crate) async fn list_candidates<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Query(filter): Query<CandidateFilter>,
) -> Result<Response, AppError> {
    Ok(Json(service.candidates(filter.status)?).into_response())
}

pub(crate) async fn get_candidate<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    Ok(Json(service.candidate(&CandidateId(id))?).into_response())
}

pub(crate) async fn update_candidate_status<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Response, AppError> {
    let candidate =
        service.update_candidate_status(&CandidateId(id), request.status, &request.actor)?;
    Ok(Json(candidate).into_response())
}

pub(crate) async fn candidate_mappings<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    Ok(Json(service.mappings_for_candidate(&CandidateId(id))?).into_response())
}

pub(crate) async fn accept_by_threshold<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Response, AppError> {
    let outcome = service.mappings().accept_by_threshold(
        &CandidateId(id),
        request.threshold,
        &request.actor,
    )?;
    Ok(Json(outcome).into_response())
}

pub(crate) async fn reject_below_threshold<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Response, AppError> {
    let outcome = service.mappings().reject_below_threshold(
        &CandidateId(id),
        request.threshold,
        &request.actor,
    )?;
    Ok(Json(outcome).into_response())
}

pub(crate) async fn score_report<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    Ok(Json(service.score_report(&CandidateId(id))?).into_response())
}

pub(crate) async fn refresh_score<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Response, AppError> {
    let breakdown = service.refresh_candidate_score(&CandidateId(id), &request.actor)?;
    Ok(Json(breakdown).into_response())
}

pub(crate) async fn set_mapping_target<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<TargetRequest>,
) -> Result<Response, AppError> {
    let mapping = service.mappings().set_target(
        &MappingId(id),
        request.target_subject_code,
        &request.actor,
    )?;
    Ok(Json(mapping).into_response())
}

pub(crate) async fn list_catalog<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
) -> Result<Response, AppError> {
    Ok(Json(service.catalog().target_subjects()?).into_response())
}

pub(crate) async fn create_target_subject<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Json(request): Json<CreateTargetRequest>,
) -> Result<Response, AppError> {
    let target = service
        .catalog()
        .add_target_subject(request.target, &request.actor)?;
    Ok((StatusCode::CREATED, Json(target)).into_response())
}

pub(crate) async fn update_target_subject<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(code): Path<String>,
    Json(request): Json<PatchTargetRequest>,
) -> Result<Response, AppError> {
    let target = service
        .catalog()
        .update_target_subject(&code, &request.patch, &request.actor)?;
    Ok(Json(target).into_response())
}

pub(crate) async fn list_suggestions<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Query(filter): Query<SuggestionFilter>,
) -> Result<Response, AppError> {
    // Without a filter every suggestion is listed; the pending view keeps review order.
    let suggestions = match filter.status {
        Some(SuggestionStatus::Pending) => service.suggestions().pending()?,
        status => service.alias_suggestions(status)?,
    };
    Ok(Json(suggestions).into_response())
}

pub(crate) async fn approve_suggestion<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Response, AppError> {
    let approval = service
        .suggestions()
        .approve(&SuggestionId(id), &request.actor)?;
    Ok(Json(approval).into_response())
}

pub(crate) async fn reject_suggestion<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Response, AppError> {
    let suggestion = service
        .suggestions()
        .reject(&SuggestionId(id), &request.actor)?;
    Ok(Json(suggestion).into_response())
}

pub(crate) async fn snooze_suggestion<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Response, AppError> {
    let suggestion = service
        .suggestions()
        .snooze(&SuggestionId(id), &request.actor)?;
    Ok(Json(suggestion).into_response())
}

pub(crate) async fn approve_confident<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Json(request): Json<ConfidenceRequest>,
) -> Result<Response, AppError> {
    let approvals = service
        .suggestions()
        .approve_confident(request.min_confidence, &request.actor)?;
    Ok(Json(approvals).into_response())
}

pub(crate) async fn get_thresholds<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
) -> Result<Response, AppError> {
    Ok(Json(service.settings()?.thresholds).into_response())
}

pub(crate) async fn put_thresholds<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Json(request): Json<SettingsRequest<ThresholdSettings>>,
) -> Result<Response, AppError> {
    request.settings.validate().map_err(rejected)?;
    let thresholds = service.update_thresholds(request.settings, &request.actor)?;
    Ok(Json(thresholds).into_response())
}

pub(crate) async fn get_weights<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
) -> Result<Response, AppError> {
    Ok(Json(service.settings()?.weights).into_response())
}

pub(crate) async fn put_weights<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Json(request): Json<SettingsRequest<WeightSettings>>,
) -> Result<Response, AppError> {
    request.settings.validate().map_err(rejected)?;
    let weights = service.update_weights(request.settings, &request.actor)?;
    Ok(Json(weights).into_response())
}

pub(crate) async fn get_hot_cache<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
) -> Result<Response, AppError> {
    Ok(Json(service.settings()?.hot_cache).into_response())
}

pub(crate) async fn put_hot_cache<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Json(request): Json<SettingsRequest<HotCacheSettings>>,
) -> Result<Response, AppError> {
    request.settings.validate().map_err(rejected)?;
    let hot_cache = service.update_hot_cache(request.settings, &request.actor)?;
    Ok(Json(hot_cache).into_response())
}

pub(crate) async fn audit_log<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
) -> Result<Response, AppError> {
    Ok(Json(service.audit_log()?).into_response())
}

pub(crate) async fn export_csv<R: EquivalencyRepository + 'static>(
    State(service): SharedService<R>,
    Path(kind): Path<String>,
) -> Result<Response, AppError> {
    let kind: ExportKind = kind.parse()?;
    let body = service.export_csv(kind)?;
    let headers = [
        (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", kind.file_name()),
        ),
    ];
    Ok((StatusCode::OK, headers, body).into_response())
}
