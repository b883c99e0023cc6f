//! HTTP routes over the discipline catalog.
//!
//! # Responsibility
//! - Map catalog use-cases onto the `/disciplinas` and `/notas` routes.
//! - Translate `CatalogError` into a status code and a short plain-text body.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes a response.
//! - Storage failure details stay in logs; clients only see `Erro interno`.
//! - Catalog calls run on the blocking pool (SQLite and key locks block).

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use disciplinas_core::{
    core_version, CatalogError, CatalogResult, CatalogService, Discipline, DisciplinePatch,
    DisciplineRepository, Note,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

const INTERNAL_ERROR_BODY: &str = "Erro interno";

/// Shared handler state.
pub struct AppState<R: DisciplineRepository> {
    service: Arc<CatalogService<R>>,
}

// Manual impl: cloning the state never requires `R: Clone`.
impl<R: DisciplineRepository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

/// Builds the catalog router.
///
/// List routes answer with and without the trailing slash. A discipline
/// literally named `nomes` is shadowed by the names listing on `GET`.
pub fn app<R: DisciplineRepository + 'static>(service: Arc<CatalogService<R>>) -> Router {
    Router::new()
        .route(
            "/disciplinas/",
            get(list_disciplines::<R>).post(create_discipline::<R>),
        )
        .route(
            "/disciplinas",
            get(list_disciplines::<R>).post(create_discipline::<R>),
        )
        .route("/disciplinas/nomes/", get(list_names::<R>))
        .route("/disciplinas/nomes", get(list_names::<R>))
        .route(
            "/disciplinas/:nome",
            get(get_discipline::<R>)
                .patch(update_discipline::<R>)
                .delete(delete_discipline::<R>),
        )
        .route("/notas/:nome", get(list_notes::<R>).put(add_note::<R>))
        .route(
            "/notas/:nome/:id_nota",
            patch(replace_note::<R>).delete(delete_note::<R>),
        )
        .route("/health", get(health))
        .route_layer(middleware::from_fn(log_requests))
        .with_state(AppState { service })
}

/// Failure response: status plus a `text/plain` body.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
    }

    fn from_catalog(op: &'static str, err: CatalogError) -> Self {
        let failure = match &err {
            CatalogError::DisciplineNotFound(key) => {
                Self::new(StatusCode::NOT_FOUND, format!("Disciplina {key} Inexistente"))
            }
            CatalogError::NoNotes(_) => {
                Self::new(StatusCode::NOT_FOUND, "Não há anotações nesta disciplina")
            }
            CatalogError::NoteNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "Anotação Inexistente")
            }
            CatalogError::Conflict(key) => {
                Self::new(StatusCode::CONFLICT, format!("Disciplina {key} já existe"))
            }
            CatalogError::Validation(inner) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, inner.to_string())
            }
            CatalogError::Repo(_) | CatalogError::InconsistentState(_) => {
                error!(
                    "event=api_call module=api status=error op={op} error_code=internal error={err}"
                );
                return Self::internal();
            }
        };
        warn!(
            "event=api_call module=api status=rejected op={op} http_status={} kind={:?}",
            failure.status.as_u16(),
            err.kind()
        );
        failure
    }

    fn unprocessable(op: &'static str, details: String) -> Self {
        warn!("event=api_call module=api status=rejected op={op} http_status=422 kind=Malformed");
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, details)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

#[derive(Debug, Deserialize)]
struct AddNoteQuery {
    id_nota: Option<String>,
    nota: String,
}

#[derive(Debug, Deserialize)]
struct ReplaceNoteQuery {
    nota: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

async fn list_disciplines<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
) -> ApiResult<(StatusCode, Json<Vec<Discipline>>)> {
    let disciplines = call(&state, "list_disciplines", |service| service.list_disciplines()).await?;
    Ok((StatusCode::ACCEPTED, Json(disciplines)))
}

async fn list_names<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
) -> ApiResult<(StatusCode, Json<Vec<String>>)> {
    let names = call(&state, "list_names", |service| service.list_names()).await?;
    Ok((StatusCode::ACCEPTED, Json(names)))
}

async fn get_discipline<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(nome): Path<String>,
) -> ApiResult<(StatusCode, Json<Discipline>)> {
    let discipline = call(&state, "get_discipline", move |service| {
        service.get_discipline(&nome)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(discipline)))
}

async fn create_discipline<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    body: Result<Json<Discipline>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Discipline>)> {
    let Json(input) = body.map_err(|rejection| {
        ApiFailure::unprocessable("create_discipline", rejection.body_text())
    })?;
    let created = call(&state, "create_discipline", move |service| {
        service.create_discipline(input)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_discipline<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(nome): Path<String>,
    body: Result<Json<DisciplinePatch>, JsonRejection>,
) -> ApiResult<Json<Discipline>> {
    let Json(update) = body.map_err(|rejection| {
        ApiFailure::unprocessable("update_discipline", rejection.body_text())
    })?;
    let updated = call(&state, "update_discipline", move |service| {
        service.update_discipline(&nome, &update)
    })
    .await?;
    Ok(Json(updated))
}

async fn delete_discipline<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(nome): Path<String>,
) -> ApiResult<StatusCode> {
    call(&state, "delete_discipline", move |service| {
        service.delete_discipline(&nome)
    })
    .await?;
    Ok(StatusCode::OK)
}

async fn list_notes<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(nome): Path<String>,
) -> ApiResult<(StatusCode, Json<Vec<Note>>)> {
    let notes = call(&state, "list_notes", move |service| service.list_notes(&nome)).await?;
    Ok((StatusCode::ACCEPTED, Json(notes)))
}

async fn add_note<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(nome): Path<String>,
    query: Result<Query<AddNoteQuery>, QueryRejection>,
) -> ApiResult<Json<Discipline>> {
    let Query(query) =
        query.map_err(|rejection| ApiFailure::unprocessable("add_note", rejection.body_text()))?;
    let discipline = call(&state, "add_note", move |service| {
        service.add_note(&nome, query.id_nota.as_deref(), &query.nota)
    })
    .await?;
    Ok(Json(discipline))
}

async fn replace_note<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((nome, id_nota)): Path<(String, String)>,
    query: Result<Query<ReplaceNoteQuery>, QueryRejection>,
) -> ApiResult<Json<Discipline>> {
    let Query(query) = query
        .map_err(|rejection| ApiFailure::unprocessable("replace_note", rejection.body_text()))?;
    let discipline = call(&state, "replace_note", move |service| {
        service.replace_note(&nome, &id_nota, &query.nota)
    })
    .await?;
    Ok(Json(discipline))
}

async fn delete_note<R: DisciplineRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((nome, id_nota)): Path<(String, String)>,
) -> ApiResult<Json<Discipline>> {
    let discipline = call(&state, "delete_note", move |service| {
        service.delete_note(&nome, &id_nota)
    })
    .await?;
    Ok(Json(discipline))
}

async fn call<R, T>(
    state: &AppState<R>,
    op: &'static str,
    f: impl FnOnce(&CatalogService<R>) -> CatalogResult<T> + Send + 'static,
) -> ApiResult<T>
where
    R: DisciplineRepository + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || f(service.as_ref())).await {
        Ok(result) => result.map_err(|err| ApiFailure::from_catalog(op, err)),
        Err(join_err) => {
            error!(
                "event=api_call module=api status=error op={op} error_code=task_failed error={join_err}"
            );
            Err(ApiFailure::internal())
        }
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    info!(
        "event=http_request module=api status=done method={method} route={route} http_status={} duration_ms={}",
        response.status().as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}
