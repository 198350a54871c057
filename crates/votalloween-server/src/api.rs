use std::sync::{Arc, Mutex};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use votalloween_shared::constants::{
    APP_NAME, FIELD_COSTUME_NAME, FIELD_DEVICE_ID, FIELD_IMAGE, FIELD_PARTICIPANT_NAME,
    MULTIPART_FORM_SLACK, UPLOADS_ROUTE,
};
use votalloween_shared::protocol::{
    ConfigPatch, ContestConfig, Costume, HealthReport, MessageResponse, ResultsReport, StorageReport,
    VoteBatch, VoteStatus, VotesSubmitted,
};
use votalloween_store::{normalize_label, CostumeChanges, Database, NewCostume};

use crate::archive::{build_archive, ArchiveEntry, EntryNamer};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::image_store::{ImageStore, StoredImage};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub images: Arc<ImageStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, images: ImageStore, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            images: Arc::new(images),
            config: Arc::new(config),
        }
    }

    /// Run a store operation on the blocking pool while holding the
    /// connection. All database access is serialized through this lock.
    pub async fn with_db<T, F>(&self, op: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> votalloween_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|e| ServerError::Internal(format!("Database lock poisoned: {e}")))?;
            op(&mut guard).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Database task failed: {e}")))?
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = state.images.max_size() + MULTIPART_FORM_SLACK;
    let uploads = ServeDir::new(state.images.base_path());

    Router::new()
        .route("/health", get(health_check))
        .route("/api/config", get(get_config).put(update_config))
        .route("/api/costumes", get(list_costumes).post(create_costume))
        .route("/api/costumes/device/{device_id}", get(list_device_costumes))
        .route(
            "/api/costumes/{id}",
            axum::routing::put(update_costume).delete(delete_costume),
        )
        .route("/api/votes", axum::routing::post(submit_votes))
        .route("/api/votes/check/{device_id}", get(check_votes))
        .route("/api/votes/results", get(vote_results))
        .route("/api/photos/download-all", get(download_all_photos))
        .route("/api/debug/storage", get(debug_storage))
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Health & introspection ───

async fn health_check() -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".to_string(),
        message: format!("{APP_NAME} API is running"),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn debug_storage(State(state): State<AppState>) -> Result<Json<StorageReport>, ServerError> {
    let (database_path, costumes, votes) = state
        .with_db(|db| {
            Ok((
                db.path().map(|p| p.display().to_string()),
                db.count_costumes()?,
                db.count_votes()?,
            ))
        })
        .await?;
    let usage = state.images.usage().await?;

    Ok(Json(StorageReport {
        database_path,
        uploads_path: state.images.base_path().display().to_string(),
        image_files: usage.files,
        image_bytes: usage.bytes,
        max_upload_size: state.images.max_size(),
        costumes,
        votes,
    }))
}

// ─── Config ───

async fn get_config(State(state): State<AppState>) -> Result<Json<ContestConfig>, ServerError> {
    let config = state
        .with_db(|db| db.get_config())
        .await
        .map_err(|e| e.or_not_found("Config not found"))?;
    Ok(Json(config))
}

/// Unauthenticated: anyone who knows the admin page can change the phase.
async fn update_config(
    State(state): State<AppState>,
    payload: Result<Json<ConfigPatch>, JsonRejection>,
) -> Result<Json<ContestConfig>, ServerError> {
    let Json(patch) = payload.map_err(json_rejection)?;
    let config = state
        .with_db(move |db| db.update_config(&patch))
        .await
        .map_err(|e| e.or_not_found("Config not found"))?;

    info!(phase = %config.phase, "Contest config updated via API");
    Ok(Json(config))
}

// ─── Costumes ───

async fn list_costumes(State(state): State<AppState>) -> Result<Json<Vec<Costume>>, ServerError> {
    Ok(Json(state.with_db(|db| db.list_costumes()).await?))
}

async fn list_device_costumes(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<Costume>>, ServerError> {
    let costumes = state
        .with_db(move |db| db.list_costumes_by_device(&device_id))
        .await?;
    Ok(Json(costumes))
}

/// An uploaded file part of the costume form.
struct UploadedImage {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// The text and file parts of a costume form. Unknown parts are ignored.
#[derive(Default)]
struct CostumeForm {
    participant_name: Option<String>,
    costume_name: Option<String>,
    device_id: Option<String>,
    image: Option<UploadedImage>,
}

async fn read_costume_form(mut multipart: Multipart) -> Result<CostumeForm, ServerError> {
    let mut form = CostumeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            FIELD_IMAGE => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::Validation(format!("Failed to read image: {e}")))?;
                // Browsers send an empty part when no file was picked.
                if !(file_name.is_empty() && data.is_empty()) {
                    form.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        data,
                    });
                }
            }
            FIELD_PARTICIPANT_NAME | FIELD_COSTUME_NAME | FIELD_DEVICE_ID => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::Validation(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    FIELD_PARTICIPANT_NAME => form.participant_name = Some(text),
                    FIELD_COSTUME_NAME => form.costume_name = Some(text),
                    _ => form.device_id = Some(text),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn store_uploaded(
    state: &AppState,
    image: &UploadedImage,
) -> Result<StoredImage, ServerError> {
    state
        .images
        .store_image(&image.file_name, &image.content_type, &image.data)
        .await
}

/// Best-effort removal of an image whose database write failed.
async fn discard_image(state: &AppState, stored: &StoredImage) {
    if let Err(e) = state.images.remove_image(&stored.url).await {
        warn!(file = %stored.file_name, error = %e, "Failed to clean up orphaned image");
    }
}

async fn create_costume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Costume>), ServerError> {
    let form = read_costume_form(multipart).await?;

    let participant_name = normalize_label(form.participant_name.as_deref());
    let device_id = normalize_label(form.device_id.as_deref());
    let (Some(participant_name), Some(device_id)) = (participant_name, device_id) else {
        return Err(ServerError::Validation(
            "participantName and deviceId are required".to_string(),
        ));
    };
    let image = form
        .image
        .ok_or_else(|| ServerError::Validation("An image is required".to_string()))?;

    let stored = store_uploaded(&state, &image).await?;

    let new = NewCostume {
        participant_name,
        costume_name: form.costume_name,
        image_url: stored.url.clone(),
        device_id,
    };
    match state.with_db(move |db| db.create_costume(&new)).await {
        Ok(costume) => {
            info!(
                id = %costume.id,
                device = %costume.device_id,
                size = image.data.len(),
                "Costume uploaded"
            );
            Ok((StatusCode::CREATED, Json(costume)))
        }
        Err(e) => {
            discard_image(&state, &stored).await;
            Err(e)
        }
    }
}

async fn update_costume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Costume>, ServerError> {
    let id = parse_costume_id(&id)?;
    let form = read_costume_form(multipart).await?;

    let stored = match &form.image {
        Some(image) => Some(store_uploaded(&state, image).await?),
        None => None,
    };

    let changes = CostumeChanges {
        participant_name: form.participant_name,
        costume_name: form.costume_name.map(Some),
        image_url: stored.as_ref().map(|s| s.url.clone()),
    };
    match state
        .with_db(move |db| db.update_costume(id, &changes))
        .await
        .map_err(|e| e.or_not_found("Costume not found"))
    {
        Ok(costume) => {
            info!(id = %costume.id, new_image = stored.is_some(), "Costume updated");
            Ok(Json(costume))
        }
        Err(e) => {
            if let Some(stored) = &stored {
                discard_image(&state, stored).await;
            }
            Err(e)
        }
    }
}

async fn delete_costume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    let id = parse_costume_id(&id)?;
    let deleted = state.with_db(move |db| db.delete_costume(id)).await?;
    if !deleted {
        return Err(ServerError::NotFound("Costume not found".to_string()));
    }

    info!(id = %id, "Costume deleted");
    Ok(Json(MessageResponse {
        message: "Costume deleted".to_string(),
    }))
}

/// A malformed id cannot name a stored costume.
fn parse_costume_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServerError::NotFound("Costume not found".to_string()))
}

// ─── Votes ───

async fn check_votes(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<VoteStatus>, ServerError> {
    let status = state.with_db(move |db| db.vote_status(&device_id)).await?;
    Ok(Json(status))
}

async fn submit_votes(
    State(state): State<AppState>,
    payload: Result<Json<VoteBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<VotesSubmitted>), ServerError> {
    let Json(batch) = payload.map_err(json_rejection)?;
    let device = batch.device_id.clone();

    let votes = state.with_db(move |db| db.submit_votes(&batch)).await?;

    info!(device = %device, "Vote batch accepted");
    Ok((
        StatusCode::CREATED,
        Json(VotesSubmitted {
            message: "Votes recorded".to_string(),
            votes,
        }),
    ))
}

async fn vote_results(State(state): State<AppState>) -> Result<Json<ResultsReport>, ServerError> {
    Ok(Json(state.with_db(|db| db.results()).await?))
}

// ─── Photo archive ───

async fn download_all_photos(State(state): State<AppState>) -> Result<Response, ServerError> {
    let costumes = state.with_db(|db| db.list_costumes()).await?;
    if costumes.is_empty() {
        return Err(ServerError::NotFound("No photos to download".to_string()));
    }

    let mut namer = EntryNamer::default();
    let mut entries = Vec::with_capacity(costumes.len());
    for costume in &costumes {
        let path = match state.images.path_for_url(&costume.image_url) {
            Ok(path) => path,
            Err(e) => {
                warn!(id = %costume.id, error = %e, "Skipping costume with bad image URL");
                continue;
            }
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        entries.push(ArchiveEntry {
            name: namer.name(
                &costume.participant_name,
                costume.costume_name.as_deref(),
                &ext,
            ),
            path,
        });
    }

    let (archive, written) = tokio::task::spawn_blocking(move || build_archive(&entries))
        .await
        .map_err(|e| ServerError::Internal(format!("Archive task failed: {e}")))??;

    info!(photos = written, bytes = archive.len(), "Photo archive built");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"votalloween-photos.zip\"",
            ),
        ],
        archive,
    )
        .into_response())
}

fn json_rejection(rejection: JsonRejection) -> ServerError {
    ServerError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
