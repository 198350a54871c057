//! Typed wrapper around the contest REST API.
//!
//! Reads and idempotent writes go through the configured [`RetryPolicy`].
//! Creating a costume and submitting votes are sent exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use urlencoding::encode;
use uuid::Uuid;

use votalloween_shared::constants::{
    FIELD_COSTUME_NAME, FIELD_DEVICE_ID, FIELD_IMAGE, FIELD_PARTICIPANT_NAME,
};
use votalloween_shared::protocol::{
    ConfigPatch, ContestConfig, Costume, ErrorBody, HealthReport, MessageResponse, ResultsReport,
    StorageReport, VoteBatch, VoteStatus, VotesSubmitted,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;

/// An image file to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl ImageFile {
    fn to_part(&self) -> Result<Part> {
        Ok(Part::bytes(self.data.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)?)
    }
}

#[derive(Debug, Clone)]
pub struct CostumeUpload {
    pub participant_name: String,
    pub costume_name: Option<String>,
    pub device_id: String,
    pub image: ImageFile,
}

/// Fields to change on an existing costume. `None` leaves a field as is;
/// an empty `costume_name` clears the label.
#[derive(Debug, Clone, Default)]
pub struct CostumeEdit {
    pub participant_name: Option<String>,
    pub costume_name: Option<String>,
    pub image: Option<ImageFile>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a server path such as a costume's `imageUrl`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.retry
            .run(path, || async {
                let resp = self.request(Method::GET, path).send().await?;
                decode(resp).await
            })
            .await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.get_json("/health").await
    }

    pub async fn storage(&self) -> Result<StorageReport> {
        self.get_json("/api/debug/storage").await
    }

    // ─── Config ───

    pub async fn config(&self) -> Result<ContestConfig> {
        self.get_json("/api/config").await
    }

    pub async fn update_config(&self, patch: &ConfigPatch) -> Result<ContestConfig> {
        self.retry
            .run("/api/config", || async {
                let resp = self
                    .request(Method::PUT, "/api/config")
                    .json(patch)
                    .send()
                    .await?;
                decode(resp).await
            })
            .await
    }

    // ─── Costumes ───

    pub async fn costumes(&self) -> Result<Vec<Costume>> {
        self.get_json("/api/costumes").await
    }

    pub async fn device_costumes(&self, device_id: &str) -> Result<Vec<Costume>> {
        self.get_json(&format!("/api/costumes/device/{}", encode(device_id)))
            .await
    }

    /// Upload a new costume. Never retried: a repeat could create a duplicate.
    pub async fn upload_costume(&self, upload: &CostumeUpload) -> Result<Costume> {
        let mut form = Form::new()
            .text(FIELD_PARTICIPANT_NAME, upload.participant_name.clone())
            .text(FIELD_DEVICE_ID, upload.device_id.clone());
        if let Some(name) = &upload.costume_name {
            form = form.text(FIELD_COSTUME_NAME, name.clone());
        }
        form = form.part(FIELD_IMAGE, upload.image.to_part()?);

        let resp = self
            .request(Method::POST, "/api/costumes")
            .multipart(form)
            .send()
            .await?;
        let costume: Costume = decode(resp).await?;
        debug!(id = %costume.id, "Costume uploaded");
        Ok(costume)
    }

    pub async fn update_costume(&self, id: Uuid, edit: &CostumeEdit) -> Result<Costume> {
        let path = format!("/api/costumes/{id}");
        self.retry
            .run(&path, || async {
                let mut form = Form::new();
                if let Some(name) = &edit.participant_name {
                    form = form.text(FIELD_PARTICIPANT_NAME, name.clone());
                }
                if let Some(name) = &edit.costume_name {
                    form = form.text(FIELD_COSTUME_NAME, name.clone());
                }
                if let Some(image) = &edit.image {
                    form = form.part(FIELD_IMAGE, image.to_part()?);
                }
                let resp = self
                    .request(Method::PUT, &path)
                    .multipart(form)
                    .send()
                    .await?;
                decode(resp).await
            })
            .await
    }

    /// Delete a costume.
    ///
    /// A 404 on a retry means an earlier attempt already removed the row, so
    /// it is reported as success. A 404 on the first attempt is an error.
    pub async fn delete_costume(&self, id: Uuid) -> Result<MessageResponse> {
        let path = format!("/api/costumes/{id}");
        let sent_before = AtomicBool::new(false);
        self.retry
            .run(&path, || async {
                let is_retry = sent_before.swap(true, Ordering::SeqCst);
                let resp = self.request(Method::DELETE, &path).send().await?;
                if is_retry && resp.status() == StatusCode::NOT_FOUND {
                    debug!(id = %id, "Costume already gone on retry, treating delete as done");
                    return Ok(MessageResponse {
                        message: "Costume deleted".to_string(),
                    });
                }
                decode(resp).await
            })
            .await
    }

    // ─── Votes ───

    pub async fn vote_status(&self, device_id: &str) -> Result<VoteStatus> {
        self.get_json(&format!("/api/votes/check/{}", encode(device_id)))
            .await
    }

    /// Submit a device's ballot once.
    ///
    /// If the request may have reached the server but no response came back,
    /// the error is [`ClientError::AmbiguousSubmission`] and the caller should
    /// check [`vote_status`](Self::vote_status) before trying again.
    pub async fn submit_votes(&self, batch: &VoteBatch) -> Result<VotesSubmitted> {
        let sent = self
            .request(Method::POST, "/api/votes")
            .json(batch)
            .send()
            .await;
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) if e.is_connect() => return Err(e.into()),
            Err(e) => {
                warn!(device = %batch.device_id, error = %e, "Vote submission outcome unknown");
                return Err(ClientError::AmbiguousSubmission(e.to_string()));
            }
        };
        decode(resp).await
    }

    pub async fn results(&self) -> Result<ResultsReport> {
        self.get_json("/api/votes/results").await
    }

    /// Every costume photo as one ZIP archive.
    pub async fn download_all_photos(&self) -> Result<Bytes> {
        self.retry
            .run("/api/photos/download-all", || async {
                let resp = self
                    .request(Method::GET, "/api/photos/download-all")
                    .send()
                    .await?;
                read_bytes(resp).await
            })
            .await
    }
}

/// Turn a non-success response into [`ClientError::Api`], preferring the
/// server's `{"error": ...}` message.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    Ok(check_status(resp).await?.json().await?)
}

async fn read_bytes(resp: Response) -> Result<Bytes> {
    Ok(check_status(resp).await?.bytes().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use votalloween_shared::{Category, Phase};

    #[derive(Clone, Default)]
    struct Hits {
        config: Arc<AtomicU32>,
        costumes: Arc<AtomicU32>,
        delete: Arc<AtomicU32>,
        votes: Arc<AtomicU32>,
    }

    fn stub_router(hits: Hits) -> Router {
        Router::new()
            .route(
                "/api/config",
                get(|State(hits): State<Hits>| async move {
                    // Fail twice, then answer.
                    if hits.config.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err((StatusCode::SERVICE_UNAVAILABLE, "warming up"));
                    }
                    Ok(Json(json!({
                        "phase": "voting",
                        "votingStartTime": null,
                        "votingEndTime": null,
                        "updatedAt": "2025-10-31T20:00:00Z",
                    })))
                }),
            )
            .route(
                "/api/costumes",
                get(|State(hits): State<Hits>| async move {
                    hits.costumes.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "Storage error" })),
                    )
                }),
            )
            .route(
                "/api/costumes/{id}",
                delete(|State(hits): State<Hits>| async move {
                    hits.delete.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "error": "Costume not found" })),
                    )
                }),
            )
            .route(
                "/api/votes",
                post(|State(hits): State<Hits>, Json(_): Json<Value>| async move {
                    hits.votes.fetch_add(1, Ordering::SeqCst);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "Storage error" })),
                    )
                }),
            )
            .with_state(hits)
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String, timeout: Duration) -> ApiClient {
        ApiClient::new(ClientConfig {
            base_url,
            timeout,
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                ..RetryPolicy::default()
            },
        })
        .unwrap()
    }

    fn ballot() -> VoteBatch {
        let choices = Category::ALL
            .iter()
            .map(|c| (*c, Uuid::new_v4()))
            .collect();
        VoteBatch::new("device_1_abcdefghi", &choices)
    }

    #[tokio::test]
    async fn reads_recover_from_transient_server_errors() {
        let hits = Hits::default();
        let api = client(spawn(stub_router(hits.clone())).await, Duration::from_secs(5));

        let config = api.config().await.unwrap();
        assert_eq!(config.phase, Phase::Voting);
        assert_eq!(hits.config.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn server_errors_retry_up_to_the_ceiling() {
        let hits = Hits::default();
        let api = client(spawn(stub_router(hits.clone())).await, Duration::from_secs(5));

        let err = api.costumes().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("Storage error"));
        assert_eq!(hits.costumes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Hits::default();
        let api = client(spawn(stub_router(hits.clone())).await, Duration::from_secs(5));

        let err = api.delete_costume(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api { status: 404, ref message } if message == "Costume not found"
        ));
        assert_eq!(hits.delete.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vote_submission_is_never_retried() {
        let hits = Hits::default();
        let api = client(spawn(stub_router(hits.clone())).await, Duration::from_secs(5));

        let err = api.submit_votes(&ballot()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.votes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vote_timeout_is_ambiguous() {
        let router = Router::new().route(
            "/api/votes",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::CREATED
            }),
        );
        let api = client(spawn(router).await, Duration::from_millis(200));

        let err = api.submit_votes(&ballot()).await.unwrap_err();
        assert!(matches!(err, ClientError::AmbiguousSubmission(_)), "{err}");
    }

    #[tokio::test]
    async fn refused_connection_is_not_ambiguous() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(format!("http://{addr}"), Duration::from_secs(1));
        let err = api.submit_votes(&ballot()).await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)), "{err}");
    }

    #[tokio::test]
    async fn delete_confirmed_by_not_found_on_retry() {
        let hits = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/api/costumes/{id}",
                delete(|State(hits): State<Arc<AtomicU32>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        // The row is gone but the answer arrives too late.
                        tokio::time::sleep(Duration::from_millis(600)).await;
                        return (StatusCode::OK, Json(json!({ "message": "Costume deleted" })));
                    }
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "error": "Costume not found" })),
                    )
                }),
            )
            .with_state(hits.clone());
        let api = client(spawn(router).await, Duration::from_millis(200));

        let done = api.delete_costume(Uuid::new_v4()).await.unwrap();
        assert_eq!(done.message, "Costume deleted");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn device_ids_are_sent_as_one_path_segment() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let router = Router::new()
            .route(
                "/api/votes/check/{device_id}",
                get(
                    |State(seen): State<Arc<std::sync::Mutex<Vec<String>>>>,
                     axum::extract::Path(device_id): axum::extract::Path<String>| async move {
                        seen.lock().unwrap().push(device_id);
                        Json(json!({ "hasVoted": false, "votes": {}, "votedCategories": 0 }))
                    },
                ),
            )
            .with_state(seen.clone());
        let api = client(spawn(router).await, Duration::from_secs(5));

        let status = api.vote_status("phone/1?x=y#z").await.unwrap();
        assert!(!status.has_voted);
        assert_eq!(*seen.lock().unwrap(), vec!["phone/1?x=y#z".to_string()]);
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let api = client("http://localhost:3000/".to_string(), Duration::from_secs(1));
        assert_eq!(
            api.url("/uploads/a.png"),
            "http://localhost:3000/uploads/a.png"
        );
    }
}
