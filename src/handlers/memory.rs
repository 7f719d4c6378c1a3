use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};

use crate::error::{AppError, Result};
use crate::models::{MemoryPayload, MemoryQuery, MemoryResponse, Owner};
use crate::services::{validate_memory, DateFilter, MemoryService};
use crate::storage::ImageStore;
use crate::AppState;

pub const DELETED_MESSAGE: &str = "successfully delete memory";

/// Create a memory and upload its photo
/// POST /memories
pub async fn create_memory(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    payload: std::result::Result<Json<MemoryPayload>, JsonRejection>,
) -> Result<Json<MemoryResponse>> {
    let Json(mut payload) = payload?;
    check_payload(&payload)?;

    let image = ImageStore::decode(&payload.take_image().unwrap_or_default())?;
    let image_url = state.images.upload_new(image).await?;

    let memory = MemoryService::create(&state.db, &owner.uid, payload.into_draft(image_url)).await?;
    tracing::info!("Created memory {} for {}", memory.id, owner.uid);

    Ok(Json(memory.into()))
}

/// List the caller's memories
/// GET /memories?year=2024&month=5
pub async fn list_memories(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Query(query): Query<MemoryQuery>,
) -> Result<Json<Vec<MemoryResponse>>> {
    let filter = date_filter(&query)?;
    let memories = MemoryService::find_many(&state.db, &owner.uid, filter).await?;
    Ok(Json(memories.into_iter().map(MemoryResponse::from).collect()))
}

/// Get a specific memory
/// GET /memories/:id
pub async fn get_memory(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Json<MemoryResponse>> {
    let id = parse_id(&id)?;
    let memory = MemoryService::find_one(&state.db, id, &owner.uid)
        .await?
        .ok_or(AppError::NotFoundOrNotOwner)?;
    Ok(Json(memory.into()))
}

/// Replace a memory, swapping its photo when a new one is supplied
/// PUT /memories/:id
pub async fn update_memory(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<MemoryPayload>, JsonRejection>,
) -> Result<Json<MemoryResponse>> {
    let id = parse_id(&id)?;
    let existing = MemoryService::find_one(&state.db, id, &owner.uid)
        .await?
        .ok_or(AppError::NotFoundOrNotOwner)?;

    // Body errors surface only once ownership is established
    let Json(mut payload) = payload?;
    check_payload(&payload)?;

    // Decode first so a bad payload leaves the current photo in place
    let image = payload
        .take_image()
        .map(|raw| ImageStore::decode(&raw))
        .transpose()?;

    let image_url = match image {
        Some(image) => {
            match state.images.blob_name_from_url(&existing.image_url) {
                Some(old_name) => state.images.delete(old_name).await?,
                None => tracing::warn!(
                    "Memory {} image URL is outside the bucket, old blob left alone: {}",
                    id,
                    existing.image_url
                ),
            }
            state.images.upload_new(image).await?
        }
        None => existing.image_url,
    };

    let memory =
        MemoryService::update(&state.db, id, &owner.uid, payload.into_draft(image_url)).await?;
    tracing::info!("Updated memory {} for {}", memory.id, owner.uid);

    Ok(Json(memory.into()))
}

/// Delete a memory
/// DELETE /memories/:id
pub async fn delete_memory(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Json<&'static str>> {
    let id = parse_id(&id)?;
    let memory = MemoryService::find_one(&state.db, id, &owner.uid)
        .await?
        .ok_or(AppError::NotFoundOrNotOwner)?;

    MemoryService::delete(&state.db, id, &owner.uid).await?;
    tracing::info!("Deleted memory {} for {}", id, owner.uid);

    if state.config.storage.delete_blob_on_remove {
        if let Some(name) = state.images.blob_name_from_url(&memory.image_url) {
            if let Err(e) = state.images.delete(name).await {
                tracing::warn!("Failed to delete blob {} of memory {}: {}", name, id, e);
            }
        }
    }

    Ok(Json(DELETED_MESSAGE))
}

fn check_payload(payload: &MemoryPayload) -> Result<()> {
    let messages = validate_memory(payload);
    if messages.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(messages))
    }
}

/// Ids that are not non-negative integers cannot match any row
fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
        .ok_or(AppError::NotFoundOrNotOwner)
}

fn date_filter(query: &MemoryQuery) -> Result<DateFilter> {
    let year = match query.year.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid year: {}", raw)))?,
        ),
    };
    let month = match query.month.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid month: {}", raw)))?,
        ),
    };
    Ok(DateFilter { year, month })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::Database;
    use crate::error::NOT_FOUND_OR_NOT_OWNER;
    use crate::identity::jwt::tests::token_for;
    use crate::identity::JwtVerifier;
    use crate::services::validation::{CONTENT_MESSAGE, TITLE_MESSAGE};
    use crate::storage::testing::RecordingStore;
    use crate::storage::ImageStore;

    const SECRET: &str = "test-secret";
    const BASE_URL: &str = "https://storage.googleapis.com/daymemo-memory";

    struct TestApp {
        router: Router,
        blobs: Arc<RecordingStore>,
        alice: String,
        bob: String,
    }

    async fn test_app_with(config: Config) -> TestApp {
        let blobs = Arc::new(RecordingStore::default());
        let state = AppState {
            db: Database::in_memory().await.unwrap(),
            config: Arc::new(config),
            images: ImageStore::new(blobs.clone(), BASE_URL),
            verifier: Arc::new(JwtVerifier::new(SECRET)),
        };
        TestApp {
            router: crate::create_router(state),
            blobs,
            alice: token_for(SECRET, "alice", chrono::Duration::minutes(5)),
            bob: token_for(SECRET, "bob", chrono::Duration::minutes(5)),
        }
    }

    async fn test_app() -> TestApp {
        test_app_with(Config::default()).await
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn create(&self, token: &str, title: &str, date: &str) -> Value {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/memories",
                    Some(token),
                    Some(json!({
                        "title": title,
                        "content": "content",
                        "date": date,
                        "imageBase64": "aGVsbG8=",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            body
        }
    }

    fn not_found_body() -> Value {
        json!({"code": 400, "message": NOT_FOUND_OR_NOT_OWNER})
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("-1"), Err(AppError::NotFoundOrNotOwner)));
        assert!(matches!(parse_id("abc"), Err(AppError::NotFoundOrNotOwner)));
    }

    #[test]
    fn test_date_filter() {
        let query = MemoryQuery {
            year: Some("2024".to_string()),
            month: Some("".to_string()),
        };
        assert_eq!(
            date_filter(&query).unwrap(),
            DateFilter {
                year: Some(2024),
                month: None
            }
        );
        let bad = MemoryQuery {
            year: None,
            month: Some("may".to_string()),
        };
        assert!(matches!(date_filter(&bad), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_returns_stored_record() {
        let app = test_app().await;
        let body = app.create(&app.alice, "T", "2024-05-01").await;

        assert_eq!(body["title"], "T");
        assert_eq!(body["content"], "content");
        assert_eq!(body["uid"], "alice");
        assert_eq!(body["date"], "2024-05-01");
        assert_eq!(body["imageBase64"], "");

        let url = body["imageUrl"].as_str().unwrap();
        let name = url.strip_prefix(&format!("{}/", BASE_URL)).unwrap();
        assert_eq!(name.len(), 10);
        assert_eq!(app.blobs.uploads(), vec![name.to_string()]);
        assert_eq!(app.blobs.get(name).as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let app = test_app().await;
        let (status, _) = app
            .send(
                Method::POST,
                "/memories",
                None,
                Some(json!({"title": "T", "content": "C", "date": "2024-05-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(Method::GET, "/memories", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.blobs.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_create_validation_messages() {
        let app = test_app().await;

        let (status, body) = app
            .send(
                Method::POST,
                "/memories",
                Some(&app.alice),
                Some(json!({"title": "", "content": "", "date": "2024-05-01", "imageBase64": "aGk="})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!([TITLE_MESSAGE, CONTENT_MESSAGE]));

        let (status, body) = app
            .send(
                Method::POST,
                "/memories",
                Some(&app.alice),
                Some(json!({"title": "x".repeat(21), "content": "C", "date": "2024-05-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!([TITLE_MESSAGE]));

        assert!(app.blobs.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_create_and_update_share_json_error_shape() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let missing_date = json!({"title": "T", "content": "C"});

        let (status, create_body) = app
            .send(Method::POST, "/memories", Some(&app.alice), Some(missing_date.clone()))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(create_body["code"], 422);
        assert!(create_body["message"].is_string());

        let (status, update_body) = app
            .send(
                Method::PUT,
                &format!("/memories/{}", created["id"]),
                Some(&app.alice),
                Some(missing_date),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(update_body["code"], 422);
        assert!(update_body["message"].is_string());
    }

    #[tokio::test]
    async fn test_create_with_bad_image_stores_nothing() {
        let app = test_app().await;
        let (status, _) = app
            .send(
                Method::POST,
                "/memories",
                Some(&app.alice),
                Some(json!({"title": "T", "content": "C", "date": "2024-05-01", "imageBase64": "not base64!!"})),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(app.blobs.uploads().is_empty());

        let (_, list) = app.send(Method::GET, "/memories", Some(&app.alice), None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_create_storage_failure_is_server_error() {
        let app = test_app().await;
        app.blobs.fail_all();

        let (status, _) = app
            .send(
                Method::POST,
                "/memories",
                Some(&app.alice),
                Some(json!({"title": "T", "content": "C", "date": "2024-05-01", "imageBase64": "aGk="})),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, list) = app.send(Method::GET, "/memories", Some(&app.alice), None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_filtered() {
        let app = test_app().await;
        app.create(&app.alice, "may", "2024-05-03").await;
        app.create(&app.alice, "june", "2024-06-10").await;
        app.create(&app.alice, "old may", "2023-05-09").await;
        app.create(&app.bob, "bobs", "2024-05-03").await;

        let (status, all) = app.send(Method::GET, "/memories", Some(&app.alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, filtered) = app
            .send(Method::GET, "/memories?year=2024&month=5", Some(&app.alice), None)
            .await;
        let titles: Vec<_> = filtered
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["may"]);

        let (_, empty_filters) = app
            .send(Method::GET, "/memories?year=&month=", Some(&app.alice), None)
            .await;
        assert_eq!(empty_filters.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_get_hides_foreign_and_missing_records() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let uri = format!("/memories/{}", created["id"]);

        let (status, body) = app.send(Method::GET, &uri, Some(&app.alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "T");
        assert_eq!(body["imageUrl"], created["imageUrl"]);

        for (uri, token) in [
            (uri.as_str(), &app.bob),
            ("/memories/9999", &app.alice),
            ("/memories/not-a-number", &app.alice),
        ] {
            let (status, body) = app.send(Method::GET, uri, Some(token.as_str()), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, not_found_body());
        }
    }

    #[tokio::test]
    async fn test_update_without_image_keeps_url() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let uri = format!("/memories/{}", created["id"]);

        let (status, body) = app
            .send(
                Method::PUT,
                &uri,
                Some(&app.alice),
                Some(json!({"title": "New", "content": "Changed", "date": "2024-06-02"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], created["id"]);
        assert_eq!(body["title"], "New");
        assert_eq!(body["content"], "Changed");
        assert_eq!(body["date"], "2024-06-02");
        assert_eq!(body["imageUrl"], created["imageUrl"]);
        assert_eq!(body["imageBase64"], "");

        assert_eq!(app.blobs.uploads().len(), 1);
        assert!(app.blobs.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_update_with_image_replaces_blob() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let old_url = created["imageUrl"].as_str().unwrap().to_string();
        let old_name = old_url.rsplit('/').next().unwrap().to_string();

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/memories/{}", created["id"]),
                Some(&app.alice),
                Some(json!({"title": "T", "content": "C", "date": "2024-05-01", "imageBase64": "d29ybGQ="})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let new_url = body["imageUrl"].as_str().unwrap();
        assert_ne!(new_url, old_url);
        assert!(new_url.starts_with(BASE_URL));
        assert_eq!(app.blobs.deletes(), vec![old_name.clone()]);
        assert_eq!(app.blobs.uploads().len(), 2);
        assert!(app.blobs.get(&old_name).is_none());

        let (_, fetched) = app
            .send(Method::GET, &format!("/memories/{}", created["id"]), Some(&app.alice), None)
            .await;
        assert_eq!(fetched["imageUrl"], new_url);
    }

    #[tokio::test]
    async fn test_update_with_bad_image_keeps_old_blob() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let old_url = created["imageUrl"].as_str().unwrap().to_string();
        let old_name = old_url.rsplit('/').next().unwrap().to_string();
        let uri = format!("/memories/{}", created["id"]);

        let (status, _) = app
            .send(
                Method::PUT,
                &uri,
                Some(&app.alice),
                Some(json!({"title": "New", "content": "C", "date": "2024-05-01", "imageBase64": "not base64!!"})),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(app.blobs.deletes().is_empty());
        assert_eq!(app.blobs.uploads().len(), 1);
        assert_eq!(app.blobs.get(&old_name).as_deref(), Some(&b"hello"[..]));

        let (_, fetched) = app.send(Method::GET, &uri, Some(&app.alice), None).await;
        assert_eq!(fetched["title"], "T");
        assert_eq!(fetched["imageUrl"], old_url);
    }

    #[tokio::test]
    async fn test_update_checks_ownership_before_body() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let uri = format!("/memories/{}", created["id"]);

        let (status, body) = app
            .send(
                Method::PUT,
                &uri,
                Some(&app.bob),
                Some(json!({"title": "Mine now", "content": "C", "date": "2024-05-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, not_found_body());

        // Malformed body on a foreign record still reads as not found
        let (status, body) = app
            .send(Method::PUT, &uri, Some(&app.bob), Some(json!({"title": 1})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, not_found_body());

        let (status, body) = app
            .send(
                Method::PUT,
                "/memories/9999",
                Some(&app.alice),
                Some(json!({"title": "T", "content": "C", "date": "2024-05-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, not_found_body());

        let (_, fetched) = app.send(Method::GET, &uri, Some(&app.alice), None).await;
        assert_eq!(fetched["title"], "T");
        assert_eq!(app.blobs.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_update_validation() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/memories/{}", created["id"]),
                Some(&app.alice),
                Some(json!({"title": "T", "content": "", "date": "2024-05-01", "imageBase64": "aGk="})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!([CONTENT_MESSAGE]));
        assert_eq!(app.blobs.uploads().len(), 1);
        assert!(app.blobs.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_create_get_delete_round() {
        let app = test_app().await;
        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let uri = format!("/memories/{}", created["id"]);

        let (status, _) = app.send(Method::DELETE, &uri, Some(&app.bob), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.send(Method::DELETE, &uri, Some(&app.alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(DELETED_MESSAGE));

        let (status, body) = app.send(Method::GET, &uri, Some(&app.alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, not_found_body());

        let (status, _) = app.send(Method::DELETE, &uri, Some(&app.alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Blob stays unless removal is enabled
        assert!(app.blobs.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_can_remove_blob() {
        let mut config = Config::default();
        config.storage.delete_blob_on_remove = true;
        let app = test_app_with(config).await;

        let created = app.create(&app.alice, "T", "2024-05-01").await;
        let name = created["imageUrl"]
            .as_str()
            .unwrap()
            .rsplit('/')
            .next()
            .unwrap()
            .to_string();

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/memories/{}", created["id"]),
                Some(&app.alice),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.blobs.deletes(), vec![name]);
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}
