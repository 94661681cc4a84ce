//! HTTP server for ferry.
//!
//! Exposes the upload coordinator's `SubmitPart` operation as a multipart
//! form endpoint compatible with resumable.js-style clients, the read-only
//! dedup lookups, and thin bucket/object passthroughs to the object store.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{
    FerryConfig, LogConfig, MetadataBackend, MetadataConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use error::{ApiError, ApiResult, ServerError, ServerResult};
pub use server::FerryServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use ferry_meta::InMemoryMetadataStore;
    use ferry_store::InMemoryObjectStore;
    use ferry_upload::{UploadConfig, UploadCoordinator};
    use serde_json::Value;
    use tower::util::ServiceExt;

    const ID: &str = "5d41402abc4b2a76b9719d911017c592";
    const BOUNDARY: &str = "ferry-test-boundary";

    fn app() -> Router {
        let coordinator = UploadCoordinator::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryMetadataStore::new()),
            UploadConfig::default(),
        );
        router::build_router(AppState::new(Arc::new(coordinator)), 1024 * 1024)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn create_bucket(name: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/buckets")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"name":"{name}"}}"#)))
            .unwrap()
    }

    fn upload(fields: &[(&str, String)], file: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"blob\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/v1/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn part_fields(index: u32, total: u32, total_size: u64) -> Vec<(&'static str, String)> {
        vec![
            ("bucket_name", "media".into()),
            ("identifier", ID.into()),
            ("chunk_size", "5".into()),
            ("chunk_number", index.to_string()),
            ("total_chunks", total.to_string()),
            ("total_size", total_size.to_string()),
            ("filename", "notes/hello.txt".into()),
        ]
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, req).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send_json(&app(), get("/v1/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (status, body) = send_json(&app(), get("/v1/info")).await;
        assert_eq!(status, 200);
        assert_eq!(body["storage_backend"], "memory");
        assert_eq!(body["metadata_backend"], "memory");
        assert_eq!(body["upload"]["max_part_attempts"], 4);
    }

    #[tokio::test]
    async fn bucket_lifecycle() {
        let app = app();
        assert_eq!(send(&app, create_bucket("media")).await.0, StatusCode::CREATED);
        let (status, body) = send_json(&app, create_bucket("media")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");
        assert_eq!(send(&app, create_bucket("Bad_Name")).await.0, StatusCode::BAD_REQUEST);

        let (_, list) = send_json(&app, get("/v1/buckets")).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/v1/buckets/media")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, delete).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, get("/v1/objects/media")).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn object_put_get_stat_list() {
        let app = app();
        send(&app, create_bucket("media")).await;

        let put = Request::builder()
            .method("PUT")
            .uri("/v1/objects/media/docs/readme.md")
            .body(Body::from("# ferry"))
            .unwrap();
        let (status, body) = send_json(&app, put).await;
        assert_eq!(status, 200);
        assert_eq!(body["size"], 7);
        assert_eq!(body["location"]["object_name"], "docs/readme.md");

        let response = app
            .clone()
            .oneshot(get("/v1/objects/media/docs/readme.md"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"readme.md\""
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"# ferry");

        let (status, stat) = send_json(&app, get("/v1/stat/media/docs/readme.md")).await;
        assert_eq!(status, 200);
        assert_eq!(stat["size"], 7);
        assert_eq!(send(&app, get("/v1/stat/media/nope.md")).await.0, StatusCode::NOT_FOUND);

        let (_, listed) = send_json(&app, get("/v1/objects/media?prefix=docs/")).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        let (_, listed) = send_json(&app, get("/v1/objects/media?prefix=img/")).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunked_upload_then_dedup() {
        let app = app();
        send(&app, create_bucket("media")).await;

        let (status, first) = send_json(&app, upload(&part_fields(2, 2, 10), b"world")).await;
        assert_eq!(status, 200);
        assert_eq!(first["complete"], false);
        assert_eq!(first["outcome"], "in_progress");

        let (status, second) = send_json(&app, upload(&part_fields(1, 2, 10), b"hello")).await;
        assert_eq!(status, 200);
        assert_eq!(second["complete"], true);
        assert_eq!(second["outcome"], "assembled");
        assert_eq!(second["location"]["bucket_name"], "media");
        assert_eq!(second["location"]["object_name"], "notes/hello.txt");

        let (_, content) = send(&app, get("/v1/objects/media/notes/hello.txt")).await;
        assert_eq!(content, b"helloworld");

        let (status, by_id) = send_json(&app, get(&format!("/v1/dedup/by-id/{ID}"))).await;
        assert_eq!(status, 200);
        assert_eq!(by_id["size"], 10);
        let (status, by_loc) =
            send_json(&app, get("/v1/dedup/by-location/media/notes/hello.txt")).await;
        assert_eq!(status, 200);
        assert_eq!(by_loc["identifier"], ID);

        let (_, again) = send_json(&app, upload(&part_fields(2, 2, 10), b"world")).await;
        assert_eq!(again["outcome"], "deduplicated");
    }

    #[tokio::test]
    async fn upload_errors() {
        let app = app();

        let (status, body) = send_json(&app, upload(&part_fields(1, 1, 5), b"hello")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        send(&app, create_bucket("media")).await;
        let mut fields = part_fields(1, 1, 5);
        fields.retain(|(name, _)| *name != "identifier");
        let (status, body) = send_json(&app, upload(&fields, b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");

        let mut fields = part_fields(1, 1, 5);
        fields[3].1 = "first".into();
        let (status, _) = send_json(&app, upload(&fields, b"hello")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dedup_lookups() {
        let app = app();
        let (status, _) = send_json(&app, get(&format!("/v1/dedup/by-id/{ID}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send_json(&app, get("/v1/dedup/by-id/xyz")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let app = app();
        send(&app, create_bucket("media")).await;
        let put = Request::builder()
            .method("PUT")
            .uri("/v1/objects/media/big.bin")
            .header(header::CONTENT_LENGTH, 2 * 1024 * 1024)
            .body(Body::from(vec![0u8; 2 * 1024 * 1024]))
            .unwrap();
        assert_eq!(send(&app, put).await.0, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
