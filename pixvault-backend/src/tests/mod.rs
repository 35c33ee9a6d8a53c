use crate::backfill::{run_backfill, BackfillOptions};
use crate::cli::CliOpts;
use crate::images::ErrorBody;
use crate::store::Store;
use crate::testutil::{legacy_row, png_bytes};
use crate::transcode::NORMALIZED_MIME_TYPE;
use crate::{build_app, AppState, SharedState};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::*;
use clap::Parser;
use pixvault_shared::asset::{AssetPage, AssetSummary, IngestOutcome};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

fn server_for(appstate: AppState) -> (TestServer, SharedState) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                "pixvault_backend=debug,tower_http=debug",
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
    let shared_state = Arc::new(RwLock::new(appstate));
    let app = build_app(&shared_state);

    let config = TestServerConfig {
        expect_success_by_default: true,
        restrict_requests_with_http_schema: false,
        default_content_type: None,
        default_scheme: Some("http".into()),
        ..Default::default()
    };

    let server = TestServer::new_with_config(app, config).expect("test server starts");
    (server, shared_state)
}

async fn setup_test_server() -> TestServer {
    server_for(AppState::test().await).0
}

fn image_form(bytes: Vec<u8>, mime_type: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes).file_name("upload.png").mime_type(mime_type),
    )
}

async fn upload(server: &TestServer, form: MultipartForm) -> IngestOutcome {
    let res = server.post("/api/v1/images").multipart(form).await;
    res.assert_status(StatusCode::CREATED);
    res.json()
}

#[tokio::test]
async fn test_failing_setup_server() {
    let cli = CliOpts::parse_from([
        "pixvault",
        "--db-path",
        "/nonexistent-pixvault-dir/sub/db.sqlite3",
        "--retry-attempts",
        "1",
    ]);
    assert!(AppState::new(&cli).await.is_err());
}

#[tokio::test]
async fn test_app_state_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cli = CliOpts::parse_from([
        "pixvault",
        "--db-path",
        dir.path().join("vault.sqlite3").to_str().expect("utf8 path"),
    ]);
    let appstate = AppState::new(&cli).await.expect("state opens");
    assert_eq!(appstate.store.count_assets().await.expect("count"), 0);
    appstate.store.close().await.expect("close");
}

#[tokio::test]
async fn test_api_upload_and_fetch() {
    let server = setup_test_server().await;

    let form = image_form(png_bytes(1200, 600), "image/png")
        .add_text("title", "A wide one")
        .add_text("category", "nature")
        .add_text("tags", "wide, test")
        .add_text("status", "approved");
    let outcome = upload(&server, form).await;
    info!("uploaded asset {}", outcome.id);
    assert_eq!((outcome.width, outcome.height), (1200, 600));
    assert!(!outcome.placeholder.is_empty());

    let res = server.get(&format!("/api/v1/images/{}", outcome.id)).await;
    res.assert_status_ok();
    let summary: AssetSummary = res.json();
    assert_eq!(summary.description.as_deref(), Some("A wide one"));
    assert_eq!(summary.tags, vec!["nature", "wide", "test"]);
    assert_eq!(summary.status, "approved");
    assert_eq!(summary.mime_type.as_deref(), Some(NORMALIZED_MIME_TYPE));
    assert_eq!(summary.placeholder, Some(outcome.placeholder.clone()));
    assert_eq!(summary.byte_size, Some(outcome.full_size as i64));
    assert_eq!(summary.view_count, 1);

    let res = server.get(&summary.thumbnail_url).await;
    res.assert_status_ok();
    assert_eq!(res.header(CONTENT_TYPE), NORMALIZED_MIME_TYPE);
    assert_eq!(res.header(CACHE_CONTROL), crate::middleware::IMAGE_CACHE_CONTROL);
    let thumb = image::load_from_memory(res.as_bytes()).expect("thumbnail decodes");
    assert_eq!((thumb.width(), thumb.height()), (150, 150));

    let res = server.get(&summary.image_url).await;
    res.assert_status_ok();
    let full = image::load_from_memory(res.as_bytes()).expect("full image decodes");
    assert_eq!((full.width(), full.height()), (800, 400));

    let summary: AssetSummary = server
        .get(&format!("/api/v1/images/{}", outcome.id))
        .await
        .json();
    assert_eq!(summary.view_count, 2);
    assert_eq!(summary.download_count, 1);
}

#[tokio::test]
async fn test_api_upload_rejections() {
    let server = setup_test_server().await;

    let res = server
        .post("/api/v1/images")
        .multipart(image_form(b"hello".to_vec(), "text/plain"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = res.json();
    assert!(body.error.contains("Unsupported file type"));

    let res = server
        .post("/api/v1/images")
        .multipart(image_form(b"\x89PNG\r\n\x1a\ncorrupt".to_vec(), "image/png"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/api/v1/images")
        .multipart(MultipartForm::new().add_text("description", "no file"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/api/v1/images")
        .multipart(image_form(png_bytes(10, 10), "image/png").add_text("status", "bad status!"))
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let page: AssetPage = server.get("/api/v1/images").await.json();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_api_list_images() {
    let server = setup_test_server().await;

    let mut ids = Vec::new();
    for size in [10, 20, 30] {
        ids.push(upload(&server, image_form(png_bytes(size, size), "image/png")).await.id);
    }

    let page: AssetPage = server.get("/api/v1/images").await.json();
    assert_eq!(page.total, 3);
    assert_eq!(page.limit, 40);
    assert_eq!(page.offset, 0);
    // newest first
    let listed: Vec<i64> = page.data.iter().map(|a| a.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);

    let page: AssetPage = server
        .get("/api/v1/images")
        .add_query_param("limit", 0)
        .add_query_param("offset", 1)
        .await
        .json();
    assert_eq!(page.limit, 1);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, ids[1]);

    let page: AssetPage = server
        .get("/api/v1/images")
        .add_query_param("limit", 1000)
        .await
        .json();
    assert_eq!(page.limit, 100);
}

#[tokio::test]
async fn test_api_delete_image() {
    let server = setup_test_server().await;
    let outcome = upload(&server, image_form(png_bytes(16, 16), "image/png")).await;
    let path = format!("/api/v1/images/{}", outcome.id);

    server
        .delete(&path)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    for path in [
        path.clone(),
        format!("{path}/thumbnail"),
        format!("{path}/file"),
    ] {
        let res = server.get(&path).expect_failure().await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{path}");
    }

    let res = server.delete(&path).expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_bad_ids() {
    let server = setup_test_server().await;

    let res = server.get("/api/v1/images/0").expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = res.json();
    assert!(body.error.contains("positive integer"));

    let res = server.get("/api/v1/images/12345").expect_failure().await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let res = server
        .get("/api/v1/images/not-a-number")
        .expect_failure()
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_legacy_schema_then_backfill() {
    let (server, shared_state) = server_for(AppState {
        store: Store::test_legacy().await,
    });

    let legacy = {
        let state = shared_state.read().await;
        legacy_row(&state.store, &png_bytes(40, 20), "image/png").await
    };
    let uploaded = upload(&server, image_form(png_bytes(20, 40), "image/png")).await;

    let res = server.get(&format!("/api/v1/images/{}", uploaded.id)).await;
    let json: serde_json::Value = res.json();
    assert!(json["placeholder"].is_null());

    // raw bytes are served as-is until the row is migrated
    let res = server
        .get(&format!("/api/v1/images/{legacy}/thumbnail"))
        .await;
    assert_eq!(res.header(CONTENT_TYPE), "image/png");

    let summary = {
        let state = shared_state.read().await;
        run_backfill(
            &state.store,
            BackfillOptions {
                batch_pause: Duration::ZERO,
                ..Default::default()
            },
        )
        .await
        .expect("backfill")
    };
    assert_eq!((summary.processed, summary.failed), (1, 0));

    let res = server
        .get(&format!("/api/v1/images/{legacy}/thumbnail"))
        .await;
    assert_eq!(res.header(CONTENT_TYPE), NORMALIZED_MIME_TYPE);
    let summary: AssetSummary = server
        .get(&format!("/api/v1/images/{legacy}"))
        .await
        .json();
    assert_eq!((summary.width, summary.height), (Some(40), Some(20)));
}

#[tokio::test]
async fn test_api_openapi_document() {
    let server = setup_test_server().await;
    let res = server.get("/api/v1/openapi.json").await;
    res.assert_status_ok();
    let doc: serde_json::Value = res.json();
    assert!(doc["paths"]["/api/v1/images/{id}/thumbnail"].is_object());
}
