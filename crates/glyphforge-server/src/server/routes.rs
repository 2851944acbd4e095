//! The HTTP surface: upload intake, synthesis with streamed delivery,
//! bulk cleanup, static asset exposure, and a liveness probe.

use crate::server::error::ApiError;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use glyphforge::{
    AssetId, Error, FontBundle, FontPipeline, GlyphMapping, GlyphStore, IconIntake, IncomingFile,
    SynthesisRequest, UploadedIcon, parse_character,
};
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Multipart field name the upload batch arrives under.
const UPLOAD_FIELD: &str = "icons";

/// Shared handler state; everything is `Arc`ed and cheap to clone per
/// request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GlyphStore>,
    pub intake: Arc<IconIntake>,
    pub pipeline: Arc<FontPipeline>,
}

/// Builds the service router.
///
/// `assets_dir` is exposed read-only under `/assets`; `max_body_bytes`
/// bounds every request body, uploads included.
pub fn router(state: AppState, assets_dir: &Path, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/icons", post(upload_icons))
        .route("/api/fonts", post(synthesize_font))
        .route("/api/cleanup", post(bulk_cleanup))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `POST /api/icons` - accepts a multipart batch of SVG files and answers
/// with one descriptor per accepted file.
async fn upload_icons(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedIcon>>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await?;
        files.push(IncomingFile {
            filename,
            content_type,
            bytes,
        });
    }

    let accepted = state.intake.accept_batch(files).await?;
    tracing::info!("accepted {} uploaded glyphs", accepted.len());
    Ok(Json(accepted))
}

/// Wire form of one synthesis request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody {
    #[serde(default)]
    font_name: Option<String>,
    #[serde(default)]
    mappings: Vec<WireMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMapping {
    file_id: String,
    #[serde(rename = "char")]
    character: String,
}

impl TryFrom<SynthesizeBody> for SynthesisRequest {
    type Error = Error;

    fn try_from(body: SynthesizeBody) -> Result<Self, Self::Error> {
        let mut mappings = Vec::with_capacity(body.mappings.len());
        for mapping in body.mappings {
            // An identifier that does not even parse cannot resolve to a
            // stored asset, so it reports like any other miss.
            let asset: AssetId =
                mapping
                    .file_id
                    .parse()
                    .map_err(|_| Error::AssetNotFound {
                        id: mapping.file_id.clone(),
                    })?;
            let character = parse_character(&mapping.character)?;
            mappings.push(GlyphMapping { asset, character });
        }
        Ok(SynthesisRequest::new(body.font_name, mappings))
    }
}

/// `POST /api/fonts` - validates the mapping set, synthesizes into an
/// isolated scope, and streams the packaged archive back.
async fn synthesize_font(
    State(state): State<AppState>,
    Json(body): Json<SynthesizeBody>,
) -> Result<Response, ApiError> {
    let request = SynthesisRequest::try_from(body)?;
    let bundle = state.pipeline.build_bundle(request).await?;
    tracing::info!(
        "delivering {} for scope {}",
        bundle.archive_filename(),
        bundle.scope_id()
    );
    deliver(bundle).await
}

/// Streams the archive blob, tying scope cleanup to the response body:
/// whenever the body is dropped - fully sent, errored, or abandoned by a
/// disconnecting client - the bundle drops with it and releases the
/// working scope and the blob.
async fn deliver(bundle: FontBundle) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(bundle.archive_path())
        .await
        .map_err(Error::from)?;
    let disposition = format!("attachment; filename=\"{}\"", bundle.archive_filename());

    let stream = BundleStream {
        inner: ReaderStream::new(file),
        _bundle: bundle,
    };
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_owned()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}

pin_project! {
    /// Archive byte stream that owns the [`FontBundle`] guard for the life
    /// of the response body.
    struct BundleStream {
        #[pin]
        inner: ReaderStream<tokio::fs::File>,
        _bundle: FontBundle,
    }
}

impl Stream for BundleStream {
    type Item = std::io::Result<bytes::Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[derive(Debug, Serialize)]
struct CleanupResponse {
    success: bool,
    message: String,
}

/// `POST /api/cleanup` - best-effort purge of every stored asset.
async fn bulk_cleanup(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let outcome = state.store.clear().await?;
    let message = if outcome.is_complete() {
        format!("removed {} stored assets", outcome.removed)
    } else {
        format!(
            "removed {} stored assets, {} could not be removed",
            outcome.removed, outcome.failed
        )
    };
    tracing::info!("bulk cleanup: {message}");
    Ok(Json(CleanupResponse {
        success: outcome.is_complete(),
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use glyphforge::{
        FontFormat, FontSynthesizer, GlyphSource, MemoryGlyphStore, RenderedFont, WorkArea,
        ZipArchiveWriter,
    };
    use std::io::Read;
    use tower::ServiceExt;

    /// Renders `<name>:<ext>:<glyph count>` per format.
    struct EchoSynthesizer;

    #[async_trait]
    impl FontSynthesizer for EchoSynthesizer {
        async fn synthesize(
            &self,
            font_name: &str,
            glyphs: &[GlyphSource],
            formats: &[FontFormat],
        ) -> glyphforge::Result<Vec<RenderedFont>> {
            Ok(formats
                .iter()
                .map(|&format| RenderedFont {
                    format,
                    bytes: Bytes::from(format!(
                        "{font_name}:{}:{}",
                        format.extension(),
                        glyphs.len()
                    )),
                })
                .collect())
        }
    }

    struct TestApp {
        router: Router,
        store: MemoryGlyphStore,
        work_root: tempfile::TempDir,
        _assets_root: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let work_root = tempfile::tempdir().unwrap();
        let assets_root = tempfile::tempdir().unwrap();
        let store = MemoryGlyphStore::new();
        let shared: Arc<dyn GlyphStore> = Arc::new(store.clone());

        let intake = Arc::new(IconIntake::new(Arc::clone(&shared)));
        let pipeline = Arc::new(FontPipeline::new(
            Arc::clone(&shared),
            Arc::new(EchoSynthesizer),
            Arc::new(ZipArchiveWriter),
            WorkArea::new(work_root.path()),
        ));
        let state = AppState {
            store: shared,
            intake,
            pipeline,
        };
        let router = router(state, assets_root.path(), 1024 * 1024);
        TestApp {
            router,
            store,
            work_root,
            _assets_root: assets_root,
        }
    }

    const BOUNDARY: &str = "glyphforge-test-boundary";

    fn multipart_body(parts: &[(&str, &str, &str)]) -> (String, String) {
        let mut body = String::new();
        for (filename, content_type, content) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{UPLOAD_FIELD}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            body,
        )
    }

    async fn post_multipart(app: &TestApp, parts: &[(&str, &str, &str)]) -> Response {
        let (content_type, body) = multipart_body(parts);
        let request = Request::builder()
            .method("POST")
            .uri("/api/icons")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn post_json(app: &TestApp, uri: &str, json: serde_json::Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn healthz_answers() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_returns_one_descriptor_per_file() {
        let app = test_app();
        let response = post_multipart(
            &app,
            &[
                ("house.svg", "image/svg+xml", "<svg>house</svg>"),
                ("cart.svg", "image/svg+xml", "<svg>cart</svg>"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let icons: Vec<UploadedIcon> =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(icons.len(), 2);
        assert_eq!(icons[0].original_name, "house.svg");
        assert_ne!(icons[0].id, icons[1].id);
        assert_eq!(app.store.len(), 2);
    }

    #[tokio::test]
    async fn upload_without_files_is_rejected() {
        let app = test_app();
        let response = post_multipart(&app, &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_of_a_non_svg_is_rejected_and_named() {
        let app = test_app();
        let response = post_multipart(&app, &[("photo.png", "image/png", "not svg")]).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("photo.png"));
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn synthesis_without_mappings_is_a_400() {
        let app = test_app();
        let response = post_json(
            &app,
            "/api/fonts",
            serde_json::json!({ "fontName": "demo", "mappings": [] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn synthesis_with_an_unknown_id_is_a_404() {
        let app = test_app();
        let missing = AssetId::generate();
        let response = post_json(
            &app,
            "/api/fonts",
            serde_json::json!({
                "mappings": [{ "fileId": missing.to_string(), "char": "\u{E001}" }]
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .contains(&missing.to_string())
        );
    }

    #[tokio::test]
    async fn synthesis_with_an_unparsable_id_is_a_404() {
        let app = test_app();
        let response = post_json(
            &app,
            "/api/fonts",
            serde_json::json!({ "mappings": [{ "fileId": "not-a-real-id", "char": "a" }] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn synthesis_with_a_multi_char_target_is_a_400() {
        let app = test_app();
        let id = AssetId::generate();
        app.store
            .put(id, Bytes::from_static(b"<svg/>"))
            .await
            .unwrap();

        let response = post_json(
            &app,
            "/api/fonts",
            serde_json::json!({ "mappings": [{ "fileId": id.to_string(), "char": "ab" }] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_synthesize_download_end_to_end() {
        let app = test_app();

        // Upload one vector file.
        let response =
            post_multipart(&app, &[("icon.svg", "image/svg+xml", "<svg>icon</svg>")]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let icons: Vec<UploadedIcon> =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(icons[0].original_name, "icon.svg");

        // Request synthesis against it.
        let response = post_json(
            &app,
            "/api/fonts",
            serde_json::json!({
                "fontName": "demo",
                "mappings": [{ "fileId": icons[0].id.to_string(), "char": "\u{E001}" }]
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/zip")
        );
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
            Some("attachment; filename=\"demo.zip\"")
        );

        // The archive holds every format, non-empty.
        let blob = body_bytes(response).await;
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(blob.to_vec())).unwrap();
        for ext in ["ttf", "woff", "woff2", "eot", "svg"] {
            let mut file = archive.by_name(&format!("demo.{ext}")).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            assert!(!content.is_empty(), "demo.{ext} is empty");
        }

        // Delivery done: the scope and blob are removed shortly after the
        // body was dropped.
        for _ in 0..100 {
            if std::fs::read_dir(app.work_root.path()).unwrap().count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("working scope or archive blob survived delivery");
    }

    #[tokio::test]
    async fn cleanup_purges_the_store_and_is_idempotent() {
        let app = test_app();
        post_multipart(
            &app,
            &[
                ("a.svg", "image/svg+xml", "<svg/>"),
                ("b.svg", "image/svg+xml", "<svg/>"),
            ],
        )
        .await;
        assert_eq!(app.store.len(), 2);

        let response = post_json(&app, "/api/cleanup", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["success"], true);
        assert!(app.store.is_empty());

        // A second purge on the now-empty store still succeeds.
        let response = post_json(&app, "/api/cleanup", serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["success"], true);
    }
}
