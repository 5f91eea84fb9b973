use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use clauseguard_core::analysis::{self, Credentials};
use clauseguard_core::config::Settings;
use clauseguard_core::domain::report::{self, ReportFormat, ReportMeta};
use clauseguard_core::domain::risk::AnalysisResult;
use clauseguard_core::domain::stats::SessionStats;
use clauseguard_core::extract::{DocumentKind, ExtractionError, TextExtractor};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const LOW_TEXT_CHARS: usize = 50;
const API_KEY_HEADER: &str = "x-goog-api-key";
const MISSING_KEY_HINT: &str = "Please provide your Google AI API key (form field `api_key`, \
     header `x-goog-api-key`, or GOOGLE_API_KEY). Get a free key at https://aistudio.google.com/apikey";

#[derive(Debug, Clone, Copy, Serialize)]
struct ModelInfo {
    id: &'static str,
    description: &'static str,
}

const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.0-flash",
        description: "Fastest, free tier available, best for quick analysis",
    },
    ModelInfo {
        id: analysis::DEFAULT_MODEL,
        description: "Thorough, slower, good for complex contracts",
    },
    ModelInfo {
        id: "gemini-1.5-flash",
        description: "Balanced, fast and accurate",
    },
    ModelInfo {
        id: analysis::PRO_MODEL,
        description: "Most thorough, may hit rate limits",
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if settings.google_api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY not set; requests must supply their own key");
    }

    let ocr_lang = std::env::var("OCR_LANG").unwrap_or_else(|_| "eng".to_string());
    let state = AppState {
        settings: Arc::new(settings),
        extractor: TextExtractor::new().with_language(&ocr_lang),
        stats: Arc::new(Mutex::new(SessionStats::default())),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/models", get(list_models))
        .route("/stats", get(get_stats))
        .route("/analyze", post(analyze_upload))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    extractor: TextExtractor,
    stats: Arc<Mutex<SessionStats>>,
}

async fn list_models() -> Json<&'static [ModelInfo]> {
    Json(MODELS)
}

async fn get_stats(State(state): State<AppState>) -> Json<SessionStats> {
    let stats = *state.stats.lock().unwrap_or_else(PoisonError::into_inner);
    Json(stats)
}

#[derive(Debug, Deserialize)]
struct AnalyzeQuery {
    format: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiAnalysis {
    analysis_id: Uuid,
    analyzed_at: DateTime<Utc>,
    file_name: String,
    model: String,
    characters: usize,
    words: usize,
    unique_risk_types: usize,
    analysis: AnalysisResult,
}

#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    model: Option<String>,
    api_key: Option<String>,
}

type ApiError = (StatusCode, String);

async fn analyze_upload(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some(s) => s
            .parse::<ReportFormat>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => ReportFormat::Json,
    };

    let form = read_form(multipart).await?;
    let (Some(file_name), Some(bytes)) = (form.file_name, form.bytes) else {
        return Err((StatusCode::BAD_REQUEST, "multipart field `file` is required".to_string()));
    };

    let header_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let api_key = resolve_api_key(form.api_key, header_key, state.settings.google_api_key.clone())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, MISSING_KEY_HINT.to_string()))?;

    let kind = DocumentKind::from_path(Path::new(&file_name))
        .map_err(|e| (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string()))?;

    tracing::info!(%file_name, ?kind, size_kb = bytes.len() / 1024, "received contract upload");

    // Removed when `upload` drops at the end of the request.
    let upload = write_temp_upload(&file_name, &bytes).map_err(|e| {
        let err = anyhow::Error::new(e).context("failed to stage upload");
        sentry_anyhow::capture_anyhow(&err);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    })?;

    let text = state
        .extractor
        .extract_blocking(upload.path().to_path_buf())
        .await
        .map_err(|e| extraction_error_response(&file_name, e))?;

    let characters = text.chars().count();
    let words = text.split_whitespace().count();
    if characters < LOW_TEXT_CHARS {
        tracing::warn!(%file_name, characters, "very little text extracted; the file might be scanned or image-based");
    }

    let requested = form
        .model
        .unwrap_or_else(|| state.settings.model_or_default().to_string());
    let credentials = Credentials::new(api_key);
    let (model, result) = if wants_pro(&requested) {
        (
            analysis::PRO_MODEL.to_string(),
            analysis::analyze_pro(&text, &credentials).await,
        )
    } else {
        let result = analysis::analyze(&text, &credentials, &requested).await;
        (requested, result)
    };

    state
        .stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(&result);

    tracing::info!(
        %file_name,
        %model,
        risks = result.len(),
        diagnostic = result.is_diagnostic(),
        "analysis finished"
    );

    match format {
        ReportFormat::Json => Ok(Json(ApiAnalysis {
            analysis_id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            unique_risk_types: result.unique_risk_types(),
            file_name,
            model,
            characters,
            words,
            analysis: result,
        })
        .into_response()),
        ReportFormat::Markdown => {
            let body = report::to_markdown(
                &result,
                &ReportMeta {
                    file_name: &file_name,
                    model: &model,
                },
            );
            let disposition = format!(
                "attachment; filename=\"report_{}.{}\"",
                sanitize_file_name(&file_name),
                format.file_extension()
            );
            Ok((
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        (StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = Some(
                    field
                        .file_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| "upload".to_string()),
                );
                form.bytes = Some(field.bytes().await.map_err(bad_request)?.to_vec());
            }
            "model" => form.model = non_empty(field.text().await.map_err(bad_request)?),
            "api_key" => form.api_key = non_empty(field.text().await.map_err(bad_request)?),
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(form)
}

fn write_temp_upload(file_name: &str, bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let suffix = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("clauseguard-")
        .suffix(&suffix)
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

fn extraction_error_response(file_name: &str, err: ExtractionError) -> ApiError {
    let status = extraction_status(&err);
    if status.is_server_error() {
        let err = anyhow::Error::new(err).context(format!("text extraction failed for {file_name}"));
        sentry_anyhow::capture_anyhow(&err);
        let message = format!("{err:#}");
        tracing::error!(error = %message, "text extraction failed");
        return (status, message);
    }
    tracing::warn!(%file_name, error = %err, "text extraction failed");
    (status, format!("Error extracting text: {err}"))
}

fn extraction_status(err: &ExtractionError) -> StatusCode {
    match err {
        ExtractionError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ExtractionError::ToolNotFound(_) | ExtractionError::Io(_) | ExtractionError::NotFound(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ExtractionError::ExtractionFailed(_) | ExtractionError::NoTextFound(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn resolve_api_key(
    form: Option<String>,
    header: Option<String>,
    env: Option<String>,
) -> Option<String> {
    [form, header, env]
        .into_iter()
        .flatten()
        .find(|k| !k.trim().is_empty())
}

fn wants_pro(model: &str) -> bool {
    model.contains("pro")
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
