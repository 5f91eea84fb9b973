use anyhow::Context;
use clap::Parser;
use clauseguard_core::analysis::{self, Credentials};
use clauseguard_core::domain::report::{self, ReportFormat, ReportMeta};
use clauseguard_core::extract::TextExtractor;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "clauseguard", about = "Identify contractual risks in a document")]
struct Args {
    /// Contract to analyze (pdf, png, jpg, tiff, txt, csv, md).
    path: PathBuf,

    /// Gemini model identifier. Defaults to GEMINI_MODEL or gemini-1.5-flash-latest.
    #[arg(long, conflicts_with = "pro")]
    model: Option<String>,

    /// Use the pro model preset.
    #[arg(long)]
    pro: bool,

    /// Output format: json or markdown.
    #[arg(long, default_value = "json")]
    format: ReportFormat,

    /// Write the report here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Tesseract language used for scanned documents.
    #[arg(long, default_value = "eng")]
    ocr_lang: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = clauseguard_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "analysis run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &clauseguard_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let credentials = Credentials::from_settings(settings);

    let extractor = TextExtractor::new().with_language(&args.ocr_lang);
    let text = extractor
        .extract_blocking(args.path.clone())
        .await
        .with_context(|| format!("failed to extract text from {}", args.path.display()))?;

    let words = text.split_whitespace().count();
    tracing::info!(path = %args.path.display(), characters = text.chars().count(), words, "extracted document text");
    if text.trim().chars().count() < 50 {
        tracing::warn!(path = %args.path.display(), "very little text extracted; the file may be scanned or image-based");
    }

    let model = if args.pro {
        analysis::PRO_MODEL.to_string()
    } else {
        args.model
            .clone()
            .unwrap_or_else(|| settings.model_or_default().to_string())
    };

    let result = if args.pro {
        analysis::analyze_pro(&text, &credentials).await
    } else {
        analysis::analyze(&text, &credentials, &model).await
    };

    if result.is_diagnostic() {
        tracing::warn!(
            risk_type = %result.risks[0].risk_type,
            explanation = %result.risks[0].explanation,
            "analysis did not complete"
        );
    } else {
        tracing::info!(
            risks = result.len(),
            unique_types = result.unique_risk_types(),
            %model,
            "analysis finished"
        );
    }

    let file_name = args
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.path.display().to_string());
    let rendered = report::render(
        &result,
        args.format,
        &ReportMeta {
            file_name: &file_name,
            model: &model,
        },
    )?;

    match &args.output {
        Some(out) => {
            std::fs::write(out, rendered)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            tracing::info!(output = %out.display(), "wrote report");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn init_sentry(settings: &clauseguard_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
