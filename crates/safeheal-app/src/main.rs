#![warn(missing_docs)]
//! # safeheal-app binary
//!
//! Headless shell for one SafeHeal session. Takes an optional media path,
//! runs one analysis with the offline service and prints the results.

use std::path::Path;
use std::sync::Arc;

use safeheal_acquisition::{MediaIngest, SyntheticMediaIngest};
use safeheal_analysis_contract::OfflineAnalysisService;
use safeheal_app::{AppError, WorkflowConfig, WorkflowEvent, WorkflowRuntime, app_version};
use safeheal_core::InteractionCycle;
use safeheal_ui::{
    ANALYSIS_COMPLETE_TEXT, MEDICAL_DISCLAIMER, ResultsPanel, WorkflowSnapshot, phase_status_text,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI entry point.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safeheal_app=info".into()),
        )
        .init();

    info!(version = app_version(), "starting safeheal-app");

    if let Err(error) = run(std::env::args().nth(1)).await {
        eprintln!("safeheal-app failed: {error}");
        std::process::exit(1);
    }
}

async fn run(media_path: Option<String>) -> Result<(), AppError> {
    let config = WorkflowConfig::from_env();
    let mut runtime = WorkflowRuntime::current(config, Arc::new(OfflineAnalysisService))?;
    let ingest = SyntheticMediaIngest::new();

    let cycle = match media_path.as_deref() {
        Some(path) => upload_cycle(&ingest, Path::new(path))?,
        None => {
            runtime.request_capture(true);
            InteractionCycle::capture(ingest.ingest_capture(b"demo still")?)
        }
    };
    if let Some(notice) = runtime.submit_media(cycle).notice {
        warn!(message = %notice.message, "media refused");
    }

    let decision = runtime.request_analysis();
    info!(?decision, "analysis requested");

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    for event in runtime.run_until_settled(shutdown).await? {
        match event {
            WorkflowEvent::PhaseEntered { phase, .. } => println!("{}", phase_status_text(phase)),
            WorkflowEvent::RunCompleted { failed: false, .. } => println!("{ANALYSIS_COMPLETE_TEXT}"),
            _ => {}
        }
    }

    print_snapshot(&runtime.snapshot());
    for notice in runtime.take_notices() {
        println!("[{:?}] {}", notice.level, notice.message);
    }

    runtime.reset_workflow();
    Ok(())
}

fn upload_cycle(ingest: &SyntheticMediaIngest, path: &Path) -> Result<InteractionCycle, AppError> {
    let bytes = std::fs::read(path).inspect_err(|error| {
        warn!(path = %path.display(), %error, "media file unreadable");
    })?;
    let file_name = path.file_name().and_then(|name| name.to_str());
    let event = ingest.ingest_upload(file_name, declared_mime(path), &bytes)?;
    Ok(InteractionCycle::upload(event))
}

fn declared_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

fn print_snapshot(snapshot: &WorkflowSnapshot) {
    println!("safeheal-app {}", snapshot.version);
    if let Some(subject) = &snapshot.active_subject {
        println!("subject: {} ({})", subject.handle, subject.kind);
    }

    match &snapshot.results {
        ResultsPanel::Hidden => println!("no analysis"),
        ResultsPanel::Progress { percent, status_text, .. } => {
            println!("{status_text} {percent}%");
        }
        ResultsPanel::Failed(notice) => println!("{}", notice.message),
        ResultsPanel::Ready(views) => {
            if let Some(label) = views.sample_label {
                println!("{label}");
            }
            println!("wound type: {}", views.overview.wound_class);
            println!("risk level: {}", views.overview.risk_level);
            if let Some(guidance) = &views.overview.risk_guidance {
                println!("{}", guidance.message);
            }
            for recommendation in &views.overview.key_recommendations {
                println!("- {recommendation}");
            }
            if snapshot.show_technical {
                println!("wound area: {}", views.technical.wound_area);
                println!("infection risk: {}", views.technical.infection_risk);
            }
            for step in &views.first_aid.steps {
                println!("{step}");
            }
        }
    }

    println!("{MEDICAL_DISCLAIMER}");
}
