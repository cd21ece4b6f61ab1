use crate::{
    api::{AnalysisApi, HttpApi},
    config::Config,
    controller::Controller,
    poll::{StatusVerdict, classify_status},
    report::{ReportHandlers, RunReport, RunStatus},
    scheduler::SleepScheduler,
    speech::{BlobTranscriber, record_on_server},
    submit::Upload,
    util::{ensure_dir, now_rfc3339, write_json},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "imgscope")]
#[command(about = "Image analysis client (upload + async job polling)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./imgscope.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload an image and wait for its analysis.
    Submit {
        #[arg(long)]
        image: PathBuf,
        /// Optional question about the image.
        #[arg(long)]
        query: Option<String>,
    },
    /// One status check for a job.
    Status {
        #[arg(long)]
        job_id: String,
    },
    /// Print the recent-analyses fragment.
    Recent {},
    /// Speech to text, either from an audio file or via the server recorder.
    Transcribe {
        #[arg(long, conflicts_with = "server_seconds")]
        audio: Option<PathBuf>,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        server_seconds: Option<u64>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = if cfg_path.exists() {
        Config::load(&cfg_path)?
    } else {
        Config::default()
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    if !cfg_path.exists() {
        warn!("config not found, using defaults: {}", cfg_path.display());
    }

    match &args.cmd {
        Command::Submit { image, query } => submit(&cfg, image, query.as_deref()),
        Command::Status { job_id } => status(&cfg, job_id),
        Command::Recent {} => recent(&cfg),
        Command::Transcribe {
            audio,
            mime,
            server_seconds,
        } => transcribe(&cfg, audio.as_deref(), mime.as_deref(), *server_seconds),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config does not exist: {}", p.display()));
        }
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("imgscope.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("imgscope.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays machine-readable JSON.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("imgscope.log"))
}

fn submit(cfg: &Config, image: &Path, query: Option<&str>) -> Result<()> {
    let upload = Upload::from_path(cfg, image, query)?;
    let api = HttpApi::new(cfg)?;
    let mut controller = Controller::new(cfg, api, SleepScheduler::new(), ReportHandlers::default());

    let started = now_rfc3339();
    let polled = controller.submit(&upload);
    if polled.is_some() {
        controller.run_until_idle();
    }
    let ticks = controller.scheduler().ticks_fired();
    let handlers = controller.into_handlers();

    let failure = handlers.failure().cloned();
    let report = RunReport {
        image: image.display().to_string(),
        image_sha256: upload.sha256(),
        query_text: upload.query_text.clone(),
        job_id: polled.or_else(|| handlers.accepted.as_ref().map(|j| j.id.clone())),
        status: handlers.status(),
        outcome: handlers.outcome.clone(),
        message: failure.as_ref().map(|f| f.to_string()),
        retryable: failure.as_ref().is_some_and(|f| f.is_retryable()),
        login_url: handlers.login_url.clone(),
        ticks,
        started,
        finished: now_rfc3339(),
    };

    if !cfg.output.report_path.is_empty() {
        write_json(Path::new(&cfg.output.report_path), &report)?;
    }
    if cfg.output.print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::AuthRequired => Err(anyhow!(
            "login required: {}",
            report.login_url.unwrap_or_default()
        )),
        RunStatus::Failed => Err(anyhow!(
            "{}",
            report.message.unwrap_or_else(|| "submission failed".into())
        )),
        RunStatus::Unfinished => Err(anyhow!("submission ended without an outcome")),
    }
}

fn status(cfg: &Config, job_id: &str) -> Result<()> {
    let api = HttpApi::new(cfg)?;
    let reply = api.job_status(job_id)?;
    let summary = match classify_status(&reply, &cfg.login_url()) {
        Ok(StatusVerdict::Completed(result)) => serde_json::json!({
            "job_id": job_id, "status": "completed", "result": result,
        }),
        Ok(StatusVerdict::Failed(error)) => serde_json::json!({
            "job_id": job_id, "status": "failed", "error": error,
        }),
        Ok(StatusVerdict::Pending(status)) => serde_json::json!({
            "job_id": job_id, "status": status,
        }),
        Err(reason) => serde_json::json!({
            "job_id": job_id, "status": "error", "http_status": reply.status,
            "error": reason.to_string(), "kind": reason.kind(),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn recent(cfg: &Config) -> Result<()> {
    let api = HttpApi::new(cfg)?;
    let reply = api.recent_analyses()?;
    if !reply.is_success() {
        return Err(anyhow!("recent analyses: server returned {}", reply.status));
    }
    println!("{}", reply.body);
    Ok(())
}

fn transcribe(
    cfg: &Config,
    audio: Option<&Path>,
    mime: Option<&str>,
    server_seconds: Option<u64>,
) -> Result<()> {
    let api = HttpApi::new(cfg)?;

    let text = match (audio, server_seconds) {
        (Some(path), _) => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let mime = match mime {
                Some(m) => m.to_string(),
                None => audio_mime(path)?.to_string(),
            };
            api.transcribe(&bytes, &mime)?
        }
        (None, seconds) if seconds.is_some() || cfg.speech.mode == "server" => {
            let secs = seconds
                .unwrap_or(cfg.speech.max_record_seconds)
                .min(cfg.speech.max_record_seconds);
            record_on_server(&api, Duration::from_secs(secs), std::thread::sleep)?
        }
        (None, _) => return Err(anyhow!("--audio is required when speech.mode = \"blob\"")),
    };

    match text {
        Some(text) => {
            info!("transcribed {} chars", text.len());
            println!("{text}");
            Ok(())
        }
        None => Err(anyhow!("Could not hear anything. Please try again")),
    }
}

fn audio_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => Ok("audio/webm"),
        "wav" => Ok("audio/wav"),
        "ogg" | "oga" => Ok("audio/ogg"),
        "mp3" => Ok("audio/mpeg"),
        "m4a" => Ok("audio/mp4"),
        _ => Err(anyhow!("cannot infer audio mime type for {}; pass --mime", path.display())),
    }
}
