//! Upload preparation and classification of the submit endpoint's reply.

use crate::{
    api::{Reply, SubmitBody},
    config::Config,
    error::FailureReason,
    job::{AnalysisResult, Job},
    util::sha256_hex,
};
use anyhow::{Context, Result};
use std::path::Path;

/// One unit of work: image bytes plus an optional question about them.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    /// Trimmed; `None` when the user typed nothing.
    pub query_text: Option<String>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
        query_text: Option<&str>,
    ) -> Self {
        let query_text = query_text
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
            query_text,
        }
    }

    /// Reads and validates an image file from disk.
    pub fn from_path(cfg: &Config, path: &Path, query_text: Option<&str>) -> Result<Self> {
        let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("not a file: {}", path.display());
        }
        if meta.len() == 0 {
            anyhow::bail!("image is empty: {}", path.display());
        }
        if meta.len() > cfg.upload.max_file_bytes {
            anyhow::bail!(
                "image exceeds upload.max_file_bytes ({} > {})",
                meta.len(),
                cfg.upload.max_file_bytes
            );
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("image has no extension: {}", path.display()))?;
        if !cfg.upload.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
            anyhow::bail!("Please choose an image file (got .{ext})");
        }
        let mime = mime_for_extension(&ext)
            .ok_or_else(|| anyhow::anyhow!("no image mime type for .{ext}"))?;

        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();

        Ok(Self::new(file_name, mime, bytes, query_text))
    }

    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// What the submit endpoint told us. Exactly one of these per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Immediate(AnalysisResult),
    Accepted(Job),
    AuthRequired { login_url: String },
    Failed(FailureReason),
}

pub fn classify_submit(reply: &Reply, login_url: &str) -> Submission {
    if reply.status == 401 || reply.status == 403 {
        return Submission::AuthRequired {
            login_url: login_url.to_string(),
        };
    }
    if !reply.is_success() {
        return Submission::Failed(FailureReason::http_status(reply.status));
    }

    let body: SubmitBody = match reply.json() {
        Ok(b) => b,
        Err(e) => return Submission::Failed(FailureReason::Malformed(e.to_string())),
    };

    if let Some(err) = body.error {
        let message = match body.details.filter(|d| !d.is_empty()) {
            Some(details) => format!("{err}: {details}"),
            None => err,
        };
        return Submission::Failed(FailureReason::DomainFailure(message));
    }

    match body.status.as_deref() {
        Some("processing") | Some("queued") => match body.job_id {
            Some(id) if !id.is_empty() => Submission::Accepted(Job::accepted(id)),
            _ => Submission::Failed(FailureReason::Malformed(
                "processing reply without job_id".into(),
            )),
        },
        Some("failed") => Submission::Failed(FailureReason::DomainFailure(
            body.message.unwrap_or_else(|| "Processing failed".into()),
        )),
        Some("completed") | None if !body.result.is_empty() => Submission::Immediate(body.result),
        Some("completed") => Submission::Failed(FailureReason::Malformed(
            "completed reply without a result".into(),
        )),
        Some(other) => Submission::Failed(FailureReason::Malformed(format!(
            "unexpected submit status: {other}"
        ))),
        None => Submission::Failed(FailureReason::Malformed(
            "reply carries neither a job nor a result".into(),
        )),
    }
}
