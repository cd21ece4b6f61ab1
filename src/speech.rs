//! Speech-to-text collaborators.
//!
//! The service exposes two shapes and neither is authoritative: the client
//! records audio and uploads it as a data URL, or the client drives a
//! recorder running on the server with start/stop/status actions. Both are
//! modelled here as separate traits; the poll controller uses neither.

use crate::api::{HttpApi, Reply};
use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub trait BlobTranscriber {
    /// `Ok(None)` when the service heard nothing usable.
    fn transcribe(&self, audio: &[u8], mime: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Recording,
    Idle,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderReply {
    pub status: RecorderState,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub trait RecorderControl {
    fn start(&self) -> Result<RecorderReply>;
    fn stop(&self) -> Result<RecorderReply>;
    fn status(&self) -> Result<RecorderReply>;
}

pub fn audio_data_url(audio: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(audio))
}

pub fn interpret_blob_reply(reply: &Reply) -> Result<Option<String>> {
    if !reply.is_success() {
        return Err(anyhow!("Server returned {}", reply.status));
    }
    let body: RecorderReply = reply
        .json()
        .map_err(|e| anyhow!("malformed speech reply: {e}"))?;
    Ok(match body.status {
        RecorderState::Success => body.text.filter(|t| !t.trim().is_empty()),
        _ => None,
    })
}

pub fn interpret_recorder_reply(reply: &Reply) -> Result<RecorderReply> {
    if reply.status == 503 {
        return Err(anyhow!("Speech recognition service is not available"));
    }
    let parsed: Option<RecorderReply> = reply.json().ok();
    if !reply.is_success() {
        let message = parsed
            .and_then(|r| r.message)
            .unwrap_or_else(|| format!("Server returned {}", reply.status));
        return Err(anyhow!(message));
    }
    parsed.ok_or_else(|| anyhow!("malformed recorder reply"))
}

/// Runs one server-side recording of `duration` and returns the transcript.
pub fn record_on_server<R: RecorderControl + ?Sized>(
    recorder: &R,
    duration: Duration,
    wait: impl FnOnce(Duration),
) -> Result<Option<String>> {
    let started = recorder.start()?;
    if started.status != RecorderState::Recording {
        return Err(anyhow!(
            started
                .message
                .unwrap_or_else(|| "Failed to start recording".into())
        ));
    }
    info!("server recording for {:?}", duration);
    wait(duration);

    let stopped = recorder.stop()?;
    debug!(status = ?stopped.status, "recording stopped");
    Ok(stopped.text.filter(|t| !t.trim().is_empty()))
}

impl BlobTranscriber for HttpApi {
    fn transcribe(&self, audio: &[u8], mime: &str) -> Result<Option<String>> {
        debug!(bytes = audio.len(), mime, "uploading audio");
        let body = serde_json::json!({ "audio_base64": audio_data_url(audio, mime) });
        interpret_blob_reply(&self.post_speech(&body)?)
    }
}

impl RecorderControl for HttpApi {
    fn start(&self) -> Result<RecorderReply> {
        interpret_recorder_reply(&self.post_speech(&serde_json::json!({"action": "start"}))?)
    }

    fn stop(&self) -> Result<RecorderReply> {
        interpret_recorder_reply(&self.post_speech(&serde_json::json!({"action": "stop"}))?)
    }

    fn status(&self) -> Result<RecorderReply> {
        interpret_recorder_reply(&self.post_speech(&serde_json::json!({"action": "status"}))?)
    }
}
