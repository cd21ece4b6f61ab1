use super::{AnalysisApi, types::Reply};
use crate::config::Config;
use crate::submit::Upload;
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

const CSRF_HEADER: &str = "X-CSRFToken";

/// Blocking HTTP client for the analysis service.
pub struct HttpApi {
    cfg: Config,
    client: Client,
}

impl HttpApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.server.request_timeout_seconds))
            .user_agent(cfg.server.user_agent.clone())
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            cfg: cfg.clone(),
            client,
        })
    }

    pub fn status_url(&self, job_id: &str) -> Result<Url> {
        let base = self.cfg.url(&self.cfg.server.status_path);
        let mut url = Url::parse(&base).with_context(|| format!("parsing status url: {base}"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("status url cannot be a base: {base}"))?
            .pop_if_empty()
            .push(job_id)
            .push("");
        Ok(url)
    }

    /// HTML fragment listing the caller's most recent analyses.
    pub fn recent_analyses(&self) -> Result<Reply> {
        let url = self.cfg.url(&self.cfg.server.recent_path);
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        read_reply(resp)
    }

    pub(crate) fn post_speech(&self, body: &serde_json::Value) -> Result<Reply> {
        let url = self.cfg.url(&self.cfg.server.speech_path);
        debug!("POST {url}");
        let resp = self
            .with_csrf(self.client.post(&url).json(body))
            .send()
            .with_context(|| format!("POST {url}"))?;
        read_reply(resp)
    }

    fn with_csrf(&self, req: RequestBuilder) -> RequestBuilder {
        match self.cfg.server.csrf_token.as_deref() {
            Some(token) if !token.is_empty() => req.header(CSRF_HEADER, token),
            _ => req,
        }
    }
}

impl AnalysisApi for HttpApi {
    fn submit(&self, upload: &Upload) -> Result<Reply> {
        let url = self.cfg.url(&self.cfg.server.submit_path);
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)
            .with_context(|| format!("invalid mime type: {}", upload.mime))?;
        let mut form = Form::new().part("image", part);
        if let Some(query) = upload.query_text.as_deref() {
            form = form.text("query_text", query.to_string());
        }

        debug!("POST {url} bytes={}", upload.bytes.len());
        let resp = self
            .with_csrf(self.client.post(&url).multipart(form))
            .send()
            .with_context(|| format!("POST {url}"))?;
        read_reply(resp)
    }

    fn job_status(&self, job_id: &str) -> Result<Reply> {
        let url = self.status_url(job_id)?;
        debug!("GET {url}");
        let resp = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("GET {url}"))?;
        read_reply(resp)
    }
}

fn read_reply(resp: Response) -> Result<Reply> {
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .with_context(|| format!("reading response body (status {status})"))?;
    Ok(Reply { status, body })
}
