use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub polling: Polling,
    #[serde(default)]
    pub upload: Upload,
    #[serde(default)]
    pub speech: Speech,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            anyhow::bail!("server.base_url must not be empty");
        }
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be > 0");
        }
        if self.polling.max_ticks == 0 {
            anyhow::bail!("polling.max_ticks must be > 0");
        }
        match self.speech.mode.as_str() {
            "blob" | "server" => {}
            other => anyhow::bail!("unknown speech.mode: {other}"),
        }
        Ok(())
    }

    /// Absolute URL for a configured path on the analysis server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.base_url.trim_end_matches('/'), path)
    }

    pub fn login_url(&self) -> String {
        format!("{}?next=/blog/", self.url(&self.server.login_path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub base_url: String,
    pub submit_path: String,
    pub status_path: String,
    pub login_path: String,
    pub recent_path: String,
    pub speech_path: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            submit_path: "/blog/process-image/".into(),
            status_path: "/blog/check-job/".into(),
            login_path: "/blog/login/".into(),
            recent_path: "/blog/recent-analyses/".into(),
            speech_path: "/blog/speech-to-text/".into(),
            csrf_token: None,
            request_timeout_seconds: 30,
            user_agent: concat!("imgscope/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polling {
    pub interval_ms: u64,
    pub max_ticks: u32,
}
impl Default for Polling {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_ticks: 120,
        }
    }
}
impl Polling {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
}
impl Default for Upload {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speech {
    pub mode: String,
    pub max_record_seconds: u64,
}
impl Default for Speech {
    fn default() -> Self {
        Self {
            mode: "blob".into(),
            max_record_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub print_report: bool,
    pub report_path: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            print_report: true,
            report_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
