use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Analysis payload for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub short_caption: Option<String>,
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub query_result: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.short_caption.is_none() && self.query_result.is_none() && self.image_url.is_none()
    }
}

/// Server-side unit of asynchronous work, as tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

impl Job {
    pub fn accepted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            result: None,
            error: None,
        }
    }
}
