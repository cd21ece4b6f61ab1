pub mod http;
pub mod types;

use crate::submit::Upload;
use anyhow::Result;

pub use http::HttpApi;
pub use types::{Reply, StatusBody, SubmitBody};

/// Transport seam between the controller and the analysis service.
///
/// `Err` means the request never produced an HTTP reply (connect, TLS,
/// timeout). Any reply, whatever its status, comes back as `Ok`.
pub trait AnalysisApi {
    fn submit(&self, upload: &Upload) -> Result<Reply>;
    fn job_status(&self, job_id: &str) -> Result<Reply>;
}
