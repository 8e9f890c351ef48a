//! Wire messages exchanged between the analysis client and the proxy

use serde::{Deserialize, Serialize};

/// Body of `POST /api/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Image as a data URL
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of every non-success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
