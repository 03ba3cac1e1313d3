use serde::{Deserialize, Serialize};

/// POST /build body
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRequest {
    pub urls: Vec<String>,
    /// Graph to build, the configured default when absent
    #[serde(default)]
    pub graph: Option<String>,
}

/// POST /chat body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub graph: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildResponse {
    pub status: String,
    pub nodes: Option<u64>,
}

impl BuildResponse {
    pub fn built(nodes: Option<u64>) -> Self {
        Self {
            status: "built".to_string(),
            nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
