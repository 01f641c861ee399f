//! Wire types for the control-plane API.

use serde::{Deserialize, Serialize};

/// Response body for `POST /api/v1/backups`. Mirrors the original handler's
/// result shape: `status` plus either the launched instance id or an error
/// message.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BackupResponse {
    pub fn success(instance_id: String) -> Self {
        Self {
            status: "success".to_string(),
            instance_id: Some(instance_id),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            instance_id: None,
            message: Some(message),
        }
    }
}

/// Request body for `POST /api/v1/scale-up`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScaleUpRequest {
    /// Who asked for the scale-up; defaults to "System".
    pub user: Option<String>,
}
