use std::sync::Arc;

use poem::handler;
use poem::http::StatusCode;
use poem::web::{Data, Json};
use poem::Response;
use tracing::{info, warn};

use crate::config::BackupJobConfig;
use crate::domain::orchestration;
use crate::domain::orchestration::ScaleUpOutcome;
use crate::domain::traits::{ComputeProvisioner, FleetControl};
use crate::domain::types::ScaleUpError;

use super::types::{BackupResponse, ScaleUpRequest};

/// Shared state handed to every handler.
pub struct AppContext {
    pub fleet_control: Arc<dyn FleetControl>,
    pub provisioner: Arc<dyn ComputeProvisioner>,
    pub fleet_name: String,
    pub job: BackupJobConfig,
}

/// `RequestBackup`: safety gate, then fire-and-forget worker launch.
///
/// Always `200`; the body's `status` field carries the outcome, as the
/// original Lambda did. Callers learn whether the job was launched, never
/// whether it succeeded.
#[handler]
pub async fn request_backup(context: Data<&Arc<AppContext>>) -> Json<BackupResponse> {
    match orchestration::request_backup(
        context.fleet_control.as_ref(),
        context.provisioner.as_ref(),
        &context.fleet_name,
        &context.job,
    )
    .await
    {
        Ok(instance_id) => {
            info!(instance_id = instance_id, "Backup worker dispatched");
            Json(BackupResponse::success(instance_id))
        }
        Err(e) => {
            warn!("Backup request rejected: {e}");
            Json(BackupResponse::error(e.to_string()))
        }
    }
}

/// `RequestScaleUp`: raise the fleet's desired capacity from 0 to 1.
///
/// Status codes follow the original power switch: 404 unknown fleet, 200
/// already active or started, 500 on any provider error.
#[handler]
pub async fn request_scale_up(
    context: Data<&Arc<AppContext>>,
    body: Json<ScaleUpRequest>,
) -> Response {
    let user = body.user.clone().unwrap_or_else(|| "System".to_string());

    match orchestration::request_scale_up(context.fleet_control.as_ref(), &context.fleet_name, &user)
        .await
    {
        Ok(ScaleUpOutcome::Started) => text_response(
            StatusCode::OK,
            format!("Resource successfully started by {user}"),
        ),
        Ok(ScaleUpOutcome::AlreadyActive { desired_capacity }) => text_response(
            StatusCode::OK,
            format!("Resource already active (Capacity: {desired_capacity})"),
        ),
        Err(ScaleUpError::FleetNotFound { name }) => {
            warn!(fleet_name = name, "Scale-up for unknown fleet");
            text_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
        }
        Err(ScaleUpError::Provider { source }) => {
            warn!("Scale-up provider error: {source:#}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}

fn text_response(status: StatusCode, body: String) -> Response {
    Response::builder().status(status).body(body)
}
