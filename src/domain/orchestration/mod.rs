//! Control-plane orchestration: the safety gate, the worker launcher and
//! the scale-up gate. Everything here runs in one short-lived invocation
//! and never observes the worker after launch.

pub mod bootstrap;
pub mod gate;
pub mod launcher;
pub mod scale_up;

pub use scale_up::{request_scale_up, ScaleUpOutcome};

use crate::config::BackupJobConfig;
use crate::domain::traits::{ComputeProvisioner, FleetControl};
use crate::domain::types::LaunchError;

/// `RequestBackup`: run the safety gate, then dispatch one worker.
///
/// Returns the launched instance's id. Callers learn whether the job was
/// *launched*, never whether it *succeeded*: the worker reports nothing
/// back (see the completion marker written by the sync stage for the
/// after-the-fact signal).
pub async fn request_backup<F, P>(
    fleet_control: &F,
    provisioner: &P,
    fleet_name: &str,
    job: &BackupJobConfig,
) -> Result<String, LaunchError>
where
    F: FleetControl + ?Sized,
    P: ComputeProvisioner + ?Sized,
{
    gate::ensure_fleet_idle(fleet_control, fleet_name).await?;
    launcher::launch_backup_worker(provisioner, job).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{MockFleetControl, MockProvisioner};

    fn job() -> BackupJobConfig {
        BackupJobConfig {
            volume_id: "vol-0abc123".to_string(),
            destination: "s3://game-backups".to_string(),
            image_id: "ami-0def456".to_string(),
            instance_type: "t4g.small".to_string(),
            iam_role_name: "backup-worker".to_string(),
            security_group_id: "sg-0aa11bb2".to_string(),
            availability_zone: "eu-central-1a".to_string(),
        }
    }

    #[tokio::test]
    async fn idle_fleet_launches_exactly_one_worker_with_literal_parameters() {
        let fleet_control = MockFleetControl::with_fleet("Fleet-A", 0);
        let provisioner = MockProvisioner::new();

        let instance_id = request_backup(&fleet_control, &provisioner, "Fleet-A", &job())
            .await
            .unwrap();
        assert_eq!(instance_id, "i-mock0001");

        let launches = provisioner.launches();
        assert_eq!(launches.len(), 1);
        assert!(launches[0].user_data.contains(r#"VOLUME_ID="vol-0abc123""#));
        assert!(launches[0]
            .user_data
            .contains(r#"DESTINATION="s3://game-backups""#));
    }

    #[tokio::test]
    async fn active_fleet_never_reaches_the_launcher() {
        let fleet_control = MockFleetControl::with_fleet("Fleet-A", 2);
        let provisioner = MockProvisioner::new();

        let err = request_backup(&fleet_control, &provisioner, "Fleet-A", &job())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server ASG is active. Shutdown the server before running backup worker."
        );
        assert!(provisioner.launches().is_empty());
    }
}
