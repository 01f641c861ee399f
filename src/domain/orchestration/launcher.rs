//! Worker launcher: turns a validated job config into one instance request.
//!
//! Fire-and-forget by contract: the launcher returns as soon as the
//! provider accepts the request and never observes the worker again. A
//! provisioning failure surfaces unmodified, with no retry.

use tracing::info;

use crate::config::BackupJobConfig;
use crate::domain::traits::ComputeProvisioner;
use crate::domain::types::{LaunchError, LaunchSpec, ShutdownBehavior};

use super::bootstrap::render_user_data;

/// Launch one ephemeral backup worker. Returns the new instance's id.
pub async fn launch_backup_worker<P: ComputeProvisioner + ?Sized>(
    provisioner: &P,
    job: &BackupJobConfig,
) -> Result<String, LaunchError> {
    let spec = LaunchSpec {
        image_id: job.image_id.clone(),
        instance_type: job.instance_type.clone(),
        user_data: render_user_data(job),
        iam_role_name: job.iam_role_name.clone(),
        security_group_id: job.security_group_id.clone(),
        availability_zone: job.availability_zone.clone(),
        shutdown_behavior: ShutdownBehavior::Terminate,
    };

    let instance_id = provisioner
        .launch_instance(&spec)
        .await
        .map_err(|source| LaunchError::Provisioning { source })?;

    info!(
        instance_id = instance_id,
        volume_id = job.volume_id,
        "Backup worker launched"
    );
    Ok(instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::MockProvisioner;

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
    async fn launch_spec_carries_job_parameters_and_terminate_behavior() {
        let provisioner = MockProvisioner::new();
        let instance_id = launch_backup_worker(&provisioner, &job()).await.unwrap();
        assert_eq!(instance_id, "i-mock0001");

        let launches = provisioner.launches();
        assert_eq!(launches.len(), 1);
        let spec = &launches[0];
        assert_eq!(spec.image_id, "ami-0def456");
        assert_eq!(spec.instance_type, "t4g.small");
        assert_eq!(spec.availability_zone, "eu-central-1a");
        assert_eq!(spec.shutdown_behavior, ShutdownBehavior::Terminate);
        assert!(spec.user_data.contains("vol-0abc123"));
        assert!(spec.user_data.contains("s3://game-backups"));
    }

    #[tokio::test]
    async fn provisioning_failure_surfaces_unmodified() {
        let provisioner = MockProvisioner::new();
        provisioner.set_fail_launch(true);
        let err = launch_backup_worker(&provisioner, &job()).await.unwrap_err();
        assert!(matches!(err, LaunchError::Provisioning { .. }));
        assert!(provisioner.launches().is_empty());
    }
}
