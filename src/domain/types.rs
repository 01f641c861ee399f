//! Core data structures shared by the control plane and the worker agent.

use thiserror::Error;

/// Fixed device slot the volume is attached at. The OS-visible device name
/// differs on Nitro instances, which is why the resolver exists.
pub const DEVICE_SLOT: &str = "/dev/sdf";

/// Fixed mount point used by the worker agent.
pub const DEFAULT_MOUNT_POINT: &str = "/backup";

/// Key prefix for one backup run, completed by a timestamp.
pub const BACKUP_PREFIX: &str = "manual-backup-";

/// Marker object uploaded after a fully successful sync. A timestamped
/// prefix without this marker failed mid-run.
pub const COMPLETION_MARKER: &str = "BACKUP-COMPLETE";

/// Observed state of a managed instance fleet (one auto scaling group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetState {
    pub name: String,
    pub desired_capacity: u32,
}

/// Lifecycle of a volume's association with an instance, as reported by the
/// storage provider. Never cached beyond a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Detached,
    Attaching,
    Attached,
}

/// A point-in-time view of a volume's attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub volume_id: String,
    pub state: AttachmentState,
    pub holder_instance_id: Option<String>,
}

/// What happens when the instance shuts itself down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownBehavior {
    /// Destroy the instance, not merely stop it. The worker relies on this
    /// to reclaim itself on any script exit.
    Terminate,
}

/// Everything the provisioner needs to launch one worker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image_id: String,
    pub instance_type: String,
    pub user_data: String,
    pub iam_role_name: String,
    pub security_group_id: String,
    pub availability_zone: String,
    pub shutdown_behavior: ShutdownBehavior,
}

/// Control-plane errors for `RequestBackup`. These are the only backup
/// errors a caller ever sees; worker-side failures stay on the worker.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("ASG {name} not found.")]
    FleetNotFound { name: String },

    #[error("Server ASG is active. Shutdown the server before running backup worker.")]
    FleetActive { name: String, desired_capacity: u32 },

    #[error("fleet lookup failed: {source}")]
    FleetLookup {
        #[source]
        source: anyhow::Error,
    },

    #[error("instance provisioning failed: {source}")]
    Provisioning {
        #[source]
        source: anyhow::Error,
    },
}

/// Control-plane errors for `RequestScaleUp`.
#[derive(Debug, Error)]
pub enum ScaleUpError {
    #[error("fleet {name} not found")]
    FleetNotFound { name: String },

    #[error("fleet provider error: {source}")]
    Provider {
        #[source]
        source: anyhow::Error,
    },
}

/// Worker-side errors. None of these propagate to the control plane; they
/// only decide the agent's exit code.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("volume attachment failed: {message}")]
    Attachment { message: String },

    #[error("block device for volume {volume_id} not found after {attempts} attempts")]
    DeviceNotFound { volume_id: String, attempts: u32 },

    #[error("backup sync failed: {message}")]
    Sync { message: String },

    #[error("teardown failed: {message}")]
    Teardown { message: String },
}

impl WorkerError {
    /// Exit code the agent process ends with. 1 specifically signals a
    /// missing block device; everything else is an unclassified failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkerError::DeviceNotFound { .. } => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_messages_match_operator_facing_text() {
        let not_found = LaunchError::FleetNotFound {
            name: "Fleet-A".to_string(),
        };
        assert_eq!(not_found.to_string(), "ASG Fleet-A not found.");

        let active = LaunchError::FleetActive {
            name: "Fleet-A".to_string(),
            desired_capacity: 2,
        };
        assert_eq!(
            active.to_string(),
            "Server ASG is active. Shutdown the server before running backup worker."
        );
    }

    #[test]
    fn device_not_found_maps_to_exit_code_one() {
        let err = WorkerError::DeviceNotFound {
            volume_id: "vol-123".to_string(),
            attempts: 20,
        };
        assert_eq!(err.exit_code(), 1);

        let err = WorkerError::Sync {
            message: "mount failed".to_string(),
        };
        assert_eq!(err.exit_code(), 2);
    }
}
