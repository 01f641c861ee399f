//! Configuration surface.
//!
//! Everything arrives through clap with environment-variable fallbacks (the
//! original ran off Lambda environment variables; the names are kept). The
//! job parameters are folded into an explicit [`BackupJobConfig`] validated
//! once at the boundary, before any provider call is made.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::domain::types::DEFAULT_MOUNT_POINT;

#[derive(Parser)]
#[command(name = "volback", about = "Ephemeral backup-worker orchestration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control-plane HTTP API (RequestBackup / RequestScaleUp)
    Serve(ServeArgs),
    /// Run the worker lifecycle on this instance (bootstrap payload)
    Agent(AgentArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[arg(
        long,
        env = "API_LISTEN_ADDR",
        default_value = "0.0.0.0:8080",
        help = "HTTP API listen address"
    )]
    pub listen_addr: String,

    #[arg(
        long,
        env = "ASG_NAME",
        help = "Auto scaling group of the primary server fleet"
    )]
    pub fleet_name: String,

    #[arg(long, env = "VOLUME_ID", help = "EBS volume to back up")]
    pub volume_id: String,

    #[arg(
        long,
        env = "S3_BUCKET",
        help = "Backup destination, e.g. s3://my-backups or s3://my-backups/base"
    )]
    pub destination: String,

    #[arg(long, env = "AMI_ID", help = "Machine image for the worker instance")]
    pub image_id: String,

    #[arg(
        long,
        env = "INSTANCE_TYPE",
        default_value = "t4g.small",
        help = "Worker instance type"
    )]
    pub instance_type: String,

    #[arg(
        long,
        env = "IAM_ROLE_NAME",
        help = "Instance profile name granting the worker EC2 and S3 access"
    )]
    pub iam_role_name: String,

    #[arg(long, env = "SECURITY_GROUP_ID", help = "Worker security group")]
    pub security_group_id: String,

    #[arg(
        long,
        env = "AVAILABILITY_ZONE",
        help = "Availability zone of the volume; the worker must launch there"
    )]
    pub availability_zone: String,
}

#[derive(Parser, Debug)]
pub struct AgentArgs {
    #[arg(long, help = "EBS volume to back up")]
    pub volume_id: String,

    #[arg(long, help = "Backup destination container")]
    pub destination: String,

    #[arg(long, default_value = DEFAULT_MOUNT_POINT, help = "Where to mount the volume")]
    pub mount_point: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration value {name} is empty")]
    Empty { name: &'static str },
}

/// Immutable parameters of one backup job. Fully determines the bootstrap
/// payload; owned by the launcher for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJobConfig {
    pub volume_id: String,
    pub destination: String,
    pub image_id: String,
    pub instance_type: String,
    pub iam_role_name: String,
    pub security_group_id: String,
    pub availability_zone: String,
}

impl BackupJobConfig {
    /// Build and validate the job config. clap guarantees presence; this
    /// guards against empty strings smuggled in through the environment.
    pub fn from_args(args: &ServeArgs) -> Result<Self, ConfigError> {
        let config = Self {
            volume_id: args.volume_id.clone(),
            destination: args.destination.clone(),
            image_id: args.image_id.clone(),
            instance_type: args.instance_type.clone(),
            iam_role_name: args.iam_role_name.clone(),
            security_group_id: args.security_group_id.clone(),
            availability_zone: args.availability_zone.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("VOLUME_ID", &self.volume_id),
            ("S3_BUCKET", &self.destination),
            ("AMI_ID", &self.image_id),
            ("INSTANCE_TYPE", &self.instance_type),
            ("IAM_ROLE_NAME", &self.iam_role_name),
            ("SECURITY_GROUP_ID", &self.security_group_id),
            ("AVAILABILITY_ZONE", &self.availability_zone),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { name });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_args() -> ServeArgs {
        ServeArgs {
            listen_addr: "0.0.0.0:8080".to_string(),
            fleet_name: "Fleet-A".to_string(),
            volume_id: "vol-0abc123".to_string(),
            destination: "s3://game-backups".to_string(),
            image_id: "ami-0def456".to_string(),
            instance_type: "t4g.small".to_string(),
            iam_role_name: "backup-worker".to_string(),
            security_group_id: "sg-0aa11bb2".to_string(),
            availability_zone: "eu-central-1a".to_string(),
        }
    }

    #[test]
    fn valid_args_build_a_job_config() {
        let config = BackupJobConfig::from_args(&serve_args()).unwrap();
        assert_eq!(config.volume_id, "vol-0abc123");
        assert_eq!(config.instance_type, "t4g.small");
    }

    #[test]
    fn empty_required_field_is_rejected() {
        let mut args = serve_args();
        args.volume_id = "  ".to_string();
        let err = BackupJobConfig::from_args(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "required configuration value VOLUME_ID is empty"
        );
    }

    #[test]
    fn agent_defaults_to_the_fixed_mount_point() {
        let args = AgentArgs::parse_from([
            "agent",
            "--volume-id",
            "vol-1",
            "--destination",
            "s3://b",
        ]);
        assert_eq!(args.mount_point, PathBuf::from("/backup"));
    }
}
