//! Renders the user-data script handed to a freshly launched worker.
//!
//! Job parameters are embedded as literal shell values, not references
//! resolved later: the payload alone fully determines the run. The script
//! hands control to `volback agent`, which executes the lifecycle stages
//! and terminates the instance itself. Reaching the fallback `shutdown`
//! means the agent died before teardown; the instance's shutdown behavior
//! is terminate, so powering off still reclaims it.

use crate::config::BackupJobConfig;
use crate::domain::types::DEFAULT_MOUNT_POINT;

/// Path the machine image installs the agent binary at.
pub const AGENT_BINARY: &str = "/usr/local/bin/volback";

/// Render the bootstrap script for one backup job.
pub fn render_user_data(job: &BackupJobConfig) -> String {
    format!(
        r#"#!/bin/bash
set -u

VOLUME_ID="{volume_id}"
DESTINATION="{destination}"
MOUNT_POINT="{mount_point}"

{agent} agent \
    --volume-id "$VOLUME_ID" \
    --destination "$DESTINATION" \
    --mount-point "$MOUNT_POINT"

# The agent terminates the instance on its own; reaching this line means it
# failed before teardown. Shutdown behavior is terminate, so power off.
shutdown -h now
"#,
        volume_id = job.volume_id,
        destination = job.destination,
        mount_point = DEFAULT_MOUNT_POINT,
        agent = AGENT_BINARY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupJobConfig;

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

    #[test]
    fn script_embeds_job_parameters_as_literals() {
        let script = render_user_data(&job());
        assert!(script.contains(r#"VOLUME_ID="vol-0abc123""#));
        assert!(script.contains(r#"DESTINATION="s3://game-backups""#));
        assert!(script.contains(r#"MOUNT_POINT="/backup""#));
    }

    #[test]
    fn script_falls_back_to_shutdown_after_the_agent() {
        let script = render_user_data(&job());
        let agent_pos = script.find("volback agent").unwrap();
        let shutdown_pos = script.find("shutdown -h now").unwrap();
        assert!(agent_pos < shutdown_pos);
        assert!(script.starts_with("#!/bin/bash"));
    }
}
