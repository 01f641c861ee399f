//! AWS adapters behind the capability interfaces: auto scaling for fleet
//! control, EC2 for provisioning and volume attachment, S3 for the backup
//! destination.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use aws_sdk_ec2::types::{
    IamInstanceProfileSpecification, InstanceType, Placement,
    ShutdownBehavior as Ec2ShutdownBehavior, VolumeAttachmentState, VolumeState,
};
use aws_sdk_s3::primitives::ByteStream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, info};

use crate::domain::traits::{ComputeProvisioner, FleetControl, ObjectStore, VolumeAttacher};
use crate::domain::types::{AttachmentState, FleetState, LaunchSpec, VolumeAttachment};

/// How the adapters poll for volume state transitions, mirroring the
/// provider CLI's own waiters (bounded, not application-tunable).
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const WAIT_MAX_ATTEMPTS: u32 = 200;

/// Fleet control backed by an auto scaling group.
pub struct AsgFleetControl {
    client: aws_sdk_autoscaling::Client,
}

impl AsgFleetControl {
    pub fn new(client: aws_sdk_autoscaling::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FleetControl for AsgFleetControl {
    async fn describe_fleet(&self, name: &str) -> anyhow::Result<Option<FleetState>> {
        let output = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .context("describe auto scaling group")?;

        let Some(group) = output.auto_scaling_groups().first() else {
            return Ok(None);
        };

        let desired_capacity = group.desired_capacity().unwrap_or(0).max(0) as u32;
        Ok(Some(FleetState {
            name: name.to_string(),
            desired_capacity,
        }))
    }

    async fn set_desired_capacity(&self, name: &str, capacity: u32) -> anyhow::Result<()> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(name)
            .desired_capacity(capacity as i32)
            .send()
            .await
            .context("update auto scaling group desired capacity")?;
        Ok(())
    }
}

/// Instance provisioning via EC2.
pub struct Ec2Provisioner {
    client: aws_sdk_ec2::Client,
}

impl Ec2Provisioner {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputeProvisioner for Ec2Provisioner {
    async fn launch_instance(&self, spec: &LaunchSpec) -> anyhow::Result<String> {
        let output = self
            .client
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .min_count(1)
            .max_count(1)
            .user_data(BASE64.encode(&spec.user_data))
            // Our LaunchSpec only models terminate; any script exit
            // reclaims the instance.
            .instance_initiated_shutdown_behavior(Ec2ShutdownBehavior::Terminate)
            .iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .name(&spec.iam_role_name)
                    .build(),
            )
            .security_group_ids(&spec.security_group_id)
            .placement(
                Placement::builder()
                    .availability_zone(&spec.availability_zone)
                    .build(),
            )
            .send()
            .await
            .context("run instances")?;

        let instance_id = output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .context("run instances returned no instance id")?
            .to_string();

        info!(instance_id = instance_id, "Instance launch accepted");
        Ok(instance_id)
    }

    async fn terminate_instance(&self, instance_id: &str) -> anyhow::Result<()> {
        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context("terminate instances")?;
        Ok(())
    }
}

/// Volume attachment via EC2, with CLI-style bounded polling for the state
/// transitions.
pub struct Ec2VolumeAttacher {
    client: aws_sdk_ec2::Client,
}

impl Ec2VolumeAttacher {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }

    async fn volume_state(&self, volume_id: &str) -> anyhow::Result<Option<VolumeState>> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .context("describe volumes")?;
        Ok(output
            .volumes()
            .first()
            .and_then(|volume| volume.state())
            .cloned())
    }

    async fn wait_for_state(&self, volume_id: &str, target: VolumeState) -> anyhow::Result<()> {
        for attempt in 1..=WAIT_MAX_ATTEMPTS {
            if self.volume_state(volume_id).await?.as_ref() == Some(&target) {
                return Ok(());
            }
            debug!(
                volume_id = volume_id,
                attempt = attempt,
                "Waiting for volume state {target:?}"
            );
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
        bail!("volume {volume_id} did not reach state {target:?}");
    }
}

#[async_trait]
impl VolumeAttacher for Ec2VolumeAttacher {
    async fn describe_attachment(&self, volume_id: &str) -> anyhow::Result<VolumeAttachment> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .context("describe volumes")?;

        let volume = output
            .volumes()
            .first()
            .with_context(|| format!("volume {volume_id} not found"))?;

        let attachment = volume.attachments().first();
        let state = match attachment.and_then(|a| a.state()).cloned() {
            Some(VolumeAttachmentState::Attached) => AttachmentState::Attached,
            Some(VolumeAttachmentState::Detached) | None => AttachmentState::Detached,
            Some(_) => AttachmentState::Attaching,
        };

        Ok(VolumeAttachment {
            volume_id: volume_id.to_string(),
            state,
            holder_instance_id: attachment
                .and_then(|a| a.instance_id())
                .map(ToString::to_string),
        })
    }

    async fn detach_volume(&self, volume_id: &str, force: bool) -> anyhow::Result<()> {
        self.client
            .detach_volume()
            .volume_id(volume_id)
            .force(force)
            .send()
            .await
            .context("detach volume")?;
        Ok(())
    }

    async fn wait_volume_detached(&self, volume_id: &str) -> anyhow::Result<()> {
        self.wait_for_state(volume_id, VolumeState::Available).await
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device_slot: &str,
    ) -> anyhow::Result<()> {
        self.client
            .attach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device_slot)
            .send()
            .await
            .context("attach volume")?;
        Ok(())
    }

    async fn wait_volume_attached(&self, volume_id: &str) -> anyhow::Result<()> {
        self.wait_for_state(volume_id, VolumeState::InUse).await
    }
}

/// A parsed destination container reference: `s3://bucket[/base/prefix]` or
/// a bare bucket name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub base_prefix: String,
}

impl S3Location {
    pub fn parse(destination: &str) -> anyhow::Result<Self> {
        let stripped = destination
            .strip_prefix("s3://")
            .unwrap_or(destination)
            .trim_matches('/');
        if stripped.is_empty() {
            bail!("destination container {destination:?} has no bucket name");
        }

        let (bucket, base_prefix) = match stripped.split_once('/') {
            Some((bucket, base)) => (bucket, base),
            None => (stripped, ""),
        };
        Ok(Self {
            bucket: bucket.to_string(),
            base_prefix: base_prefix.to_string(),
        })
    }

    fn key(&self, suffix: &str) -> String {
        if self.base_prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{suffix}", self.base_prefix)
        }
    }
}

/// Object upload via S3: plain sequential put-per-file, mirrored and
/// non-incremental.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    location: S3Location,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, location: S3Location) -> Self {
        Self { client, location }
    }

    /// All regular files under `root`, relative paths included.
    async fn collect_files(root: &Path) -> anyhow::Result<Vec<(std::path::PathBuf, String)>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("read dir {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let relative = path
                        .strip_prefix(root)
                        .expect("entry path is under its root")
                        .to_string_lossy()
                        .replace('\\', "/");
                    files.push((path, relative));
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload_tree(&self, source: &Path, prefix: &str) -> anyhow::Result<u64> {
        let files = Self::collect_files(source).await?;
        let total = files.len() as u64;
        info!(
            bucket = self.location.bucket,
            prefix = prefix,
            files = total,
            "Uploading backup tree"
        );

        for (path, relative) in files {
            let key = self.location.key(&format!("{prefix}/{relative}"));
            let body = ByteStream::from_path(&path)
                .await
                .with_context(|| format!("open {}", path.display()))?;
            self.client
                .put_object()
                .bucket(&self.location.bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .with_context(|| format!("put object {key}"))?;
            debug!(key = key, "Object uploaded");
        }
        Ok(total)
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> anyhow::Result<()> {
        let key = self.location.key(key);
        self.client
            .put_object()
            .bucket(&self.location.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("put object {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_only_destination() {
        let location = S3Location::parse("s3://game-backups").unwrap();
        assert_eq!(location.bucket, "game-backups");
        assert_eq!(location.base_prefix, "");
        assert_eq!(location.key("manual-backup-x/file"), "manual-backup-x/file");
    }

    #[test]
    fn parses_destination_with_base_prefix() {
        let location = S3Location::parse("s3://game-backups/minecraft/").unwrap();
        assert_eq!(location.bucket, "game-backups");
        assert_eq!(location.base_prefix, "minecraft");
        assert_eq!(
            location.key("manual-backup-x/file"),
            "minecraft/manual-backup-x/file"
        );
    }

    #[test]
    fn accepts_bare_bucket_names() {
        let location = S3Location::parse("game-backups").unwrap();
        assert_eq!(location.bucket, "game-backups");
    }

    #[test]
    fn rejects_empty_destination() {
        assert!(S3Location::parse("s3://").is_err());
        assert!(S3Location::parse("").is_err());
    }

    #[tokio::test]
    async fn collect_files_walks_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("world/region"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("server.properties"), b"motd=hi")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("world/region/r.0.0.mca"), b"chunk")
            .await
            .unwrap();

        let mut files = S3ObjectStore::collect_files(dir.path()).await.unwrap();
        files.sort_by(|a, b| a.1.cmp(&b.1));
        let relative: Vec<&str> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(relative, vec!["server.properties", "world/region/r.0.0.mca"]);
    }
}
