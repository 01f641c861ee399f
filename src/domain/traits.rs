//! Capability interfaces between the core and its providers.
//!
//! Each trait is deliberately narrow: the control plane only ever needs
//! fleet lookups and instance launches, the worker only ever needs volume
//! attachment, block-device probing, mounting and object upload. Tests
//! substitute the recording implementations from [`super::mock`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{FleetState, LaunchSpec, VolumeAttachment};

/// Read and mutate the desired capacity of an instance fleet.
#[async_trait]
pub trait FleetControl: Send + Sync {
    /// Look up a fleet by name. `Ok(None)` means the fleet does not exist.
    async fn describe_fleet(&self, name: &str) -> anyhow::Result<Option<FleetState>>;

    /// Set the fleet's desired capacity.
    async fn set_desired_capacity(&self, name: &str, capacity: u32) -> anyhow::Result<()>;
}

/// Launch and terminate compute instances.
#[async_trait]
pub trait ComputeProvisioner: Send + Sync {
    /// Request one new instance. Returns the provider-assigned instance id.
    async fn launch_instance(&self, spec: &LaunchSpec) -> anyhow::Result<String>;

    /// Terminate an instance. Used by the worker on itself.
    async fn terminate_instance(&self, instance_id: &str) -> anyhow::Result<()>;
}

/// Attach and detach block-storage volumes. The wait methods block on the
/// provider's own completion signal and carry no application timeout.
#[async_trait]
pub trait VolumeAttacher: Send + Sync {
    async fn describe_attachment(&self, volume_id: &str) -> anyhow::Result<VolumeAttachment>;

    async fn detach_volume(&self, volume_id: &str, force: bool) -> anyhow::Result<()>;

    async fn wait_volume_detached(&self, volume_id: &str) -> anyhow::Result<()>;

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device_slot: &str,
    ) -> anyhow::Result<()>;

    async fn wait_volume_attached(&self, volume_id: &str) -> anyhow::Result<()>;
}

/// Upload files into an object-storage container.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Recursively upload every file under `source`, keyed as
    /// `<prefix>/<path relative to source>`. Returns the object count.
    async fn upload_tree(&self, source: &Path, prefix: &str) -> anyhow::Result<u64>;

    /// Upload a single small object.
    async fn put_object(&self, key: &str, body: Vec<u8>) -> anyhow::Result<()>;
}

/// Probe the local machine's block devices.
pub trait BlockDeviceProbe: Send + Sync {
    /// The physical disk backing the root filesystem. Must never be
    /// selected as the backup device.
    fn root_disk(&self) -> anyhow::Result<PathBuf>;

    /// Candidate disks in enumeration order (the NVMe device family).
    fn candidate_disks(&self) -> anyhow::Result<Vec<PathBuf>>;

    /// Whether the path currently exists as a block special file.
    fn is_block_device(&self, path: &Path) -> bool;
}

/// Mount and unmount a filesystem.
#[async_trait]
pub trait Mounter: Send + Sync {
    async fn mount(&self, device: &Path, target: &Path) -> anyhow::Result<()>;

    async fn unmount(&self, target: &Path) -> anyhow::Result<()>;
}

/// Source of wall-clock time and delay. The device resolver depends on this
/// instead of real sleeps so its retry bound is testable.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
