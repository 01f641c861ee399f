//! Recording test doubles for the capability interfaces.
//!
//! Used by the unit tests in this crate; every mock keeps an operation log
//! so tests can assert call order as well as call arguments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::traits::{
    BlockDeviceProbe, Clock, ComputeProvisioner, FleetControl, Mounter, ObjectStore,
    VolumeAttacher,
};
use super::types::{AttachmentState, FleetState, LaunchSpec, VolumeAttachment};

/// Fleet control backed by an in-memory capacity map.
pub struct MockFleetControl {
    fleets: Mutex<HashMap<String, u32>>,
    capacity_updates: Mutex<Vec<(String, u32)>>,
    fail_describe: Mutex<bool>,
}

impl MockFleetControl {
    pub fn new() -> Self {
        Self {
            fleets: Mutex::new(HashMap::new()),
            capacity_updates: Mutex::new(Vec::new()),
            fail_describe: Mutex::new(false),
        }
    }

    pub fn with_fleet(name: &str, desired_capacity: u32) -> Self {
        let mock = Self::new();
        mock.insert_fleet(name, desired_capacity);
        mock
    }

    pub fn insert_fleet(&self, name: &str, desired_capacity: u32) {
        self.fleets
            .lock()
            .unwrap()
            .insert(name.to_string(), desired_capacity);
    }

    pub fn set_fail_describe(&self, enabled: bool) {
        *self.fail_describe.lock().unwrap() = enabled;
    }

    /// Capacity mutations issued so far, in order.
    pub fn capacity_updates(&self) -> Vec<(String, u32)> {
        self.capacity_updates.lock().unwrap().clone()
    }
}

impl Default for MockFleetControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FleetControl for MockFleetControl {
    async fn describe_fleet(&self, name: &str) -> anyhow::Result<Option<FleetState>> {
        if *self.fail_describe.lock().unwrap() {
            anyhow::bail!("mock fleet provider error");
        }
        Ok(self
            .fleets
            .lock()
            .unwrap()
            .get(name)
            .map(|capacity| FleetState {
                name: name.to_string(),
                desired_capacity: *capacity,
            }))
    }

    async fn set_desired_capacity(&self, name: &str, capacity: u32) -> anyhow::Result<()> {
        self.fleets
            .lock()
            .unwrap()
            .insert(name.to_string(), capacity);
        self.capacity_updates
            .lock()
            .unwrap()
            .push((name.to_string(), capacity));
        Ok(())
    }
}

/// Provisioner that records launch specs and hands out sequential ids.
pub struct MockProvisioner {
    launches: Mutex<Vec<LaunchSpec>>,
    terminations: Mutex<Vec<String>>,
    fail_launch: Mutex<bool>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            terminations: Mutex::new(Vec::new()),
            fail_launch: Mutex::new(false),
        }
    }

    pub fn set_fail_launch(&self, enabled: bool) {
        *self.fail_launch.lock().unwrap() = enabled;
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn terminations(&self) -> Vec<String> {
        self.terminations.lock().unwrap().clone()
    }
}

impl Default for MockProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeProvisioner for MockProvisioner {
    async fn launch_instance(&self, spec: &LaunchSpec) -> anyhow::Result<String> {
        if *self.fail_launch.lock().unwrap() {
            anyhow::bail!("mock provisioning error");
        }
        let mut launches = self.launches.lock().unwrap();
        launches.push(spec.clone());
        Ok(format!("i-mock{:04}", launches.len()))
    }

    async fn terminate_instance(&self, instance_id: &str) -> anyhow::Result<()> {
        self.terminations
            .lock()
            .unwrap()
            .push(instance_id.to_string());
        Ok(())
    }
}

/// Volume attacher that models the provider-side attachment state machine
/// and logs every call it receives.
pub struct MockVolumeAttacher {
    attachment: Mutex<VolumeAttachment>,
    operations: Mutex<Vec<String>>,
    fail_attach: Mutex<bool>,
}

impl MockVolumeAttacher {
    pub fn detached(volume_id: &str) -> Self {
        Self {
            attachment: Mutex::new(VolumeAttachment {
                volume_id: volume_id.to_string(),
                state: AttachmentState::Detached,
                holder_instance_id: None,
            }),
            operations: Mutex::new(Vec::new()),
            fail_attach: Mutex::new(false),
        }
    }

    pub fn attached_to(volume_id: &str, holder: &str) -> Self {
        let mock = Self::detached(volume_id);
        {
            let mut attachment = mock.attachment.lock().unwrap();
            attachment.state = AttachmentState::Attached;
            attachment.holder_instance_id = Some(holder.to_string());
        }
        mock
    }

    pub fn set_fail_attach(&self, enabled: bool) {
        *self.fail_attach.lock().unwrap() = enabled;
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    pub fn current(&self) -> VolumeAttachment {
        self.attachment.lock().unwrap().clone()
    }

    fn log(&self, operation: String) {
        self.operations.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl VolumeAttacher for MockVolumeAttacher {
    async fn describe_attachment(&self, volume_id: &str) -> anyhow::Result<VolumeAttachment> {
        self.log(format!("describe({volume_id})"));
        Ok(self.attachment.lock().unwrap().clone())
    }

    async fn detach_volume(&self, volume_id: &str, force: bool) -> anyhow::Result<()> {
        self.log(format!("detach({volume_id}, force={force})"));
        let mut attachment = self.attachment.lock().unwrap();
        attachment.state = AttachmentState::Detached;
        attachment.holder_instance_id = None;
        Ok(())
    }

    async fn wait_volume_detached(&self, volume_id: &str) -> anyhow::Result<()> {
        self.log(format!("wait_detached({volume_id})"));
        Ok(())
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
        device_slot: &str,
    ) -> anyhow::Result<()> {
        self.log(format!("attach({volume_id}, {instance_id}, {device_slot})"));
        if *self.fail_attach.lock().unwrap() {
            anyhow::bail!("mock attach error");
        }
        let mut attachment = self.attachment.lock().unwrap();
        attachment.state = AttachmentState::Attached;
        attachment.holder_instance_id = Some(instance_id.to_string());
        Ok(())
    }

    async fn wait_volume_attached(&self, volume_id: &str) -> anyhow::Result<()> {
        self.log(format!("wait_attached({volume_id})"));
        Ok(())
    }
}

/// Object store that records uploads instead of performing them.
pub struct MockObjectStore {
    uploads: Mutex<Vec<(PathBuf, String)>>,
    objects: Mutex<Vec<String>>,
    fail_upload: Mutex<bool>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            objects: Mutex::new(Vec::new()),
            fail_upload: Mutex::new(false),
        }
    }

    pub fn set_fail_upload(&self, enabled: bool) {
        *self.fail_upload.lock().unwrap() = enabled;
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().unwrap().clone()
    }

    /// Keys written via `put_object`.
    pub fn objects(&self) -> Vec<String> {
        self.objects.lock().unwrap().clone()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload_tree(&self, source: &Path, prefix: &str) -> anyhow::Result<u64> {
        if *self.fail_upload.lock().unwrap() {
            anyhow::bail!("mock upload error");
        }
        self.uploads
            .lock()
            .unwrap()
            .push((source.to_path_buf(), prefix.to_string()));
        Ok(1)
    }

    async fn put_object(&self, key: &str, _body: Vec<u8>) -> anyhow::Result<()> {
        self.objects.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Block-device probe fed by a script of scan results: each call to
/// `candidate_disks` consumes the next batch, repeating the last one once
/// the script runs out.
pub struct MockBlockDeviceProbe {
    root: PathBuf,
    batches: Mutex<Vec<Vec<PathBuf>>>,
    current: Mutex<Vec<PathBuf>>,
    scans: Mutex<u32>,
}

impl MockBlockDeviceProbe {
    pub fn new(root: &str, batches: Vec<Vec<&str>>) -> Self {
        let batches: Vec<Vec<PathBuf>> = batches
            .into_iter()
            .map(|batch| batch.into_iter().map(PathBuf::from).collect())
            .collect();
        Self {
            root: PathBuf::from(root),
            batches: Mutex::new(batches),
            current: Mutex::new(Vec::new()),
            scans: Mutex::new(0),
        }
    }

    /// Probe that reports the same candidate set on every scan.
    pub fn steady(root: &str, candidates: Vec<&str>) -> Self {
        Self::new(root, vec![candidates])
    }

    pub fn scan_count(&self) -> u32 {
        *self.scans.lock().unwrap()
    }
}

impl BlockDeviceProbe for MockBlockDeviceProbe {
    fn root_disk(&self) -> anyhow::Result<PathBuf> {
        Ok(self.root.clone())
    }

    fn candidate_disks(&self) -> anyhow::Result<Vec<PathBuf>> {
        *self.scans.lock().unwrap() += 1;
        let mut batches = self.batches.lock().unwrap();
        let mut current = self.current.lock().unwrap();
        if !batches.is_empty() {
            *current = batches.remove(0);
        }
        Ok(current.clone())
    }

    fn is_block_device(&self, path: &Path) -> bool {
        self.current.lock().unwrap().iter().any(|p| p == path)
    }
}

/// Mounter that records mount/unmount calls.
pub struct MockMounter {
    operations: Mutex<Vec<String>>,
    fail_mount: Mutex<bool>,
}

impl MockMounter {
    pub fn new() -> Self {
        Self {
            operations: Mutex::new(Vec::new()),
            fail_mount: Mutex::new(false),
        }
    }

    pub fn set_fail_mount(&self, enabled: bool) {
        *self.fail_mount.lock().unwrap() = enabled;
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }
}

impl Default for MockMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for MockMounter {
    async fn mount(&self, device: &Path, target: &Path) -> anyhow::Result<()> {
        self.operations
            .lock()
            .unwrap()
            .push(format!("mount({}, {})", device.display(), target.display()));
        if *self.fail_mount.lock().unwrap() {
            anyhow::bail!("mock mount error");
        }
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> anyhow::Result<()> {
        self.operations
            .lock()
            .unwrap()
            .push(format!("unmount({})", target.display()));
        Ok(())
    }
}

/// Clock whose sleeps advance simulated time instead of waiting.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn total_slept(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }

    pub fn sleep_count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }
}
