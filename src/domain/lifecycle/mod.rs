//! Worker-side lifecycle: the four stages the agent runs on itself, in
//! strict order: attach, resolve, sync, teardown.
//!
//! Nothing here reports back to the control plane. A stage failure still
//! reaches teardown (best-effort self-release, as the original procedure
//! always ran its cleanup block), and the first failure decides the
//! process exit code.

pub mod attachment;
pub mod device;
pub mod sync;
pub mod teardown;

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::domain::traits::{
    BlockDeviceProbe, Clock, ComputeProvisioner, Mounter, ObjectStore, VolumeAttacher,
};
use crate::domain::types::WorkerError;

use attachment::AttachmentController;
use device::DeviceResolver;
use sync::SyncExecutor;
use teardown::Teardown;

/// Parameters of one agent run, resolved at worker boot.
#[derive(Debug, Clone)]
pub struct AgentJob {
    pub volume_id: String,
    pub mount_point: PathBuf,
    /// This worker's own instance id, from metadata self-identification.
    pub instance_id: String,
}

pub struct BackupLifecycle<'a> {
    attacher: &'a dyn VolumeAttacher,
    provisioner: &'a dyn ComputeProvisioner,
    probe: &'a dyn BlockDeviceProbe,
    mounter: &'a dyn Mounter,
    store: &'a dyn ObjectStore,
    clock: &'a dyn Clock,
    job: AgentJob,
}

impl<'a> BackupLifecycle<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attacher: &'a dyn VolumeAttacher,
        provisioner: &'a dyn ComputeProvisioner,
        probe: &'a dyn BlockDeviceProbe,
        mounter: &'a dyn Mounter,
        store: &'a dyn ObjectStore,
        clock: &'a dyn Clock,
        job: AgentJob,
    ) -> Self {
        Self {
            attacher,
            provisioner,
            probe,
            mounter,
            store,
            clock,
            job,
        }
    }

    /// Run all stages. Teardown executes even after a stage failure; the
    /// stage's error wins over any teardown error.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let result = self.run_stages().await;
        if let Err(e) = &result {
            error!(
                volume_id = self.job.volume_id,
                "Backup stage failed, proceeding to teardown: {e}"
            );
        }

        let teardown = Teardown::new(
            self.attacher,
            self.provisioner,
            &self.job.volume_id,
            &self.job.instance_id,
        )
        .run()
        .await;

        match (result, teardown) {
            (Ok(()), Ok(())) => {
                info!(volume_id = self.job.volume_id, "Backup job complete");
                Ok(())
            }
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
        }
    }

    async fn run_stages(&self) -> Result<(), WorkerError> {
        AttachmentController::new(self.attacher, &self.job.volume_id, &self.job.instance_id)
            .ensure_attached()
            .await?;

        let device = DeviceResolver::new(self.probe, self.clock, &self.job.volume_id)
            .resolve()
            .await?;

        self.sync(&device).await?;
        Ok(())
    }

    async fn sync(&self, device: &Path) -> Result<(), WorkerError> {
        SyncExecutor::new(self.mounter, self.store, self.clock)
            .run(device, &self.job.mount_point)
            .await
            .map(|_| ())
    }
}
