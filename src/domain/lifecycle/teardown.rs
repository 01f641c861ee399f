//! Teardown: release the volume and terminate the worker instance.
//!
//! This is the resource-release mechanism for the whole job. The detach is
//! best-effort (the instance is about to disappear either way), but the
//! terminate must go through, otherwise the worker keeps incurring cost.

use tracing::{info, warn};

use crate::domain::traits::{ComputeProvisioner, VolumeAttacher};
use crate::domain::types::WorkerError;

pub struct Teardown<'a, A: VolumeAttacher + ?Sized, P: ComputeProvisioner + ?Sized> {
    attacher: &'a A,
    provisioner: &'a P,
    volume_id: &'a str,
    instance_id: &'a str,
}

impl<'a, A: VolumeAttacher + ?Sized, P: ComputeProvisioner + ?Sized> Teardown<'a, A, P> {
    pub fn new(
        attacher: &'a A,
        provisioner: &'a P,
        volume_id: &'a str,
        instance_id: &'a str,
    ) -> Self {
        Self {
            attacher,
            provisioner,
            volume_id,
            instance_id,
        }
    }

    pub async fn run(&self) -> Result<(), WorkerError> {
        if let Err(e) = self.attacher.detach_volume(self.volume_id, false).await {
            warn!(volume_id = self.volume_id, "Detach during teardown failed: {e:#}");
        }

        self.provisioner
            .terminate_instance(self.instance_id)
            .await
            .map_err(|e| WorkerError::Teardown {
                message: format!("terminate instance: {e:#}"),
            })?;

        info!(instance_id = self.instance_id, "Worker terminated itself");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{MockProvisioner, MockVolumeAttacher};

    #[tokio::test]
    async fn teardown_detaches_then_terminates() {
        let attacher = MockVolumeAttacher::attached_to("vol-1", "i-self");
        let provisioner = MockProvisioner::new();

        Teardown::new(&attacher, &provisioner, "vol-1", "i-self")
            .run()
            .await
            .unwrap();

        assert_eq!(attacher.operations(), vec!["detach(vol-1, force=false)"]);
        assert_eq!(provisioner.terminations(), vec!["i-self"]);
    }
}
