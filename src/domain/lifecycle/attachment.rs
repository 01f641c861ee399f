//! Volume attachment controller: guarantee the volume ends up attached to
//! this worker and to nothing else.
//!
//! The forced detach before attach is the only mutual-exclusion mechanism
//! for the volume. It is advisory (the provider's attachment model, not a
//! lock), so the safety gate plus one-job-at-a-time discipline carry the
//! rest.

use tracing::{info, warn};

use crate::domain::traits::VolumeAttacher;
use crate::domain::types::{AttachmentState, WorkerError, DEVICE_SLOT};

pub struct AttachmentController<'a, A: VolumeAttacher + ?Sized> {
    attacher: &'a A,
    volume_id: &'a str,
    instance_id: &'a str,
}

impl<'a, A: VolumeAttacher + ?Sized> AttachmentController<'a, A> {
    pub fn new(attacher: &'a A, volume_id: &'a str, instance_id: &'a str) -> Self {
        Self {
            attacher,
            volume_id,
            instance_id,
        }
    }

    /// Check → (forced detach, if held) → attach → wait usable.
    ///
    /// An already-detached volume skips straight to attach. The waits block
    /// on the provider's own completion signal; a failure there is fatal,
    /// not retried.
    pub async fn ensure_attached(&self) -> Result<(), WorkerError> {
        let attachment = self
            .attacher
            .describe_attachment(self.volume_id)
            .await
            .map_err(|e| self.error(format!("describe attachment: {e:#}")))?;

        match attachment.state {
            AttachmentState::Detached => {
                info!(volume_id = self.volume_id, "Volume already detached");
            }
            AttachmentState::Attached | AttachmentState::Attaching => {
                warn!(
                    volume_id = self.volume_id,
                    holder = attachment.holder_instance_id.as_deref().unwrap_or("unknown"),
                    "Volume held by another instance, forcing detach"
                );
                self.attacher
                    .detach_volume(self.volume_id, true)
                    .await
                    .map_err(|e| self.error(format!("forced detach: {e:#}")))?;
                self.attacher
                    .wait_volume_detached(self.volume_id)
                    .await
                    .map_err(|e| self.error(format!("wait for detach: {e:#}")))?;
            }
        }

        self.attacher
            .attach_volume(self.volume_id, self.instance_id, DEVICE_SLOT)
            .await
            .map_err(|e| self.error(format!("attach: {e:#}")))?;
        self.attacher
            .wait_volume_attached(self.volume_id)
            .await
            .map_err(|e| self.error(format!("wait for attach: {e:#}")))?;

        info!(
            volume_id = self.volume_id,
            instance_id = self.instance_id,
            device_slot = DEVICE_SLOT,
            "Volume attached"
        );
        Ok(())
    }

    fn error(&self, message: String) -> WorkerError {
        WorkerError::Attachment { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::MockVolumeAttacher;

    #[tokio::test]
    async fn held_volume_is_detached_before_attach() {
        let attacher = MockVolumeAttacher::attached_to("vol-1", "i-old");
        let controller = AttachmentController::new(&attacher, "vol-1", "i-new");
        controller.ensure_attached().await.unwrap();

        let ops = attacher.operations();
        assert_eq!(
            ops,
            vec![
                "describe(vol-1)",
                "detach(vol-1, force=true)",
                "wait_detached(vol-1)",
                "attach(vol-1, i-new, /dev/sdf)",
                "wait_attached(vol-1)",
            ]
        );
        assert_eq!(
            attacher.current().holder_instance_id.as_deref(),
            Some("i-new")
        );
    }

    #[tokio::test]
    async fn detached_volume_skips_the_detach_path() {
        let attacher = MockVolumeAttacher::detached("vol-1");
        let controller = AttachmentController::new(&attacher, "vol-1", "i-new");
        controller.ensure_attached().await.unwrap();

        let ops = attacher.operations();
        assert!(!ops.iter().any(|op| op.starts_with("detach(")));
        assert!(ops.iter().any(|op| op.starts_with("attach(")));
    }

    #[tokio::test]
    async fn attach_failure_is_fatal() {
        let attacher = MockVolumeAttacher::detached("vol-1");
        attacher.set_fail_attach(true);
        let controller = AttachmentController::new(&attacher, "vol-1", "i-new");
        let err = controller.ensure_attached().await.unwrap_err();
        assert!(matches!(err, WorkerError::Attachment { .. }));
    }
}
