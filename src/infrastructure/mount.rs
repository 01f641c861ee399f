//! Mounting via the system mount utilities.

use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::traits::Mounter;

pub struct SystemMounter;

impl SystemMounter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for SystemMounter {
    async fn mount(&self, device: &Path, target: &Path) -> anyhow::Result<()> {
        let status = Command::new("mount")
            .arg(device)
            .arg(target)
            .status()
            .await
            .context("execute mount command")?;
        if !status.success() {
            bail!(
                "mount {} on {} exited with {status}",
                device.display(),
                target.display()
            );
        }
        info!(
            device = %device.display(),
            target = %target.display(),
            "Filesystem mounted"
        );
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> anyhow::Result<()> {
        let status = Command::new("umount")
            .arg(target)
            .status()
            .await
            .context("execute umount command")?;
        if !status.success() {
            bail!("umount {} exited with {status}", target.display());
        }
        Ok(())
    }
}
