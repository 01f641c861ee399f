//! Local block-device probing for the device resolver.
//!
//! The root disk comes from resolving the root mount's source to its parent
//! physical disk (`findmnt` + `lsblk`, exactly what the original procedure
//! shelled out to). Candidates are the next-generation NVMe namespace
//! devices only.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};

use crate::domain::traits::BlockDeviceProbe;

const CANDIDATE_PATTERN: &str = "/dev/nvme*n1";

pub struct NvmeDeviceProbe;

impl NvmeDeviceProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NvmeDeviceProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDeviceProbe for NvmeDeviceProbe {
    fn root_disk(&self) -> anyhow::Result<PathBuf> {
        let source = run_stdout("findmnt", &["-n", "-o", "SOURCE", "/"])?;
        let source = source.trim();
        if source.is_empty() {
            bail!("findmnt reported no source for /");
        }

        // The root mount source is usually a partition; prefer its parent
        // disk. A source without a parent (whole-disk root) maps to itself.
        let parent = run_stdout("lsblk", &["-no", "PKNAME", source])
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|name| !name.is_empty());

        let disk_name = match parent {
            Some(name) => name,
            None => Path::new(source)
                .file_name()
                .context("root source has no file name")?
                .to_string_lossy()
                .to_string(),
        };
        Ok(PathBuf::from(format!("/dev/{disk_name}")))
    }

    fn candidate_disks(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut disks: Vec<PathBuf> = glob::glob(CANDIDATE_PATTERN)
            .context("invalid device glob")?
            .filter_map(Result::ok)
            .collect();
        disks.sort();
        Ok(disks)
    }

    fn is_block_device(&self, path: &Path) -> bool {
        use std::os::unix::fs::FileTypeExt;
        std::fs::metadata(path)
            .map(|metadata| metadata.file_type().is_block_device())
            .unwrap_or(false)
    }
}

fn run_stdout(program: &str, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("execute {program}"))?;
    if !output.status.success() {
        bail!("{program} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
