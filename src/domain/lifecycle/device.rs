//! Device resolver: map the freshly attached volume to its OS-visible
//! block device.
//!
//! The provider reporting the attachment usable and the kernel exposing the
//! device are not synchronous: the gap is a few seconds in practice but
//! unbounded in principle. The bounded poll turns that indefinite wait into
//! a deterministic failure.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::traits::{BlockDeviceProbe, Clock};
use crate::domain::types::WorkerError;

/// 20 attempts at 2-second intervals: a 40-second bound.
pub const MAX_ATTEMPTS: u32 = 20;
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct DeviceResolver<'a, P: BlockDeviceProbe + ?Sized, C: Clock + ?Sized> {
    probe: &'a P,
    clock: &'a C,
    volume_id: &'a str,
}

impl<'a, P: BlockDeviceProbe + ?Sized, C: Clock + ?Sized> DeviceResolver<'a, P, C> {
    pub fn new(probe: &'a P, clock: &'a C, volume_id: &'a str) -> Self {
        Self {
            probe,
            clock,
            volume_id,
        }
    }

    /// First candidate that is a block special file and not the root disk,
    /// in enumeration order. No disambiguation by size or label.
    pub async fn resolve(&self) -> Result<PathBuf, WorkerError> {
        for attempt in 1..=MAX_ATTEMPTS {
            if let Some(device) = self.scan_once(attempt) {
                info!(
                    volume_id = self.volume_id,
                    device = %device.display(),
                    attempt = attempt,
                    "Block device resolved"
                );
                return Ok(device);
            }
            if attempt < MAX_ATTEMPTS {
                self.clock.sleep(POLL_INTERVAL).await;
            }
        }

        Err(WorkerError::DeviceNotFound {
            volume_id: self.volume_id.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    fn scan_once(&self, attempt: u32) -> Option<PathBuf> {
        // Root resolution can fail transiently right after attach; treat it
        // like an empty scan and keep polling.
        let root = match self.probe.root_disk() {
            Ok(root) => root,
            Err(e) => {
                warn!(attempt = attempt, "Could not resolve root disk: {e:#}");
                return None;
            }
        };

        let candidates = match self.probe.candidate_disks() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(attempt = attempt, "Device scan failed: {e:#}");
                return None;
            }
        };

        debug!(
            attempt = attempt,
            root = %root.display(),
            candidates = candidates.len(),
            "Scanning for backup device"
        );

        candidates
            .into_iter()
            .find(|candidate| *candidate != root && self.probe.is_block_device(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{MockBlockDeviceProbe, MockClock};

    #[test_log::test(tokio::test)]
    async fn root_device_is_never_selected_regardless_of_position() {
        // Root enumerates first.
        let probe =
            MockBlockDeviceProbe::steady("/dev/nvme0n1", vec!["/dev/nvme0n1", "/dev/nvme1n1"]);
        let clock = MockClock::default();
        let resolver = DeviceResolver::new(&probe, &clock, "vol-1");
        assert_eq!(
            resolver.resolve().await.unwrap(),
            PathBuf::from("/dev/nvme1n1")
        );

        // Root enumerates last.
        let probe =
            MockBlockDeviceProbe::steady("/dev/nvme1n1", vec!["/dev/nvme0n1", "/dev/nvme1n1"]);
        let clock = MockClock::default();
        let resolver = DeviceResolver::new(&probe, &clock, "vol-1");
        assert_eq!(
            resolver.resolve().await.unwrap(),
            PathBuf::from("/dev/nvme0n1")
        );
    }

    #[tokio::test]
    async fn first_match_wins_in_enumeration_order() {
        let probe = MockBlockDeviceProbe::steady(
            "/dev/nvme0n1",
            vec!["/dev/nvme0n1", "/dev/nvme1n1", "/dev/nvme2n1"],
        );
        let clock = MockClock::default();
        let resolver = DeviceResolver::new(&probe, &clock, "vol-1");
        assert_eq!(
            resolver.resolve().await.unwrap(),
            PathBuf::from("/dev/nvme1n1")
        );
    }

    #[tokio::test]
    async fn device_appearing_mid_poll_is_found() {
        // Empty for three scans, then the device shows up.
        let probe = MockBlockDeviceProbe::new(
            "/dev/nvme0n1",
            vec![
                vec!["/dev/nvme0n1"],
                vec!["/dev/nvme0n1"],
                vec!["/dev/nvme0n1"],
                vec!["/dev/nvme0n1", "/dev/nvme1n1"],
            ],
        );
        let clock = MockClock::default();
        let resolver = DeviceResolver::new(&probe, &clock, "vol-1");
        assert_eq!(
            resolver.resolve().await.unwrap(),
            PathBuf::from("/dev/nvme1n1")
        );
        assert_eq!(probe.scan_count(), 4);
        assert_eq!(clock.sleep_count(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn exhausted_bound_fails_within_forty_seconds() {
        let probe = MockBlockDeviceProbe::steady("/dev/nvme0n1", vec!["/dev/nvme0n1"]);
        let clock = MockClock::default();
        let resolver = DeviceResolver::new(&probe, &clock, "vol-1");

        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::DeviceNotFound { attempts: 20, .. }
        ));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(probe.scan_count(), 20);
        assert!(clock.total_slept() <= Duration::from_secs(40));
    }
}
