//! Provider and OS adapters implementing the domain's capability
//! interfaces.

pub mod aws;
pub mod block_device;
pub mod imds;
pub mod logging;
pub mod mount;

/// A real clock: wall time plus tokio sleeps.
pub mod clock {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::domain::traits::Clock;

    pub struct SystemClock;

    #[async_trait]
    impl Clock for SystemClock {
        fn now_utc(&self) -> DateTime<Utc> {
            Utc::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }
}
