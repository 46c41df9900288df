use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Gate consulted before every batch write.
pub trait Throttler: Send + Sync {
    /// Resolve once it is safe to write to the target.
    fn wait_until_open(&self) -> impl Future<Output = ()> + Send;
}

/// Never throttles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

impl Throttler for NoThrottle {
    fn wait_until_open(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}

/// A gate that can be paused and resumed from anywhere.
///
/// Waiters park on a watch channel rather than polling.
#[derive(Debug, Clone)]
pub struct PauseThrottle {
    paused: Arc<watch::Sender<bool>>,
}

impl Default for PauseThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseThrottle {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused: Arc::new(paused),
        }
    }

    pub fn pause(&self) {
        if !self.paused.send_replace(true) {
            info!("Throttle paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.send_replace(false) {
            info!("Throttle resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

impl Throttler for PauseThrottle {
    fn wait_until_open(&self) -> impl Future<Output = ()> + Send {
        let mut paused = self.paused.subscribe();
        async move {
            if *paused.borrow() {
                debug!("Waiting for throttle to open");
            }
            // Errors only once every throttle handle is gone.
            let _ = paused.wait_for(|paused| !*paused).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_no_throttle_is_open() {
        NoThrottle.wait_until_open().await;
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let throttle = PauseThrottle::new();
        throttle.pause();
        assert!(throttle.is_paused());

        let waiter = {
            let throttle = throttle.clone();
            tokio::spawn(async move { throttle.wait_until_open().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        throttle.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish after resume")
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_throttle_does_not_block() {
        let throttle = PauseThrottle::new();
        tokio::time::timeout(Duration::from_millis(100), throttle.wait_until_open())
            .await
            .unwrap();
    }
}
