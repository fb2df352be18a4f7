use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use shopbot_core::domain::store::StoreId;

/// Store-keyed reconciliation guard with a fixed time-to-live. A run is never
/// released explicitly; the window simply expires. A second trigger inside
/// the window is rejected outright, not queued.
pub struct CooldownLock {
    ttl: Duration,
    started: Mutex<HashMap<StoreId, Instant>>,
}

impl CooldownLock {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, started: Mutex::new(HashMap::new()) }
    }

    /// Marks a run as started for `store_id`, or returns the time left on the
    /// active window.
    pub async fn try_begin(&self, store_id: StoreId) -> Result<(), Duration> {
        let mut started = self.started.lock().await;
        let now = Instant::now();
        started.retain(|_, at| now.duration_since(*at) < self.ttl);

        if let Some(at) = started.get(&store_id) {
            return Err(self.ttl.saturating_sub(now.duration_since(*at)));
        }
        started.insert(store_id, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shopbot_core::domain::store::StoreId;

    use super::CooldownLock;

    #[tokio::test]
    async fn second_trigger_inside_the_window_is_rejected() {
        let lock = CooldownLock::new(Duration::from_secs(5));
        let store_id = StoreId::new();

        assert!(lock.try_begin(store_id).await.is_ok());
        let remaining = lock.try_begin(store_id).await.expect_err("inside window");
        assert!(remaining <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn windows_are_independent_per_store() {
        let lock = CooldownLock::new(Duration::from_secs(5));
        assert!(lock.try_begin(StoreId::new()).await.is_ok());
        assert!(lock.try_begin(StoreId::new()).await.is_ok());
    }

    #[tokio::test]
    async fn the_window_expires_on_its_own() {
        let lock = CooldownLock::new(Duration::from_millis(20));
        let store_id = StoreId::new();

        assert!(lock.try_begin(store_id).await.is_ok());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(lock.try_begin(store_id).await.is_ok());
    }
}
