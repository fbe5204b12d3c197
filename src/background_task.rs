use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::auth::revocation::TokenRevocations;

/// Periodically drops revocation entries whose token has expired anyway.
pub async fn start_purge_task(revocations: Arc<dyn TokenRevocations>, every: Duration) {
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let purged = revocations.purge_expired().await;
        if purged > 0 {
            tracing::info!(backend = revocations.backend_name(), "Purged {} expired token revocations", purged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::MemoryRevocations;

    #[tokio::test]
    async fn purges_on_every_tick() {
        let revocations = Arc::new(MemoryRevocations::new());
        revocations.revoke("expired", 0).await.unwrap();
        revocations.revoke("live", 3600).await.unwrap();

        let task = tokio::spawn(start_purge_task(revocations.clone(), Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();

        assert_eq!(revocations.len(), 1);
    }
}
