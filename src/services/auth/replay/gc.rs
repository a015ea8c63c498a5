use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::services::auth::replay::store::NonceLedger;

/// Periodically drop expired ledger records.
///
/// Failures are logged and retried on the next tick.
pub fn spawn_garbage_collector(ledger: Arc<dyn NonceLedger>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; open() has already collected.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp();
            match ledger.garbage_collect(now).await {
                Ok(removed) => debug!(removed, "nonce ledger gc"),
                Err(e) => warn!(error = %e, "nonce ledger gc failed"),
            }
        }
    })
}
