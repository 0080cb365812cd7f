//! Credential refresh sweep, run out-of-band by the job queue.
//!
//! Walks every vault record and refreshes the ones about to expire. The
//! OAuth exchange itself lives behind [`TokenRefresher`]; this driver owns
//! the skip rules and the failure isolation.

use crate::error::EngineResult;
use crate::tokens::{TokenRecord, TokenVault};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records expiring within this window get refreshed by default.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

/// Exchanges a refresh token for fresh credentials with the provider.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, user_id: &str, record: &TokenRecord) -> EngineResult<TokenRecord>;
}

/// Refreshes every record expiring within `threshold`. Returns the count.
///
/// Skip rules: records with no refresh token or no expiry are untouchable;
/// records expiring later than the threshold are left alone. A per-user
/// exchange failure is logged and skipped so one broken grant never stalls
/// the sweep. Successful refreshes overwrite the whole record, which keeps
/// concurrent readers on complete, decryptable blobs.
pub async fn refresh_expiring_tokens(
    vault: &TokenVault,
    refresher: &dyn TokenRefresher,
    threshold: Duration,
) -> EngineResult<usize> {
    let now = Utc::now().timestamp();
    let threshold_secs = threshold.as_secs() as i64;
    let mut refreshed = 0;

    for (user_id, record) in vault.iterate()? {
        if !record.is_refreshable() {
            debug!(target: "voxline::refresh", user_id, "record not refreshable, skipping");
            continue;
        }
        if !record.expires_within(now, threshold_secs) {
            debug!(target: "voxline::refresh", user_id, "token still fresh, skipping");
            continue;
        }
        match refresher.refresh(&user_id, &record).await {
            Ok(new_record) => {
                vault.set(&user_id, &new_record)?;
                refreshed += 1;
                debug!(target: "voxline::refresh", user_id, "credentials refreshed");
            }
            Err(e) => {
                warn!(
                    target: "voxline::refresh",
                    user_id,
                    error = %e,
                    "refresh failed for user, continuing sweep"
                );
            }
        }
    }

    if refreshed > 0 {
        info!(target: "voxline::refresh", refreshed, "credential refresh sweep complete");
    }
    Ok(refreshed)
}
