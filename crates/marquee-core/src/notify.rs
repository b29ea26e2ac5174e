//! Pre-commit quota gate and post-commit bookkeeping.
//!
//! After a successful add the requester's counter is bumped, the request is
//! written to the ledger, and every other admin is told on every identity they
//! have linked. Ledger and notification failures are logged and otherwise
//! ignored.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::media::{MediaKind, MediaSearchResult};
use crate::quota::{QuotaDecision, QuotaTracker};
use crate::services::{Notifier, RequestLedger, RequestRecord};
use crate::users::UserDirectory;

/// Outcome of a best-effort fan-out. Never an error as a whole.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl FanOutReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Used when no send timeout is configured.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends `text` to every identity concurrently; one failure does not affect
/// the others. A send still pending after `deadline` counts as failed.
pub async fn fan_out(
    notifier: &dyn Notifier,
    identities: Vec<String>,
    text: &str,
    deadline: Duration,
) -> FanOutReport {
    let sends = identities.into_iter().map(|identity| async move {
        let result = match tokio::time::timeout(deadline, notifier.send(&identity, text)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(anyhow!("timed out after {}s", deadline.as_secs())),
        };
        (identity, result)
    });

    let mut report = FanOutReport::default();
    for (identity, result) in join_all(sends).await {
        match result {
            Ok(()) => report.delivered.push(identity),
            Err(err) => {
                warn!(identity = %identity, error = %err, "notification failed");
                report.failed.push((identity, err));
            }
        }
    }
    report
}

pub struct RequestGate {
    quota: QuotaTracker,
    ledger: Arc<dyn RequestLedger>,
    notifier: Arc<dyn Notifier>,
    users: UserDirectory,
    send_timeout: Duration,
}

impl RequestGate {
    pub fn new(
        quota: QuotaTracker,
        ledger: Arc<dyn RequestLedger>,
        notifier: Arc<dyn Notifier>,
        users: UserDirectory,
    ) -> Self {
        Self {
            quota,
            ledger,
            notifier,
            users,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Upper bound for each admin notification.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn check(&self, requester: &str, kind: MediaKind) -> QuotaDecision {
        self.quota.check(
            &self.users.account_name(requester),
            kind,
            self.users.is_admin(requester),
        )
    }

    /// Bookkeeping for a successful commit.
    pub async fn committed(&self, requester: &str, media: &MediaSearchResult) -> FanOutReport {
        let account = self.users.account_name(requester);
        self.quota.record(&account, media.kind);

        let record = RequestRecord {
            kind: media.kind,
            title: media.title.clone(),
            year: media.year,
            catalog_id: media.catalog_id,
            requester: requester.to_string(),
            linked_ids: self.users.linked_identities(requester),
        };
        if let Err(err) = self.ledger.record(&record).await {
            warn!(
                requester,
                catalog_id = media.catalog_id,
                error = %err,
                "failed to record request"
            );
        }

        let text = format!(
            "{account} requested the {} {}.",
            media.kind.label(),
            media.display_title()
        );
        let report = fan_out(
            self.notifier.as_ref(),
            self.admin_recipients(requester),
            &text,
            self.send_timeout,
        )
        .await;
        debug!(
            requester,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "admin notifications sent"
        );
        report
    }

    /// Identities of every admin other than the requester.
    fn admin_recipients(&self, requester: &str) -> Vec<String> {
        let requester_name = self.users.find(requester).map(|user| user.name.as_str());
        self.users
            .admins()
            .filter(|admin| Some(admin.name.as_str()) != requester_name)
            .flat_map(|admin| admin.identities.iter().cloned())
            .collect()
    }
}
