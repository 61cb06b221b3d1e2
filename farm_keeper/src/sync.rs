//! One reconciliation pass against the ledger.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use shared::player::HolderRecord;

use crate::context::Context;
use crate::enrichment::{self, EnrichmentQueue, EnrichmentSink};
use crate::ledger::LedgerClient;
use crate::players::{self, ReconcileReport};

pub struct Reconciler {
    context: Context,
    ledger: Arc<dyn LedgerClient>,
    queue: EnrichmentQueue,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub holders: usize,
    pub created: usize,
    pub enqueued: usize,
}

impl Reconciler {
    pub fn new(context: Context, ledger: Arc<dyn LedgerClient>, queue: EnrichmentQueue) -> Self {
        Self {
            context,
            ledger,
            queue,
        }
    }

    /// Runs a pass with the reconciliation in a single database transaction.
    pub async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        let settings = self.context.shared_settings();
        let pool = self.context.db_connection_pool();

        run_pass_with(
            self.ledger.as_ref(),
            self.context.settings().tracked_asset(),
            &self.queue,
            move |holders| async move {
                pool.transaction(move |conn| players::reconcile(conn, &settings, &holders))
                    .await
            },
        )
        .await
    }
}

/// Fetches the holder list of `asset`, hands it to `reconcile` and schedules
/// enrichment once `reconcile` has succeeded. A ledger failure aborts the
/// pass before `reconcile` runs.
pub async fn run_pass_with<Q, R, Fut>(
    ledger: &dyn LedgerClient,
    asset: &str,
    queue: &Q,
    reconcile: R,
) -> anyhow::Result<PassSummary>
where
    Q: EnrichmentSink + ?Sized,
    R: FnOnce(Vec<HolderRecord>) -> Fut,
    Fut: Future<Output = anyhow::Result<ReconcileReport>>,
{
    let holders = ledger
        .get_holders(asset)
        .await
        .with_context(|| format!("Failed to fetch holders of {asset}"))?;
    let no_of_holders = holders.len();

    let report = reconcile(holders)
        .await
        .context("Failed to reconcile players")?;

    let enqueued = enrichment::dispatch(queue, report.to_enrich)?;

    Ok(PassSummary {
        holders: no_of_holders,
        created: report.created.len(),
        enqueued,
    })
}
