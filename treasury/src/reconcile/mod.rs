//! Payout reconciliation
//!
//! Matches an unexplained incoming amount against the ledger of expected
//! payouts. Single pass, at most one match, highest score wins; the
//! matcher deliberately does not solve a global assignment across
//! simultaneous arrivals: two payouts of very similar size can compete
//! for the same record, and the tolerance bands in [`fees`] were tuned
//! with that limitation in place.

pub mod fees;

use crate::ledger::LedgerStore;
use crate::metrics::RECONCILE_TOTAL;
use crate::Result;
use fees::{PayoutRange, Platform};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one reconciliation attempt.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Whether a record was matched (and, outside dry runs, marked)
    pub success: bool,
    /// Reference of the matched record
    pub matched_reference: Option<String>,
    /// Fee absorbed by the platform: base amount minus observed
    pub adjustment: Option<Decimal>,
    /// Score of the winning candidate
    pub score: Option<f64>,
    /// Why nothing matched, when `success` is false
    pub error: Option<String>,
}

impl ReconcileOutcome {
    fn no_match(message: impl Into<String>) -> Self {
        Self {
            success: false,
            matched_reference: None,
            adjustment: None,
            score: None,
            error: Some(message.into()),
        }
    }
}

/// Single-pass best-score payout matcher.
pub struct ReconciliationMatcher {
    store: Arc<dyn LedgerStore>,
    min_score: f64,
}

impl ReconciliationMatcher {
    /// Matcher over the given store with a score floor (0.80 in
    /// production).
    pub fn new(store: Arc<dyn LedgerStore>, min_score: f64) -> Self {
        Self { store, min_score }
    }

    /// All payout records, reconciled ones included.
    pub async fn payout_records(&self) -> Result<Vec<crate::ledger::PayoutRecord>> {
        self.store.read_payout_records().await
    }

    /// Try to match `observed` against the unreconciled payout records.
    ///
    /// `bank` and `account_name` identify where the amount showed up and
    /// are carried into the logs only. With `dry_run` the winning record
    /// is reported but not marked received.
    pub async fn reconcile(
        &self,
        observed: Decimal,
        bank: &str,
        account_name: Option<&str>,
        dry_run: bool,
    ) -> Result<ReconcileOutcome> {
        if observed <= Decimal::ZERO {
            return Ok(ReconcileOutcome::no_match("non-positive observed amount"));
        }

        info!(
            "Reconciling {} USD seen at {}{}",
            observed,
            bank,
            account_name.map(|a| format!(" ({})", a)).unwrap_or_default()
        );

        let records = self.store.read_payout_records().await?;

        let mut best: Option<(f64, String, Decimal, PayoutRange)> = None;
        for record in records.iter().filter(|r| r.matchable()) {
            let platform = Platform::parse(&record.platform);
            let range = platform.fee_model().payout_range(record.base_amount);
            if range.expected <= Decimal::ZERO || !range.contains(observed) {
                continue;
            }

            let deviation = (observed - range.expected).abs() / range.expected;
            let score = (Decimal::ONE - deviation).to_f64().unwrap_or(0.0);

            if best.as_ref().map_or(true, |(s, _, _, _)| score > *s) {
                best = Some((score, record.reference.clone(), record.base_amount, range));
            }
        }

        let Some((score, reference, base_amount, range)) = best else {
            warn!("No payout record in range for {} USD at {}", observed, bank);
            RECONCILE_TOTAL.with_label_values(&["no_candidate"]).inc();
            return Ok(ReconcileOutcome::no_match("no suitable match"));
        };

        if score <= self.min_score {
            warn!(
                "Best candidate {} scored {:.3} (expected {}), below floor {:.2}",
                reference, score, range.expected, self.min_score
            );
            RECONCILE_TOTAL.with_label_values(&["below_floor"]).inc();
            return Ok(ReconcileOutcome::no_match("no suitable match"));
        }

        if !dry_run {
            self.store.mark_received(&reference).await?;
        }

        info!(
            "Matched {} USD to payout record {} (expected {}, score {:.3}{})",
            observed,
            reference,
            range.expected,
            score,
            if dry_run { ", dry run" } else { "" }
        );
        RECONCILE_TOTAL.with_label_values(&["matched"]).inc();

        Ok(ReconcileOutcome {
            success: true,
            matched_reference: Some(reference),
            adjustment: Some(base_amount - observed),
            score: Some(score),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryLedgerStore, PayoutRecord};
    use rust_decimal_macros::dec;

    fn record(reference: &str, platform: &str, base: Decimal) -> PayoutRecord {
        PayoutRecord {
            reference: reference.to_string(),
            platform: platform.to_string(),
            base_amount: base,
            received: false,
        }
    }

    fn matcher(store: Arc<InMemoryLedgerStore>) -> ReconciliationMatcher {
        ReconciliationMatcher::new(store, 0.80)
    }

    #[tokio::test]
    async fn test_topstep_payout_matches_and_marks_received() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1", "Topstep", dec!(1000),
        )]));

        let outcome = matcher(store.clone())
            .reconcile(dec!(900), "mercury", Some("Payouts"), false)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.matched_reference.as_deref(), Some("row-1"));
        assert_eq!(outcome.adjustment, Some(dec!(100)));
        assert!(outcome.score.unwrap() > 0.8);

        let records = store.read_payout_records().await.unwrap();
        assert!(records[0].received);
    }

    #[tokio::test]
    async fn test_unknown_platform_exact_default_expectation() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1",
            "SomeNewFirm",
            dec!(500),
        )]));

        let outcome = matcher(store)
            .reconcile(dec!(475), "revolut", None, false)
            .await
            .unwrap();

        assert!(outcome.success);
        assert!((outcome.score.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_in_range_but_low_score_is_rejected() {
        // Small base: observed at full base deviates > 20 % from the
        // modeled amount, so it stays unreconciled.
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1", "Topstep", dec!(100),
        )]));

        let outcome = matcher(store.clone())
            .reconcile(dec!(100), "revolut", None, false)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("no suitable match"));
        assert!(!store.read_payout_records().await.unwrap()[0].received);
    }

    #[tokio::test]
    async fn test_closest_of_two_candidates_wins() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![
            record("row-a", "Tradeify", dec!(1000)),
            record("row-b", "Tradeify", dec!(1010)),
        ]));

        // Expected: row-a 900, row-b 909; observed 910 is closer to row-b.
        let outcome = matcher(store)
            .reconcile(dec!(910), "revolut", None, false)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.matched_reference.as_deref(), Some("row-b"));
    }

    #[tokio::test]
    async fn test_received_record_never_matches_again() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1", "Topstep", dec!(1000),
        )]));
        let matcher = matcher(store);

        let first = matcher
            .reconcile(dec!(900), "revolut", None, false)
            .await
            .unwrap();
        assert!(first.success);

        let second = matcher
            .reconcile(dec!(900), "revolut", None, false)
            .await
            .unwrap();
        assert!(!second.success);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_marking() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1", "Topstep", dec!(1000),
        )]));

        let outcome = matcher(store.clone())
            .reconcile(dec!(900), "revolut", None, true)
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!store.read_payout_records().await.unwrap()[0].received);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_never_match() {
        let store = Arc::new(InMemoryLedgerStore::with_records(vec![record(
            "row-1", "Topstep", dec!(1000),
        )]));

        let outcome = matcher(store)
            .reconcile(dec!(0), "revolut", None, false)
            .await
            .unwrap();
        assert!(!outcome.success);
    }
}
