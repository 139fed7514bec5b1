use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::calculator::{calculate_balance, in_sync, round2};
use crate::collector::collect_transactions;
use crate::error::Result;
use crate::models::Account;
use crate::store::{AccountFilter, LedgerStore};
use crate::synthesizer::Synthesizer;

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// Pipeline step an account failed at, for the run report. Calculation and
/// synthesis are pure and cannot fail, so only the store-facing steps appear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Collecting,
    Persisting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Collecting => "collecting",
            Stage::Persisting => "persisting",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum Outcome {
    /// Transaction sum already explains the stated balance.
    InSync { calculated: f64 },
    /// Synthetic history or an adjustment was persisted to close the gap.
    Adjusted { calculated: f64, delta: f64, written: usize },
    /// Check mode: the gap was found but nothing was written.
    Drift { calculated: f64, delta: f64 },
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub account_id: String,
    pub user_id: String,
    pub stated_balance: f64,
    pub existing_transactions: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed: usize,
    pub in_sync: usize,
    pub adjusted: usize,
    pub failed: usize,
    pub transactions_written: usize,
    pub accounts: Vec<AccountReport>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives collect -> calculate -> synthesize -> persist for each account in
/// turn. One account failing never stops the batch; the failure lands in the
/// summary and the run moves on.
pub struct Reconciler<'a, S: LedgerStore, R: Rng> {
    store: &'a mut S,
    rng: R,
    check_only: bool,
    now: Option<DateTime<Utc>>,
}

impl<'a, S: LedgerStore, R: Rng> Reconciler<'a, S, R> {
    pub fn new(store: &'a mut S, rng: R) -> Self {
        Self { store, rng, check_only: false, now: None }
    }

    /// Report drift without persisting anything.
    pub fn check_only(mut self, yes: bool) -> Self {
        self.check_only = yes;
        self
    }

    /// Pin the run instant; tests use this instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn run(&mut self, filter: &AccountFilter) -> Result<RunSummary> {
        self.run_with(filter, |_| {})
    }

    /// Like `run`, with a per-account observer so callers can print progress
    /// while the batch is still going.
    pub fn run_with<F>(&mut self, filter: &AccountFilter, mut observe: F) -> Result<RunSummary>
    where
        F: FnMut(&AccountReport),
    {
        // Failing to enumerate accounts means the run never starts; that one
        // is fatal, unlike any per-account error below.
        let accounts = self.store.accounts(filter)?;
        let now = self.now.unwrap_or_else(Utc::now);
        let synthesizer = Synthesizer::new(now);

        let mut summary = RunSummary::default();
        for account in &accounts {
            let report = self.reconcile_account(account, &synthesizer, now);
            summary.processed += 1;
            match &report.outcome {
                Outcome::InSync { .. } => summary.in_sync += 1,
                Outcome::Adjusted { written, .. } => {
                    summary.adjusted += 1;
                    summary.transactions_written += written;
                }
                Outcome::Drift { .. } => summary.adjusted += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
            observe(&report);
            summary.accounts.push(report);
        }
        Ok(summary)
    }

    fn reconcile_account(
        &mut self,
        account: &Account,
        synthesizer: &Synthesizer,
        now: DateTime<Utc>,
    ) -> AccountReport {
        let collected = collect_transactions(self.store, &account.id, &account.user_id);
        let stated = round2(account.balance);
        let calculated = calculate_balance(&collected.transactions);

        // One predicate failing degrades to partial data; all of them failing
        // means we know nothing, and synthesizing a "fresh" history on top of
        // an unreadable ledger would duplicate it. Fail the account instead.
        if collected.transactions.is_empty()
            && collected.warnings.len() == crate::store::LINK_PREDICATES.len()
        {
            return AccountReport {
                account_id: account.id.clone(),
                user_id: account.user_id.clone(),
                stated_balance: stated,
                existing_transactions: 0,
                outcome: Outcome::Failed {
                    stage: Stage::Collecting,
                    message: "all transaction queries failed".to_string(),
                },
                warnings: collected.warnings,
            };
        }

        let outcome = if in_sync(calculated, stated) {
            Outcome::InSync { calculated }
        } else {
            let delta = round2(stated - calculated);
            if self.check_only {
                Outcome::Drift { calculated, delta }
            } else {
                let batch = if collected.transactions.is_empty() {
                    synthesizer.fresh_history(account, now, &mut self.rng)
                } else {
                    vec![synthesizer.adjustment(account, calculated, now)]
                };
                match self.store.commit_batch(&batch) {
                    Ok(written) => Outcome::Adjusted { calculated, delta, written },
                    Err(e) => Outcome::Failed {
                        stage: Stage::Persisting,
                        message: e.to_string(),
                    },
                }
            }
        };

        AccountReport {
            account_id: account.id.clone(),
            user_id: account.user_id.clone(),
            stated_balance: stated,
            existing_transactions: collected.transactions.len(),
            outcome,
            warnings: collected.warnings,
        }
    }
}
