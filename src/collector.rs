use std::collections::HashSet;

use crate::models::Transaction;
use crate::store::{LedgerStore, LINK_PREDICATES};

pub struct Collected {
    /// Every transaction reachable from the account, each id exactly once.
    pub transactions: Vec<Transaction>,
    /// One entry per link predicate whose query failed.
    pub warnings: Vec<String>,
}

/// Gather every transaction that could belong to the account by running all
/// link predicates and deduplicating on id (first occurrence wins).
///
/// A failed sub-query degrades to an empty result set instead of aborting:
/// reconciling on partial data beats skipping the account entirely.
pub fn collect_transactions<S: LedgerStore + ?Sized>(
    store: &S,
    account_id: &str,
    user_id: &str,
) -> Collected {
    let mut seen: HashSet<String> = HashSet::new();
    let mut transactions = Vec::new();
    let mut warnings = Vec::new();

    for predicate in LINK_PREDICATES {
        match store.transactions_by(predicate, account_id, user_id) {
            Ok(batch) => {
                for txn in batch {
                    if seen.insert(txn.id.clone()) {
                        transactions.push(txn);
                    }
                }
            }
            Err(e) => warnings.push(format!(
                "query on {} failed for account {account_id}: {e}",
                predicate.field
            )),
        }
    }

    Collected { transactions, warnings }
}
