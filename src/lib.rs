// Ledger reconciliation engine.
//
// Guarantees that every account's stated balance is explained by a
// deduplicated set of completed transactions, synthesizing plausible history
// (fresh accounts) or a single administrative adjustment (accounts with real
// history) when it is not. Exposed as a library so programmatic callers get
// the same structured run summary the CLI prints.

pub mod calculator;
pub mod collector;
pub mod error;
pub mod fmt;
pub mod models;
pub mod reconciler;
pub mod settings;
pub mod store;
pub mod synthesizer;

pub use calculator::{calculate_balance, in_sync, round2, TOLERANCE};
pub use collector::{collect_transactions, Collected};
pub use error::{Result, TallyError};
pub use models::{Account, Transaction, TransactionKind, TransactionStatus};
pub use reconciler::{AccountReport, Outcome, Reconciler, RunSummary, Stage};
pub use store::{AccountFilter, LedgerStore, LinkPredicate, SqliteStore, LINK_PREDICATES};
pub use synthesizer::Synthesizer;
