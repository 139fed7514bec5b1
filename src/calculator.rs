use crate::models::{Transaction, TransactionStatus};

/// Maximum acceptable drift between a stated balance and the transaction sum
/// before an account counts as out of sync. Absorbs float noise.
pub const TOLERANCE: f64 = 0.01;

/// Round to cents. Applied at every accumulation step, not just at output,
/// so drift cannot compound across a long history.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sum the completed transactions into a signed total. Malformed amounts were
/// already coerced to 0.0 at decode time, so a bad row contributes nothing but
/// is never an error. Non-completed rows are not part of the balance.
pub fn calculate_balance(transactions: &[Transaction]) -> f64 {
    let mut total = 0.0;
    for txn in transactions {
        if txn.status != TransactionStatus::Completed {
            continue;
        }
        total = round2(total + txn.amount);
    }
    total
}

pub fn in_sync(calculated: f64, stated: f64) -> bool {
    (calculated - stated).abs() < TOLERANCE
}
