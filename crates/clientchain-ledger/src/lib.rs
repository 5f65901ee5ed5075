//! Subject profiles and credit accounting.
//!
//! ```text
//!   apply_credit ──► BEGIN
//!                      read balance          (Redeemed: insufficient → error)
//!                      UPDATE subjects.credits
//!                      INSERT credit_ledger  (balance_before / balance_after)
//!                    COMMIT
//! ```
//!
//! Every balance mutation writes a ledger entry in the same transaction, so
//! the entries always sum back to the balance.

pub mod entry;
pub mod store;

pub use entry::{CreditDirection, CreditSource, LedgerEntry};
pub use store::LedgerDb;
