//! Service layer for finvault
//!
//! Services sit on top of the [`Vault`](crate::vault::Vault): they validate
//! input, encrypt and decrypt through the record cipher, post balances, and
//! write the audit trail.

pub mod account;
pub mod dashboard;
pub mod loan;
pub mod preferences;
pub mod recurring;
pub mod transaction;
pub mod user;

pub use account::AccountService;
pub use dashboard::{DashboardService, DashboardSummary, MonthlyExpenses};
pub use loan::LoanService;
pub use preferences::PreferenceService;
pub use recurring::RecurringService;
pub use transaction::TransactionService;
pub use user::{ErasureReport, UserService};
