//! Core data models for finvault
//!
//! These are the decrypted, typed views of stored rows, plus the patch and
//! input types used to write them.

pub mod account;
pub mod ids;
pub mod loan;
pub mod preferences;
pub mod recurring;
pub mod transaction;

pub use account::{Account, AccountPatch, AccountRef, AccountType, AccountValidationError};
pub use ids::{AccountId, LoanId, RecurringId, TransactionId, UserId};
pub use loan::{Loan, LoanPatch, NewLoan};
pub use preferences::{Preferences, DEFAULT_CURRENCY};
pub use recurring::{
    Frequency, NewRecurring, RecurringOutcome, RecurringPatch, RecurringRun,
    RecurringTransaction, RecurringView,
};
pub use transaction::{
    NewTransaction, Transaction, TransactionPatch, TransactionType, TransactionView, TransferLeg,
};
