//! Display formatting for terminal output
//!
//! Plain-text tables and detail views built from decrypted models. Nothing
//! here touches storage or keys.

pub mod account;
pub mod dashboard;
pub mod loan;
pub mod recurring;
pub mod transaction;

pub use account::{format_account_details, format_account_list};
pub use dashboard::{format_dashboard, format_monthly_expenses};
pub use loan::format_loan_list;
pub use recurring::{format_recurring_list, format_recurring_runs};
pub use transaction::{format_transaction_details, format_transaction_register};

/// Format an amount with its currency code and thousands separators
///
/// `format_amount(-1234.5, "INR")` gives `-INR 1,234.50`.
pub fn format_amount(value: f64, currency: &str) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{} {}.{:02}", sign, currency, grouped, cents % 100)
}

/// Pad or cut a string to exactly `max_len` characters
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0, "INR"), "INR 0.00");
        assert_eq!(format_amount(250.75, "INR"), "INR 250.75");
        assert_eq!(format_amount(1234567.5, "USD"), "USD 1,234,567.50");
        assert_eq!(format_amount(-1000.0, "EUR"), "-EUR 1,000.00");
        assert_eq!(format_amount(-0.001, "INR"), "INR 0.00");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Short", 10), "Short     ");
        let result = truncate("A very long string", 10);
        assert_eq!(result.chars().count(), 10);
        assert!(result.ends_with("..."));
        // multi-byte characters are cut on char boundaries
        assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
    }
}
