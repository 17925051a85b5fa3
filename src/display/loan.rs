//! Loan display formatting

use crate::models::Loan;

use super::{format_amount, truncate};

pub fn format_loan_list(loans: &[Loan], currency: &str) -> String {
    if loans.is_empty() {
        return "No loans found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<14} {:20} {:>18} {:>18} {:>16} {:>5}\n",
        "ID", "Name", "Outstanding", "Total", "EMI", "Paid"
    ));
    output.push_str(&"-".repeat(96));
    output.push('\n');

    for loan in loans {
        output.push_str(&format!(
            "{:<14} {} {:>18} {:>18} {:>16} {:>4.0}%\n",
            loan.id.to_string(),
            truncate(&loan.name, 20),
            format_amount(loan.outstanding_balance, currency),
            format_amount(loan.total_amount, currency),
            format_amount(loan.emi_amount, currency),
            loan.progress() * 100.0,
        ));
    }

    let outstanding: f64 = loans.iter().map(|l| l.outstanding_balance).sum();
    output.push_str(&"-".repeat(96));
    output.push('\n');
    output.push_str(&format!(
        "{:<14} {:20} {:>18}\n",
        "",
        "TOTAL DEBT",
        format_amount(outstanding, currency)
    ));

    output
}

/// One-paragraph summary of a loan, used after creating or paying one
pub fn format_loan_details(loan: &Loan, currency: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("Loan: {}\n", loan.name));
    output.push_str(&format!("  ID:          {}\n", loan.id.key()));
    output.push_str(&format!(
        "  Outstanding: {}\n",
        format_amount(loan.outstanding_balance, currency)
    ));
    output.push_str(&format!(
        "  Total:       {}\n",
        format_amount(loan.total_amount, currency)
    ));
    output.push_str(&format!(
        "  EMI:         {} x {} months from {}\n",
        format_amount(loan.emi_amount, currency),
        loan.duration_months,
        loan.start_date
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoanId, UserId};
    use chrono::{NaiveDate, Utc};

    fn loan() -> Loan {
        Loan {
            id: LoanId::new(),
            user_id: UserId::from("u1"),
            name: "Home".into(),
            total_amount: 200000.0,
            outstanding_balance: 150000.0,
            emi_amount: 5000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            duration_months: 60,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_loan_list() {
        let output = format_loan_list(&[loan()], "INR");
        assert!(output.contains("Home"));
        assert!(output.contains("INR 150,000.00"));
        assert!(output.contains("25%"));
        assert!(output.contains("TOTAL DEBT"));
    }

    #[test]
    fn test_format_empty() {
        assert!(format_loan_list(&[], "INR").contains("No loans found"));
    }

    #[test]
    fn test_format_loan_details() {
        let output = format_loan_details(&loan(), "INR");
        assert!(output.contains("60 months"));
        assert!(output.contains("2024-01-01"));
    }
}
