//! Loan model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LoanId, UserId};

/// A decrypted loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub name: String,
    pub total_amount: f64,
    pub outstanding_balance: f64,
    /// Monthly instalment
    pub emi_amount: f64,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Share of the principal repaid so far, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.total_amount <= 0.0 {
            return 1.0;
        }
        ((self.total_amount - self.outstanding_balance) / self.total_amount).clamp(0.0, 1.0)
    }
}

/// Input for creating a loan
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub name: String,
    pub total_amount: f64,
    /// Defaults to `total_amount` when absent
    pub outstanding_balance: Option<f64>,
    pub emi_amount: f64,
    pub start_date: NaiveDate,
    pub duration_months: u32,
}

impl NewLoan {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Loan name cannot be empty".into());
        }
        for (label, value) in [
            ("Total amount", Some(self.total_amount)),
            ("Outstanding balance", self.outstanding_balance),
            ("EMI amount", Some(self.emi_amount)),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{} must be a non-negative number", label));
                }
            }
        }
        if self.duration_months == 0 {
            return Err("Loan duration must be at least one month".into());
        }
        Ok(())
    }
}

/// Plaintext column values for a loan insert or update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outstanding_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emi_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_months: Option<u32>,
}

impl From<&NewLoan> for LoanPatch {
    fn from(loan: &NewLoan) -> Self {
        Self {
            name: Some(loan.name.trim().to_string()),
            total_amount: Some(loan.total_amount),
            outstanding_balance: Some(loan.outstanding_balance.unwrap_or(loan.total_amount)),
            emi_amount: Some(loan.emi_amount),
            start_date: Some(loan.start_date),
            duration_months: Some(loan.duration_months),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_loan() -> NewLoan {
        NewLoan {
            name: "Car".into(),
            total_amount: 500000.0,
            outstanding_balance: None,
            emi_amount: 12000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            duration_months: 48,
        }
    }

    #[test]
    fn test_outstanding_defaults_to_total() {
        let patch = LoanPatch::from(&new_loan());
        assert_eq!(patch.outstanding_balance, Some(500000.0));
    }

    #[test]
    fn test_validate() {
        assert!(new_loan().validate().is_ok());

        let mut loan = new_loan();
        loan.emi_amount = -1.0;
        assert!(loan.validate().unwrap_err().contains("EMI amount"));

        let mut loan = new_loan();
        loan.duration_months = 0;
        assert!(loan.validate().is_err());
    }
}
