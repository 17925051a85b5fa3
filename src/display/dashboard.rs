//! Dashboard display formatting

use crate::services::{DashboardSummary, MonthlyExpenses};

use super::format_amount;

pub fn format_dashboard(summary: &DashboardSummary, currency: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Overview for {}\n", summary.month.format("%B %Y")));
    output.push_str(&"=".repeat(40));
    output.push('\n');

    let rows = [
        ("Total balance", summary.total_balance),
        ("Income this month", summary.monthly_income),
        ("Expenses this month", summary.monthly_expenses),
        ("Loan debt", summary.total_debt),
        ("Net worth", summary.net_worth),
    ];
    for (label, value) in rows {
        output.push_str(&format!(
            "{:<20} {:>19}\n",
            label,
            format_amount(value, currency)
        ));
    }

    if !summary.expenses_by_category.is_empty() {
        output.push_str("\nSpending by category\n");
        let mut categories: Vec<_> = summary.expenses_by_category.iter().collect();
        categories.sort_by(|a, b| b.1.total_cmp(a.1).then(a.0.cmp(b.0)));
        for (category, amount) in categories {
            output.push_str(&format!(
                "  {:<18} {:>19}\n",
                category,
                format_amount(*amount, currency)
            ));
        }
    }

    output.push_str(&format!(
        "\n{} accounts, {} transactions, {} loans, {} recurring\n",
        summary.account_count,
        summary.transaction_count,
        summary.loan_count,
        summary.recurring_count
    ));

    output
}

/// One line per month, then one indented line per category
pub fn format_monthly_expenses(trend: &[MonthlyExpenses], currency: &str) -> String {
    let mut output = String::from("Monthly spending\n");

    for month in trend {
        let total: f64 = month.by_category.values().sum();
        output.push_str(&format!(
            "{:<20} {:>19}\n",
            month.month.format("%b %Y").to_string(),
            format_amount(total, currency)
        ));
        for (category, amount) in &month.by_category {
            output.push_str(&format!(
                "  {:<18} {:>19}\n",
                category,
                format_amount(*amount, currency)
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_dashboard() {
        let mut by_category = BTreeMap::new();
        by_category.insert("Food".to_string(), 100.0);
        by_category.insert("Rent".to_string(), 900.0);
        let summary = DashboardSummary {
            month: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            total_balance: 301.0,
            monthly_income: 500.0,
            monthly_expenses: 1000.0,
            total_debt: 250.0,
            net_worth: 51.0,
            expenses_by_category: by_category,
            account_count: 1,
            transaction_count: 5,
            loan_count: 1,
            recurring_count: 0,
        };

        let output = format_dashboard(&summary, "INR");
        assert!(output.contains("March 2025"));
        assert!(output.contains("INR 51.00"));
        // largest category first
        assert!(output.find("Rent").unwrap() < output.find("Food").unwrap());
    }

    #[test]
    fn test_format_monthly_expenses() {
        let month = |m, rent| MonthlyExpenses {
            month: NaiveDate::from_ymd_opt(2025, m, 1).unwrap(),
            by_category: BTreeMap::from([
                ("food".to_string(), 10.0),
                ("rent".to_string(), rent),
            ]),
        };

        let output = format_monthly_expenses(&[month(1, 0.0), month(2, 900.0)], "INR");
        assert!(output.contains("Jan 2025"));
        assert!(output.contains("INR 910.00"));
        assert!(output.find("Jan 2025").unwrap() < output.find("Feb 2025").unwrap());
        assert!(output.contains("INR 0.00"));
    }
}
