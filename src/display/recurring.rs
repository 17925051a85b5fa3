//! Recurring rule display formatting

use crate::models::{RecurringOutcome, RecurringRun, RecurringView};

use super::{format_amount, truncate};

pub fn format_recurring_list(views: &[RecurringView], currency: &str) -> String {
    if views.is_empty() {
        return "No recurring transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<13} {:10} {:20} {:16} {:10} {:8} {:>16}\n",
        "ID", "Next due", "Description", "Account", "Type", "Every", "Amount"
    ));
    output.push_str(&"-".repeat(99));
    output.push('\n');

    for view in views {
        let rule = &view.recurring;
        let account = view
            .account
            .as_ref()
            .map(|a| a.name.as_str())
            .unwrap_or("(deleted)");
        output.push_str(&format!(
            "{:<13} {} {} {} {:10} {:8} {:>16}\n",
            rule.id.to_string(),
            rule.next_due_date.format("%Y-%m-%d"),
            truncate(&rule.description, 20),
            truncate(account, 16),
            rule.transaction_type.to_string(),
            rule.frequency.to_string(),
            format_amount(rule.amount, currency),
        ));
    }

    output
}

/// Summary of a processing run, one line per rule
pub fn format_recurring_runs(runs: &[RecurringRun]) -> String {
    if runs.is_empty() {
        return "No recurring transactions were due.\n".to_string();
    }

    let mut output = String::new();
    let mut failures = 0;
    for run in runs {
        let status = match &run.outcome {
            RecurringOutcome::Success => "posted".to_string(),
            RecurringOutcome::Partial(reason) => {
                failures += 1;
                format!("posted, due date not advanced: {}", reason)
            }
            RecurringOutcome::Failed(reason) => {
                failures += 1;
                format!("failed: {}", reason)
            }
        };
        output.push_str(&format!(
            "{} {} ({}) {}\n",
            run.due_date.format("%Y-%m-%d"),
            run.recurring_id,
            run.user_id,
            status
        ));
    }
    output.push_str(&format!(
        "\nProcessed {} rule(s), {} with problems\n",
        runs.len(),
        failures
    ));
    output
}
