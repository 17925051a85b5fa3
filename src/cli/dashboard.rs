//! Dashboard CLI command

use crate::display::{format_dashboard, format_monthly_expenses};
use crate::error::VaultResult;
use crate::models::UserId;
use crate::services::DashboardService;
use crate::vault::Vault;

use super::{currency, parse_date};

/// Print the overview for the month containing `date` (default today),
/// followed by a spending trend when `months` is given
pub fn handle_dashboard_command(
    vault: &Vault,
    user_id: &UserId,
    date: Option<&str>,
    months: Option<u32>,
) -> VaultResult<()> {
    let today = parse_date(date)?;
    let service = DashboardService::new(vault);
    let currency = currency(vault, user_id);

    let summary = service.summary(user_id, today)?;
    print!("{}", format_dashboard(&summary, &currency));

    if let Some(months) = months {
        let trend = service.monthly_expenses(user_id, today, months)?;
        print!("\n{}", format_monthly_expenses(&trend, &currency));
    }
    Ok(())
}
