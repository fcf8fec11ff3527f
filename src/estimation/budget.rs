//! Budget rollup and statistics.

use rust_decimal::Decimal;
use serde::Serialize;

use super::Estimator;
use crate::error::Result;
use crate::models::Budget;

/// Totals across a list of budgets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetStats {
    pub total_budgets: usize,
    pub total_csus: usize,
    pub active_budgets: usize,
    pub total_hours: Decimal,
}

/// Number of budgets owning at least one CSU.
pub fn active_count(budgets: &[Budget]) -> usize {
    budgets.iter().filter(|b| b.is_active()).count()
}

impl Estimator {
    /// Sum of the CSU totals of a budget. Never persisted.
    pub fn budget_hours(&self, budget: &Budget) -> Result<Decimal> {
        budget
            .csus
            .iter()
            .try_fold(Decimal::ZERO, |total, csu| Ok(total.saturating_add(self.csu_hours(csu)?)))
    }

    /// Statistics across budgets.
    pub fn budget_stats(&self, budgets: &[Budget]) -> Result<BudgetStats> {
        let mut stats = BudgetStats {
            total_budgets: budgets.len(),
            active_budgets: active_count(budgets),
            ..Default::default()
        };
        for budget in budgets {
            stats.total_csus += budget.csus.len();
            stats.total_hours = stats.total_hours.saturating_add(self.budget_hours(budget)?);
        }
        Ok(stats)
    }
}
