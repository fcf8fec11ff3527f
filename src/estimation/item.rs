//! Item totals.

use rust_decimal::Decimal;

use super::{Complexity, Estimator};
use crate::error::Result;
use crate::models::Item;

impl Estimator {
    /// Sum of the item's task hours at a stored complexity name.
    ///
    /// An absent item, or one without tasks, is zero. Items never hold the
    /// same task twice, so no deduplication happens here.
    pub fn item_hours(&self, item: Option<&Item>, complexity: &str) -> Result<Decimal> {
        let Some(item) = item else {
            return Ok(Decimal::ZERO);
        };
        match self.resolve_complexity(complexity)? {
            Some(level) => self.item_hours_at(item, level),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Sum of the item's task hours at a known complexity level.
    pub fn item_hours_at(&self, item: &Item, level: Complexity) -> Result<Decimal> {
        item.tasks
            .iter()
            .try_fold(Decimal::ZERO, |total, task| Ok(total.saturating_add(self.hours_at(task, level)?)))
    }
}
