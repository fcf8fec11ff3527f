//! CSU totals and write-time link pricing.
//!
//! Reads prefer the `calculated_hours` persisted on each link. Only when
//! those sum to exactly zero (no links, or links written without hours) are
//! the totals recomputed from the nested items and tasks. A CSU whose true
//! total is zero therefore always takes the recompute path and lands on
//! zero again.

use rust_decimal::Decimal;

use super::Estimator;
use crate::error::Result;
use crate::models::{Csu, Item, ItemSelection, NewItemLink, NewTaskLink, Task, TaskSelection};

/// Sum of the persisted link hours of a CSU; missing values count as zero.
pub fn persisted_hours(csu: &Csu) -> Decimal {
    let items = csu.item_links.iter().map(|l| l.calculated_hours);
    let tasks = csu.task_links.iter().map(|l| l.calculated_hours);
    items
        .chain(tasks)
        .fold(Decimal::ZERO, |total, hours| {
            total.saturating_add(hours.unwrap_or_default())
        })
}

impl Estimator {
    /// Total hours of a CSU.
    pub fn csu_hours(&self, csu: &Csu) -> Result<Decimal> {
        let persisted = persisted_hours(csu);
        if !persisted.is_zero() {
            return Ok(persisted);
        }

        if csu.has_links() {
            tracing::debug!(csu_id = %csu.id, "No persisted link hours, recomputing");
        }
        self.recompute_csu_hours(csu)
    }

    /// Total hours of a CSU computed from its nested items and tasks,
    /// ignoring persisted link hours.
    pub fn recompute_csu_hours(&self, csu: &Csu) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for link in &csu.item_links {
            total = total.saturating_add(self.item_hours(link.item.as_ref(), &link.complexity)?);
        }
        for link in &csu.task_links {
            total = total.saturating_add(self.task_hours(link.task.as_ref(), &link.complexity)?);
        }
        Ok(total)
    }

    /// Compute the hours to persist with a new item link.
    ///
    /// A selection whose item no longer exists is priced at zero.
    pub fn price_item_link(
        &self,
        item: Option<&Item>,
        selection: &ItemSelection,
    ) -> Result<NewItemLink> {
        Ok(NewItemLink {
            item_id: selection.item_id,
            complexity: selection.complexity.clone(),
            calculated_hours: self.item_hours(item, &selection.complexity)?,
        })
    }

    /// Compute the hours to persist with a new task link.
    pub fn price_task_link(
        &self,
        task: Option<&Task>,
        selection: &TaskSelection,
    ) -> Result<NewTaskLink> {
        Ok(NewTaskLink {
            task_id: selection.task_id,
            complexity: selection.complexity.clone(),
            calculated_hours: self.task_hours(task, &selection.complexity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::Complexity;
    use crate::models::{CsuItemLink, CsuTaskLink};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn task_a() -> Task {
        Task::new("Task A")
            .with_estimate(Complexity::Low, "1:30")
            .with_estimate(Complexity::Medium, "4:00")
    }

    fn item_link(item: Item, complexity: &str, hours: Option<Decimal>) -> CsuItemLink {
        CsuItemLink {
            id: Uuid::new_v4(),
            item_id: item.id,
            complexity: complexity.to_string(),
            calculated_hours: hours,
            item: Some(item),
        }
    }

    fn task_link(task: Task, complexity: &str, hours: Option<Decimal>) -> CsuTaskLink {
        CsuTaskLink {
            id: Uuid::new_v4(),
            task_id: task.id,
            complexity: complexity.to_string(),
            calculated_hours: hours,
            task: Some(task),
        }
    }

    #[test]
    fn test_recomputes_when_nothing_persisted() {
        let item_x = Item::new("Item X", vec![task_a()]);
        let mut csu_y = Csu::new(Uuid::new_v4(), "CSU Y");
        csu_y.item_links.push(item_link(item_x, "medium", None));

        assert_eq!(Estimator::strict().csu_hours(&csu_y), Ok(dec!(4.0)));
    }

    #[test]
    fn test_single_nonzero_persisted_value_wins() {
        let item = Item::new(
            "Heavy",
            vec![Task::new("Big").with_estimate(Complexity::High, "10")],
        );
        let mut csu_z = Csu::new(Uuid::new_v4(), "CSU Z");
        csu_z.task_links.push(task_link(task_a(), "low", Some(dec!(1.5))));
        csu_z.item_links.push(item_link(item, "high", Some(dec!(0))));

        assert_eq!(Estimator::strict().csu_hours(&csu_z), Ok(dec!(1.5)));
        assert_eq!(Estimator::strict().recompute_csu_hours(&csu_z), Ok(dec!(11.5)));
    }

    #[test]
    fn test_persisted_sum_used_when_all_present() {
        let mut csu = Csu::new(Uuid::new_v4(), "Persisted");
        // Persisted values deliberately disagree with the nested data.
        csu.task_links.push(task_link(task_a(), "low", Some(dec!(3))));
        csu.item_links
            .push(item_link(Item::new("X", vec![task_a()]), "medium", Some(dec!(2.25))));

        assert_eq!(Estimator::strict().csu_hours(&csu), Ok(dec!(5.25)));
    }

    #[test]
    fn test_all_zero_persisted_falls_back() {
        let mut csu = Csu::new(Uuid::new_v4(), "Stale");
        csu.task_links.push(task_link(task_a(), "low", Some(dec!(0))));
        csu.item_links
            .push(item_link(Item::new("X", vec![task_a()]), "medium", None));

        assert_eq!(Estimator::strict().csu_hours(&csu), Ok(dec!(5.5)));
    }

    #[test]
    fn test_true_zero_total_stays_zero() {
        let mut csu = Csu::new(Uuid::new_v4(), "Nothing to do");
        csu.task_links.push(task_link(task_a(), "very_high", Some(dec!(0))));

        assert_eq!(Estimator::strict().csu_hours(&csu), Ok(Decimal::ZERO));
        assert_eq!(
            Estimator::strict().csu_hours(&Csu::new(Uuid::new_v4(), "Empty")),
            Ok(Decimal::ZERO)
        );
    }

    #[test]
    fn test_csu_hours_is_idempotent() {
        let mut csu = Csu::new(Uuid::new_v4(), "Repeat");
        csu.task_links.push(task_link(task_a(), "medium", None));
        let estimator = Estimator::lenient();

        let first = estimator.csu_hours(&csu).unwrap();
        let second = estimator.csu_hours(&csu).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dec!(4));
    }

    #[test]
    fn test_huge_totals_saturate() {
        let mut csu = Csu::new(Uuid::new_v4(), "Huge");
        csu.task_links.push(task_link(task_a(), "low", Some(Decimal::MAX)));
        csu.task_links.push(task_link(task_a(), "low", Some(Decimal::MAX)));
        assert_eq!(persisted_hours(&csu), Decimal::MAX);
        assert_eq!(Estimator::lenient().csu_hours(&csu).unwrap(), Decimal::MAX);

        let huge = Task::new("Huge").with_estimate(Complexity::Low, "79228162514264337593543950335");
        let mut fallback = Csu::new(Uuid::new_v4(), "Huge fallback");
        fallback.task_links.push(task_link(huge.clone(), "low", None));
        fallback.task_links.push(task_link(huge, "low", None));
        assert_eq!(
            Estimator::strict().csu_hours(&fallback).unwrap(),
            Decimal::MAX
        );
    }

    #[test]
    fn test_price_links() {
        let estimator = Estimator::strict();
        let task = task_a();
        let item = Item::new("X", vec![task.clone()]);

        let priced_item = estimator
            .price_item_link(
                Some(&item),
                &ItemSelection {
                    item_id: item.id,
                    complexity: "low".to_string(),
                },
            )
            .unwrap();
        assert_eq!(priced_item.calculated_hours, dec!(1.5));

        let missing = estimator
            .price_task_link(
                None,
                &TaskSelection {
                    task_id: Uuid::new_v4(),
                    complexity: "low".to_string(),
                },
            )
            .unwrap();
        assert_eq!(missing.calculated_hours, Decimal::ZERO);
    }
}
