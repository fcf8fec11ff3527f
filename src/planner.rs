//! Write and read service over a [`Database`].
//!
//! The planner validates drafts, prices CSU links with the [`Estimator`] and
//! hands fully computed records to the store. It is the only place where
//! link `calculated_hours` are produced.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{DatabaseError, PlannerError};
use crate::estimation::{ErrorPolicy, Estimator};
use crate::models::{
    Budget, BudgetDraft, Csu, CsuDraft, CsuItemLink, CsuPatch, CsuTaskLink, CsuUpdate, Item,
    ItemDraft, ItemSelection, NewCsu, NewItemLink, NewTaskLink, Task, TaskDraft, TaskSelection,
};
use crate::report::{BudgetReport, DashboardStats};
use crate::validation::{ValidationResult, Validator};

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Validating, pricing front for the data store.
pub struct Planner {
    db: Arc<dyn Database>,
    estimator: Estimator,
    validator: Validator,
}

impl Planner {
    pub fn new(db: Arc<dyn Database>, policy: ErrorPolicy) -> Self {
        Self {
            db,
            estimator: Estimator::new(policy),
            validator: Validator::new(policy),
        }
    }

    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    // ==================== Tasks ====================

    pub async fn create_task(&self, user_id: &str, draft: &TaskDraft) -> Result<Task> {
        let draft = draft.normalized();
        check(self.validator.validate_task(&draft))?;
        let task = self.db.create_task(user_id, &draft).await?;
        tracing::info!(task_id = %task.id, "Created task");
        Ok(task)
    }

    pub async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self.db.list_tasks(user_id).await?)
    }

    /// Update a task. Links already priced with the old estimates keep their
    /// hours until they are written again.
    pub async fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task> {
        let draft = draft.normalized();
        check(self.validator.validate_task(&draft))?;
        Ok(self.db.update_task(id, &draft).await?)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.delete_task(id).await?)
    }

    // ==================== Items ====================

    pub async fn create_item(&self, user_id: &str, draft: &ItemDraft) -> Result<Item> {
        check(self.validator.validate_item(draft))?;
        let item = self.db.create_item(user_id, draft).await?;
        tracing::info!(item_id = %item.id, tasks = item.tasks.len(), "Created item");
        Ok(item)
    }

    pub async fn list_items(&self, user_id: &str) -> Result<Vec<Item>> {
        Ok(self.db.list_items(user_id).await?)
    }

    /// Update an item, replacing its whole task set.
    pub async fn update_item(&self, id: Uuid, draft: &ItemDraft) -> Result<Item> {
        check(self.validator.validate_item(draft))?;
        Ok(self.db.update_item(id, draft).await?)
    }

    pub async fn delete_item(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.delete_item(id).await?)
    }

    // ==================== Budgets ====================

    pub async fn create_budget(&self, user_id: &str, draft: &BudgetDraft) -> Result<Budget> {
        check(self.validator.validate_budget(draft))?;
        let budget = self.db.create_budget(user_id, draft).await?;
        tracing::info!(budget_id = %budget.id, "Created budget");
        Ok(budget)
    }

    pub async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        Ok(self.db.list_budgets(user_id).await?)
    }

    pub async fn update_budget(&self, id: Uuid, draft: &BudgetDraft) -> Result<Budget> {
        check(self.validator.validate_budget(draft))?;
        Ok(self.db.update_budget(id, draft).await?)
    }

    /// Delete a budget together with its CSUs.
    pub async fn delete_budget(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.delete_budget(id).await?)
    }

    // ==================== CSUs ====================

    /// Create a CSU with every selected link priced at its complexity.
    pub async fn create_csu(&self, draft: &CsuDraft) -> Result<Csu> {
        check(self.validator.validate_csu(draft))?;

        let new = NewCsu {
            budget_id: draft.budget_id,
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            items: self.price_items(&draft.items).await?,
            tasks: self.price_tasks(&draft.tasks).await?,
        };
        let csu = self.db.create_csu(&new).await?;
        tracing::info!(
            csu_id = %csu.id,
            items = new.items.len(),
            tasks = new.tasks.len(),
            "Created CSU"
        );
        Ok(csu)
    }

    pub async fn get_csu(&self, id: Uuid) -> Result<Csu> {
        self.db
            .get_csu(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound { entity: "csu", id }.into())
    }

    /// Update a CSU. Each supplied link set replaces the stored one and is
    /// priced again; omitted sets are kept as they are.
    pub async fn update_csu(&self, id: Uuid, update: &CsuUpdate) -> Result<Csu> {
        check(self.validator.validate_csu_update(update))?;

        let items = match &update.items {
            Some(selections) => Some(self.price_items(selections).await?),
            None => None,
        };
        let tasks = match &update.tasks {
            Some(selections) => Some(self.price_tasks(selections).await?),
            None => None,
        };
        let patch = CsuPatch {
            name: update.name.trim().to_string(),
            description: update.description.clone(),
            items,
            tasks,
        };
        let csu = self.db.update_csu(id, &patch).await?;
        tracing::debug!(
            csu_id = %id,
            items_replaced = patch.items.is_some(),
            tasks_replaced = patch.tasks.is_some(),
            "Updated CSU"
        );
        Ok(csu)
    }

    pub async fn delete_csu(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.delete_csu(id).await?)
    }

    /// Link one more item to an existing CSU.
    pub async fn add_item_to_csu(
        &self,
        csu_id: Uuid,
        selection: &ItemSelection,
    ) -> Result<CsuItemLink> {
        check(self.validator.validate_complexity("items", &selection.complexity))?;
        self.get_csu(csu_id).await?;

        let items = self.db.get_items(&[selection.item_id]).await?;
        let link = self.estimator.price_item_link(items.first(), selection)?;
        Ok(self.db.insert_item_link(csu_id, &link).await?)
    }

    /// Link one more task to an existing CSU.
    pub async fn add_task_to_csu(
        &self,
        csu_id: Uuid,
        selection: &TaskSelection,
    ) -> Result<CsuTaskLink> {
        check(self.validator.validate_complexity("tasks", &selection.complexity))?;
        self.get_csu(csu_id).await?;

        let tasks = self.db.get_tasks(&[selection.task_id]).await?;
        let link = self.estimator.price_task_link(tasks.first(), selection)?;
        Ok(self.db.insert_task_link(csu_id, &link).await?)
    }

    pub async fn remove_item_link(&self, link_id: Uuid) -> Result<bool> {
        Ok(self.db.delete_item_link(link_id).await?)
    }

    pub async fn remove_task_link(&self, link_id: Uuid) -> Result<bool> {
        Ok(self.db.delete_task_link(link_id).await?)
    }

    // ==================== Reads ====================

    /// Total hours of a stored CSU.
    pub async fn csu_hours(&self, id: Uuid) -> Result<Decimal> {
        let csu = self.get_csu(id).await?;
        Ok(self.estimator.csu_hours(&csu)?)
    }

    /// Reports for every budget of a user, newest first.
    pub async fn budget_reports(&self, user_id: &str) -> Result<Vec<BudgetReport>> {
        let budgets = self.db.list_budgets(user_id).await?;
        budgets
            .iter()
            .map(|b| self.estimator.budget_report(b).map_err(PlannerError::from))
            .collect()
    }

    /// Dashboard statistics for a user.
    pub async fn dashboard(&self, user_id: &str) -> Result<DashboardStats> {
        let budgets = self.db.list_budgets(user_id).await?;
        let items = self.db.list_items(user_id).await?;
        let tasks = self.db.list_tasks(user_id).await?;
        Ok(self
            .estimator
            .dashboard_stats(&budgets, items.len(), tasks.len())?)
    }

    // ==================== Pricing ====================

    async fn price_items(&self, selections: &[ItemSelection]) -> Result<Vec<NewItemLink>> {
        if selections.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = selections.iter().map(|s| s.item_id).collect();
        let items: HashMap<Uuid, Item> = self
            .db
            .get_items(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        selections
            .iter()
            .map(|s| {
                let item = items.get(&s.item_id);
                if item.is_none() {
                    tracing::warn!(item_id = %s.item_id, "Linked item not found, pricing at zero");
                }
                Ok(self.estimator.price_item_link(item, s)?)
            })
            .collect()
    }

    async fn price_tasks(&self, selections: &[TaskSelection]) -> Result<Vec<NewTaskLink>> {
        if selections.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = selections.iter().map(|s| s.task_id).collect();
        let tasks: HashMap<Uuid, Task> = self
            .db
            .get_tasks(&ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        selections
            .iter()
            .map(|s| {
                let task = tasks.get(&s.task_id);
                if task.is_none() {
                    tracing::warn!(task_id = %s.task_id, "Linked task not found, pricing at zero");
                }
                Ok(self.estimator.price_task_link(task, s)?)
            })
            .collect()
    }
}

fn check(result: ValidationResult) -> Result<()> {
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }
    result.into_result().map_err(PlannerError::Validation)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::MemoryStore;
    use crate::validation::ValidationErrorCode;

    const USER: &str = "user-1";

    fn planner(policy: ErrorPolicy) -> Planner {
        Planner::new(Arc::new(MemoryStore::new()), policy)
    }

    fn task_draft(description: &str, low: &str, medium: &str) -> TaskDraft {
        TaskDraft {
            description: description.to_string(),
            complexity_low: Some(low.to_string()),
            complexity_medium: Some(medium.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_task_normalizes_and_validates() {
        let planner = planner(ErrorPolicy::Lenient);
        let task = planner
            .create_task(
                USER,
                &TaskDraft {
                    description: "  Login form ".to_string(),
                    complexity_low: Some(" 1:30 ".to_string()),
                    complexity_high: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.description, "Login form");
        assert_eq!(task.complexity_low.as_deref(), Some("1:30"));
        assert_eq!(task.complexity_high, None);

        let err = planner
            .create_task(USER, &TaskDraft { description: "Empty".to_string(), ..Default::default() })
            .await
            .unwrap_err();
        match err {
            PlannerError::Validation(errors) => {
                assert_eq!(errors[0].code, ValidationErrorCode::MissingEstimate)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_csu_prices_links() {
        let planner = planner(ErrorPolicy::Lenient);
        let a = planner.create_task(USER, &task_draft("A", "1:30", "4:00")).await.unwrap();
        let b = planner.create_task(USER, &task_draft("B", "0:45", "2")).await.unwrap();
        let item = planner
            .create_item(
                USER,
                &ItemDraft {
                    name: "X".to_string(),
                    description: String::new(),
                    task_ids: vec![a.id, b.id],
                },
            )
            .await
            .unwrap();
        let budget = planner
            .create_budget(USER, &BudgetDraft { name: "Launch".to_string() })
            .await
            .unwrap();

        let csu = planner
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "Y".to_string(),
                description: String::new(),
                items: vec![ItemSelection { item_id: item.id, complexity: "medium".to_string() }],
                tasks: vec![TaskSelection { task_id: b.id, complexity: "low".to_string() }],
            })
            .await
            .unwrap();

        assert_eq!(csu.item_links[0].calculated_hours, Some(dec!(6)));
        assert_eq!(csu.task_links[0].calculated_hours, Some(dec!(0.75)));
        assert_eq!(planner.csu_hours(csu.id).await.unwrap(), dec!(6.75));

        let reports = planner.budget_reports(USER).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].total_hours, dec!(6.75));
    }

    #[tokio::test]
    async fn test_update_csu_replaces_only_supplied_sets() {
        let planner = planner(ErrorPolicy::Lenient);
        let a = planner.create_task(USER, &task_draft("A", "1", "3")).await.unwrap();
        let budget = planner
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        let csu = planner
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![],
                tasks: vec![TaskSelection { task_id: a.id, complexity: "low".to_string() }],
            })
            .await
            .unwrap();

        let renamed = planner
            .update_csu(csu.id, &CsuUpdate { name: "Renamed".to_string(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.task_links.len(), 1);

        let repriced = planner
            .update_csu(
                csu.id,
                &CsuUpdate {
                    name: "Renamed".to_string(),
                    tasks: Some(vec![TaskSelection { task_id: a.id, complexity: "medium".to_string() }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(repriced.task_links.len(), 1);
        assert_eq!(repriced.task_links[0].calculated_hours, Some(dec!(3)));

        let cleared = planner
            .update_csu(
                csu.id,
                &CsuUpdate { name: "Renamed".to_string(), tasks: Some(vec![]), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(!cleared.has_links());
    }

    #[tokio::test]
    async fn test_add_and_remove_links() {
        let planner = planner(ErrorPolicy::Lenient);
        let a = planner.create_task(USER, &task_draft("A", "2:30", "5")).await.unwrap();
        let budget = planner
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        let csu = planner
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![],
                tasks: vec![],
            })
            .await
            .unwrap();

        let link = planner
            .add_task_to_csu(csu.id, &TaskSelection { task_id: a.id, complexity: "low".to_string() })
            .await
            .unwrap();
        assert_eq!(link.calculated_hours, Some(dec!(2.5)));
        assert_eq!(planner.csu_hours(csu.id).await.unwrap(), dec!(2.5));

        assert!(planner.remove_task_link(link.id).await.unwrap());
        assert!(!planner.remove_task_link(link.id).await.unwrap());
        assert_eq!(planner.csu_hours(csu.id).await.unwrap(), Decimal::ZERO);

        let missing = planner
            .add_task_to_csu(Uuid::new_v4(), &TaskSelection { task_id: a.id, complexity: "low".to_string() })
            .await;
        assert!(matches!(
            missing,
            Err(PlannerError::Database(DatabaseError::NotFound { entity: "csu", .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_reference_priced_at_zero() {
        let planner = planner(ErrorPolicy::Lenient);
        let budget = planner
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        let csu = planner
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![ItemSelection { item_id: Uuid::new_v4(), complexity: "high".to_string() }],
                tasks: vec![],
            })
            .await
            .unwrap();
        assert_eq!(csu.item_links[0].calculated_hours, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_unknown_complexity() {
        let strict = planner(ErrorPolicy::Strict);
        let budget = strict
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        let err = strict
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![],
                tasks: vec![TaskSelection { task_id: Uuid::new_v4(), complexity: "extreme".to_string() }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));

        let lenient = planner(ErrorPolicy::Lenient);
        let budget = lenient
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        let csu = lenient
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![],
                tasks: vec![TaskSelection { task_id: Uuid::new_v4(), complexity: "extreme".to_string() }],
            })
            .await
            .unwrap();
        assert_eq!(csu.task_links[0].calculated_hours, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let planner = planner(ErrorPolicy::Lenient);
        let a = planner.create_task(USER, &task_draft("A", "1", "2")).await.unwrap();
        planner.create_task("someone-else", &task_draft("B", "1", "2")).await.unwrap();
        planner
            .create_item(
                USER,
                &ItemDraft { name: "X".to_string(), description: String::new(), task_ids: vec![a.id] },
            )
            .await
            .unwrap();
        let budget = planner
            .create_budget(USER, &BudgetDraft { name: "B".to_string() })
            .await
            .unwrap();
        planner
            .create_budget(USER, &BudgetDraft { name: "Empty".to_string() })
            .await
            .unwrap();
        planner
            .create_csu(&CsuDraft {
                budget_id: budget.id,
                name: "CSU".to_string(),
                description: String::new(),
                items: vec![],
                tasks: vec![TaskSelection { task_id: a.id, complexity: "medium".to_string() }],
            })
            .await
            .unwrap();

        let stats = planner.dashboard(USER).await.unwrap();
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.budgets.total_budgets, 2);
        assert_eq!(stats.budgets.active_budgets, 1);
        assert_eq!(stats.budgets.total_csus, 1);
        assert_eq!(stats.budgets.total_hours, dec!(2));
    }
}
