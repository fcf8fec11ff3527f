//! Data store abstraction.
//!
//! Stores persist what they are given: link `calculated_hours` arrive
//! already computed by the planner and are never recomputed here. Reads
//! return records with their nested data resolved (item → tasks,
//! CSU link → item/task, budget → CSUs), newest first.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::models::{
    Budget, BudgetDraft, Csu, CsuItemLink, CsuPatch, CsuTaskLink, Item, ItemDraft, NewCsu,
    NewItemLink, NewTaskLink, Task, TaskDraft,
};

/// Database abstraction layer.
#[async_trait]
pub trait Database: Send + Sync {
    // --- Tasks ---

    async fn create_task(&self, user_id: &str, draft: &TaskDraft) -> Result<Task, DatabaseError>;

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError>;

    /// Fetch tasks by id. Unknown ids are skipped.
    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<Task>, DatabaseError>;

    async fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task, DatabaseError>;

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // --- Items ---

    async fn create_item(&self, user_id: &str, draft: &ItemDraft) -> Result<Item, DatabaseError>;

    async fn list_items(&self, user_id: &str) -> Result<Vec<Item>, DatabaseError>;

    /// Fetch items with their tasks. Unknown ids are skipped.
    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<Item>, DatabaseError>;

    /// Update name and description and replace the whole task set.
    async fn update_item(&self, id: Uuid, draft: &ItemDraft) -> Result<Item, DatabaseError>;

    async fn delete_item(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // --- Budgets ---

    async fn create_budget(
        &self,
        user_id: &str,
        draft: &BudgetDraft,
    ) -> Result<Budget, DatabaseError>;

    /// Budgets of a user with their CSUs fully resolved.
    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError>;

    async fn update_budget(&self, id: Uuid, draft: &BudgetDraft) -> Result<Budget, DatabaseError>;

    /// Delete a budget and, with it, its CSUs.
    async fn delete_budget(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // --- CSUs ---

    async fn create_csu(&self, csu: &NewCsu) -> Result<Csu, DatabaseError>;

    async fn get_csu(&self, id: Uuid) -> Result<Option<Csu>, DatabaseError>;

    /// Update name and description, replacing each link set that is `Some`.
    async fn update_csu(&self, id: Uuid, patch: &CsuPatch) -> Result<Csu, DatabaseError>;

    async fn delete_csu(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn insert_item_link(
        &self,
        csu_id: Uuid,
        link: &NewItemLink,
    ) -> Result<CsuItemLink, DatabaseError>;

    async fn insert_task_link(
        &self,
        csu_id: Uuid,
        link: &NewTaskLink,
    ) -> Result<CsuTaskLink, DatabaseError>;

    async fn delete_item_link(&self, link_id: Uuid) -> Result<bool, DatabaseError>;

    async fn delete_task_link(&self, link_id: Uuid) -> Result<bool, DatabaseError>;
}
