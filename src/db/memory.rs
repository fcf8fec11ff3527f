//! In-memory store.
//!
//! Keeps records in maps behind a single `RwLock` and resolves nested data on
//! read, the same shape the PostgreSQL store returns. Deletes cascade the way
//! the relational schema's foreign keys do.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::Database;
use crate::error::DatabaseError;
use crate::models::{
    Budget, BudgetDraft, Csu, CsuItemLink, CsuPatch, CsuTaskLink, Item, ItemDraft, NewCsu,
    NewItemLink, NewTaskLink, Task, TaskDraft,
};

/// Item as stored: its tasks are kept as references.
#[derive(Debug, Clone)]
struct StoredItem {
    item: Item,
    task_ids: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct State {
    tasks: HashMap<Uuid, Task>,
    items: HashMap<Uuid, StoredItem>,
    /// Budgets without their CSUs.
    budgets: HashMap<Uuid, Budget>,
    /// CSUs with unresolved links.
    csus: HashMap<Uuid, Csu>,
}

impl State {
    fn resolve_item(&self, id: &Uuid) -> Option<Item> {
        let stored = self.items.get(id)?;
        let mut item = stored.item.clone();
        item.tasks = stored
            .task_ids
            .iter()
            .filter_map(|t| self.tasks.get(t).cloned())
            .collect();
        Some(item)
    }

    fn resolve_item_link(&self, link: &CsuItemLink) -> CsuItemLink {
        CsuItemLink {
            item: self.resolve_item(&link.item_id),
            ..link.clone()
        }
    }

    fn resolve_task_link(&self, link: &CsuTaskLink) -> CsuTaskLink {
        CsuTaskLink {
            task: self.tasks.get(&link.task_id).cloned(),
            ..link.clone()
        }
    }

    fn resolve_csu(&self, csu: &Csu) -> Csu {
        Csu {
            item_links: csu.item_links.iter().map(|l| self.resolve_item_link(l)).collect(),
            task_links: csu.task_links.iter().map(|l| self.resolve_task_link(l)).collect(),
            ..csu.clone()
        }
    }

    fn resolve_budget(&self, budget: &Budget) -> Budget {
        let mut csus: Vec<Csu> = self
            .csus
            .values()
            .filter(|c| c.budget_id == budget.id)
            .map(|c| self.resolve_csu(c))
            .collect();
        csus.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Budget {
            csus,
            ..budget.clone()
        }
    }
}

fn item_links(csu_links: &[NewItemLink]) -> Vec<CsuItemLink> {
    csu_links
        .iter()
        .map(|l| CsuItemLink {
            id: Uuid::new_v4(),
            item_id: l.item_id,
            complexity: l.complexity.clone(),
            calculated_hours: Some(l.calculated_hours),
            item: None,
        })
        .collect()
}

fn task_links(csu_links: &[NewTaskLink]) -> Vec<CsuTaskLink> {
    csu_links
        .iter()
        .map(|l| CsuTaskLink {
            id: Uuid::new_v4(),
            task_id: l.task_id,
            complexity: l.complexity.clone(),
            calculated_hours: Some(l.calculated_hours),
            task: None,
        })
        .collect()
}

fn newest_first<T>(records: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>) {
    records.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding already-resolved budgets, e.g. from an export.
    ///
    /// Nested items, tasks and CSUs are registered as their own records.
    pub fn with_budgets(budgets: Vec<Budget>) -> Self {
        let mut state = State::default();
        for mut budget in budgets {
            for mut stored in std::mem::take(&mut budget.csus) {
                for link in &mut stored.item_links {
                    if let Some(item) = link.item.take() {
                        register_item(&mut state, item);
                    }
                }
                for link in &mut stored.task_links {
                    if let Some(task) = link.task.take() {
                        state.tasks.insert(task.id, task);
                    }
                }
                state.csus.insert(stored.id, stored);
            }
            state.budgets.insert(budget.id, budget);
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

fn register_item(state: &mut State, mut item: Item) {
    let tasks = std::mem::take(&mut item.tasks);
    let task_ids = tasks.iter().map(|t| t.id).collect();
    for task in tasks {
        state.tasks.insert(task.id, task);
    }
    state.items.insert(item.id, StoredItem { item, task_ids });
}

#[async_trait]
impl Database for MemoryStore {
    // ==================== Tasks ====================

    async fn create_task(&self, user_id: &str, draft: &TaskDraft) -> Result<Task, DatabaseError> {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            description: draft.description.clone(),
            complexity_low: draft.complexity_low.clone(),
            complexity_medium: draft.complexity_medium.clone(),
            complexity_high: draft.complexity_high.clone(),
            complexity_very_high: draft.complexity_very_high.clone(),
            created_at: Utc::now(),
        };
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut tasks, |t| t.created_at);
        Ok(tasks)
    }

    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<Task>, DatabaseError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.tasks.get(id).cloned()).collect())
    }

    async fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task, DatabaseError> {
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(DatabaseError::NotFound { entity: "task", id })?;
        task.description = draft.description.clone();
        task.complexity_low = draft.complexity_low.clone();
        task.complexity_medium = draft.complexity_medium.clone();
        task.complexity_high = draft.complexity_high.clone();
        task.complexity_very_high = draft.complexity_very_high.clone();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        if state.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        for stored in state.items.values_mut() {
            stored.task_ids.retain(|t| *t != id);
        }
        for csu in state.csus.values_mut() {
            csu.task_links.retain(|l| l.task_id != id);
        }
        Ok(true)
    }

    // ==================== Items ====================

    async fn create_item(&self, user_id: &str, draft: &ItemDraft) -> Result<Item, DatabaseError> {
        let mut state = self.state.write().await;
        let item = Item {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            tasks: Vec::new(),
            created_at: Utc::now(),
        };
        let id = item.id;
        state.items.insert(
            id,
            StoredItem {
                item,
                task_ids: draft.task_ids.clone(),
            },
        );
        state
            .resolve_item(&id)
            .ok_or(DatabaseError::NotFound { entity: "item", id })
    }

    async fn list_items(&self, user_id: &str) -> Result<Vec<Item>, DatabaseError> {
        let state = self.state.read().await;
        let mut items: Vec<Item> = state
            .items
            .iter()
            .filter(|(_, s)| s.item.user_id == user_id)
            .filter_map(|(id, _)| state.resolve_item(id))
            .collect();
        newest_first(&mut items, |i| i.created_at);
        Ok(items)
    }

    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<Item>, DatabaseError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.resolve_item(id)).collect())
    }

    async fn update_item(&self, id: Uuid, draft: &ItemDraft) -> Result<Item, DatabaseError> {
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&id)
            .ok_or(DatabaseError::NotFound { entity: "item", id })?;
        stored.item.name = draft.name.clone();
        stored.item.description = draft.description.clone();
        stored.task_ids = draft.task_ids.clone();
        state
            .resolve_item(&id)
            .ok_or(DatabaseError::NotFound { entity: "item", id })
    }

    async fn delete_item(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        if state.items.remove(&id).is_none() {
            return Ok(false);
        }
        for csu in state.csus.values_mut() {
            csu.item_links.retain(|l| l.item_id != id);
        }
        Ok(true)
    }

    // ==================== Budgets ====================

    async fn create_budget(
        &self,
        user_id: &str,
        draft: &BudgetDraft,
    ) -> Result<Budget, DatabaseError> {
        let budget = Budget {
            user_id: user_id.to_string(),
            ..Budget::new(draft.name.clone())
        };
        self.state
            .write()
            .await
            .budgets
            .insert(budget.id, budget.clone());
        Ok(budget)
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError> {
        let state = self.state.read().await;
        let mut budgets: Vec<Budget> = state
            .budgets
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|b| state.resolve_budget(b))
            .collect();
        newest_first(&mut budgets, |b| b.created_at);
        Ok(budgets)
    }

    async fn update_budget(&self, id: Uuid, draft: &BudgetDraft) -> Result<Budget, DatabaseError> {
        let mut state = self.state.write().await;
        let budget = state
            .budgets
            .get_mut(&id)
            .ok_or(DatabaseError::NotFound { entity: "budget", id })?;
        budget.name = draft.name.clone();
        let budget = budget.clone();
        Ok(state.resolve_budget(&budget))
    }

    async fn delete_budget(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        if state.budgets.remove(&id).is_none() {
            return Ok(false);
        }
        state.csus.retain(|_, c| c.budget_id != id);
        Ok(true)
    }

    // ==================== CSUs ====================

    async fn create_csu(&self, new: &NewCsu) -> Result<Csu, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.budgets.contains_key(&new.budget_id) {
            return Err(DatabaseError::NotFound {
                entity: "budget",
                id: new.budget_id,
            });
        }

        let csu = Csu {
            description: new.description.clone(),
            item_links: item_links(&new.items),
            task_links: task_links(&new.tasks),
            ..Csu::new(new.budget_id, new.name.clone())
        };
        state.csus.insert(csu.id, csu.clone());
        Ok(state.resolve_csu(&csu))
    }

    async fn get_csu(&self, id: Uuid) -> Result<Option<Csu>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.csus.get(&id).map(|c| state.resolve_csu(c)))
    }

    async fn update_csu(&self, id: Uuid, patch: &CsuPatch) -> Result<Csu, DatabaseError> {
        let mut state = self.state.write().await;
        let csu = state
            .csus
            .get_mut(&id)
            .ok_or(DatabaseError::NotFound { entity: "csu", id })?;
        csu.name = patch.name.clone();
        csu.description = patch.description.clone();
        if let Some(items) = &patch.items {
            csu.item_links = item_links(items);
        }
        if let Some(tasks) = &patch.tasks {
            csu.task_links = task_links(tasks);
        }
        let csu = csu.clone();
        Ok(state.resolve_csu(&csu))
    }

    async fn delete_csu(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.state.write().await.csus.remove(&id).is_some())
    }

    async fn insert_item_link(
        &self,
        csu_id: Uuid,
        link: &NewItemLink,
    ) -> Result<CsuItemLink, DatabaseError> {
        let mut state = self.state.write().await;
        let csu = state.csus.get_mut(&csu_id).ok_or(DatabaseError::NotFound {
            entity: "csu",
            id: csu_id,
        })?;
        let mut links = item_links(std::slice::from_ref(link));
        let created = links.remove(0);
        csu.item_links.push(created.clone());
        Ok(state.resolve_item_link(&created))
    }

    async fn insert_task_link(
        &self,
        csu_id: Uuid,
        link: &NewTaskLink,
    ) -> Result<CsuTaskLink, DatabaseError> {
        let mut state = self.state.write().await;
        let csu = state.csus.get_mut(&csu_id).ok_or(DatabaseError::NotFound {
            entity: "csu",
            id: csu_id,
        })?;
        let mut links = task_links(std::slice::from_ref(link));
        let created = links.remove(0);
        csu.task_links.push(created.clone());
        Ok(state.resolve_task_link(&created))
    }

    async fn delete_item_link(&self, link_id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        for csu in state.csus.values_mut() {
            let before = csu.item_links.len();
            csu.item_links.retain(|l| l.id != link_id);
            if csu.item_links.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn delete_task_link(&self, link_id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        for csu in state.csus.values_mut() {
            let before = csu.task_links.len();
            csu.task_links.retain(|l| l.id != link_id);
            if csu.task_links.len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
