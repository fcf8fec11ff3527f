//! PostgreSQL store.
//!
//! Expects the tables in `sql/schema.sql`. Link-set replacements run inside a
//! transaction, so readers see either the old set or the new one.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Config, GenericClient, Pool, Runtime};
use rust_decimal::Decimal;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::Database;
use crate::error::DatabaseError;
use crate::models::{
    Budget, BudgetDraft, Csu, CsuItemLink, CsuPatch, CsuTaskLink, Item, ItemDraft, NewCsu,
    NewItemLink, NewTaskLink, Task, TaskDraft,
};

/// Database store backed by a connection pool.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store and connect to the database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        // Test connection
        let _ = pool.get().await?;
        tracing::info!("Connected to database (pool size {})", config.pool_size);

        Ok(Self { pool })
    }

    /// Get a connection from the pool.
    pub async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }

    /// Get a clone of the database pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }
}

// ==================== Row mapping ====================

fn task_from_row(row: &Row) -> Task {
    Task {
        id: row.get("id"),
        user_id: row.get("user_id"),
        description: row.get("description"),
        complexity_low: row.get("complexity_low"),
        complexity_medium: row.get("complexity_medium"),
        complexity_high: row.get("complexity_high"),
        complexity_very_high: row.get("complexity_very_high"),
        created_at: row.get("created_at"),
    }
}

fn item_from_row(row: &Row) -> Item {
    Item {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        tasks: Vec::new(),
        created_at: row.get("created_at"),
    }
}

fn budget_from_row(row: &Row) -> Budget {
    Budget {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        csus: Vec::new(),
        created_at: row.get("created_at"),
    }
}

fn csu_from_row(row: &Row) -> Csu {
    Csu {
        id: row.get("id"),
        budget_id: row.get("budget_id"),
        name: row.get("name"),
        description: row.get("description"),
        item_links: Vec::new(),
        task_links: Vec::new(),
        created_at: row.get("created_at"),
    }
}

fn item_link_from_row(row: &Row, items: &HashMap<Uuid, Item>) -> CsuItemLink {
    let item_id: Uuid = row.get("item_id");
    CsuItemLink {
        id: row.get("id"),
        item_id,
        complexity: row.get("complexity"),
        calculated_hours: row.get::<_, Option<Decimal>>("calculated_hours"),
        item: items.get(&item_id).cloned(),
    }
}

fn task_link_from_row(row: &Row, tasks: &HashMap<Uuid, Task>) -> CsuTaskLink {
    let task_id: Uuid = row.get("task_id");
    CsuTaskLink {
        id: row.get("id"),
        task_id,
        complexity: row.get("complexity"),
        calculated_hours: row.get::<_, Option<Decimal>>("calculated_hours"),
        task: tasks.get(&task_id).cloned(),
    }
}

// ==================== Nested loading ====================

async fn fetch_tasks<C>(client: &C, ids: &[Uuid]) -> Result<Vec<Task>, DatabaseError>
where
    C: GenericClient + Sync,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = client
        .query(
            r#"
            SELECT id, user_id, description, complexity_low, complexity_medium,
                   complexity_high, complexity_very_high, created_at
            FROM tasks
            WHERE id = ANY($1)
            ORDER BY created_at DESC
            "#,
            &[&ids],
        )
        .await?;
    Ok(rows.iter().map(task_from_row).collect())
}

/// Fill in each item's tasks.
async fn attach_tasks<C>(client: &C, items: &mut [Item]) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let rows = client
        .query(
            r#"
            SELECT it.item_id, t.id, t.user_id, t.description, t.complexity_low,
                   t.complexity_medium, t.complexity_high, t.complexity_very_high,
                   t.created_at
            FROM item_tasks it
            JOIN tasks t ON t.id = it.task_id
            WHERE it.item_id = ANY($1)
            ORDER BY t.created_at DESC
            "#,
            &[&ids],
        )
        .await?;

    let mut by_item: HashMap<Uuid, Vec<Task>> = HashMap::new();
    for row in &rows {
        by_item
            .entry(row.get("item_id"))
            .or_default()
            .push(task_from_row(row));
    }
    for item in items.iter_mut() {
        item.tasks = by_item.remove(&item.id).unwrap_or_default();
    }
    Ok(())
}

async fn fetch_items<C>(client: &C, ids: &[Uuid]) -> Result<Vec<Item>, DatabaseError>
where
    C: GenericClient + Sync,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = client
        .query(
            r#"
            SELECT id, user_id, name, description, created_at
            FROM items
            WHERE id = ANY($1)
            ORDER BY created_at DESC
            "#,
            &[&ids],
        )
        .await?;
    let mut items: Vec<Item> = rows.iter().map(item_from_row).collect();
    attach_tasks(client, &mut items).await?;
    Ok(items)
}

/// Fill in the links of each CSU, with linked items and tasks resolved.
async fn attach_links<C>(client: &C, csus: &mut [Csu]) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    if csus.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = csus.iter().map(|c| c.id).collect();

    let item_rows = client
        .query(
            r#"
            SELECT id, csu_id, item_id, complexity, calculated_hours
            FROM csu_items
            WHERE csu_id = ANY($1)
            ORDER BY created_at
            "#,
            &[&ids],
        )
        .await?;
    let task_rows = client
        .query(
            r#"
            SELECT id, csu_id, task_id, complexity, calculated_hours
            FROM csu_tasks
            WHERE csu_id = ANY($1)
            ORDER BY created_at
            "#,
            &[&ids],
        )
        .await?;

    let item_ids: Vec<Uuid> = item_rows.iter().map(|r| r.get("item_id")).collect();
    let items: HashMap<Uuid, Item> = fetch_items(client, &item_ids)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
    let task_ids: Vec<Uuid> = task_rows.iter().map(|r| r.get("task_id")).collect();
    let tasks: HashMap<Uuid, Task> = fetch_tasks(client, &task_ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let mut item_links: HashMap<Uuid, Vec<CsuItemLink>> = HashMap::new();
    for row in &item_rows {
        item_links
            .entry(row.get("csu_id"))
            .or_default()
            .push(item_link_from_row(row, &items));
    }
    let mut task_links: HashMap<Uuid, Vec<CsuTaskLink>> = HashMap::new();
    for row in &task_rows {
        task_links
            .entry(row.get("csu_id"))
            .or_default()
            .push(task_link_from_row(row, &tasks));
    }

    for csu in csus.iter_mut() {
        csu.item_links = item_links.remove(&csu.id).unwrap_or_default();
        csu.task_links = task_links.remove(&csu.id).unwrap_or_default();
    }
    Ok(())
}

/// Load the resolved CSUs of the given budgets, grouped by budget.
async fn fetch_budget_csus<C>(
    client: &C,
    budget_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Csu>>, DatabaseError>
where
    C: GenericClient + Sync,
{
    let mut grouped: HashMap<Uuid, Vec<Csu>> = HashMap::new();
    if budget_ids.is_empty() {
        return Ok(grouped);
    }
    let rows = client
        .query(
            r#"
            SELECT id, budget_id, name, description, created_at
            FROM csus
            WHERE budget_id = ANY($1)
            ORDER BY created_at DESC
            "#,
            &[&budget_ids],
        )
        .await?;
    let mut csus: Vec<Csu> = rows.iter().map(csu_from_row).collect();
    attach_links(client, &mut csus).await?;

    for csu in csus {
        grouped.entry(csu.budget_id).or_default().push(csu);
    }
    Ok(grouped)
}

async fn fetch_csu<C>(client: &C, id: Uuid) -> Result<Option<Csu>, DatabaseError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_opt(
            "SELECT id, budget_id, name, description, created_at FROM csus WHERE id = $1",
            &[&id],
        )
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut csus = vec![csu_from_row(&row)];
    attach_links(client, &mut csus).await?;
    Ok(csus.pop())
}

// ==================== Link writes ====================

async fn insert_item_tasks<C>(client: &C, item_id: Uuid, task_ids: &[Uuid]) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    for task_id in task_ids {
        client
            .execute(
                "INSERT INTO item_tasks (item_id, task_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                &[&item_id, task_id],
            )
            .await?;
    }
    Ok(())
}

async fn insert_item_links<C>(client: &C, csu_id: Uuid, links: &[NewItemLink]) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    for link in links {
        client
            .execute(
                "INSERT INTO csu_items (id, csu_id, item_id, complexity, calculated_hours) VALUES ($1, $2, $3, $4, $5)",
                &[&Uuid::new_v4(), &csu_id, &link.item_id, &link.complexity, &link.calculated_hours],
            )
            .await?;
    }
    Ok(())
}

async fn insert_task_links<C>(client: &C, csu_id: Uuid, links: &[NewTaskLink]) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    for link in links {
        client
            .execute(
                "INSERT INTO csu_tasks (id, csu_id, task_id, complexity, calculated_hours) VALUES ($1, $2, $3, $4, $5)",
                &[&Uuid::new_v4(), &csu_id, &link.task_id, &link.complexity, &link.calculated_hours],
            )
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Database for PgStore {
    // ==================== Tasks ====================

    async fn create_task(&self, user_id: &str, draft: &TaskDraft) -> Result<Task, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                r#"
                INSERT INTO tasks (
                    id, user_id, description, complexity_low, complexity_medium,
                    complexity_high, complexity_very_high
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, user_id, description, complexity_low, complexity_medium,
                          complexity_high, complexity_very_high, created_at
                "#,
                &[
                    &Uuid::new_v4(),
                    &user_id,
                    &draft.description,
                    &draft.complexity_low,
                    &draft.complexity_medium,
                    &draft.complexity_high,
                    &draft.complexity_very_high,
                ],
            )
            .await?;
        Ok(task_from_row(&row))
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                r#"
                SELECT id, user_id, description, complexity_low, complexity_medium,
                       complexity_high, complexity_very_high, created_at
                FROM tasks
                WHERE user_id = $1
                ORDER BY created_at DESC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(task_from_row).collect())
    }

    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn().await?;
        fetch_tasks(&conn, ids).await
    }

    async fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                r#"
                UPDATE tasks SET
                    description = $2, complexity_low = $3, complexity_medium = $4,
                    complexity_high = $5, complexity_very_high = $6
                WHERE id = $1
                RETURNING id, user_id, description, complexity_low, complexity_medium,
                          complexity_high, complexity_very_high, created_at
                "#,
                &[
                    &id,
                    &draft.description,
                    &draft.complexity_low,
                    &draft.complexity_medium,
                    &draft.complexity_high,
                    &draft.complexity_very_high,
                ],
            )
            .await?;
        row.map(|r| task_from_row(&r))
            .ok_or(DatabaseError::NotFound { entity: "task", id })
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn.execute("DELETE FROM tasks WHERE id = $1", &[&id]).await?;
        Ok(count > 0)
    }

    // ==================== Items ====================

    async fn create_item(&self, user_id: &str, draft: &ItemDraft) -> Result<Item, DatabaseError> {
        let mut conn = self.conn().await?;
        let id = Uuid::new_v4();

        let tx = conn.transaction().await?;
        tx.execute(
            "INSERT INTO items (id, user_id, name, description) VALUES ($1, $2, $3, $4)",
            &[&id, &user_id, &draft.name, &draft.description],
        )
        .await?;
        insert_item_tasks(&tx, id, &draft.task_ids).await?;
        tx.commit().await?;

        fetch_items(&conn, &[id])
            .await?
            .pop()
            .ok_or(DatabaseError::NotFound { entity: "item", id })
    }

    async fn list_items(&self, user_id: &str) -> Result<Vec<Item>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                r#"
                SELECT id, user_id, name, description, created_at
                FROM items
                WHERE user_id = $1
                ORDER BY created_at DESC
                "#,
                &[&user_id],
            )
            .await?;
        let mut items: Vec<Item> = rows.iter().map(item_from_row).collect();
        attach_tasks(&conn, &mut items).await?;
        Ok(items)
    }

    async fn get_items(&self, ids: &[Uuid]) -> Result<Vec<Item>, DatabaseError> {
        let conn = self.conn().await?;
        fetch_items(&conn, ids).await
    }

    async fn update_item(&self, id: Uuid, draft: &ItemDraft) -> Result<Item, DatabaseError> {
        let mut conn = self.conn().await?;

        let tx = conn.transaction().await?;
        let updated = tx
            .execute(
                "UPDATE items SET name = $2, description = $3 WHERE id = $1",
                &[&id, &draft.name, &draft.description],
            )
            .await?;
        if updated == 0 {
            return Err(DatabaseError::NotFound { entity: "item", id });
        }
        tx.execute("DELETE FROM item_tasks WHERE item_id = $1", &[&id])
            .await?;
        insert_item_tasks(&tx, id, &draft.task_ids).await?;
        tx.commit().await?;
        tracing::debug!(item_id = %id, tasks = draft.task_ids.len(), "Replaced item task set");

        fetch_items(&conn, &[id])
            .await?
            .pop()
            .ok_or(DatabaseError::NotFound { entity: "item", id })
    }

    async fn delete_item(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn.execute("DELETE FROM items WHERE id = $1", &[&id]).await?;
        Ok(count > 0)
    }

    // ==================== Budgets ====================

    async fn create_budget(
        &self,
        user_id: &str,
        draft: &BudgetDraft,
    ) -> Result<Budget, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                r#"
                INSERT INTO budgets (id, user_id, name) VALUES ($1, $2, $3)
                RETURNING id, user_id, name, created_at
                "#,
                &[&Uuid::new_v4(), &user_id, &draft.name],
            )
            .await?;
        Ok(budget_from_row(&row))
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                r#"
                SELECT id, user_id, name, created_at
                FROM budgets
                WHERE user_id = $1
                ORDER BY created_at DESC
                "#,
                &[&user_id],
            )
            .await?;
        let mut budgets: Vec<Budget> = rows.iter().map(budget_from_row).collect();

        let ids: Vec<Uuid> = budgets.iter().map(|b| b.id).collect();
        let mut csus = fetch_budget_csus(&conn, &ids).await?;
        for budget in &mut budgets {
            budget.csus = csus.remove(&budget.id).unwrap_or_default();
        }
        Ok(budgets)
    }

    async fn update_budget(&self, id: Uuid, draft: &BudgetDraft) -> Result<Budget, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE budgets SET name = $2 WHERE id = $1 RETURNING id, user_id, name, created_at",
                &[&id, &draft.name],
            )
            .await?;
        let mut budget = row
            .map(|r| budget_from_row(&r))
            .ok_or(DatabaseError::NotFound { entity: "budget", id })?;
        budget.csus = fetch_budget_csus(&conn, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(budget)
    }

    async fn delete_budget(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn
            .execute("DELETE FROM budgets WHERE id = $1", &[&id])
            .await?;
        Ok(count > 0)
    }

    // ==================== CSUs ====================

    async fn create_csu(&self, new: &NewCsu) -> Result<Csu, DatabaseError> {
        let mut conn = self.conn().await?;
        let id = Uuid::new_v4();

        let tx = conn.transaction().await?;
        tx.execute(
            "INSERT INTO csus (id, budget_id, name, description) VALUES ($1, $2, $3, $4)",
            &[&id, &new.budget_id, &new.name, &new.description],
        )
        .await?;
        insert_item_links(&tx, id, &new.items).await?;
        insert_task_links(&tx, id, &new.tasks).await?;
        tx.commit().await?;

        fetch_csu(&conn, id)
            .await?
            .ok_or(DatabaseError::NotFound { entity: "csu", id })
    }

    async fn get_csu(&self, id: Uuid) -> Result<Option<Csu>, DatabaseError> {
        let conn = self.conn().await?;
        fetch_csu(&conn, id).await
    }

    async fn update_csu(&self, id: Uuid, patch: &CsuPatch) -> Result<Csu, DatabaseError> {
        let mut conn = self.conn().await?;

        let tx = conn.transaction().await?;
        let updated = tx
            .execute(
                "UPDATE csus SET name = $2, description = $3 WHERE id = $1",
                &[&id, &patch.name, &patch.description],
            )
            .await?;
        if updated == 0 {
            return Err(DatabaseError::NotFound { entity: "csu", id });
        }
        if let Some(items) = &patch.items {
            tx.execute("DELETE FROM csu_items WHERE csu_id = $1", &[&id])
                .await?;
            insert_item_links(&tx, id, items).await?;
        }
        if let Some(tasks) = &patch.tasks {
            tx.execute("DELETE FROM csu_tasks WHERE csu_id = $1", &[&id])
                .await?;
            insert_task_links(&tx, id, tasks).await?;
        }
        tx.commit().await?;

        fetch_csu(&conn, id)
            .await?
            .ok_or(DatabaseError::NotFound { entity: "csu", id })
    }

    async fn delete_csu(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn.execute("DELETE FROM csus WHERE id = $1", &[&id]).await?;
        Ok(count > 0)
    }

    async fn insert_item_link(
        &self,
        csu_id: Uuid,
        link: &NewItemLink,
    ) -> Result<CsuItemLink, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                r#"
                INSERT INTO csu_items (id, csu_id, item_id, complexity, calculated_hours)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, csu_id, item_id, complexity, calculated_hours
                "#,
                &[&Uuid::new_v4(), &csu_id, &link.item_id, &link.complexity, &link.calculated_hours],
            )
            .await?;
        let items: HashMap<Uuid, Item> = fetch_items(&conn, &[link.item_id])
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        Ok(item_link_from_row(&row, &items))
    }

    async fn insert_task_link(
        &self,
        csu_id: Uuid,
        link: &NewTaskLink,
    ) -> Result<CsuTaskLink, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                r#"
                INSERT INTO csu_tasks (id, csu_id, task_id, complexity, calculated_hours)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, csu_id, task_id, complexity, calculated_hours
                "#,
                &[&Uuid::new_v4(), &csu_id, &link.task_id, &link.complexity, &link.calculated_hours],
            )
            .await?;
        let tasks: HashMap<Uuid, Task> = fetch_tasks(&conn, &[link.task_id])
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        Ok(task_link_from_row(&row, &tasks))
    }

    async fn delete_item_link(&self, link_id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn
            .execute("DELETE FROM csu_items WHERE id = $1", &[&link_id])
            .await?;
        Ok(count > 0)
    }

    async fn delete_task_link(&self, link_id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn
            .execute("DELETE FROM csu_tasks WHERE id = $1", &[&link_id])
            .await?;
        Ok(count > 0)
    }
}
