//! Records exchanged with the data store.
//!
//! Read records (`Task`, `Item`, `Csu`, `Budget`) carry their nested data once
//! resolved by the store. Write drafts never carry precomputed hours: the
//! planner computes `calculated_hours` itself before handing `New*` link
//! records to the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::estimation::Complexity;

/// A unit of work with one optional estimate per complexity level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: String,
    pub description: String,
    #[serde(default)]
    pub complexity_low: Option<String>,
    #[serde(default)]
    pub complexity_medium: Option<String>,
    #[serde(default)]
    pub complexity_high: Option<String>,
    #[serde(default)]
    pub complexity_very_high: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with no estimates.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: String::new(),
            description: description.into(),
            complexity_low: None,
            complexity_medium: None,
            complexity_high: None,
            complexity_very_high: None,
            created_at: Utc::now(),
        }
    }

    /// Set the estimate for one complexity level.
    pub fn with_estimate(mut self, complexity: Complexity, duration: impl Into<String>) -> Self {
        let slot = match complexity {
            Complexity::Low => &mut self.complexity_low,
            Complexity::Medium => &mut self.complexity_medium,
            Complexity::High => &mut self.complexity_high,
            Complexity::VeryHigh => &mut self.complexity_very_high,
        };
        *slot = Some(duration.into());
        self
    }

    /// The stored duration text for a complexity level.
    pub fn duration(&self, complexity: Complexity) -> Option<&str> {
        match complexity {
            Complexity::Low => self.complexity_low.as_deref(),
            Complexity::Medium => self.complexity_medium.as_deref(),
            Complexity::High => self.complexity_high.as_deref(),
            Complexity::VeryHigh => self.complexity_very_high.as_deref(),
        }
    }

    /// Complexity levels with a non-empty estimate.
    pub fn available_complexities(&self) -> Vec<Complexity> {
        Complexity::ALL
            .into_iter()
            .filter(|c| self.duration(*c).is_some_and(|d| !d.trim().is_empty()))
            .collect()
    }
}

/// A reusable bundle of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Also read from the joined `item_tasks: [{ "tasks": {..} }]` form.
    #[serde(default, alias = "item_tasks", deserialize_with = "item_tasks")]
    pub tasks: Vec<Task>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn item_tasks<'de, D>(deserializer: D) -> std::result::Result<Vec<Task>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Plain(Task),
        Joined {
            #[serde(alias = "task")]
            tasks: Task,
        },
    }

    let entries = Option::<Vec<Entry>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            Entry::Plain(task) => task,
            Entry::Joined { tasks } => tasks,
        })
        .collect())
}

impl Item {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: String::new(),
            name: name.into(),
            description: String::new(),
            tasks,
            created_at: Utc::now(),
        }
    }

    pub fn task_ids(&self) -> Vec<Uuid> {
        self.tasks.iter().map(|t| t.id).collect()
    }
}

/// An item attached to a CSU at a chosen complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsuItemLink {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Raw complexity name as stored; resolved by the estimator.
    pub complexity: String,
    #[serde(default)]
    pub calculated_hours: Option<Decimal>,
    /// The linked item, when the store resolved it.
    #[serde(default, alias = "items")]
    pub item: Option<Item>,
}

/// A standalone task attached to a CSU at a chosen complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsuTaskLink {
    pub id: Uuid,
    pub task_id: Uuid,
    pub complexity: String,
    #[serde(default)]
    pub calculated_hours: Option<Decimal>,
    #[serde(default, alias = "tasks")]
    pub task: Option<Task>,
}

/// A use case owned by a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Csu {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "items", alias = "csu_items")]
    pub item_links: Vec<CsuItemLink>,
    #[serde(default, rename = "tasks", alias = "csu_tasks")]
    pub task_links: Vec<CsuTaskLink>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Csu {
    pub fn new(budget_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            budget_id,
            name: name.into(),
            description: String::new(),
            item_links: Vec::new(),
            task_links: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_links(&self) -> bool {
        !self.item_links.is_empty() || !self.task_links.is_empty()
    }
}

/// Top-level container of CSUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub csus: Vec<Csu>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: String::new(),
            name: name.into(),
            csus: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A budget is active once it owns at least one CSU.
    pub fn is_active(&self) -> bool {
        !self.csus.is_empty()
    }
}

// ==================== Drafts ====================

/// Fields submitted when creating or editing a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub description: String,
    #[serde(default)]
    pub complexity_low: Option<String>,
    #[serde(default)]
    pub complexity_medium: Option<String>,
    #[serde(default)]
    pub complexity_high: Option<String>,
    #[serde(default)]
    pub complexity_very_high: Option<String>,
}

impl TaskDraft {
    /// Each estimate field paired with its complexity level.
    pub fn estimates(&self) -> [(Complexity, Option<&str>); 4] {
        [
            (Complexity::Low, self.complexity_low.as_deref()),
            (Complexity::Medium, self.complexity_medium.as_deref()),
            (Complexity::High, self.complexity_high.as_deref()),
            (Complexity::VeryHigh, self.complexity_very_high.as_deref()),
        ]
    }

    /// Copy with blank estimates dropped and text trimmed.
    pub fn normalized(&self) -> Self {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            description: self.description.trim().to_string(),
            complexity_low: clean(&self.complexity_low),
            complexity_medium: clean(&self.complexity_medium),
            complexity_high: clean(&self.complexity_high),
            complexity_very_high: clean(&self.complexity_very_high),
        }
    }
}

/// Fields submitted when creating or editing an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
}

/// Fields submitted when creating or renaming a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetDraft {
    pub name: String,
}

/// An item chosen for a CSU together with its complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSelection {
    pub item_id: Uuid,
    pub complexity: String,
}

/// A task chosen for a CSU together with its complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSelection {
    pub task_id: Uuid,
    pub complexity: String,
}

/// Fields submitted when creating a CSU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsuDraft {
    pub budget_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<ItemSelection>,
    #[serde(default)]
    pub tasks: Vec<TaskSelection>,
}

/// Fields submitted when editing a CSU.
///
/// `None` keeps the current link set; `Some` replaces it wholesale, so
/// `Some(vec![])` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsuUpdate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Option<Vec<ItemSelection>>,
    #[serde(default)]
    pub tasks: Option<Vec<TaskSelection>>,
}

// ==================== Priced links ====================

/// An item link with its hours computed at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItemLink {
    pub item_id: Uuid,
    pub complexity: String,
    pub calculated_hours: Decimal,
}

/// A task link with its hours computed at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskLink {
    pub task_id: Uuid,
    pub complexity: String,
    pub calculated_hours: Decimal,
}

/// A CSU ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCsu {
    pub budget_id: Uuid,
    pub name: String,
    pub description: String,
    pub items: Vec<NewItemLink>,
    pub tasks: Vec<NewTaskLink>,
}

/// Changes to apply to a stored CSU. Link sets follow [`CsuUpdate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CsuPatch {
    pub name: String,
    pub description: String,
    pub items: Option<Vec<NewItemLink>>,
    pub tasks: Option<Vec<NewTaskLink>>,
}
