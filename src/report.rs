//! Budget reports and dashboard statistics.

use std::fmt;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ReportError, Result};
use crate::estimation::{BudgetStats, Estimator, format_hours, persisted_hours};
use crate::models::{Budget, Csu};

/// Number of budgets listed as recent on the dashboard.
pub const RECENT_BUDGETS: usize = 3;

/// A budget annotated with its total and per-CSU hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub id: Uuid,
    pub name: String,
    pub total_hours: Decimal,
    pub csus: Vec<CsuReport>,
}

/// A CSU annotated with its hours and where they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsuReport {
    pub id: Uuid,
    pub name: String,
    pub hours: Decimal,
    /// Hours were recomputed from nested records instead of read from links.
    pub recomputed: bool,
    pub links: Vec<LinkReport>,
}

/// One link of a CSU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkReport {
    pub kind: LinkKind,
    /// Item name or task description; `None` when the target is gone.
    pub label: Option<String>,
    pub complexity: String,
    pub hours: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Item,
    Task,
}

/// Totals shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub budgets: BudgetStats,
    pub total_items: usize,
    pub total_tasks: usize,
    pub recent_budgets: Vec<BudgetReport>,
}

impl Estimator {
    /// Report for one budget.
    pub fn budget_report(&self, budget: &Budget) -> Result<BudgetReport> {
        let csus = budget
            .csus
            .iter()
            .map(|csu| self.csu_report(csu))
            .collect::<Result<Vec<_>>>()?;
        Ok(BudgetReport {
            id: budget.id,
            name: budget.name.clone(),
            total_hours: csus
                .iter()
                .fold(Decimal::ZERO, |total, c| total.saturating_add(c.hours)),
            csus,
        })
    }

    /// Report for one CSU. Link hours follow the same source as the total.
    pub fn csu_report(&self, csu: &Csu) -> Result<CsuReport> {
        let recomputed = persisted_hours(csu).is_zero();
        let mut links = Vec::with_capacity(csu.item_links.len() + csu.task_links.len());

        for link in &csu.item_links {
            let hours = if recomputed {
                self.item_hours(link.item.as_ref(), &link.complexity)?
            } else {
                link.calculated_hours.unwrap_or_default()
            };
            links.push(LinkReport {
                kind: LinkKind::Item,
                label: link.item.as_ref().map(|i| i.name.clone()),
                complexity: link.complexity.clone(),
                hours,
            });
        }
        for link in &csu.task_links {
            let hours = if recomputed {
                self.task_hours(link.task.as_ref(), &link.complexity)?
            } else {
                link.calculated_hours.unwrap_or_default()
            };
            links.push(LinkReport {
                kind: LinkKind::Task,
                label: link.task.as_ref().map(|t| t.description.clone()),
                complexity: link.complexity.clone(),
                hours,
            });
        }

        Ok(CsuReport {
            id: csu.id,
            name: csu.name.clone(),
            hours: self.csu_hours(csu)?,
            recomputed,
            links,
        })
    }

    /// Dashboard statistics. The most recently created budgets are listed
    /// first.
    pub fn dashboard_stats(
        &self,
        budgets: &[Budget],
        total_items: usize,
        total_tasks: usize,
    ) -> Result<DashboardStats> {
        let mut recent: Vec<&Budget> = budgets.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(DashboardStats {
            budgets: self.budget_stats(budgets)?,
            total_items,
            total_tasks,
            recent_budgets: recent
                .into_iter()
                .take(RECENT_BUDGETS)
                .map(|b| self.budget_report(b))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

/// Case-insensitive substring match; an empty term matches everything.
pub fn matches_search(name: &str, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || name.to_lowercase().contains(&term.to_lowercase())
}

/// Budgets whose name matches the search term.
pub fn filter_budgets<'a>(budgets: &'a [Budget], term: &str) -> Vec<&'a Budget> {
    budgets.iter().filter(|b| matches_search(&b.name, term)).collect()
}

/// Load a JSON array of budgets in the store's read shape.
pub fn load_budgets(path: impl AsRef<Path>) -> std::result::Result<Vec<Budget>, ReportError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let budgets: Vec<Budget> = serde_json::from_str(&raw)?;
    tracing::debug!(
        "Loaded {} budgets from {}",
        budgets.len(),
        path.as_ref().display()
    );
    Ok(budgets)
}

impl fmt::Display for BudgetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  {}", self.name, format_hours(self.total_hours))?;
        for csu in &self.csus {
            write!(f, "{}", csu)?;
        }
        Ok(())
    }
}

impl fmt::Display for CsuReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.recomputed && !self.links.is_empty() {
            " (recomputed)"
        } else {
            ""
        };
        writeln!(f, "  {}  {}{}", self.name, format_hours(self.hours), marker)?;
        for link in &self.links {
            let kind = match link.kind {
                LinkKind::Item => "item",
                LinkKind::Task => "task",
            };
            writeln!(
                f,
                "    {} {} [{}]  {}",
                kind,
                link.label.as_deref().unwrap_or("<missing>"),
                link.complexity,
                format_hours(link.hours)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for DashboardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Budgets:         {}", self.budgets.total_budgets)?;
        writeln!(f, "Active budgets:  {}", self.budgets.active_budgets)?;
        writeln!(f, "CSUs:            {}", self.budgets.total_csus)?;
        writeln!(f, "Items:           {}", self.total_items)?;
        writeln!(f, "Tasks:           {}", self.total_tasks)?;
        writeln!(f, "Total hours:     {}", format_hours(self.budgets.total_hours))?;
        if !self.recent_budgets.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recent budgets:")?;
            for budget in &self.recent_budgets {
                writeln!(f, "  {}  {}", budget.name, format_hours(budget.total_hours))?;
            }
        }
        Ok(())
    }
}
