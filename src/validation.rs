//! Draft validation before anything reaches the store.

use std::collections::HashSet;

use uuid::Uuid;

use crate::estimation::{Complexity, ErrorPolicy, is_valid_time};
use crate::models::{BudgetDraft, CsuDraft, CsuUpdate, ItemDraft, ItemSelection, TaskDraft, TaskSelection};

/// Outcome of checking a draft. Errors block the write; warnings are only
/// logged by the planner.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A draft with nothing to report.
    pub fn ok() -> Self {
        Self::default()
    }

    /// A draft rejected for one reason.
    pub fn error(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
            warnings: vec![],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Combine the checks of two fields of the same draft.
    pub fn merge(mut self, other: Self) -> Self {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self
    }

    /// Errors of a rejected draft, for [`PlannerError::Validation`](crate::error::PlannerError::Validation).
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// A rejected draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Draft field name, e.g. `complexity_low` or `task_ids`.
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationErrorCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

/// Why a draft field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    Empty,
    InvalidFormat,
    MissingEstimate,
    MissingReference,
    Duplicate,
    UnknownComplexity,
}

/// Draft validator.
///
/// Unknown link complexities are errors under [`ErrorPolicy::Strict`] and
/// warnings otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: ErrorPolicy,
}

impl Validator {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy }
    }

    /// A task needs a description and at least one well-formed estimate.
    pub fn validate_task(&self, draft: &TaskDraft) -> ValidationResult {
        let mut result = required("description", &draft.description);

        let mut has_estimate = false;
        for (complexity, value) in draft.estimates() {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            has_estimate = true;
            if !is_valid_time(value) {
                result = result.merge(ValidationResult::error(ValidationError::new(
                    format!("complexity_{}", complexity.as_str()),
                    format!("'{}' is not a valid duration, use H, HH or HH:MM", value),
                    ValidationErrorCode::InvalidFormat,
                )));
            }
        }

        if !has_estimate {
            result = result.merge(ValidationResult::error(ValidationError::new(
                "estimates",
                "At least one complexity estimate is required",
                ValidationErrorCode::MissingEstimate,
            )));
        }
        result
    }

    /// An item needs a name and at least one distinct task.
    pub fn validate_item(&self, draft: &ItemDraft) -> ValidationResult {
        let mut result = required("name", &draft.name);

        if draft.task_ids.is_empty() {
            result = result.merge(ValidationResult::error(ValidationError::new(
                "task_ids",
                "Select at least one task",
                ValidationErrorCode::MissingReference,
            )));
        }
        result.merge(unique("task_ids", draft.task_ids.iter().copied()))
    }

    pub fn validate_budget(&self, draft: &BudgetDraft) -> ValidationResult {
        required("name", &draft.name)
    }

    /// A CSU needs a name, a parent budget and valid link selections.
    pub fn validate_csu(&self, draft: &CsuDraft) -> ValidationResult {
        let mut result = required("name", &draft.name);

        if draft.budget_id.is_nil() {
            result = result.merge(ValidationResult::error(ValidationError::new(
                "budget_id",
                "Budget is required",
                ValidationErrorCode::MissingReference,
            )));
        }
        result
            .merge(self.validate_item_selections(&draft.items))
            .merge(self.validate_task_selections(&draft.tasks))
    }

    pub fn validate_csu_update(&self, update: &CsuUpdate) -> ValidationResult {
        let mut result = required("name", &update.name);
        if let Some(items) = &update.items {
            result = result.merge(self.validate_item_selections(items));
        }
        if let Some(tasks) = &update.tasks {
            result = result.merge(self.validate_task_selections(tasks));
        }
        result
    }

    pub fn validate_item_selections(&self, selections: &[ItemSelection]) -> ValidationResult {
        selections
            .iter()
            .fold(unique("items", selections.iter().map(|s| s.item_id)), |acc, s| {
                acc.merge(self.validate_complexity("items", &s.complexity))
            })
    }

    pub fn validate_task_selections(&self, selections: &[TaskSelection]) -> ValidationResult {
        selections
            .iter()
            .fold(unique("tasks", selections.iter().map(|s| s.task_id)), |acc, s| {
                acc.merge(self.validate_complexity("tasks", &s.complexity))
            })
    }

    pub fn validate_complexity(&self, field: &str, raw: &str) -> ValidationResult {
        match raw.parse::<Complexity>() {
            Ok(_) => ValidationResult::ok(),
            Err(e) if self.policy.is_strict() => ValidationResult::error(ValidationError::new(
                field,
                e.to_string(),
                ValidationErrorCode::UnknownComplexity,
            )),
            Err(e) => ValidationResult::ok().with_warning(format!("{}: {}", field, e)),
        }
    }
}

fn required(field: &str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        ValidationResult::error(ValidationError::new(
            field,
            format!("{} is required", field),
            ValidationErrorCode::Empty,
        ))
    } else {
        ValidationResult::ok()
    }
}

fn unique(field: &str, ids: impl Iterator<Item = Uuid>) -> ValidationResult {
    let mut seen = HashSet::new();
    let duplicates: Vec<Uuid> = ids.filter(|id| !seen.insert(*id)).collect();
    if duplicates.is_empty() {
        return ValidationResult::ok();
    }
    ValidationResult::error(ValidationError::new(
        field,
        format!("Duplicate references: {:?}", duplicates),
        ValidationErrorCode::Duplicate,
    ))
}
