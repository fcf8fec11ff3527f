//! Complexity levels and per-task resolution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Estimator;
use crate::error::{EstimationError, Result};
use crate::models::Task;

/// Which of a task's estimates applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub const ALL: [Complexity; 4] = [
        Complexity::Low,
        Complexity::Medium,
        Complexity::High,
        Complexity::VeryHigh,
    ];

    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Complexity {
    type Err = EstimationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            "very_high" | "very-high" | "veryhigh" => Ok(Complexity::VeryHigh),
            _ => Err(EstimationError::InvalidComplexity {
                value: s.to_string(),
            }),
        }
    }
}

impl Estimator {
    /// Hours for a task at a stored complexity name.
    ///
    /// An absent task, or a task without an estimate at that level, is zero.
    pub fn task_hours(&self, task: Option<&Task>, complexity: &str) -> Result<Decimal> {
        let Some(task) = task else {
            return Ok(Decimal::ZERO);
        };
        match self.resolve_complexity(complexity)? {
            Some(level) => self.hours_at(task, level),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Hours for a task at a known complexity level.
    pub fn hours_at(&self, task: &Task, level: Complexity) -> Result<Decimal> {
        self.decode(task.duration(level))
    }
}
