//! Hours estimation for tasks, items, CSUs and budgets.
//!
//! Estimates flow bottom-up:
//! - [`time`] decodes a task's clock-like estimate into decimal hours
//! - [`Estimator::task_hours`] picks the estimate for a complexity level
//! - [`Estimator::item_hours`] sums the tasks of an item
//! - [`Estimator::csu_hours`] prefers persisted link hours, recomputing
//!   from nested records only when they sum to zero
//! - [`Estimator::budget_hours`] sums the CSUs of a budget
//!
//! Every computation is a pure function of already-loaded records.

mod budget;
mod complexity;
mod csu;
mod item;
pub mod time;

pub use budget::{BudgetStats, active_count};
pub use complexity::Complexity;
pub use csu::persisted_hours;
pub use time::{decode_time, encode_time, format_hours, is_valid_time, normalize_time_input};

use rust_decimal::Decimal;

use crate::error::{EstimationError, Result};

/// How the estimator treats unknown complexities and malformed durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Bad input contributes zero hours and is logged.
    #[default]
    Lenient,
    /// Bad input is returned to the caller as an [`EstimationError`].
    Strict,
}

impl ErrorPolicy {
    pub fn is_strict(&self) -> bool {
        matches!(self, ErrorPolicy::Strict)
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" | "permissive" | "zero" => Ok(ErrorPolicy::Lenient),
            "strict" | "error" => Ok(ErrorPolicy::Strict),
            _ => Err(format!(
                "invalid error policy '{}', expected 'lenient' or 'strict'",
                s
            )),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Hours estimator.
///
/// Holds no state besides its [`ErrorPolicy`]; every method is a pure
/// function of its arguments and may be called from any thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Estimator {
    policy: ErrorPolicy,
}

impl Estimator {
    /// Create an estimator with the given policy.
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy }
    }

    /// Estimator that degrades bad input to zero.
    pub fn lenient() -> Self {
        Self::new(ErrorPolicy::Lenient)
    }

    /// Estimator that surfaces bad input as errors.
    pub fn strict() -> Self {
        Self::new(ErrorPolicy::Strict)
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Decode a duration under this estimator's policy.
    pub fn decode(&self, text: Option<&str>) -> Result<Decimal> {
        match decode_time(text) {
            Ok(hours) => Ok(hours),
            Err(e) => self.degrade(e).map(|_| Decimal::ZERO),
        }
    }

    /// Resolve a stored complexity name.
    ///
    /// Under the lenient policy an unknown name resolves to `None`, which
    /// every aggregator treats as zero hours.
    pub fn resolve_complexity(&self, raw: &str) -> Result<Option<Complexity>> {
        match raw.parse::<Complexity>() {
            Ok(c) => Ok(Some(c)),
            Err(e) => self.degrade(e).map(|_| None),
        }
    }

    fn degrade(&self, error: EstimationError) -> Result<()> {
        match self.policy {
            ErrorPolicy::Strict => Err(error),
            ErrorPolicy::Lenient => {
                tracing::warn!("Counting as zero hours: {}", error);
                Ok(())
            }
        }
    }
}
