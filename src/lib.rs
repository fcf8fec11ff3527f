//! taskbudget: hours estimation for task, item and use-case budgets.
//!
//! Tasks carry clock-like estimates per complexity level. Items bundle
//! tasks, CSUs link items and tasks at a chosen complexity, and budgets
//! group CSUs. The [`estimation`] module turns all of that into decimal
//! hours; the [`planner`] validates and prices writes against a
//! [`db::Database`].

pub mod config;
pub mod db;
pub mod error;
pub mod estimation;
pub mod models;
pub mod planner;
pub mod report;
pub mod validation;

pub use config::Config;
pub use error::{DatabaseError, EstimationError, PlannerError};
pub use estimation::{Complexity, ErrorPolicy, Estimator};
pub use planner::Planner;
