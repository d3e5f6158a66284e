//! Shared types for emis-plan

mod error;

pub use error::{PlanError, Result, ValidationErrors};
