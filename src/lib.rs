//! emis-plan - emergency response plans for an EMIS deployment
//!
//! Plans describe how to respond to a class of incidents within a boundary.
//! A plan is carried out through activities, and each activity through
//! procedures. All three are served as a versioned REST API backed by
//! MongoDB.
//!
//! ## Structure
//!
//! - **Schemas**: declarative field manifests driving validation, search,
//!   indexes and population
//! - **References**: existence checks and one-hop population against the
//!   stores owning incident types, boundaries and parties
//! - **Hooks**: pre-validation steps run before every write
//! - **Routes**: CRUD endpoints per entity, grouped into routers mounted on
//!   the shared application

pub mod actions;
pub mod config;
pub mod db;
pub mod hooks;
pub mod package;
pub mod references;
pub mod routes;
pub mod schema;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use db::schemas::{ActivityDoc, Phase, PlanDoc, ProcedureDoc};
pub use db::Entity;
pub use package::PackageInfo;
pub use routes::{activity_router, plan_router, EntityRouter};
pub use server::{app, initialize, run, App};
pub use types::{PlanError, Result};
