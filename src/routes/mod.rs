//! HTTP routes for emis-plan

pub mod health;
pub mod request;
pub mod response;
pub mod router;

pub use health::{health_check, package_info};
pub use request::ApiRequest;
pub use response::{error_response, json_response, method_not_allowed, not_found_response, preflight_response};
pub use router::{activity_router, plan_router, EntityRouter, ACTIVITY_ROUTER, PLAN_ROUTER};
