//! Configuration for emis-plan
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// emis-plan - emergency response plans over a versioned REST API
#[derive(Parser, Debug, Clone)]
#[command(name = "emis-plan")]
#[command(about = "Emergency response plans, activities and procedures")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "emis")]
    pub mongodb_db: String,

    /// Enable development mode (falls back to an in-memory store when MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// API version prefix for all resource routes
    #[arg(long, env = "API_VERSION", default_value = "v1")]
    pub api_version: String,

    /// Page size used when a list request gives no limit
    #[arg(long, env = "DEFAULT_PAGE_LIMIT", default_value = "10")]
    pub default_page_limit: u32,

    /// Upper bound on the page size of a list request
    #[arg(long, env = "MAX_PAGE_LIMIT", default_value = "100")]
    pub max_page_limit: u32,

    /// Timeout for calls to external collaborator services in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Entity model and collection names
    #[command(flatten)]
    pub models: ModelArgs,

    /// Collaborator stores
    #[command(flatten)]
    pub collaborators: CollaboratorArgs,
}

/// Model and collection name overrides
#[derive(Parser, Debug, Clone)]
pub struct ModelArgs {
    #[arg(long, env = "PLAN_MODEL_NAME", default_value = "Plan")]
    pub plan_model_name: String,

    #[arg(long, env = "PLAN_COLLECTION_NAME", default_value = "plans")]
    pub plan_collection_name: String,

    #[arg(long, env = "ACTIVITY_MODEL_NAME", default_value = "Activity")]
    pub activity_model_name: String,

    #[arg(long, env = "ACTIVITY_COLLECTION_NAME", default_value = "activities")]
    pub activity_collection_name: String,

    #[arg(long, env = "PROCEDURE_MODEL_NAME", default_value = "Procedure")]
    pub procedure_model_name: String,

    #[arg(long, env = "PROCEDURE_COLLECTION_NAME", default_value = "procedures")]
    pub procedure_collection_name: String,
}

/// Where referenced collaborator entities live
#[derive(Parser, Debug, Clone)]
pub struct CollaboratorArgs {
    /// Collection holding parties, used when no party service URL is set
    #[arg(long, env = "PARTY_COLLECTION_NAME", default_value = "parties")]
    pub party_collection_name: String,

    /// Collection holding boundary features
    #[arg(long, env = "FEATURE_COLLECTION_NAME", default_value = "features")]
    pub feature_collection_name: String,

    /// Collection holding incident types
    #[arg(long, env = "INCIDENT_TYPE_COLLECTION_NAME", default_value = "incidenttypes")]
    pub incident_type_collection_name: String,

    /// Base URL of the party directory (e.g., "http://parties:5000/v1/parties")
    #[arg(long, env = "PARTY_SERVICE_URL")]
    pub party_service_url: Option<String>,

    /// Base URL of the feature service
    #[arg(long, env = "FEATURE_SERVICE_URL")]
    pub feature_service_url: Option<String>,

    /// Base URL of the incident type catalog
    #[arg(long, env = "INCIDENT_TYPE_SERVICE_URL")]
    pub incident_type_service_url: Option<String>,

    /// Comma-separated administrative-level fields populated on a plan boundary
    #[arg(long, env = "BOUNDARY_LEVELS", default_value = "country,region,district")]
    pub boundary_levels: String,
}

/// Resolved names and projections the entity schemas are built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub plan_model_name: String,
    pub plan_collection_name: String,
    pub activity_model_name: String,
    pub activity_collection_name: String,
    pub procedure_model_name: String,
    pub procedure_collection_name: String,
    pub party_collection_name: String,
    pub feature_collection_name: String,
    pub incident_type_collection_name: String,
    pub boundary_levels: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            plan_model_name: "Plan".to_string(),
            plan_collection_name: "plans".to_string(),
            activity_model_name: "Activity".to_string(),
            activity_collection_name: "activities".to_string(),
            procedure_model_name: "Procedure".to_string(),
            procedure_collection_name: "procedures".to_string(),
            party_collection_name: "parties".to_string(),
            feature_collection_name: "features".to_string(),
            incident_type_collection_name: "incidenttypes".to_string(),
            boundary_levels: vec![
                "country".to_string(),
                "region".to_string(),
                "district".to_string(),
            ],
        }
    }
}

/// Paging limits applied to list requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

/// Split a comma-separated list, dropping blanks
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Args {
    /// Names and projections for the entity schemas
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            plan_model_name: self.models.plan_model_name.clone(),
            plan_collection_name: self.models.plan_collection_name.clone(),
            activity_model_name: self.models.activity_model_name.clone(),
            activity_collection_name: self.models.activity_collection_name.clone(),
            procedure_model_name: self.models.procedure_model_name.clone(),
            procedure_collection_name: self.models.procedure_collection_name.clone(),
            party_collection_name: self.collaborators.party_collection_name.clone(),
            feature_collection_name: self.collaborators.feature_collection_name.clone(),
            incident_type_collection_name: self
                .collaborators
                .incident_type_collection_name
                .clone(),
            boundary_levels: split_list(&self.collaborators.boundary_levels),
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_page_limit,
            max_limit: self.max_page_limit,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_version.trim().is_empty() || self.api_version.contains('/') {
            return Err("API_VERSION must be a single non-empty path segment".to_string());
        }

        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return Err("page limits must be greater than zero".to_string());
        }

        if self.default_page_limit > self.max_page_limit {
            return Err("DEFAULT_PAGE_LIMIT must be less than or equal to MAX_PAGE_LIMIT".to_string());
        }

        let names = [
            ("PLAN_MODEL_NAME", &self.models.plan_model_name),
            ("PLAN_COLLECTION_NAME", &self.models.plan_collection_name),
            ("ACTIVITY_MODEL_NAME", &self.models.activity_model_name),
            ("ACTIVITY_COLLECTION_NAME", &self.models.activity_collection_name),
            ("PROCEDURE_MODEL_NAME", &self.models.procedure_model_name),
            ("PROCEDURE_COLLECTION_NAME", &self.models.procedure_collection_name),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(format!("{key} must not be empty"));
            }
        }

        for level in split_list(&self.collaborators.boundary_levels) {
            if !level.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("invalid boundary level field '{level}'"));
            }
        }

        Ok(())
    }
}
