//! Package descriptor
//!
//! Static facts about this build, served at `/` and `/<version>/info`.

use serde::Serialize;

/// Build information stamped by build.rs
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub commit: &'static str,
    pub built_at: &'static str,
}

/// Read-only package metadata
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub license: &'static str,
    pub homepage: &'static str,
    pub repository: &'static str,
    pub bugs: String,
    pub contributors: Vec<&'static str>,
    pub build: BuildInfo,
}

impl PackageInfo {
    pub fn current() -> Self {
        let repository = env!("CARGO_PKG_REPOSITORY");
        Self {
            name: env!("CARGO_PKG_NAME"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            version: env!("CARGO_PKG_VERSION"),
            license: env!("CARGO_PKG_LICENSE"),
            homepage: env!("CARGO_PKG_HOMEPAGE"),
            repository,
            bugs: format!("{}/issues", repository.trim_end_matches('/')),
            contributors: env!("CARGO_PKG_AUTHORS")
                .split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect(),
            build: BuildInfo {
                commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
                built_at: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            },
        }
    }
}
