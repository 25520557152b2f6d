use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::session::Timestamp;

/// A filesystem location for one project, with an optional link to a
/// docs-vault entry for that project's knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLocation {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_vault: Option<String>,
}

/// A rule used to auto-detect which profile is current on this host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRule {
    Hostname { equals: String },
    PathExists { path: String },
}

/// Describes the current host: its paths, known projects, and docs vaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub name: String,
    pub hostname: String,
    pub workspace_path: String,
    pub agent_data_path: String,
    pub home_path: String,
    #[serde(default)]
    pub projects: HashMap<String, ProjectLocation>,
    #[serde(default)]
    pub docs_vaults: HashMap<String, String>,
    #[serde(default)]
    pub match_rules: Vec<MatchRule>,
    #[serde(default)]
    pub last_active_at: Option<Timestamp>,
}
