//! Runtime settings loaded from environment variables.

use std::path::PathBuf;

const DEFAULT_PUBLIC_GROUP: &str = "Share with Public";
const DEFAULT_STAFF_GROUP: &str = "Share with Staff";
const DEFAULT_SELF_TITLE: &str = "View";
const DEFAULT_URL_PREFIX: &str = "/features";

/// Settings shared by the registry, the sharing resolver and the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Groups that share with everyone (from FEATURES_PUBLIC_GROUPS, comma-separated)
    pub public_groups: Vec<String>,
    /// Groups that share with staff only (from FEATURES_STAFF_GROUPS, comma-separated)
    pub staff_groups: Vec<String>,
    /// Title of the `self` link relation (from FEATURES_SELF_TITLE)
    pub self_title: String,
    /// Path every feature route is mounted under (from FEATURES_URL_PREFIX)
    pub url_prefix: String,
    /// SQLite database path (from FEATURES_DATABASE); platform default when unset
    pub database: Option<PathBuf>,
    /// Directory show templates are looked up in (from FEATURES_TEMPLATE_DIR)
    pub template_dir: Option<PathBuf>,
}

impl Settings {
    /// Built-in defaults, ignoring the environment.
    pub fn new() -> Self {
        Self {
            public_groups: vec![DEFAULT_PUBLIC_GROUP.to_string()],
            staff_groups: vec![DEFAULT_STAFF_GROUP.to_string()],
            self_title: DEFAULT_SELF_TITLE.to_string(),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            database: None,
            template_dir: None,
        }
    }

    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::new();

        let public_groups = std::env::var("FEATURES_PUBLIC_GROUPS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or(defaults.public_groups);

        let staff_groups = std::env::var("FEATURES_STAFF_GROUPS")
            .ok()
            .map(|s| split_list(&s))
            .unwrap_or(defaults.staff_groups);

        let self_title = std::env::var("FEATURES_SELF_TITLE").unwrap_or(defaults.self_title);

        let url_prefix = std::env::var("FEATURES_URL_PREFIX")
            .map(|s| normalize_prefix(&s))
            .unwrap_or(defaults.url_prefix);

        Self {
            public_groups,
            staff_groups,
            self_title,
            url_prefix,
            database: std::env::var("FEATURES_DATABASE").ok().map(PathBuf::from),
            template_dir: std::env::var("FEATURES_TEMPLATE_DIR").ok().map(PathBuf::from),
        }
    }

    pub fn with_url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = normalize_prefix(prefix);
        self
    }

    pub fn is_public_group(&self, name: &str) -> bool {
        self.public_groups.iter().any(|g| g == name)
    }

    pub fn is_staff_group(&self, name: &str) -> bool {
        self.staff_groups.iter().any(|g| g == name)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Leading slash, no trailing slash. The empty prefix mounts at the root.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
