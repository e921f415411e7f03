//! Lookup of show templates. Rendering happens elsewhere.

use std::collections::HashSet;
use std::path::PathBuf;

pub trait TemplateSource: Send + Sync {
    fn has_template(&self, name: &str) -> bool;
}

/// A fixed set of template names.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    names: HashSet<String>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }
}

impl TemplateSource for TemplateSet {
    fn has_template(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Templates stored as files under a directory, e.g. `{root}/mpa/show.html`.
#[derive(Debug, Clone)]
pub struct TemplateDir {
    root: PathBuf,
}

impl TemplateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for TemplateDir {
    fn has_template(&self, name: &str) -> bool {
        // Names are relative; refuse anything that could climb out of the root.
        if name.split('/').any(|part| part == "..") {
            return false;
        }
        self.root.join(name).is_file()
    }
}
