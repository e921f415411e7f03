//! Named URL routes, resolvable by name and keyword arguments.

use indexmap::IndexMap;

use crate::error::NotFound;
use crate::models::Link;

use super::FeatureOptions;

pub const WORKSPACE_OWNER_JSON: &str = "workspace-owner-json";
pub const WORKSPACE_SHARED_JSON: &str = "workspace-shared-json";
pub const WORKSPACE_PUBLIC_JSON: &str = "workspace-public-json";
pub const FEATURE_TREE_CSS: &str = "feature-tree-css";

/// Route table of a built registry.
///
/// Templates use `{param}` placeholders, the same syntax the HTTP router
/// matches on, and already carry the URL prefix.
#[derive(Debug, Clone)]
pub struct Routes {
    prefix: String,
    named: IndexMap<String, String>,
}

impl Routes {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            named: IndexMap::new(),
        }
    }

    /// Full table for the given feature classes and links.
    pub(crate) fn for_registry<'a>(
        prefix: &str,
        models: impl IntoIterator<Item = &'a FeatureOptions>,
        collections: &[&str],
        links: &[Link],
    ) -> Self {
        let mut routes = Self::new(prefix);

        for options in models {
            let slug = options.slug();
            routes.insert(format!("{slug}_create_form"), format!("/{slug}/form/"));
            routes.insert(format!("{slug}_resource"), format!("/{slug}/{{uid}}/"));
            routes.insert(format!("{slug}_update_form"), format!("/{slug}/{{uid}}/form/"));
            routes.insert(format!("{slug}_share_form"), format!("/{slug}/{{uid}}/share/"));
            if collections.contains(&options.model_uid()) {
                routes.insert(
                    format!("{slug}_remove_features"),
                    format!("/{slug}/{{uid}}/remove/{{uids}}"),
                );
                routes.insert(
                    format!("{slug}_add_features"),
                    format!("/{slug}/{{uid}}/add/{{uids}}"),
                );
            }
        }

        for link in links {
            routes.insert(
                link.url_name(),
                format!("/{}/links/{}/{{uids}}/", link.parent_slug(), link.slug()),
            );
        }

        routes.insert(WORKSPACE_OWNER_JSON, "/workspaces/{username}/owner.json");
        routes.insert(WORKSPACE_SHARED_JSON, "/workspaces/{username}/shared.json");
        routes.insert(WORKSPACE_PUBLIC_JSON, "/workspaces/public.json");
        routes.insert(FEATURE_TREE_CSS, "/feature_tree.css");
        routes
    }

    /// Register `path` (relative to the prefix) under `name`.
    pub fn insert(&mut self, name: impl Into<String>, path: impl AsRef<str>) {
        let template = format!("{}{}", self.prefix, path.as_ref());
        self.named.insert(name.into(), template);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn template(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    /// Build the URL of `name`, substituting every placeholder from `args`.
    ///
    /// Substituted values are inserted verbatim and never re-scanned, so a
    /// value may itself look like a placeholder (`{uid+}`).
    pub fn reverse(&self, name: &str, args: &[(&str, &str)]) -> Result<String, NotFound> {
        let template = self
            .named
            .get(name)
            .ok_or_else(|| NotFound::Route(name.to_string()))?;

        let mut url = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            url.push_str(&rest[..start]);
            let end = rest[start..]
                .find('}')
                .map(|e| start + e)
                .ok_or_else(|| NotFound::Route(name.to_string()))?;
            let param = &rest[start + 1..end];
            let (_, value) = args
                .iter()
                .find(|(key, _)| *key == param)
                .ok_or_else(|| NotFound::Route(format!("{name} (missing `{param}`)")))?;
            url.push_str(value);
            rest = &rest[end + 1..];
        }
        url.push_str(rest);
        Ok(url)
    }
}
