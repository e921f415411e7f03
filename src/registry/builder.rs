use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::ConfigurationError;
use crate::models::{slugify, FeatureClass, Link};

use super::{FeatureOptions, LinkTable, Registry, Routes, SymbolTable};

/// Collects feature classes at startup and freezes them into a [`Registry`].
///
/// Each class is validated as it is registered, so the first misconfigured
/// class stops registration with its [`ConfigurationError`].
#[derive(Debug)]
pub struct RegistryBuilder {
    symbols: SymbolTable,
    url_prefix: String,
    models: IndexMap<String, FeatureOptions>,
    links: LinkTable,
}

impl RegistryBuilder {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            url_prefix: String::from("/features"),
            models: IndexMap::new(),
            links: LinkTable::new(),
        }
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Validate `class` and add it to the registry under construction.
    pub fn register(&mut self, class: FeatureClass) -> Result<&FeatureOptions, ConfigurationError> {
        let model_uid = class.model_uid();
        if self.models.contains_key(&model_uid) {
            return Err(ConfigurationError::DuplicateModel {
                model: class.path(),
            });
        }

        let slug = slugify(&class.name);
        if let Some(existing) = self.models.values().find(|o| o.slug() == slug) {
            return Err(ConfigurationError::DuplicateSlug {
                slug,
                first: existing.class().path(),
                second: class.path(),
            });
        }

        let options = FeatureOptions::new(&class, &self.symbols, &mut self.links)?;

        tracing::debug!("registering Feature {}", class.name);
        let entry = self.models.entry(model_uid).or_insert(options);
        Ok(entry)
    }

    /// Register every class in order.
    pub fn register_all(
        mut self,
        classes: impl IntoIterator<Item = FeatureClass>,
    ) -> Result<Self, ConfigurationError> {
        for class in classes {
            self.register(class)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Registry, ConfigurationError> {
        check_link_routes(self.links.iter())?;

        let mut classes: HashMap<String, FeatureClass> = self
            .symbols
            .models()
            .map(|c| (c.path(), c.clone()))
            .collect();
        for options in self.models.values() {
            classes.insert(options.class().path(), options.class().clone());
        }

        let mut registry = Registry {
            models: self.models,
            links: self.links.into_links(),
            classes,
            symbols: self.symbols,
            routes: Routes::new(self.url_prefix.clone()),
        };

        let collections: Vec<String> = registry
            .get_collection_models()
            .into_iter()
            .map(|o| o.model_uid().to_string())
            .collect();
        let collections: Vec<&str> = collections.iter().map(String::as_str).collect();
        let routes = Routes::for_registry(
            &self.url_prefix,
            registry.models.values(),
            &collections,
            &registry.links,
        );
        registry.routes = routes;

        tracing::debug!(
            "registry built with {} feature classes and {} links",
            registry.models.len(),
            registry.links.len()
        );
        Ok(registry)
    }
}

/// Two links with the same route name could never both be invoked.
fn check_link_routes<'a>(links: impl Iterator<Item = &'a Link>) -> Result<(), ConfigurationError> {
    let mut seen: HashMap<String, &Link> = HashMap::new();
    for link in links {
        if let Some(first) = seen.insert(link.url_name(), link) {
            return Err(ConfigurationError::DuplicateLinkRoute {
                route: link.url_name(),
                first: first.title().to_string(),
                second: link.title().to_string(),
            });
        }
    }
    Ok(())
}
