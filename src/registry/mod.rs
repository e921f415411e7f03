//! The model registry and everything it is built from.
//!
//! A [`RegistryBuilder`] takes a [`SymbolTable`] and a list of
//! [`FeatureClass`] descriptors, validates each one into [`FeatureOptions`]
//! and collects their links into a deduplicated [`LinkTable`]. `build()`
//! freezes the result into a [`Registry`], which is then shared read-only
//! (usually as `Arc<Registry>`) by every request.

mod builder;
mod hierarchy;
mod link_table;
mod options;
mod routes;
mod symbols;

pub use builder::RegistryBuilder;
pub use hierarchy::ContainmentNode;
pub use link_table::{LinkId, LinkTable};
pub use options::{FeatureOptions, DEFAULT_FORM_TEMPLATE, STUB_SHOW_TEMPLATE};
pub use routes::{
    Routes, FEATURE_TREE_CSS, WORKSPACE_OWNER_JSON, WORKSPACE_PUBLIC_JSON, WORKSPACE_SHARED_JSON,
};
pub use symbols::{FormDescriptor, ManipulatorDescriptor, SymbolTable};

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::NotFound;
use crate::models::{parse_uid, FeatureClass, Instance, Link};
use crate::store::FeatureStore;
use crate::views::ViewError;

/// Every registered feature class and link, frozen.
#[derive(Debug)]
pub struct Registry {
    models: IndexMap<String, FeatureOptions>,
    links: Vec<Link>,
    classes: HashMap<String, FeatureClass>,
    symbols: SymbolTable,
    routes: Routes,
}

impl Registry {
    /// Registered feature classes in registration order.
    pub fn models(&self) -> impl Iterator<Item = &FeatureOptions> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Options of the feature class named `class_name` (e.g. `Mpa`).
    pub fn get_model_options(&self, class_name: &str) -> Result<&FeatureOptions, NotFound> {
        self.models
            .values()
            .find(|o| o.name() == class_name)
            .ok_or_else(|| NotFound::Model(class_name.to_string()))
    }

    pub fn get_model_by_uid(&self, model_uid: &str) -> Result<&FeatureOptions, NotFound> {
        self.models
            .get(model_uid)
            .ok_or_else(|| NotFound::Model(model_uid.to_string()))
    }

    pub fn model_by_slug(&self, slug: &str) -> Option<&FeatureOptions> {
        self.models.values().find(|o| o.slug() == slug)
    }

    /// Every link in creation order, generic ones included.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    /// Links of one feature class in presentation order.
    pub fn links_of<'a>(&'a self, options: &'a FeatureOptions) -> impl Iterator<Item = &'a Link> {
        options.link_ids().iter().map(move |id| self.link(*id))
    }

    /// The link titled `title` on the class with uid `model_uid`.
    pub fn get_link(&self, model_uid: &str, title: &str) -> Result<&Link, NotFound> {
        let options = self.get_model_by_uid(model_uid)?;
        self.links_of(options)
            .find(|l| l.title() == title)
            .ok_or_else(|| NotFound::Link {
                model: options.name().to_string(),
                title: title.to_string(),
            })
    }

    /// The link mounted at `{parent_slug}/links/{slug}`.
    pub fn link_by_route(&self, parent_slug: &str, slug: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.parent_slug() == parent_slug && l.slug() == slug)
    }

    /// Class descriptor for a model path, registered or only known to the symbol table.
    pub fn resolve_class(&self, path: &str) -> Option<&FeatureClass> {
        self.classes.get(path)
    }

    /// Load the instance a uid points to.
    pub fn get_feature_by_uid(
        &self,
        store: &dyn FeatureStore,
        uid: &str,
    ) -> Result<Instance, ViewError> {
        let (model_uid, pk) = parse_uid(uid)?;
        self.get_model_by_uid(model_uid)?;
        store
            .get_instance(model_uid, pk)?
            .ok_or_else(|| NotFound::Instance(uid.to_string()).into())
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}
