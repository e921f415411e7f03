//! Explicit table of everything a feature declaration may refer to by key.
//!
//! Views, forms, manipulators and non-feature models are registered here
//! before the registry is built; declarations that name a key missing from
//! the table fail registration.

use std::collections::HashMap;

use crate::models::{FeatureClass, GeometryType, View};

/// A form able to create and edit feature instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescriptor {
    /// Path of the model the form is bound to, if any.
    pub model: Option<String>,
    /// Whether the form derives from the feature form base.
    pub feature_form: bool,
}

impl FormDescriptor {
    pub fn feature_form() -> Self {
        Self {
            model: None,
            feature_form: true,
        }
    }

    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            feature_form: true,
        }
    }

    /// A form that does not derive from the feature form base.
    pub fn plain() -> Self {
        Self {
            model: None,
            feature_form: false,
        }
    }
}

/// A geometry transform applied to user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManipulatorDescriptor {
    /// Geometry types the manipulator handles. `None` when it never declared them.
    pub supported_geom_fields: Option<Vec<GeometryType>>,
}

impl ManipulatorDescriptor {
    pub fn supporting(types: impl IntoIterator<Item = GeometryType>) -> Self {
        Self {
            supported_geom_fields: Some(types.into_iter().collect()),
        }
    }

    pub fn undeclared() -> Self {
        Self {
            supported_geom_fields: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    views: HashMap<String, View>,
    forms: HashMap<String, FormDescriptor>,
    manipulators: HashMap<String, ManipulatorDescriptor>,
    models: HashMap<String, FeatureClass>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the views behind the default links.
    pub fn with_builtin_views() -> Self {
        crate::views::register_builtins(Self::new())
    }

    pub fn view(mut self, key: impl Into<String>, view: View) -> Self {
        self.views.insert(key.into(), view);
        self
    }

    pub fn form(mut self, key: impl Into<String>, form: FormDescriptor) -> Self {
        self.forms.insert(key.into(), form);
        self
    }

    pub fn manipulator(mut self, key: impl Into<String>, manipulator: ManipulatorDescriptor) -> Self {
        self.manipulators.insert(key.into(), manipulator);
        self
    }

    /// Make a model resolvable by its path without registering it as a feature.
    pub fn model(mut self, class: FeatureClass) -> Self {
        self.models.insert(class.path(), class);
        self
    }

    pub fn resolve_view(&self, key: &str) -> Option<View> {
        self.views.get(key).copied()
    }

    pub fn resolve_form(&self, key: &str) -> Option<&FormDescriptor> {
        self.forms.get(key)
    }

    pub fn resolve_manipulator(&self, key: &str) -> Option<&ManipulatorDescriptor> {
        self.manipulators.get(key)
    }

    pub fn resolve_model(&self, path: &str) -> Option<&FeatureClass> {
        self.models.get(path)
    }

    pub(crate) fn models(&self) -> impl Iterator<Item = &FeatureClass> {
        self.models.values()
    }

    /// Explain a missing view key when its module is otherwise known.
    pub(crate) fn view_hint(&self, key: &str) -> Option<String> {
        let (module, name) = key.rsplit_once('.')?;
        let module_known = self
            .views
            .keys()
            .filter_map(|k| k.rsplit_once('.'))
            .any(|(m, _)| m == module);
        module_known.then(|| {
            format!(
                "module `{}` has views registered but none named `{}`; \
                 register it in the symbol table before building the registry",
                module, name
            )
        })
    }
}
