//! Containment rules between feature collections and their children.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ConfigurationError;
use crate::models::FeatureClass;

use super::{FeatureOptions, Registry};

/// One feature class in the containment tree, with the classes it may hold.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContainmentNode {
    pub model_uid: String,
    pub verbose_name: String,
    pub collection: bool,
    pub children: Vec<ContainmentNode>,
}

impl Registry {
    /// Resolve the declared children of a collection class.
    ///
    /// Fails if the class declares none, or if any declared child is unknown
    /// or not a feature.
    pub fn get_valid_children(
        &self,
        options: &FeatureOptions,
    ) -> Result<Vec<&FeatureClass>, ConfigurationError> {
        let declared = options
            .valid_children()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigurationError::NotACollection {
                model: options.name().to_string(),
            })?;

        declared
            .iter()
            .map(|path| {
                let class = self
                    .resolve_class(path)
                    .ok_or_else(|| ConfigurationError::UnresolvedChild {
                        child: path.clone(),
                    })?;
                if !class.is_feature() {
                    return Err(ConfigurationError::ChildNotAFeature {
                        child: path.clone(),
                    });
                }
                Ok(class)
            })
            .collect()
    }

    /// Registered collections whose children all resolve.
    pub fn get_collection_models(&self) -> Vec<&FeatureOptions> {
        self.models()
            .filter(|o| o.is_collection())
            .filter(|o| self.get_valid_children(o).is_ok_and(|c| !c.is_empty()))
            .collect()
    }

    /// Registered features that are not collections.
    pub fn get_feature_models(&self) -> Vec<&FeatureOptions> {
        self.models().filter(|o| !o.is_collection()).collect()
    }

    pub fn is_collection_model(&self, model_uid: &str) -> bool {
        self.get_collection_models()
            .iter()
            .any(|o| o.model_uid() == model_uid)
    }

    /// Model uids `options` may contain; empty for anything but a valid collection.
    pub fn valid_child_uids(&self, options: &FeatureOptions) -> Vec<String> {
        self.get_valid_children(options)
            .map(|children| children.iter().map(|c| c.model_uid()).collect())
            .unwrap_or_default()
    }

    /// Every collection that may contain `options`, directly or through
    /// nested collections.
    ///
    /// Direct parents come first in registration order, followed by the
    /// ancestors of each. Every ancestor appears once; a containment cycle
    /// stops at the first class seen twice.
    pub fn get_potential_parents(&self, options: &FeatureOptions) -> Vec<&FeatureOptions> {
        let mut parents = Vec::new();
        let mut visited = HashSet::new();
        self.collect_parents(options.model_uid(), &mut parents, &mut visited);
        parents
    }

    fn collect_parents<'a>(
        &'a self,
        model_uid: &str,
        parents: &mut Vec<&'a FeatureOptions>,
        visited: &mut HashSet<String>,
    ) {
        let direct: Vec<&FeatureOptions> = self
            .get_collection_models()
            .into_iter()
            .filter(|c| self.valid_child_uids(c).iter().any(|uid| uid == model_uid))
            .filter(|c| visited.insert(c.model_uid().to_string()))
            .collect();

        parents.extend(direct.iter().copied());

        for parent in direct {
            if parent.model_uid() != model_uid {
                self.collect_parents(parent.model_uid(), parents, visited);
            }
        }
    }

    /// Containment forest rooted at every class with no parent but itself.
    pub fn containment_tree(&self) -> Vec<ContainmentNode> {
        self.models()
            .filter(|o| {
                self.get_potential_parents(o)
                    .iter()
                    .all(|p| p.model_uid() == o.model_uid())
            })
            .map(|o| self.containment_node(o, &mut Vec::new()))
            .collect()
    }

    fn containment_node(&self, options: &FeatureOptions, path: &mut Vec<String>) -> ContainmentNode {
        path.push(options.model_uid().to_string());
        let mut children = Vec::new();
        for uid in self.valid_child_uids(options) {
            if path.contains(&uid) {
                continue;
            }
            if let Ok(child) = self.get_model_by_uid(&uid) {
                children.push(self.containment_node(child, path));
            }
        }
        path.pop();

        ContainmentNode {
            model_uid: options.model_uid().to_string(),
            verbose_name: options.verbose_name().to_string(),
            collection: options.is_collection(),
            children,
        }
    }
}
