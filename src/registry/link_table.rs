//! Deduplicating table of every link declared by any feature class.

use crate::error::ConfigurationError;
use crate::models::{Link, LinkSpec, ModelRef};

use super::SymbolTable;

/// Position of a link in the [`LinkTable`], stable for the life of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub usize);

/// Links in creation order.
///
/// Declaring a link identical to one already in the table returns the
/// existing entry, now marked generic, instead of adding a duplicate.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: Vec<Link>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `spec` and return the id of the link it denotes.
    pub fn create_link(
        &mut self,
        spec: LinkSpec,
        symbols: &SymbolTable,
    ) -> Result<LinkId, ConfigurationError> {
        let candidate = Link::new(spec, symbols)?;

        if let Some(index) = self.links.iter().position(|l| l.same_as(&candidate)) {
            let existing = &mut self.links[index];
            existing.generic = true;
            tracing::debug!("link \"{}\" declared again, now generic", existing.title());
            return Ok(LinkId(index));
        }

        tracing::debug!("created link \"{}\"", candidate.title());
        self.links.push(candidate);
        Ok(LinkId(self.links.len() - 1))
    }

    pub(crate) fn attach_model(&mut self, id: LinkId, model: ModelRef) {
        self.links[id.0].models.insert(model);
    }

    pub fn get(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub(crate) fn into_links(self) -> Vec<Link> {
        self.links
    }
}
