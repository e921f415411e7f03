//! Declarative feature-class registration.
//!
//! Feature classes describe themselves with a [`models::FeatureClass`] and an
//! options block. [`registry::RegistryBuilder`] turns those descriptors into an
//! immutable [`registry::Registry`] once at startup: every class acquires CRUD
//! routes, hypermedia links (deduplicated into generic links when several
//! classes declare the same one), sharing semantics and containment rules.
//! At request time the registry is read concurrently by the HTTP layer in
//! [`api`], the sharing resolver in [`sharing`] and the workspace projector in
//! [`workspace`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod sample;
pub mod sharing;
pub mod store;
pub mod templates;
pub mod tree_render;
pub mod views;
pub mod workspace;
