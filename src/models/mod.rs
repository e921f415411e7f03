//! Domain models for the feature registry.
//!
//! # Core Concepts
//!
//! ## Registration-time
//!
//! - [`FeatureClass`]: Descriptor of one data model (a Feature, a FeatureCollection,
//!   or a plain model that is not a Feature at all) and its developer-specified
//!   [`OptionsSpec`].
//! - [`LinkSpec`]: Declaration of a user-invokable action. Becomes a [`Link`] when
//!   the registry is built, possibly merged with identical declarations from
//!   other feature classes into one generic link.
//!
//! ## Request-time
//!
//! - [`Instance`]: A stored feature, addressed by its uid `{model_uid}_{pk}`.
//! - [`User`] and [`Group`]: Who is asking, and through which groups features are
//!   shared with them.

mod feature;
mod instance;
mod link;

pub use feature::*;
pub use instance::*;
pub use link::*;
