//! Error types for registration and request-time lookups.

use thiserror::Error;

/// A misconfigured feature class, link, manipulator or collection.
///
/// These are raised while the registry is being built. None of them is
/// recoverable: a process that hits one must not start serving requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{model} is not a subclass of Feature")]
    NotAFeature { model: String },

    #[error("Have not defined Options on registered feature class {model}")]
    MissingOptions { model: String },

    #[error(
        "Feature class {model} is not configured with a form class. \
         To specify, add a `form` to its options."
    )]
    MissingForm { model: String },

    #[error("Feature class {model} is not configured with a valid form class. Could not resolve {form}")]
    UnresolvedForm { model: String, form: String },

    #[error("Feature class {model}'s form {form} is not a subclass of FeatureForm")]
    NotAFeatureForm { model: String, form: String },

    #[error("Feature class {model} is registered more than once")]
    DuplicateModel { model: String },

    #[error("Feature classes {first} and {second} share the slug `{slug}`")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },

    #[error("Links \"{first}\" and \"{second}\" would both be routed as `{route}`")]
    DuplicateLinkRoute {
        route: String,
        first: String,
        second: String,
    },

    #[error("Link title is empty")]
    EmptyLinkTitle,

    #[error("Link specified with invalid select option \"{0}\"")]
    InvalidSelect(String),

    #[error("Link \"{title}\" configured with invalid path to view {view}{}", hint_suffix(.hint))]
    UnresolvedView {
        title: String,
        view: String,
        hint: Option<String>,
    },

    #[error(
        "Link \"{title}\" not configured with a valid view. \
         View must take a second argument named {expected}."
    )]
    InvalidViewSignature {
        title: String,
        expected: &'static str,
    },

    #[error("valid_children option on {model} is only for FeatureCollection classes")]
    ChildrenOnNonCollection { model: String },

    #[error("Error trying to resolve manipulator {manipulator}")]
    UnresolvedManipulator { manipulator: String },

    #[error("{manipulator} is not set up properly; must have a supported_geom_fields list")]
    ManipulatorWithoutGeometries { manipulator: String },

    #[error("{model} has no geometry field; manipulator {manipulator} cannot be applied")]
    NoGeometryField { model: String, manipulator: String },

    #[error("{manipulator} does not support {field} geometry types (only {supported})")]
    UnsupportedGeometry {
        manipulator: String,
        field: String,
        supported: String,
    },

    #[error("{model} is not a properly configured FeatureCollection")]
    NotACollection { model: String },

    #[error("Error trying to resolve child model {child}")]
    UnresolvedChild { child: String },

    #[error("{child} is not a Feature; can't be a child")]
    ChildNotAFeature { child: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!("\n(Possible cause: {})", hint),
        None => String::new(),
    }
}

/// A request-time lookup that found nothing. Surfaces as a 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("No model with model_uid == `{0}`")]
    Model(String),

    #[error("{model} has no link named {title}")]
    Link { model: String, title: String },

    #[error("No route named `{0}`")]
    Route(String),

    #[error("No feature with uid `{0}`")]
    Instance(String),

    #[error("Malformed feature uid `{0}`")]
    MalformedUid(String),
}
