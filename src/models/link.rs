use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::feature::slugify;
use super::instance::{Instance, User};
use crate::error::{ConfigurationError, NotFound};
use crate::registry::{Routes, SymbolTable};
use crate::views::{RequestContext, ViewResult};

/// Parent slug of links that apply to more than one feature class.
pub const GENERIC_LINKS_SLUG: &str = "generic-links";

/// The relation a link has to the features it is invoked on.
///
/// - `Alternate`: Another representation of the features (exports)
/// - `Related`: A read-only resource derived from the features
/// - `Edit`: Changes state, either directly or through a form
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rel {
    Alternate,
    Related,
    Edit,
}

impl Rel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alternate => "alternate",
            Self::Related => "related",
            Self::Edit => "edit",
        }
    }
}

/// Whether a link is invoked on one instance or on several.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Select {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "multiple")]
    Multiple,
    #[serde(rename = "single multiple")]
    SingleMultiple,
    #[serde(rename = "multiple single")]
    MultipleSingle,
}

impl Select {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::SingleMultiple => "single multiple",
            Self::MultipleSingle => "multiple single",
        }
    }

    /// Every variant but `Single` hands the view a sequence of instances.
    pub fn takes_sequence(&self) -> bool {
        !matches!(self, Self::Single)
    }
}

impl std::str::FromStr for Select {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            "single multiple" => Ok(Self::SingleMultiple),
            "multiple single" => Ok(Self::MultipleSingle),
            _ => Err(ConfigurationError::InvalidSelect(s.to_string())),
        }
    }
}

/// Extra arguments a link passes to its view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraArgs {
    /// Spatial reference exports should be expressed in.
    pub srid: Option<u32>,
    /// Download filename for export responses.
    pub filename: Option<String>,
}

/// A view taking `(request, instance)`.
pub type SingleView = fn(&RequestContext, &Instance, &ExtraArgs) -> ViewResult;

/// A view taking `(request, instances)`.
pub type MultipleView = fn(&RequestContext, &[Instance], &ExtraArgs) -> ViewResult;

/// The handler behind a link, tagged with its calling contract.
#[derive(Clone, Copy)]
pub enum View {
    Single(SingleView),
    Multiple(MultipleView),
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("View::Single"),
            Self::Multiple(_) => f.write_str("View::Multiple"),
        }
    }
}

impl View {
    fn parameter(&self) -> &'static str {
        match self {
            Self::Single(_) => "instance",
            Self::Multiple(_) => "instances",
        }
    }
}

/// The instances a link is resolved or invoked against.
#[derive(Debug, Clone, Copy)]
pub enum Instances<'a> {
    Single(&'a Instance),
    Many(&'a [Instance]),
}

impl<'a> Instances<'a> {
    pub fn as_slice(&self) -> &'a [Instance] {
        match *self {
            Self::Single(instance) => std::slice::from_ref(instance),
            Self::Many(instances) => instances,
        }
    }

    /// Comma-joined uids, as they appear in link URLs.
    pub fn joined_uids(&self) -> String {
        self.as_slice()
            .iter()
            .map(Instance::uid)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Identity of a feature class a link applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub uid: String,
    pub slug: String,
}

/// Declaration of a link, as written in a feature class's options.
///
/// Use [`alternate`], [`related`], [`edit`] or [`edit_form`] to start one.
/// It is validated and turned into a [`Link`] when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub rel: Rel,
    pub title: String,
    /// Symbol key of the view.
    pub view: String,
    /// `None` means the default for the constructor used (GET).
    pub method: Option<String>,
    /// One of `single`, `multiple`, `single multiple`, `multiple single`.
    pub select: String,
    pub mime_type: Option<String>,
    /// Defaults to the slugified title.
    pub slug: Option<String>,
    pub extra_args: ExtraArgs,
    pub confirm: Option<String>,
    /// `Some(true)` implies `must_own`. `Some(false)` marks actions that
    /// work on a copy and so are open to non-owners.
    pub edits_original: Option<bool>,
    pub must_own: bool,
    pub limit_to_groups: Option<Vec<String>>,
}

impl LinkSpec {
    pub fn new(rel: Rel, title: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            rel,
            title: title.into(),
            view: view.into(),
            method: None,
            select: Select::Single.as_str().to_string(),
            mime_type: None,
            slug: None,
            extra_args: ExtraArgs::default(),
            confirm: None,
            edits_original: None,
            must_own: false,
            limit_to_groups: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn extra_args(mut self, extra_args: ExtraArgs) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn confirm(mut self, confirm: impl Into<String>) -> Self {
        self.confirm = Some(confirm.into());
        self
    }

    pub fn edits_original(mut self, edits_original: bool) -> Self {
        self.edits_original = Some(edits_original);
        self
    }

    pub fn must_own(mut self, must_own: bool) -> Self {
        self.must_own = must_own;
        self
    }

    pub fn limit_to_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.limit_to_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }
}

pub fn alternate(title: impl Into<String>, view: impl Into<String>) -> LinkSpec {
    LinkSpec::new(Rel::Alternate, title, view)
}

pub fn related(title: impl Into<String>, view: impl Into<String>) -> LinkSpec {
    LinkSpec::new(Rel::Related, title, view)
}

/// An edit link that is POSTed to directly.
pub fn edit(title: impl Into<String>, view: impl Into<String>) -> LinkSpec {
    LinkSpec::new(Rel::Edit, title, view).method("POST")
}

/// An edit link that requests a form first.
pub fn edit_form(title: impl Into<String>, view: impl Into<String>) -> LinkSpec {
    LinkSpec::new(Rel::Edit, title, view).method("GET")
}

/// A validated, user-invokable action on one or more feature instances.
#[derive(Debug, Clone)]
pub struct Link {
    rel: Rel,
    title: String,
    view_key: String,
    view: View,
    method: String,
    select: Select,
    mime_type: Option<String>,
    slug: String,
    extra_args: ExtraArgs,
    confirm: Option<String>,
    edits_original: Option<bool>,
    must_own: bool,
    limit_to_groups: Option<Vec<String>>,
    pub(crate) generic: bool,
    pub(crate) models: IndexSet<ModelRef>,
}

impl Link {
    /// Validate a declaration against the views in `symbols`.
    pub fn new(spec: LinkSpec, symbols: &SymbolTable) -> Result<Self, ConfigurationError> {
        let view = symbols
            .resolve_view(&spec.view)
            .ok_or_else(|| ConfigurationError::UnresolvedView {
                title: spec.title.clone(),
                view: spec.view.clone(),
                hint: symbols.view_hint(&spec.view),
            })?;

        if spec.title.is_empty() {
            return Err(ConfigurationError::EmptyLinkTitle);
        }

        let select: Select = spec.select.parse()?;

        let signature_matches = match view {
            View::Single(_) => !select.takes_sequence(),
            View::Multiple(_) => select.takes_sequence(),
        };
        if !signature_matches {
            let expected = if select.takes_sequence() {
                "instances"
            } else {
                "instance"
            };
            tracing::debug!(
                "view {} takes `{}`, link \"{}\" needs `{}`",
                spec.view,
                view.parameter(),
                spec.title,
                expected
            );
            return Err(ConfigurationError::InvalidViewSignature {
                title: spec.title,
                expected,
            });
        }

        let slug = spec.slug.unwrap_or_else(|| slugify(&spec.title));
        let must_own = spec.must_own || spec.edits_original == Some(true);

        Ok(Self {
            rel: spec.rel,
            method: spec.method.unwrap_or_else(|| "GET".to_string()),
            title: spec.title,
            view_key: spec.view,
            view,
            select,
            mime_type: spec.mime_type,
            slug,
            extra_args: spec.extra_args,
            confirm: spec.confirm,
            edits_original: spec.edits_original,
            must_own,
            limit_to_groups: spec.limit_to_groups,
            generic: false,
            models: IndexSet::new(),
        })
    }

    /// Whether two links are interchangeable for deduplication.
    pub fn same_as(&self, other: &Link) -> bool {
        self.rel == other.rel
            && self.title == other.title
            && self.view_key == other.view_key
            && self.extra_args == other.extra_args
            && self.method == other.method
            && self.slug == other.slug
            && self.select == other.select
            && self.must_own == other.must_own
    }

    pub fn rel(&self) -> Rel {
        self.rel
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn view_key(&self) -> &str {
        &self.view_key
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn select(&self) -> Select {
        self.select
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn extra_args(&self) -> &ExtraArgs {
        &self.extra_args
    }

    pub fn confirm(&self) -> Option<&str> {
        self.confirm.as_deref()
    }

    pub fn edits_original(&self) -> Option<bool> {
        self.edits_original
    }

    pub fn must_own(&self) -> bool {
        self.must_own
    }

    pub fn limit_to_groups(&self) -> Option<&[String]> {
        self.limit_to_groups.as_deref()
    }

    /// True once a second feature class declared the same link.
    pub fn is_generic(&self) -> bool {
        self.generic
    }

    /// Feature classes this link applies to, in registration order.
    pub fn models(&self) -> &IndexSet<ModelRef> {
        &self.models
    }

    pub fn applies_to(&self, model_uid: &str) -> bool {
        self.models.iter().any(|m| m.uid == model_uid)
    }

    /// Slug of the only model this link applies to, or `generic-links`.
    pub fn parent_slug(&self) -> &str {
        match self.models.first() {
            Some(model) if self.models.len() == 1 => &model.slug,
            _ => GENERIC_LINKS_SLUG,
        }
    }

    /// Name of the route invoking this link.
    pub fn url_name(&self) -> String {
        format!("{}-{}", self.parent_slug(), self.slug)
    }

    /// Whether `user` may see this link on features they do (or don't) own.
    pub fn visible_to(&self, user: &User, is_owner: bool) -> bool {
        if let Some(groups) = self.limit_to_groups.as_ref().filter(|g| !g.is_empty()) {
            if !groups.iter().any(|g| user.in_group(g)) {
                return false;
            }
        }

        !(self.must_own && !is_owner)
    }

    /// URL invoking this link on `instances`.
    pub fn resolve_url(&self, routes: &Routes, instances: Instances<'_>) -> Result<String, NotFound> {
        routes.reverse(&self.url_name(), &[("uids", &instances.joined_uids())])
    }

    /// Hypermedia projection used in workspace documents.
    pub fn document(&self, routes: &Routes) -> Result<LinkDocument, NotFound> {
        let uri_template = routes.reverse(&self.url_name(), &[("uids", "{uid+}")])?;
        Ok(LinkDocument {
            rel: Some(self.rel),
            title: Some(self.title.clone()),
            select: Some(self.select),
            uri_template,
            method: (self.rel == Rel::Edit).then(|| self.method.clone()),
            models: (self.models.len() > 1)
                .then(|| self.models.iter().map(|m| m.uid.clone()).collect()),
            confirm: self.confirm.clone(),
        })
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// A URI template plus whatever metadata a client needs to present it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<Rel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
    #[serde(rename = "uri-template")]
    pub uri_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl LinkDocument {
    /// A bare template, optionally titled.
    pub fn template(title: Option<&str>, uri_template: String) -> Self {
        Self {
            rel: None,
            title: title.map(str::to_string),
            select: None,
            uri_template,
            method: None,
            models: None,
            confirm: None,
        }
    }
}
