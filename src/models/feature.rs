use serde::{Deserialize, Serialize};

use super::link::LinkSpec;

/// What kind of model a [`FeatureClass`] describes.
///
/// - `Feature`: A registrable feature with CRUD, links and sharing
/// - `Collection`: A feature that can contain other features
/// - `Plain`: Any other model; cannot be registered or contained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Feature,
    Collection,
    Plain,
}

/// The type of a feature's terminal geometry field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
}

impl GeometryType {
    /// Name of the geometry field class, as manipulators declare support for it.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Point => "PointField",
            Self::LineString => "LineStringField",
            Self::Polygon => "PolygonField",
            Self::MultiPolygon => "MultiPolygonField",
        }
    }
}

/// Descriptor of a data model taking part in registration.
///
/// The host application builds one per model and hands them to
/// [`RegistryBuilder`](crate::registry::RegistryBuilder). `Plain` descriptors
/// can also be placed in the symbol table so collections may (wrongly) refer
/// to them and be rejected.
#[derive(Debug, Clone)]
pub struct FeatureClass {
    pub app_label: String,
    /// Class name, e.g. `Mpa`. Slug and default verbose name derive from it.
    pub name: String,
    pub kind: ModelKind,
    /// Terminal geometry field; `None` for non-spatial features.
    pub geometry: Option<GeometryType>,
    /// The options block. Registration fails without one.
    pub options: Option<OptionsSpec>,
}

impl FeatureClass {
    pub fn feature(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(app_label, name, ModelKind::Feature)
    }

    pub fn collection(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(app_label, name, ModelKind::Collection)
    }

    pub fn plain(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_kind(app_label, name, ModelKind::Plain)
    }

    fn with_kind(app_label: impl Into<String>, name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            kind,
            geometry: None,
            options: None,
        }
    }

    pub fn geometry(mut self, geometry: GeometryType) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn options(mut self, options: OptionsSpec) -> Self {
        self.options = Some(options);
        self
    }

    /// Stable model identifier, `{app_label}_{lowercased name}`.
    pub fn model_uid(&self) -> String {
        format!("{}_{}", self.app_label, self.name.to_lowercase())
    }

    /// Symbol path other declarations use to refer to this model, `{app_label}.{name}`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.app_label, self.name)
    }

    pub fn is_feature(&self) -> bool {
        matches!(self.kind, ModelKind::Feature | ModelKind::Collection)
    }

    pub fn is_collection(&self) -> bool {
        self.kind == ModelKind::Collection
    }
}

/// Developer-specified options of a feature class.
///
/// Everything except `form` has a default. Default links are injected
/// according to the `enable_*`/`export_*` flags.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsSpec {
    /// Symbol key of the form used to create and edit instances.
    pub form: Option<String>,
    pub verbose_name: Option<String>,
    pub form_template: Option<String>,
    pub form_context: serde_json::Map<String, serde_json::Value>,
    pub show_template: Option<String>,
    pub show_context: serde_json::Map<String, serde_json::Value>,
    /// 16x16 icon shown next to instances in the feature tree.
    pub icon_url: Option<String>,
    pub links: Vec<LinkSpec>,
    pub enable_copy: bool,
    pub enable_kml: bool,
    pub export_png: bool,
    pub export_geojson: bool,
    /// Model paths this collection may contain. Only legal on collections.
    pub valid_children: Option<Vec<String>>,
    /// Manipulators always applied to user geometries.
    pub manipulators: Vec<String>,
    /// Manipulators the user may choose to apply.
    pub optional_manipulators: Vec<String>,
}

impl OptionsSpec {
    pub fn new(form: impl Into<String>) -> Self {
        Self {
            form: Some(form.into()),
            ..Self::default()
        }
    }

    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = Some(name.into());
        self
    }

    pub fn form_template(mut self, template: impl Into<String>) -> Self {
        self.form_template = Some(template.into());
        self
    }

    pub fn show_template(mut self, template: impl Into<String>) -> Self {
        self.show_template = Some(template.into());
        self
    }

    pub fn icon_url(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    pub fn link(mut self, link: LinkSpec) -> Self {
        self.links.push(link);
        self
    }

    pub fn links(mut self, links: impl IntoIterator<Item = LinkSpec>) -> Self {
        self.links.extend(links);
        self
    }

    pub fn disable_copy(mut self) -> Self {
        self.enable_copy = false;
        self
    }

    pub fn enable_kml(mut self, enabled: bool) -> Self {
        self.enable_kml = enabled;
        self
    }

    pub fn export_png(mut self, enabled: bool) -> Self {
        self.export_png = enabled;
        self
    }

    pub fn export_geojson(mut self, enabled: bool) -> Self {
        self.export_geojson = enabled;
        self
    }

    pub fn valid_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_children = Some(children.into_iter().map(Into::into).collect());
        self
    }

    pub fn manipulator(mut self, key: impl Into<String>) -> Self {
        self.manipulators.push(key.into());
        self
    }

    pub fn optional_manipulator(mut self, key: impl Into<String>) -> Self {
        self.optional_manipulators.push(key.into());
        self
    }
}

impl Default for OptionsSpec {
    fn default() -> Self {
        Self {
            form: None,
            verbose_name: None,
            form_template: None,
            form_context: serde_json::Map::new(),
            show_template: None,
            show_context: serde_json::Map::new(),
            icon_url: None,
            links: Vec::new(),
            enable_copy: true,
            enable_kml: true,
            export_png: true,
            export_geojson: true,
            valid_children: None,
            manipulators: Vec::new(),
            optional_manipulators: Vec::new(),
        }
    }
}

/// Turn a display string into a URL path segment.
///
/// Drops everything but ASCII word characters, whitespace and hyphens,
/// lowercases, then collapses runs of whitespace and hyphens into one hyphen.
pub fn slugify(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut pending_separator = false;
    for c in kept.trim().chars() {
        if c == '-' || c.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator && !slug.is_empty() {
            slug.push('-');
        }
        pending_separator = false;
        slug.push(c.to_ascii_lowercase());
    }
    slug
}
