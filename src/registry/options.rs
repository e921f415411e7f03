//! Resolved, validated options of one registered feature class.

use crate::error::{ConfigurationError, NotFound};
use crate::models::{alternate, edit, slugify, FeatureClass, LinkSpec, ModelRef, OptionsSpec};
use crate::templates::TemplateSource;
use crate::views;

use super::{FormDescriptor, LinkId, LinkTable, Routes, SymbolTable};

pub const DEFAULT_FORM_TEMPLATE: &str = "features/form.html";

/// Shown when a feature class has no show template of its own.
pub const STUB_SHOW_TEMPLATE: &str = "features/show.html";

const DELETE_CONFIRM: &str = "Are you sure you want to delete this feature and it's contents?";

/// Properties of a feature class derived from its [`OptionsSpec`] and the
/// defaults. These drive routing, default links, sharing and containment.
#[derive(Debug, Clone)]
pub struct FeatureOptions {
    class: FeatureClass,
    model: ModelRef,
    verbose_name: String,
    form: String,
    form_template: String,
    form_context: serde_json::Map<String, serde_json::Value>,
    show_template: Option<String>,
    show_context: serde_json::Map<String, serde_json::Value>,
    icon_url: Option<String>,
    links: Vec<LinkId>,
    enable_copy: bool,
    enable_kml: bool,
    export_png: bool,
    export_geojson: bool,
    valid_children: Option<Vec<String>>,
    manipulators: Vec<String>,
    optional_manipulators: Vec<String>,
}

impl FeatureOptions {
    /// Build the options of `class`, creating its links in `links`.
    ///
    /// `links` is only changed when the whole class validates.
    pub fn new(
        class: &FeatureClass,
        symbols: &SymbolTable,
        links: &mut LinkTable,
    ) -> Result<Self, ConfigurationError> {
        let name = &class.name;

        if !class.is_feature() {
            return Err(ConfigurationError::NotAFeature {
                model: name.clone(),
            });
        }

        let spec = class
            .options
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingOptions {
                model: name.clone(),
            })?;

        let form = spec
            .form
            .clone()
            .ok_or_else(|| ConfigurationError::MissingForm {
                model: name.clone(),
            })?;
        resolve_form(name, &form, symbols)?;

        let model = ModelRef {
            uid: class.model_uid(),
            slug: slugify(name),
        };

        let mut scratch = links.clone();
        let ids = create_links(spec, symbols, &mut scratch)?;

        if spec.valid_children.as_ref().is_some_and(|c| !c.is_empty()) && !class.is_collection() {
            return Err(ConfigurationError::ChildrenOnNonCollection {
                model: name.clone(),
            });
        }

        for key in spec.manipulators.iter().chain(&spec.optional_manipulators) {
            check_manipulator(class, key, symbols)?;
        }

        for id in &ids {
            scratch.attach_model(*id, model.clone());
        }
        *links = scratch;

        Ok(Self {
            class: class.clone(),
            model,
            verbose_name: spec.verbose_name.clone().unwrap_or_else(|| name.clone()),
            form,
            form_template: spec
                .form_template
                .clone()
                .unwrap_or_else(|| DEFAULT_FORM_TEMPLATE.to_string()),
            form_context: spec.form_context.clone(),
            show_template: spec.show_template.clone(),
            show_context: spec.show_context.clone(),
            icon_url: spec.icon_url.clone(),
            links: ids,
            enable_copy: spec.enable_copy,
            enable_kml: spec.enable_kml,
            export_png: spec.export_png,
            export_geojson: spec.export_geojson,
            valid_children: spec.valid_children.clone(),
            manipulators: spec.manipulators.clone(),
            optional_manipulators: spec.optional_manipulators.clone(),
        })
    }

    pub fn class(&self) -> &FeatureClass {
        &self.class
    }

    /// Class name, e.g. `Mpa`.
    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn model_ref(&self) -> &ModelRef {
        &self.model
    }

    pub fn model_uid(&self) -> &str {
        &self.model.uid
    }

    /// Used in every URL path of this class and in its links' route names.
    pub fn slug(&self) -> &str {
        &self.model.slug
    }

    pub fn verbose_name(&self) -> &str {
        &self.verbose_name
    }

    pub fn is_collection(&self) -> bool {
        self.class.is_collection()
    }

    /// Symbol key of the form editing this class.
    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn form_class<'a>(&self, symbols: &'a SymbolTable) -> Result<&'a FormDescriptor, ConfigurationError> {
        resolve_form(self.name(), &self.form, symbols)
    }

    pub fn form_template(&self) -> &str {
        &self.form_template
    }

    pub fn form_context(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.form_context
    }

    pub fn show_context(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.show_context
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref()
    }

    /// Links of this class in presentation order.
    pub fn link_ids(&self) -> &[LinkId] {
        &self.links
    }

    pub fn enable_copy(&self) -> bool {
        self.enable_copy
    }

    pub fn enable_kml(&self) -> bool {
        self.enable_kml
    }

    pub fn export_png(&self) -> bool {
        self.export_png
    }

    pub fn export_geojson(&self) -> bool {
        self.export_geojson
    }

    /// Declared child model paths; see [`Registry::get_valid_children`](super::Registry::get_valid_children).
    pub fn valid_children(&self) -> Option<&[String]> {
        self.valid_children.as_deref()
    }

    pub fn manipulators(&self) -> &[String] {
        &self.manipulators
    }

    pub fn optional_manipulators(&self) -> &[String] {
        &self.optional_manipulators
    }

    /// Template rendering an instance's attributes.
    ///
    /// The configured template, or `{slug}/show.html`, when `templates` has
    /// it; otherwise the stub documenting how to override it.
    pub fn show_template(&self, templates: &dyn TemplateSource) -> String {
        let template = self
            .show_template
            .clone()
            .unwrap_or_else(|| format!("{}/show.html", self.slug()));
        if templates.has_template(&template) {
            template
        } else {
            STUB_SHOW_TEMPLATE.to_string()
        }
    }

    pub fn instance_uid(&self, pk: i64) -> String {
        format!("{}_{}", self.model_uid(), pk)
    }

    pub fn get_create_form(&self, routes: &Routes) -> Result<String, NotFound> {
        routes.reverse(&format!("{}_create_form", self.slug()), &[])
    }

    pub fn get_update_form(&self, routes: &Routes, pk: i64) -> Result<String, NotFound> {
        self.instance_route(routes, "update_form", pk)
    }

    pub fn get_share_form(&self, routes: &Routes, pk: i64) -> Result<String, NotFound> {
        self.instance_route(routes, "share_form", pk)
    }

    /// Primary URL of an instance; supports GET and DELETE.
    pub fn get_resource(&self, routes: &Routes, pk: i64) -> Result<String, NotFound> {
        self.instance_route(routes, "resource", pk)
    }

    fn instance_route(&self, routes: &Routes, purpose: &str, pk: i64) -> Result<String, NotFound> {
        routes.reverse(
            &format!("{}_{}", self.slug(), purpose),
            &[("uid", &self.instance_uid(pk))],
        )
    }
}

/// Explicit links first, then the defaults, so the table sees declarations
/// in the order the class states them.
fn create_links(
    spec: &OptionsSpec,
    symbols: &SymbolTable,
    links: &mut LinkTable,
) -> Result<Vec<LinkId>, ConfigurationError> {
    let mut create = |spec: LinkSpec| links.create_link(spec, symbols);

    let explicit = spec
        .links
        .iter()
        .cloned()
        .map(&mut create)
        .collect::<Result<Vec<_>, _>>()?;

    let copy = spec
        .enable_copy
        .then(|| {
            create(
                edit("Copy", views::COPY_VIEW)
                    .select("multiple single")
                    .edits_original(false),
            )
        })
        .transpose()?;

    let delete = create(
        edit("Delete", views::DELETE_VIEW)
            .select("multiple single")
            .method("DELETE")
            .edits_original(true)
            .confirm(DELETE_CONFIRM),
    )?;

    let png = spec
        .export_png
        .then(|| {
            create(
                alternate("PNG Image", views::PNG_VIEW)
                    .select("multiple single")
                    .method("GET"),
            )
        })
        .transpose()?;

    let geojson = spec
        .export_geojson
        .then(|| {
            create(
                alternate("GeoJSON", views::GEOJSON_VIEW)
                    .select("multiple single")
                    .method("GET"),
            )
        })
        .transpose()?;

    let (kml, kmz) = if spec.enable_kml {
        let kml = create(alternate("KML", views::KML_VIEW).select("multiple single"))?;
        let kmz = create(alternate("KMZ", views::KMZ_VIEW).select("multiple single"))?;
        (Some(kml), Some(kmz))
    } else {
        (None, None)
    };

    let mut ids: Vec<LinkId> = Vec::new();
    let ordered = [kmz, kml, geojson, png, Some(delete)]
        .into_iter()
        .flatten()
        .chain(explicit)
        .chain(copy);
    for id in ordered {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn resolve_form<'a>(
    model: &str,
    form: &str,
    symbols: &'a SymbolTable,
) -> Result<&'a FormDescriptor, ConfigurationError> {
    let descriptor = symbols
        .resolve_form(form)
        .ok_or_else(|| ConfigurationError::UnresolvedForm {
            model: model.to_string(),
            form: form.to_string(),
        })?;
    if !descriptor.feature_form {
        return Err(ConfigurationError::NotAFeatureForm {
            model: model.to_string(),
            form: form.to_string(),
        });
    }
    Ok(descriptor)
}

fn check_manipulator(
    class: &FeatureClass,
    key: &str,
    symbols: &SymbolTable,
) -> Result<(), ConfigurationError> {
    let manipulator =
        symbols
            .resolve_manipulator(key)
            .ok_or_else(|| ConfigurationError::UnresolvedManipulator {
                manipulator: key.to_string(),
            })?;

    let supported = manipulator
        .supported_geom_fields
        .as_ref()
        .ok_or_else(|| ConfigurationError::ManipulatorWithoutGeometries {
            manipulator: key.to_string(),
        })?;

    let geometry = class
        .geometry
        .ok_or_else(|| ConfigurationError::NoGeometryField {
            model: class.name.clone(),
            manipulator: key.to_string(),
        })?;

    if !supported.contains(&geometry) {
        return Err(ConfigurationError::UnsupportedGeometry {
            manipulator: key.to_string(),
            field: geometry.field_name().to_string(),
            supported: supported
                .iter()
                .map(|g| g.field_name())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(())
}
