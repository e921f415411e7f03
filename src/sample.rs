//! A small marine-planning catalog of feature classes.
//!
//! Used by the `featreg` binary when no host application supplies its own
//! classes, and by the test suites as a realistic registry.
//!
//! ```text
//! Folder ─┬─ Folder
//!         ├─ Array ── Mpa
//!         ├─ Mpa
//!         ├─ Pipeline
//!         └─ Shipwreck
//! ```

use serde_json::json;

use crate::error::ConfigurationError;
use crate::models::{
    alternate, related, ExtraArgs, FeatureClass, GeometryType, Instance, OptionsSpec,
};
use crate::registry::{FormDescriptor, ManipulatorDescriptor, Registry, RegistryBuilder, SymbolTable};
use crate::views::{RequestContext, ViewResponse, ViewResult};

pub const APP_LABEL: &str = "marine";

pub const SUMMARY_VIEW: &str = "marine.views.summary";
pub const REPORT_VIEW: &str = "marine.views.report";
pub const CLIP_TO_GRATICULE: &str = "marine.manipulators.ClipToGraticule";

/// Group allowed to request habitat reports.
pub const ANALYSTS_GROUP: &str = "Analysts";

/// Views, forms and manipulators the catalog refers to, plus the built-in views.
pub fn symbols() -> SymbolTable {
    SymbolTable::with_builtin_views()
        .view(SUMMARY_VIEW, crate::models::View::Multiple(summary))
        .view(REPORT_VIEW, crate::models::View::Single(report))
        .form("marine.forms.MpaForm", FormDescriptor::for_model("marine.Mpa"))
        .form("marine.forms.PipelineForm", FormDescriptor::for_model("marine.Pipeline"))
        .form("marine.forms.ShipwreckForm", FormDescriptor::for_model("marine.Shipwreck"))
        .form("marine.forms.ArrayForm", FormDescriptor::for_model("marine.Array"))
        .form("marine.forms.FolderForm", FormDescriptor::for_model("marine.Folder"))
        .manipulator(
            CLIP_TO_GRATICULE,
            ManipulatorDescriptor::supporting([GeometryType::Polygon, GeometryType::MultiPolygon]),
        )
        .model(FeatureClass::plain("auth", "Group"))
}

fn summary_link() -> crate::models::LinkSpec {
    related("Summary", SUMMARY_VIEW).select("multiple single")
}

/// Feature classes in registration order.
pub fn classes() -> Vec<FeatureClass> {
    vec![
        FeatureClass::feature(APP_LABEL, "Mpa")
            .geometry(GeometryType::Polygon)
            .options(
                OptionsSpec::new("marine.forms.MpaForm")
                    .verbose_name("Marine Protected Area")
                    .show_template("mpa/show.html")
                    .icon_url("/media/marine/img/mpa.png")
                    .link(summary_link())
                    .link(
                        alternate("Habitat Report", REPORT_VIEW)
                            .limit_to_groups([ANALYSTS_GROUP]),
                    )
                    .manipulator(CLIP_TO_GRATICULE),
            ),
        FeatureClass::feature(APP_LABEL, "Pipeline")
            .geometry(GeometryType::LineString)
            .options(
                OptionsSpec::new("marine.forms.PipelineForm")
                    .icon_url("/media/marine/img/pipeline.png")
                    .enable_kml(false)
                    .export_png(false),
            ),
        FeatureClass::feature(APP_LABEL, "Shipwreck")
            .geometry(GeometryType::Point)
            .options(
                OptionsSpec::new("marine.forms.ShipwreckForm")
                    .link(summary_link())
                    .link(alternate("GeoJSON (WGS84)", crate::views::GEOJSON_VIEW)
                        .select("multiple single")
                        .slug("geojson-wgs84")
                        .extra_args(ExtraArgs {
                            srid: Some(4326),
                            filename: None,
                        })),
            ),
        FeatureClass::collection(APP_LABEL, "Array").options(
            OptionsSpec::new("marine.forms.ArrayForm")
                .icon_url("/media/marine/img/array.png")
                .valid_children(["marine.Mpa"]),
        ),
        FeatureClass::collection(APP_LABEL, "Folder").options({
            let mut options = OptionsSpec::new("marine.forms.FolderForm")
                .icon_url("/media/marine/img/folder.png")
                .disable_copy()
                .valid_children([
                    "marine.Mpa",
                    "marine.Array",
                    "marine.Pipeline",
                    "marine.Shipwreck",
                    "marine.Folder",
                ]);
            options
                .form_context
                .insert("hint".to_string(), json!("Folders may be nested"));
            options
        }),
    ]
}

/// The catalog registry, with routes mounted under `prefix`.
pub fn registry(prefix: &str) -> Result<Registry, ConfigurationError> {
    RegistryBuilder::new(symbols())
        .url_prefix(prefix)
        .register_all(classes())?
        .build()
}

fn summary(_: &RequestContext, instances: &[Instance], _: &ExtraArgs) -> ViewResult {
    let mut body = String::new();
    for instance in instances {
        body.push_str(&format!("{}\t{}\n", instance.uid(), instance.name));
    }
    Ok(ViewResponse::text(body))
}

fn report(ctx: &RequestContext, instance: &Instance, _: &ExtraArgs) -> ViewResult {
    let contents = ctx.store.children_of(&instance.uid())?.len();
    Ok(ViewResponse::json(&json!({
        "uid": instance.uid(),
        "name": instance.name,
        "requested_by": ctx.user.username,
        "contents": contents,
    })))
}
