//! Link views and the dispatcher that invokes them.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::config::Settings;
use crate::error::NotFound;
use crate::models::{ExtraArgs, Instance, Link, Rel, Select, User, View};
use crate::registry::{Registry, SymbolTable};
use crate::sharing;
use crate::store::FeatureStore;

pub const COPY_VIEW: &str = "features.views.copy";
pub const DELETE_VIEW: &str = "features.views.multi_delete";
pub const PNG_VIEW: &str = "staticmap.views.staticmap_link";
pub const GEOJSON_VIEW: &str = "features.views.geojson_link";
pub const KML_VIEW: &str = "features.views.kml";
pub const KMZ_VIEW: &str = "features.views.kmz";

/// What a view gets to know about the request invoking it.
#[derive(Clone)]
pub struct RequestContext {
    pub user: User,
    pub method: String,
    pub store: Arc<dyn FeatureStore>,
    pub settings: Arc<Settings>,
}

impl RequestContext {
    pub fn new(user: User, method: impl Into<String>, store: Arc<dyn FeatureStore>, settings: Arc<Settings>) -> Self {
        Self {
            user,
            method: method.into(),
            store,
            settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// Sent as an attachment under this name when set.
    pub filename: Option<String>,
}

impl ViewResponse {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into(),
            filename: None,
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: value.to_string(),
            filename: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("Invalid http method. This link expects {0}")]
    MethodNotAllowed(String),

    #[error("{0} is not available on this server")]
    NotImplemented(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ViewResult = Result<ViewResponse, ViewError>;

/// Add the views behind the default links to `symbols`.
pub fn register_builtins(symbols: SymbolTable) -> SymbolTable {
    symbols
        .view(COPY_VIEW, View::Multiple(copy))
        .view(DELETE_VIEW, View::Multiple(multi_delete))
        .view(PNG_VIEW, View::Multiple(staticmap_link))
        .view(GEOJSON_VIEW, View::Multiple(geojson_link))
        .view(KML_VIEW, View::Multiple(kml))
        .view(KMZ_VIEW, View::Multiple(kmz))
}

/// Invoke `link` on the comma-separated `uids`.
///
/// Every instance must exist and belong to a class the link applies to.
/// Edit links need a signed-in user; links that must be owned need every
/// instance to be owned by them; anything else needs it to be viewable.
pub fn handle_link(registry: &Registry, ctx: &RequestContext, link: &Link, uids: &str) -> ViewResult {
    if !ctx.method.eq_ignore_ascii_case(link.method()) {
        return Err(ViewError::MethodNotAllowed(link.method().to_string()));
    }

    let uids: Vec<&str> = uids.split(',').filter(|u| !u.is_empty()).collect();
    if uids.is_empty() {
        return Err(ViewError::BadRequest("No features specified".to_string()));
    }
    if link.select() == Select::Single && uids.len() > 1 {
        return Err(ViewError::BadRequest(format!(
            "{} applies to a single feature",
            link.title()
        )));
    }

    if link.rel() == Rel::Edit && ctx.user.is_anonymous() {
        return Err(ViewError::Forbidden("You must be logged in".to_string()));
    }

    let mut instances = Vec::with_capacity(uids.len());
    for uid in uids {
        let instance = registry.get_feature_by_uid(ctx.store.as_ref(), uid)?;
        if !link.applies_to(&instance.model_uid) {
            return Err(ViewError::BadRequest(format!(
                "{} cannot be applied to {}",
                link.title(),
                uid
            )));
        }

        let is_owner = instance.is_owned_by(&ctx.user);
        if !link.visible_to(&ctx.user, is_owner) {
            tracing::warn!("{} may not invoke {} on {}", ctx.user.username, link, uid);
            return Err(ViewError::Forbidden(format!(
                "You do not have permission to use {} on {}",
                link.title(),
                uid
            )));
        }
        if !is_owner
            && !sharing::can_user_view_instance(ctx.store.as_ref(), &ctx.settings, &ctx.user, &instance)?
        {
            return Err(ViewError::Forbidden(format!(
                "You do not have permission to view {}",
                uid
            )));
        }
        instances.push(instance);
    }

    match link.view() {
        View::Single(view) => view(ctx, &instances[0], link.extra_args()),
        View::Multiple(view) => view(ctx, &instances, link.extra_args()),
    }
}

fn copy(ctx: &RequestContext, instances: &[Instance], _: &ExtraArgs) -> ViewResult {
    let mut copied = Vec::with_capacity(instances.len());
    for instance in instances {
        let copy = ctx.store.copy_instance(instance, ctx.user.id)?;
        tracing::debug!("copied {} to {}", instance.uid(), copy.uid());
        copied.push(copy.uid());
    }
    Ok(ViewResponse::json(&json!({ "copied": copied })).with_status(201))
}

fn multi_delete(ctx: &RequestContext, instances: &[Instance], _: &ExtraArgs) -> ViewResult {
    let mut deleted = Vec::new();
    for instance in instances {
        for uid in delete_with_contents(ctx.store.as_ref(), instance.clone())? {
            if !deleted.contains(&uid) {
                deleted.push(uid);
            }
        }
    }
    Ok(ViewResponse::json(&json!({ "deleted": deleted })))
}

/// Delete `instance` and, for collections, everything inside it. Returns the
/// uids actually removed.
pub fn delete_with_contents(store: &dyn FeatureStore, instance: Instance) -> anyhow::Result<Vec<String>> {
    let mut deleted = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut pending = vec![instance];
    while let Some(instance) = pending.pop() {
        let uid = instance.uid();
        if !seen.insert(uid.clone()) {
            continue;
        }
        pending.extend(store.children_of(&uid)?);
        if store.delete_instance(&instance.model_uid, instance.pk)? {
            deleted.push(uid);
        }
    }
    Ok(deleted)
}

fn geojson_link(_: &RequestContext, instances: &[Instance], extra: &ExtraArgs) -> ViewResult {
    let features: Vec<serde_json::Value> = instances
        .iter()
        .map(|i| {
            json!({
                "type": "Feature",
                "id": i.uid(),
                "geometry": null,
                "properties": {
                    "uid": i.uid(),
                    "name": i.name,
                    "model": i.model_uid,
                    "collection": i.collection,
                },
            })
        })
        .collect();

    let mut doc = json!({ "type": "FeatureCollection", "features": features });
    if let Some(srid) = extra.srid {
        doc["crs"] = json!({ "type": "name", "properties": { "name": format!("EPSG:{srid}") } });
    }
    Ok(ViewResponse::json(&doc)
        .with_filename(download_name(instances, extra, "geojson")))
}

fn kml(_: &RequestContext, instances: &[Instance], extra: &ExtraArgs) -> ViewResult {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n",
    );
    for instance in instances {
        body.push_str(&format!(
            "  <Placemark id=\"{}\">\n    <name>{}</name>\n  </Placemark>\n",
            xml_escape(&instance.uid()),
            xml_escape(&instance.name)
        ));
    }
    body.push_str("</Document>\n</kml>\n");

    Ok(ViewResponse::text(body)
        .with_content_type("application/vnd.google-earth.kml+xml")
        .with_filename(download_name(instances, extra, "kml")))
}

fn kmz(_: &RequestContext, _: &[Instance], _: &ExtraArgs) -> ViewResult {
    Err(ViewError::NotImplemented("KMZ export".to_string()))
}

fn staticmap_link(_: &RequestContext, _: &[Instance], _: &ExtraArgs) -> ViewResult {
    Err(ViewError::NotImplemented("PNG export".to_string()))
}

fn download_name(instances: &[Instance], extra: &ExtraArgs, extension: &str) -> Option<String> {
    if let Some(filename) = &extra.filename {
        return Some(filename.clone());
    }
    match instances {
        [single] => Some(format!("{}.{}", crate::models::slugify(&single.name), extension)),
        _ => Some(format!("features.{}", extension)),
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
