//! Hypermedia workspace documents.
//!
//! A workspace tells a client which feature classes exist, which URI
//! templates act on them and which links a given user may invoke.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::NotFound;
use crate::models::{LinkDocument, Rel, User};
use crate::registry::{FeatureOptions, Registry};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceDocument {
    #[serde(rename = "feature-classes")]
    pub feature_classes: Vec<FeatureClassDocument>,
    #[serde(rename = "generic-links")]
    pub generic_links: Vec<LinkDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureClassDocument {
    pub id: String,
    pub title: String,
    #[serde(rename = "link-relations")]
    pub link_relations: LinkRelations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionDocument>,
}

/// `self` and `create` are single templates; every other relation (`edit`,
/// `alternate`, `related`) is a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkRelations {
    #[serde(rename = "self")]
    pub self_link: LinkDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<LinkDocument>,
    #[serde(flatten)]
    pub rels: IndexMap<String, Vec<LinkDocument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionDocument {
    pub classes: Vec<String>,
    pub remove: LinkDocument,
    pub add: LinkDocument,
}

/// Project one feature class for `user`.
pub fn options_document(
    registry: &Registry,
    settings: &Settings,
    options: &FeatureOptions,
    user: &User,
    is_owner: bool,
) -> Result<FeatureClassDocument, NotFound> {
    let routes = registry.routes();
    let slug = options.slug();
    let uid = [("uid", "{uid}")];

    let self_link = LinkDocument::template(
        Some(settings.self_title.as_str()),
        routes.reverse(&format!("{slug}_resource"), &uid)?,
    );

    let mut rels: IndexMap<String, Vec<LinkDocument>> = IndexMap::new();
    let mut create = None;
    if is_owner {
        create = Some(LinkDocument::template(
            None,
            routes.reverse(&format!("{slug}_create_form"), &[])?,
        ));
        rels.insert(
            Rel::Edit.as_str().to_string(),
            vec![
                LinkDocument::template(
                    Some("Edit"),
                    routes.reverse(&format!("{slug}_update_form"), &uid)?,
                ),
                LinkDocument::template(
                    Some("Share"),
                    routes.reverse(&format!("{slug}_share_form"), &uid)?,
                ),
            ],
        );
    }

    for link in registry.links_of(options) {
        if link.is_generic() || !link.visible_to(user, is_owner) {
            continue;
        }
        if user.is_anonymous() && link.rel() == Rel::Edit {
            continue;
        }
        rels.entry(link.rel().as_str().to_string())
            .or_default()
            .push(link.document(routes)?);
    }

    let collection = if is_owner && registry.is_collection_model(options.model_uid()) {
        let args = [("uid", "{collection_uid}"), ("uids", "{uid+}")];
        Some(CollectionDocument {
            classes: registry.valid_child_uids(options),
            remove: LinkDocument::template(
                None,
                routes.reverse(&format!("{slug}_remove_features"), &args)?,
            ),
            add: LinkDocument::template(
                None,
                routes.reverse(&format!("{slug}_add_features"), &args)?,
            ),
        })
    } else {
        None
    };

    Ok(FeatureClassDocument {
        id: options.model_uid().to_string(),
        title: options.verbose_name().to_string(),
        link_relations: LinkRelations {
            self_link,
            create,
            rels,
        },
        collection,
    })
}

/// The workspace of `user`, for every registered class or only `models`
/// (given as model uids).
///
/// Generic links are listed once, outside any class; with `models` given,
/// only those applying to at least one of them. Anonymous users never see
/// edit links.
pub fn workspace_document(
    registry: &Registry,
    settings: &Settings,
    user: &User,
    is_owner: bool,
    models: Option<&[&str]>,
) -> Result<WorkspaceDocument, NotFound> {
    let selected: Vec<&FeatureOptions> = match models {
        Some(uids) => uids
            .iter()
            .map(|uid| registry.get_model_by_uid(uid))
            .collect::<Result<_, _>>()?,
        None => registry.models().collect(),
    };

    let feature_classes = selected
        .iter()
        .map(|options| options_document(registry, settings, options, user, is_owner))
        .collect::<Result<Vec<_>, _>>()?;

    let generic_links = registry
        .links()
        .iter()
        .filter(|l| l.is_generic() && l.visible_to(user, is_owner))
        .filter(|l| !(user.is_anonymous() && l.rel() == Rel::Edit))
        .filter(|l| models.map_or(true, |uids| uids.iter().any(|uid| l.applies_to(uid))))
        .map(|l| l.document(registry.routes()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WorkspaceDocument {
        feature_classes,
        generic_links,
    })
}

/// [`workspace_document`] as indented JSON.
pub fn workspace_json(
    registry: &Registry,
    settings: &Settings,
    user: &User,
    is_owner: bool,
    models: Option<&[&str]>,
) -> anyhow::Result<String> {
    let doc = workspace_document(registry, settings, user, is_owner, models)?;
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Stylesheet giving each feature class with an icon its tree icon.
pub fn feature_tree_css(registry: &Registry) -> String {
    let mut css = String::new();
    for options in registry.models() {
        let Some(icon) = options.icon_url() else {
            continue;
        };
        css.push_str(&format!(
            "li.{uid} > a > .jstree-icon,\nli.{uid} > .jstree-icon {{\n    background: url({icon}) 0 0 no-repeat !important;\n}}\n\n",
            uid = options.model_uid(),
            icon = icon,
        ));
    }
    css
}
