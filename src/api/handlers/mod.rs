use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::NotFound;
use crate::models::{parse_uid, Group, Instance, InstanceDocument, User};
use crate::registry::FeatureOptions;
use crate::sharing::{self, SharingError};
use crate::views::{self, RequestContext, ViewError, ViewResponse};
use crate::workspace::{self, WorkspaceDocument};

use super::{AppState, CurrentUser};

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side for debugging, but clients only
/// see a generic message to avoid leaking internal details.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn not_found(e: NotFound) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, e.to_string())
}

fn view_error(e: ViewError) -> (StatusCode, String) {
    let status = match &e {
        ViewError::Forbidden(_) => StatusCode::FORBIDDEN,
        ViewError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ViewError::NotFound(_) => StatusCode::NOT_FOUND,
        ViewError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        ViewError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        ViewError::Store(e) => return internal_error(e),
    };
    tracing::warn!("Rejected request: {}", e);
    (status, e.to_string())
}

fn sharing_error(e: SharingError) -> (StatusCode, String) {
    match e {
        SharingError::Store(e) => internal_error(e),
        e @ SharingError::NotEnabled => (StatusCode::CONFLICT, e.to_string()),
        other => {
            tracing::warn!("Rejected share: {}", other);
            (StatusCode::BAD_REQUEST, other.to_string())
        }
    }
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, String) {
    let msg = msg.into();
    tracing::warn!("Validation error: {}", msg);
    (StatusCode::BAD_REQUEST, msg)
}

// ============================================================
// Lookups and permission checks
// ============================================================

fn model_for_slug<'a>(state: &'a AppState, slug: &str) -> ApiResult<&'a FeatureOptions> {
    state
        .registry
        .model_by_slug(slug)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No feature class `{}`", slug)))
}

/// Load `uid`, which must be an instance of `options`.
fn load_instance(state: &AppState, options: &FeatureOptions, uid: &str) -> ApiResult<Instance> {
    let (model_uid, _) = parse_uid(uid).map_err(not_found)?;
    if model_uid != options.model_uid() {
        return Err(not_found(NotFound::Instance(uid.to_string())));
    }
    state
        .registry
        .get_feature_by_uid(state.store.as_ref(), uid)
        .map_err(view_error)
}

fn require_login(user: &User) -> ApiResult<()> {
    if user.is_anonymous() {
        return Err((StatusCode::UNAUTHORIZED, "You must be logged in".to_string()));
    }
    Ok(())
}

fn require_owner(user: &User, instance: &Instance) -> ApiResult<()> {
    require_login(user)?;
    if !instance.is_owned_by(user) {
        tracing::warn!("{} does not own {}", user.username, instance.uid());
        return Err((
            StatusCode::FORBIDDEN,
            format!("You do not have permission to edit {}", instance.uid()),
        ));
    }
    Ok(())
}

fn require_viewable(state: &AppState, user: &User, instance: &Instance) -> ApiResult<()> {
    let viewable =
        sharing::can_user_view_instance(state.store.as_ref(), &state.settings, user, instance)
            .map_err(internal_error)?;
    if !viewable {
        return Err((
            StatusCode::FORBIDDEN,
            format!("You do not have permission to view {}", instance.uid()),
        ));
    }
    Ok(())
}

fn instance_document(state: &AppState, options: &FeatureOptions, instance: Instance) -> InstanceDocument {
    InstanceDocument {
        uid: instance.uid(),
        name: instance.name,
        model: instance.model_uid,
        owner_id: instance.owner_id,
        collection: instance.collection,
        show_template: options.show_template(state.templates.as_ref()),
        created_at: instance.created_at,
        updated_at: instance.updated_at,
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Forms and resources
// ============================================================

/// What a client needs to render the form of a feature class.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormDocument {
    pub model: String,
    pub form: String,
    pub template: String,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceDocument>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFeatureInput {
    pub name: String,
}

fn form_document(
    options: &FeatureOptions,
    action: String,
    instance: Option<InstanceDocument>,
) -> FormDocument {
    FormDocument {
        model: options.model_uid().to_string(),
        form: options.form().to_string(),
        template: options.form_template().to_string(),
        context: options.form_context().clone(),
        action,
        instance,
    }
}

pub async fn create_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<FormDocument>> {
    require_login(&user)?;
    let options = model_for_slug(&state, &slug)?;
    let action = options
        .get_create_form(state.registry.routes())
        .map_err(not_found)?;
    Ok(Json(form_document(options, action, None)))
}

pub async fn create_feature(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(input): Json<CreateFeatureInput>,
) -> ApiResult<(StatusCode, Json<InstanceDocument>)> {
    require_login(&user)?;
    let options = model_for_slug(&state, &slug)?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(bad_request("name is required"));
    }

    let instance = state
        .store
        .create_instance(options.model_uid(), name, user.id)
        .map_err(internal_error)?;
    tracing::info!("{} created {}", user.username, instance.uid());
    Ok((
        StatusCode::CREATED,
        Json(instance_document(&state, options, instance)),
    ))
}

pub async fn resource(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid)): Path<(String, String)>,
) -> ApiResult<Json<InstanceDocument>> {
    let options = model_for_slug(&state, &slug)?;
    let instance = load_instance(&state, options, &uid)?;
    require_viewable(&state, &user, &instance)?;
    Ok(Json(instance_document(&state, options, instance)))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let options = model_for_slug(&state, &slug)?;
    let instance = load_instance(&state, options, &uid)?;
    require_owner(&user, &instance)?;

    let deleted = views::delete_with_contents(state.store.as_ref(), instance).map_err(internal_error)?;
    tracing::info!("{} deleted {}", user.username, deleted.join(", "));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid)): Path<(String, String)>,
) -> ApiResult<Json<FormDocument>> {
    let options = model_for_slug(&state, &slug)?;
    let instance = load_instance(&state, options, &uid)?;
    require_owner(&user, &instance)?;

    let action = options
        .get_update_form(state.registry.routes(), instance.pk)
        .map_err(not_found)?;
    let instance = instance_document(&state, options, instance);
    Ok(Json(form_document(options, action, Some(instance))))
}

// ============================================================
// Sharing
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareDocument {
    pub uid: String,
    pub shared_with: Vec<Group>,
    /// Groups the requesting user may share through.
    pub available: Vec<Group>,
}

#[derive(Debug, Deserialize)]
pub struct ShareInput {
    pub groups: Vec<i64>,
}

fn share_document(state: &AppState, user: &User, instance: &Instance) -> ApiResult<ShareDocument> {
    let shared_with = state
        .store
        .sharing_groups(&instance.model_uid, instance.pk)
        .map_err(internal_error)?;
    let available = sharing::user_sharing_groups(state.store.as_ref(), user)
        .map_err(internal_error)?
        .unwrap_or_default();
    Ok(ShareDocument {
        uid: instance.uid(),
        shared_with,
        available,
    })
}

pub async fn share_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid)): Path<(String, String)>,
) -> ApiResult<Json<ShareDocument>> {
    let options = model_for_slug(&state, &slug)?;
    let instance = load_instance(&state, options, &uid)?;
    require_owner(&user, &instance)?;
    share_document(&state, &user, &instance).map(Json)
}

pub async fn share(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid)): Path<(String, String)>,
    Json(input): Json<ShareInput>,
) -> ApiResult<Json<ShareDocument>> {
    let options = model_for_slug(&state, &slug)?;
    let instance = load_instance(&state, options, &uid)?;
    require_owner(&user, &instance)?;

    sharing::share_with(state.store.as_ref(), &user, &instance, &input.groups)
        .map_err(sharing_error)?;
    share_document(&state, &user, &instance).map(Json)
}

// ============================================================
// Collections
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionMembers {
    pub collection: String,
    pub children: Vec<String>,
}

pub async fn add_features(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid, uids)): Path<(String, String, String)>,
) -> ApiResult<Json<CollectionMembers>> {
    manage_collection(&state, &user, &slug, &uid, &uids, true).map(Json)
}

pub async fn remove_features(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((slug, uid, uids)): Path<(String, String, String)>,
) -> ApiResult<Json<CollectionMembers>> {
    manage_collection(&state, &user, &slug, &uid, &uids, false).map(Json)
}

fn manage_collection(
    state: &AppState,
    user: &User,
    slug: &str,
    collection_uid: &str,
    uids: &str,
    add: bool,
) -> ApiResult<CollectionMembers> {
    let options = model_for_slug(state, slug)?;
    if !state.registry.is_collection_model(options.model_uid()) {
        return Err(not_found(NotFound::Model(options.model_uid().to_string())));
    }
    let collection = load_instance(state, options, collection_uid)?;
    require_owner(user, &collection)?;

    let allowed = state.registry.valid_child_uids(options);
    let ancestors = ancestors(state, &collection)?;

    let mut members: Vec<Instance> = Vec::new();
    for uid in uids.split(',').filter(|u| !u.is_empty()) {
        let child = state
            .registry
            .get_feature_by_uid(state.store.as_ref(), uid)
            .map_err(view_error)?;
        require_owner(user, &child)?;

        if add {
            if !allowed.contains(&child.model_uid) {
                return Err(bad_request(format!(
                    "{} cannot contain {}",
                    options.verbose_name(),
                    child.model_uid
                )));
            }
            if child.uid() == collection_uid || ancestors.contains(&child.uid()) {
                return Err(bad_request(format!("{} cannot contain itself", uid)));
            }
        } else if child.collection.as_deref() != Some(collection_uid) {
            return Err(bad_request(format!("{} is not in {}", uid, collection_uid)));
        }
        members.push(child);
    }

    // nothing is written until every uid has been accepted
    let target = add.then_some(collection_uid);
    state
        .store
        .assign_collection(&members, target)
        .map_err(internal_error)?;

    let children = state
        .store
        .children_of(collection_uid)
        .map_err(internal_error)?
        .iter()
        .map(Instance::uid)
        .collect();
    Ok(CollectionMembers {
        collection: collection_uid.to_string(),
        children,
    })
}

/// Uids of the collections containing `instance`, innermost first.
fn ancestors(state: &AppState, instance: &Instance) -> ApiResult<Vec<String>> {
    let mut uids: Vec<String> = Vec::new();
    let mut next = instance.collection.clone();
    while let Some(uid) = next {
        if uids.contains(&uid) {
            break;
        }
        next = match state.registry.get_feature_by_uid(state.store.as_ref(), &uid) {
            Ok(parent) => parent.collection,
            Err(ViewError::NotFound(_)) => None,
            Err(e) => return Err(view_error(e)),
        };
        uids.push(uid);
    }
    Ok(uids)
}

// ============================================================
// Links
// ============================================================

pub async fn invoke_link(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    method: Method,
    Path((slug, link, uids)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let link = state
        .registry
        .link_by_route(&slug, &link)
        .ok_or_else(|| not_found(NotFound::Route(format!("{}-{}", slug, link))))?;

    let ctx = RequestContext::new(
        user,
        method.as_str(),
        state.store.clone(),
        state.settings.clone(),
    );
    let response = views::handle_link(&state.registry, &ctx, link, &uids).map_err(view_error)?;
    Ok(view_response(response))
}

fn view_response(r: ViewResponse) -> Response {
    let status = StatusCode::from_u16(r.status).unwrap_or(StatusCode::OK);
    let mut response = (status, [(header::CONTENT_TYPE, r.content_type)], r.body).into_response();
    if let Some(filename) = r.filename {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

// ============================================================
// Workspaces
// ============================================================

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    /// Comma-separated model uids to scope the document to.
    pub models: Option<String>,
}

fn workspace_for(
    state: &AppState,
    user: &User,
    is_owner: bool,
    query: &WorkspaceQuery,
) -> ApiResult<Json<WorkspaceDocument>> {
    let models: Option<Vec<&str>> = query
        .models
        .as_deref()
        .map(|m| m.split(',').filter(|s| !s.is_empty()).collect());
    workspace::workspace_document(
        &state.registry,
        &state.settings,
        user,
        is_owner,
        models.as_deref(),
    )
    .map(Json)
    .map_err(not_found)
}

fn require_same_user(user: &User, username: &str) -> ApiResult<()> {
    require_login(user)?;
    if user.username != username {
        tracing::warn!("{} requested the workspace of {}", user.username, username);
        return Err((
            StatusCode::FORBIDDEN,
            "You can only view your own workspace".to_string(),
        ));
    }
    Ok(())
}

pub async fn workspace_owner(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<WorkspaceDocument>> {
    require_same_user(&user, &username)?;
    workspace_for(&state, &user, true, &query)
}

pub async fn workspace_shared(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<WorkspaceDocument>> {
    require_same_user(&user, &username)?;
    workspace_for(&state, &user, false, &query)
}

pub async fn workspace_public(
    State(state): State<AppState>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<WorkspaceDocument>> {
    workspace_for(&state, &User::anonymous(), false, &query)
}

pub async fn feature_tree_css(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css")],
        workspace::feature_tree_css(&state.registry),
    )
}
