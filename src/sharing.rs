//! Who shares what with whom.
//!
//! Sharing is a single global permission held by groups. An owner shares an
//! instance by adding it to one or more of those groups; every member of a
//! group then sees it. Groups listed in [`Settings::public_groups`] share with
//! everyone and [`Settings::staff_groups`] with staff only.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::models::{parse_uid, Group, Instance, User};
use crate::registry::Registry;
use crate::store::FeatureStore;

pub const SHARE_PERMISSION_CODENAME: &str = "can_share_features";
pub const SHARE_PERMISSION_NAME: &str = "Can Share Features";
/// The permission belongs to groups, not to any one feature class.
pub const SHARE_PERMISSION_CONTENT_TYPE: &str = "group";

#[derive(Debug, Error)]
pub enum SharingError {
    #[error("Sharing has not been enabled")]
    NotEnabled,

    #[error("Group {0} does not have permission to share features")]
    GroupCannotShare(String),

    #[error("You are not a member of group {0}")]
    NotAMember(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A group sharing with a user, and the distinct owners sharing through it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SharingGroup {
    pub group: Group,
    pub users: Vec<User>,
}

fn share_permission(store: &dyn FeatureStore) -> anyhow::Result<Option<i64>> {
    store.permission_id(SHARE_PERMISSION_CODENAME, SHARE_PERMISSION_CONTENT_TYPE)
}

/// Make sure the share permission exists and the public and staff groups
/// (plus `group`, if given) hold it. Safe to call any number of times.
pub fn enable_sharing(
    store: &dyn FeatureStore,
    settings: &Settings,
    group: Option<&str>,
) -> anyhow::Result<i64> {
    let permission = store.create_permission_if_absent(
        SHARE_PERMISSION_CODENAME,
        SHARE_PERMISSION_NAME,
        SHARE_PERMISSION_CONTENT_TYPE,
    )?;

    let names = settings
        .public_groups
        .iter()
        .chain(&settings.staff_groups)
        .map(String::as_str)
        .chain(group);
    for name in names {
        let group = store.get_or_create_group(name)?;
        store.grant_permission(group.id, permission)?;
        tracing::debug!("group {} may share features", group.name);
    }

    tracing::info!("sharing enabled");
    Ok(permission)
}

/// Groups `user` belongs to that may share, or `None` before sharing is enabled.
pub fn user_sharing_groups(
    store: &dyn FeatureStore,
    user: &User,
) -> anyhow::Result<Option<Vec<Group>>> {
    let Some(permission) = share_permission(store)? else {
        return Ok(None);
    };

    let mut groups = Vec::new();
    for group in store.user_groups(user.id)? {
        if store.group_has_permission(group.id, permission)? {
            groups.push(group);
        }
    }
    Ok(Some(groups))
}

/// Groups through which other users share features with `user`, keyed by
/// group name, with the distinct users sharing through each.
///
/// Public groups are skipped unless `include_public`; staff groups unless
/// `user` is staff. `None` when nobody shares anything with `user`.
pub fn groups_users_sharing_with(
    registry: &Registry,
    store: &dyn FeatureStore,
    settings: &Settings,
    user: &User,
    include_public: bool,
) -> anyhow::Result<Option<IndexMap<String, SharingGroup>>> {
    let Some(permission) = share_permission(store)? else {
        return Ok(None);
    };

    let groups: Vec<Group> = store
        .user_groups(user.id)?
        .into_iter()
        .filter(|g| include_public || !settings.is_public_group(&g.name))
        .filter(|g| user.is_staff || !settings.is_staff_group(&g.name))
        .collect();

    let mut sharing: IndexMap<String, SharingGroup> = IndexMap::new();
    for options in registry.models() {
        let shared = store.shared_with_user(options.model_uid(), user.id, permission)?;
        if shared.is_empty() {
            continue;
        }

        for group in &groups {
            let mut owners: Vec<i64> = Vec::new();
            for instance in &shared {
                if instance.owner_id == user.id || owners.contains(&instance.owner_id) {
                    continue;
                }
                let in_group = store
                    .sharing_groups(&instance.model_uid, instance.pk)?
                    .iter()
                    .any(|g| g.id == group.id);
                if in_group {
                    owners.push(instance.owner_id);
                }
            }
            if owners.is_empty() {
                continue;
            }

            let entry = sharing
                .entry(group.name.clone())
                .or_insert_with(|| SharingGroup {
                    group: group.clone(),
                    users: Vec::new(),
                });
            for owner in owners {
                if entry.users.iter().any(|u| u.id == owner) {
                    continue;
                }
                if let Some(owner) = store.get_user(owner)? {
                    entry.users.push(owner);
                }
            }
        }
    }

    Ok((!sharing.is_empty()).then_some(sharing))
}

/// Whether `user` may view `instance`: they own it, or it (or a collection
/// containing it) is shared into a group they may see.
pub fn can_user_view_instance(
    store: &dyn FeatureStore,
    settings: &Settings,
    user: &User,
    instance: &Instance,
) -> anyhow::Result<bool> {
    if instance.is_owned_by(user) {
        return Ok(true);
    }
    let Some(permission) = share_permission(store)? else {
        return Ok(false);
    };

    let mut current = instance.clone();
    let mut seen = vec![current.uid()];
    loop {
        for group in store.sharing_groups(&current.model_uid, current.pk)? {
            if !store.group_has_permission(group.id, permission)? {
                continue;
            }
            if settings.is_public_group(&group.name) {
                return Ok(true);
            }
            if user.in_group(&group.name) && (user.is_staff || !settings.is_staff_group(&group.name)) {
                return Ok(true);
            }
        }

        let Some(parent_uid) = current.collection.clone() else {
            return Ok(false);
        };
        if seen.contains(&parent_uid) {
            return Ok(false);
        }
        let Ok((model_uid, pk)) = parse_uid(&parent_uid) else {
            return Ok(false);
        };
        let Some(parent) = store.get_instance(model_uid, pk)? else {
            return Ok(false);
        };
        if parent.is_owned_by(user) {
            return Ok(true);
        }
        seen.push(parent_uid);
        current = parent;
    }
}

/// Replace the groups `instance` is shared with.
///
/// `user` must belong to every group, and each must hold the share permission.
pub fn share_with(
    store: &dyn FeatureStore,
    user: &User,
    instance: &Instance,
    group_ids: &[i64],
) -> Result<Vec<Group>, SharingError> {
    let available = user_sharing_groups(store, user)?.ok_or(SharingError::NotEnabled)?;

    let mut groups = Vec::new();
    for id in group_ids {
        if let Some(group) = available.iter().find(|g| g.id == *id) {
            groups.push(group.clone());
            continue;
        }
        // A group the user is in but cannot share through lacks the permission.
        let member = store.user_groups(user.id)?.into_iter().find(|g| g.id == *id);
        return Err(match member {
            Some(group) => SharingError::GroupCannotShare(group.name),
            None => SharingError::NotAMember(id.to_string()),
        });
    }

    store.set_sharing_groups(&instance.model_uid, instance.pk, group_ids)?;
    tracing::info!(
        "{} shared with {} group(s)",
        instance.uid(),
        groups.len()
    );
    Ok(groups)
}
