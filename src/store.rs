//! Persistence and permission collaborators the registry calls into.

use anyhow::Result;

use crate::models::{Group, Instance, User};

/// Storage of users, groups, permissions and feature instances.
///
/// [`crate::db::Database`] is the SQLite implementation. Get-or-create
/// operations must be idempotent when called concurrently.
pub trait FeatureStore: Send + Sync {
    fn get_user(&self, id: i64) -> Result<Option<User>>;

    fn get_user_by_name(&self, username: &str) -> Result<Option<User>>;

    /// Groups `user_id` belongs to, ordered by name.
    fn user_groups(&self, user_id: i64) -> Result<Vec<Group>>;

    fn permission_id(&self, codename: &str, content_type: &str) -> Result<Option<i64>>;

    /// Id of the permission, creating it on first use.
    fn create_permission_if_absent(
        &self,
        codename: &str,
        name: &str,
        content_type: &str,
    ) -> Result<i64>;

    fn get_or_create_group(&self, name: &str) -> Result<Group>;

    fn grant_permission(&self, group_id: i64, permission_id: i64) -> Result<()>;

    fn group_has_permission(&self, group_id: i64, permission_id: i64) -> Result<bool>;

    fn groups_with_permission(&self, permission_id: i64) -> Result<Vec<Group>>;

    fn get_instance(&self, model_uid: &str, pk: i64) -> Result<Option<Instance>>;

    fn instances_of(&self, model_uid: &str) -> Result<Vec<Instance>>;

    fn create_instance(&self, model_uid: &str, name: &str, owner_id: i64) -> Result<Instance>;

    /// Duplicate `instance` for `owner_id`, outside any collection.
    fn copy_instance(&self, instance: &Instance, owner_id: i64) -> Result<Instance>;

    fn delete_instance(&self, model_uid: &str, pk: i64) -> Result<bool>;

    /// Instances of `model_uid` owned by someone else and shared into a
    /// group `user_id` belongs to that holds `permission_id`.
    fn shared_with_user(
        &self,
        model_uid: &str,
        user_id: i64,
        permission_id: i64,
    ) -> Result<Vec<Instance>>;

    fn sharing_groups(&self, model_uid: &str, pk: i64) -> Result<Vec<Group>>;

    /// Replace the groups an instance is shared with.
    fn set_sharing_groups(&self, model_uid: &str, pk: i64, group_ids: &[i64]) -> Result<()>;

    fn set_collection(&self, model_uid: &str, pk: i64, collection: Option<&str>) -> Result<()>;

    /// Move every instance in `members` into `collection` in one
    /// transaction; either all of them move or none do.
    fn assign_collection(&self, members: &[Instance], collection: Option<&str>) -> Result<()>;

    /// Instances whose collection is `collection_uid`.
    fn children_of(&self, collection_uid: &str) -> Result<Vec<Instance>>;
}
