use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotFound;

/// Id carried by the anonymous user. Stored users start at 1.
pub const ANONYMOUS_USER_ID: i64 = 0;

/// A user as seen by link visibility and sharing checks.
///
/// `groups` holds the names of every group the user belongs to; group names
/// are unique in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub groups: Vec<String>,
}

impl User {
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_USER_ID,
            username: String::new(),
            is_staff: false,
            groups: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_USER_ID
    }

    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }
}

/// A user group. Sharing happens through groups holding the share permission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// A stored feature instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub pk: i64,
    pub model_uid: String,
    pub name: String,
    pub owner_id: i64,
    /// Uid of the collection instance containing this one, if any.
    pub collection: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Stable string identifier, `{model_uid}_{pk}`.
    pub fn uid(&self) -> String {
        format!("{}_{}", self.model_uid, self.pk)
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        !user.is_anonymous() && self.owner_id == user.id
    }
}

/// Split an instance uid into its model uid and primary key.
pub fn parse_uid(uid: &str) -> Result<(&str, i64), NotFound> {
    let (model_uid, pk) = uid
        .rsplit_once('_')
        .ok_or_else(|| NotFound::MalformedUid(uid.to_string()))?;
    let pk = pk
        .parse::<i64>()
        .map_err(|_| NotFound::MalformedUid(uid.to_string()))?;
    if model_uid.is_empty() {
        return Err(NotFound::MalformedUid(uid.to_string()));
    }
    Ok((model_uid, pk))
}

/// Instance detail returned by the resource endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDocument {
    pub uid: String,
    pub name: String,
    pub model: String,
    pub owner_id: i64,
    pub collection: Option<String>,
    pub show_template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
