mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{Group, Instance, User};
use crate::store::FeatureStore;

const INSTANCE_COLUMNS: &str =
    "fi.id, fi.model_uid, fi.name, fi.owner_id, fi.collection_uid, fi.created_at, fi.updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "feature-registry")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("features.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Users
    // ============================================================

    pub fn create_user(&self, username: &str, is_staff: bool) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO users (username, is_staff, created_at) VALUES (?, ?, ?)",
            (username, is_staff as i32, Utc::now().to_rfc3339()),
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            is_staff,
            groups: Vec::new(),
        })
    }

    pub fn add_user_to_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?, ?)",
            (user_id, group_id),
        )?;
        Ok(())
    }

    fn find_user(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                &format!("SELECT id, username, is_staff FROM users WHERE {clause}"),
                [param],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        is_staff: row.get::<_, i32>(2)? != 0,
                        groups: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut user) = user else {
            return Ok(None);
        };
        user.groups = query_groups(
            &conn,
            "SELECT g.id, g.name FROM auth_groups g
             JOIN user_groups ug ON ug.group_id = g.id
             WHERE ug.user_id = ? ORDER BY g.name",
            [user.id],
        )?
        .into_iter()
        .map(|g| g.name)
        .collect();
        Ok(Some(user))
    }
}

impl FeatureStore for Database {
    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.find_user("id = ?", &id)
    }

    fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        self.find_user("username = ?", &username)
    }

    fn user_groups(&self, user_id: i64) -> Result<Vec<Group>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_groups(
            &conn,
            "SELECT g.id, g.name FROM auth_groups g
             JOIN user_groups ug ON ug.group_id = g.id
             WHERE ug.user_id = ? ORDER BY g.name",
            [user_id],
        )
    }

    // ============================================================
    // Groups and permissions
    // ============================================================

    fn permission_id(&self, codename: &str, content_type: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = conn
            .query_row(
                "SELECT id FROM permissions WHERE codename = ? AND content_type = ?",
                (codename, content_type),
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn create_permission_if_absent(
        &self,
        codename: &str,
        name: &str,
        content_type: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO permissions (codename, name, content_type) VALUES (?, ?, ?)",
            (codename, name, content_type),
        )?;
        let id = conn.query_row(
            "SELECT id FROM permissions WHERE codename = ? AND content_type = ?",
            (codename, content_type),
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_or_create_group(&self, name: &str) -> Result<Group> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute("INSERT OR IGNORE INTO auth_groups (name) VALUES (?)", [name])?;
        let group = conn.query_row("SELECT id, name FROM auth_groups WHERE name = ?", [name], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(group)
    }

    fn grant_permission(&self, group_id: i64, permission_id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO group_permissions (group_id, permission_id) VALUES (?, ?)",
            (group_id, permission_id),
        )?;
        Ok(())
    }

    fn group_has_permission(&self, group_id: i64, permission_id: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM group_permissions WHERE group_id = ? AND permission_id = ?",
            (group_id, permission_id),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn groups_with_permission(&self, permission_id: i64) -> Result<Vec<Group>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_groups(
            &conn,
            "SELECT g.id, g.name FROM auth_groups g
             JOIN group_permissions gp ON gp.group_id = g.id
             WHERE gp.permission_id = ? ORDER BY g.name",
            [permission_id],
        )
    }

    // ============================================================
    // Feature instances
    // ============================================================

    fn get_instance(&self, model_uid: &str, pk: i64) -> Result<Option<Instance>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let instance = conn
            .query_row(
                &format!(
                    "SELECT {INSTANCE_COLUMNS} FROM feature_instances fi
                     WHERE fi.id = ? AND fi.model_uid = ?"
                ),
                (pk, model_uid),
                instance_from_row,
            )
            .optional()?;
        Ok(instance)
    }

    fn instances_of(&self, model_uid: &str) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_instances(
            &conn,
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM feature_instances fi
                 WHERE fi.model_uid = ? ORDER BY fi.id"
            ),
            [model_uid],
        )
    }

    fn create_instance(&self, model_uid: &str, name: &str, owner_id: i64) -> Result<Instance> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        conn.execute(
            "INSERT INTO feature_instances (model_uid, name, owner_id, collection_uid, created_at, updated_at)
             VALUES (?, ?, ?, NULL, ?, ?)",
            (model_uid, name, owner_id, now.to_rfc3339(), now.to_rfc3339()),
        )?;

        Ok(Instance {
            pk: conn.last_insert_rowid(),
            model_uid: model_uid.to_string(),
            name: name.to_string(),
            owner_id,
            collection: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn copy_instance(&self, instance: &Instance, owner_id: i64) -> Result<Instance> {
        self.create_instance(
            &instance.model_uid,
            &format!("{} (copy)", instance.name),
            owner_id,
        )
    }

    fn delete_instance(&self, model_uid: &str, pk: i64) -> Result<bool> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "DELETE FROM feature_instances WHERE id = ? AND model_uid = ?",
            (pk, model_uid),
        )?;
        if rows > 0 {
            tx.execute(
                "DELETE FROM feature_sharing_groups WHERE instance_id = ?",
                [pk],
            )?;
        }
        tx.commit()?;
        Ok(rows > 0)
    }

    // ============================================================
    // Sharing and containment
    // ============================================================

    fn shared_with_user(
        &self,
        model_uid: &str,
        user_id: i64,
        permission_id: i64,
    ) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_instances(
            &conn,
            &format!(
                "SELECT DISTINCT {INSTANCE_COLUMNS} FROM feature_instances fi
                 JOIN feature_sharing_groups fsg ON fsg.instance_id = fi.id
                 JOIN user_groups ug ON ug.group_id = fsg.group_id AND ug.user_id = ?1
                 JOIN group_permissions gp ON gp.group_id = fsg.group_id AND gp.permission_id = ?2
                 WHERE fi.model_uid = ?3 AND fi.owner_id != ?1
                 ORDER BY fi.id"
            ),
            (user_id, permission_id, model_uid),
        )
    }

    fn sharing_groups(&self, model_uid: &str, pk: i64) -> Result<Vec<Group>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_groups(
            &conn,
            "SELECT g.id, g.name FROM auth_groups g
             JOIN feature_sharing_groups fsg ON fsg.group_id = g.id
             JOIN feature_instances fi ON fi.id = fsg.instance_id
             WHERE fi.id = ? AND fi.model_uid = ? ORDER BY g.name",
            (pk, model_uid),
        )
    }

    fn set_sharing_groups(&self, model_uid: &str, pk: i64, group_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM feature_instances WHERE id = ? AND model_uid = ?",
            (pk, model_uid),
            |row| row.get(0),
        )?;
        if exists == 0 {
            anyhow::bail!("Feature {}_{} not found", model_uid, pk);
        }

        tx.execute(
            "DELETE FROM feature_sharing_groups WHERE instance_id = ?",
            [pk],
        )?;
        for group_id in group_ids {
            tx.execute(
                "INSERT OR IGNORE INTO feature_sharing_groups (instance_id, group_id) VALUES (?, ?)",
                (pk, group_id),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn set_collection(&self, model_uid: &str, pk: i64, collection: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE feature_instances SET collection_uid = ?, updated_at = ? WHERE id = ? AND model_uid = ?",
            (collection, Utc::now().to_rfc3339(), pk, model_uid),
        )?;
        Ok(())
    }

    fn assign_collection(&self, members: &[Instance], collection: Option<&str>) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for member in members {
            tx.execute(
                "UPDATE feature_instances SET collection_uid = ?, updated_at = ? WHERE id = ? AND model_uid = ?",
                (collection, &now, member.pk, &member.model_uid),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn children_of(&self, collection_uid: &str) -> Result<Vec<Instance>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        query_instances(
            &conn,
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM feature_instances fi
                 WHERE fi.collection_uid = ? ORDER BY fi.id"
            ),
            [collection_uid],
        )
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn query_groups(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(sql)?;
    let groups = stmt
        .query_map(params, |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

fn query_instances(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Instance>> {
    let mut stmt = conn.prepare(sql)?;
    let instances = stmt
        .query_map(params, instance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(instances)
}

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        pk: row.get(0)?,
        model_uid: row.get(1)?,
        name: row.get(2)?,
        owner_id: row.get(3)?,
        collection: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
