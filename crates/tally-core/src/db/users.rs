//! User operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{map_unique_violation, parse_datetime, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{User, UserCreate, UserUpdate};

impl Database {
    /// Create a user. The password hash comes from the caller's auth layer;
    /// the payload password is validated but never stored.
    pub fn create_user(&self, input: &UserCreate, password_hash: &str) -> Result<User> {
        input.validate()?;

        let conn = self.conn()?;
        if Self::username_taken(&conn, &input.username, None)? {
            return Err(Error::Conflict(format!(
                "username {:?} is already registered",
                input.username
            )));
        }
        if Self::email_taken(&conn, &input.email, None)? {
            return Err(Error::Conflict(format!(
                "email {:?} is already registered",
                input.email
            )));
        }

        conn.execute(
            r#"
            INSERT INTO users (username, email, full_name, password_hash, role)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                input.username,
                input.email,
                input.full_name,
                password_hash,
                input.role.as_str()
            ],
        )
        .map_err(|e| map_unique_violation(e, "username or email is already registered"))?;

        let id = conn.last_insert_rowid();
        debug!(user_id = id, "User created");
        self.get_user(id)
    }

    /// Get a user by id
    pub fn get_user(&self, user_id: i64) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, username, email, full_name, password_hash, role,
                   is_active, created_at, updated_at
            FROM users WHERE id = ?1
            "#,
            params![user_id],
            Self::row_to_user,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Look a user up by username (the login path; absence is not an error)
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                r#"
                SELECT id, username, email, full_name, password_hash, role,
                       is_active, created_at, updated_at
                FROM users WHERE username = ?1
                "#,
                params![username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List users, optionally restricted to active ones
    pub fn list_users(&self, active_only: bool) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut sql = String::from(
            r#"
            SELECT id, username, email, full_name, password_hash, role,
                   is_active, created_at, updated_at
            FROM users
            "#,
        );
        if active_only {
            sql.push_str(" WHERE is_active = 1");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Apply a partial update to a user
    pub fn update_user(&self, user_id: i64, input: &UserUpdate) -> Result<User> {
        input.validate()?;

        let conn = self.conn()?;
        // Existence first, so a bad id reads as not-found rather than a no-op
        self.get_user(user_id)?;

        if let Some(username) = &input.username {
            if Self::username_taken(&conn, username, Some(user_id))? {
                return Err(Error::Conflict(format!(
                    "username {:?} is already registered",
                    username
                )));
            }
        }
        if let Some(email) = &input.email {
            if Self::email_taken(&conn, email, Some(user_id))? {
                return Err(Error::Conflict(format!(
                    "email {:?} is already registered",
                    email
                )));
            }
        }

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(username) = &input.username {
            updates.push("username = ?");
            values.push(Box::new(username.clone()));
        }
        if let Some(email) = &input.email {
            updates.push("email = ?");
            values.push(Box::new(email.clone()));
        }
        if let Some(full_name) = &input.full_name {
            updates.push("full_name = ?");
            values.push(Box::new(full_name.clone()));
        }
        if let Some(role) = input.role {
            updates.push("role = ?");
            values.push(Box::new(role.as_str()));
        }
        if let Some(is_active) = input.is_active {
            updates.push("is_active = ?");
            values.push(Box::new(is_active));
        }

        if updates.is_empty() {
            return self.get_user(user_id);
        }

        updates.push("updated_at = datetime('now')");
        values.push(Box::new(user_id));

        let sql = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())
            .map_err(|e| map_unique_violation(e, "username or email is already registered"))?;

        self.get_user(user_id)
    }

    /// Soft-delete a user by clearing its active flag
    pub fn deactivate_user(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET is_active = 0, updated_at = datetime('now') WHERE id = ?1",
            params![user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        debug!(user_id, "User deactivated");
        Ok(())
    }

    fn username_taken(conn: &Connection, username: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = match exclude {
            Some(id) => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
                params![username, id],
                |row| row.get::<_, bool>(0),
            )?,
            None => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get::<_, bool>(0),
            )?,
        };
        Ok(taken)
    }

    fn email_taken(conn: &Connection, email: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = match exclude {
            Some(id) => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != ?2)",
                params![email, id],
                |row| row.get::<_, bool>(0),
            )?,
            None => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get::<_, bool>(0),
            )?,
        };
        Ok(taken)
    }

    pub(crate) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let role: String = row.get(5)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            full_name: row.get(3)?,
            password_hash: row.get(4)?,
            role: text_column(5, role)?,
            is_active: row.get(6)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
