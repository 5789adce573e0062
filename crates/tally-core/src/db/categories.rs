//! Category operations
//!
//! Categories are shared across users: any user may post transactions
//! against any category. The creator is recorded when known.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{parse_datetime, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{Category, CategoryCreate, CategoryType, CategoryUpdate};

impl Database {
    /// Create a category, optionally recording the creating user
    pub fn create_category(
        &self,
        created_by: Option<i64>,
        input: &CategoryCreate,
    ) -> Result<Category> {
        input.validate()?;

        let conn = self.conn()?;
        if let Some(user_id) = created_by {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![user_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::NotFound(format!("user {}", user_id)));
            }
        }

        conn.execute(
            r#"
            INSERT INTO categories (name, description, category_type, color, icon, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                input.name,
                input.description,
                input.category_type.as_str(),
                input.color,
                input.icon,
                created_by
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(category_id = id, kind = %input.category_type, "Category created");
        self.get_category(id)
    }

    /// Get a category by id
    pub fn get_category(&self, category_id: i64) -> Result<Category> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, name, description, category_type, color, icon,
                   is_active, created_at, created_by
            FROM categories WHERE id = ?1
            "#,
            params![category_id],
            Self::row_to_category,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("category {}", category_id)))
    }

    /// List categories, optionally filtered by type
    pub fn list_categories(
        &self,
        kind: Option<CategoryType>,
        active_only: bool,
    ) -> Result<Vec<Category>> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = kind {
            conditions.push("category_type = ?");
            params.push(Box::new(kind.as_str()));
        }
        if active_only {
            conditions.push("is_active = 1");
        }

        let mut sql = String::from(
            r#"
            SELECT id, name, description, category_type, color, icon,
                   is_active, created_at, created_by
            FROM categories
            "#,
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE");

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let categories = stmt
            .query_map(params_refs.as_slice(), Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Apply a partial update to a category. The type is immutable: budgets
    /// and transactions already hang off it.
    pub fn update_category(&self, category_id: i64, input: &CategoryUpdate) -> Result<Category> {
        input.validate()?;

        let conn = self.conn()?;
        self.get_category(category_id)?;

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(description) = &input.description {
            updates.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(color) = &input.color {
            updates.push("color = ?");
            values.push(Box::new(color.clone()));
        }
        if let Some(icon) = &input.icon {
            updates.push("icon = ?");
            values.push(Box::new(icon.clone()));
        }
        if let Some(is_active) = input.is_active {
            updates.push("is_active = ?");
            values.push(Box::new(is_active));
        }

        if updates.is_empty() {
            return self.get_category(category_id);
        }

        values.push(Box::new(category_id));
        let sql = format!("UPDATE categories SET {} WHERE id = ?", updates.join(", "));
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        self.get_category(category_id)
    }

    /// Soft-delete a category. Existing transactions and budgets keep their
    /// reference; new budgets and listings skip it.
    pub fn deactivate_category(&self, category_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE categories SET is_active = 0 WHERE id = ?1",
            params![category_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("category {}", category_id)));
        }
        debug!(category_id, "Category deactivated");
        Ok(())
    }

    /// Type of a category, for posting and budget checks
    pub(crate) fn category_kind(conn: &Connection, category_id: i64) -> Result<CategoryType> {
        let kind: Option<String> = conn
            .query_row(
                "SELECT category_type FROM categories WHERE id = ?1",
                params![category_id],
                |row| row.get(0),
            )
            .optional()?;
        match kind {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Consistency(format!("stored category type {:?} is unknown", raw))
            }),
            None => Err(Error::NotFound(format!("category {}", category_id))),
        }
    }

    pub(crate) fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        let category_type: String = row.get(3)?;
        let created_at: String = row.get(7)?;
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category_type: text_column(3, category_type)?,
            color: row.get(4)?,
            icon: row.get(5)?,
            is_active: row.get(6)?,
            created_at: parse_datetime(&created_at),
            created_by: row.get(8)?,
        })
    }
}
