//! Wallet operations
//!
//! Balances are not set directly by postings here; the transaction module
//! shifts them. Updates through [`Database::update_wallet`] are manual
//! corrections.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{parse_datetime, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{Wallet, WalletCreate, WalletUpdate};

impl Database {
    /// Create a wallet for a user. Marking it primary demotes any existing
    /// primary wallet in the same step.
    pub fn create_wallet(&self, user_id: i64, input: &WalletCreate) -> Result<Wallet> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let user_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }

        if input.is_primary {
            Self::demote_primary_wallets(&tx, user_id, None)?;
        }

        tx.execute(
            r#"
            INSERT INTO wallets (user_id, name, balance, is_primary)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                user_id,
                input.name,
                input.balance.to_string(),
                input.is_primary
            ],
        )?;

        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(wallet_id = id, user_id, "Wallet created");
        self.get_wallet(user_id, id)
    }

    /// Get a wallet owned by the given user
    pub fn get_wallet(&self, user_id: i64, wallet_id: i64) -> Result<Wallet> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, user_id, name, balance, is_primary, created_at, updated_at
            FROM wallets WHERE id = ?1 AND user_id = ?2
            "#,
            params![wallet_id, user_id],
            Self::row_to_wallet,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("wallet {}", wallet_id)))
    }

    /// List a user's wallets, primary first
    pub fn list_wallets(&self, user_id: i64) -> Result<Vec<Wallet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, balance, is_primary, created_at, updated_at
            FROM wallets WHERE user_id = ?1
            ORDER BY is_primary DESC, id
            "#,
        )?;
        let wallets = stmt
            .query_map(params![user_id], Self::row_to_wallet)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(wallets)
    }

    /// Apply a partial update to a wallet. Setting `balance` is a manual
    /// correction and does not touch transaction history.
    pub fn update_wallet(
        &self,
        user_id: i64,
        wallet_id: i64,
        input: &WalletUpdate,
    ) -> Result<Wallet> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let owned: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM wallets WHERE id = ?1 AND user_id = ?2)",
            params![wallet_id, user_id],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(Error::NotFound(format!("wallet {}", wallet_id)));
        }

        if input.is_primary == Some(true) {
            Self::demote_primary_wallets(&tx, user_id, Some(wallet_id))?;
        }

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(balance) = input.balance {
            updates.push("balance = ?");
            values.push(Box::new(balance.to_string()));
        }
        if let Some(is_primary) = input.is_primary {
            updates.push("is_primary = ?");
            values.push(Box::new(is_primary));
        }

        if !updates.is_empty() {
            updates.push("updated_at = datetime('now')");
            values.push(Box::new(wallet_id));
            let sql = format!("UPDATE wallets SET {} WHERE id = ?", updates.join(", "));
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                values.iter().map(|v| v.as_ref()).collect();
            tx.execute(&sql, params_refs.as_slice())?;
        }

        tx.commit()?;
        self.get_wallet(user_id, wallet_id)
    }

    fn demote_primary_wallets(conn: &Connection, user_id: i64, keep: Option<i64>) -> Result<()> {
        match keep {
            Some(id) => conn.execute(
                r#"
                UPDATE wallets SET is_primary = 0, updated_at = datetime('now')
                WHERE user_id = ?1 AND is_primary = 1 AND id != ?2
                "#,
                params![user_id, id],
            )?,
            None => conn.execute(
                r#"
                UPDATE wallets SET is_primary = 0, updated_at = datetime('now')
                WHERE user_id = ?1 AND is_primary = 1
                "#,
                params![user_id],
            )?,
        };
        Ok(())
    }

    pub(crate) fn row_to_wallet(row: &rusqlite::Row) -> rusqlite::Result<Wallet> {
        let balance: String = row.get(3)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(Wallet {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            balance: text_column(3, balance)?,
            is_primary: row.get(4)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
