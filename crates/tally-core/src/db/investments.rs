//! Investment operations
//!
//! Investment transactions are additive history. Recording one may adjust
//! the parent's `current_value` (a `sell` reduces it, any other kind raises
//! it); the entry remembers whether it did via `applied_to_value`, and
//! deleting it reverses exactly what was applied.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{opt_text_column, parse_datetime, stored_decimal, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{
    Investment, InvestmentCreate, InvestmentTransaction, InvestmentTransactionCreate,
    InvestmentUpdate,
};

impl Database {
    /// Create an investment position
    pub fn create_investment(&self, user_id: i64, input: &InvestmentCreate) -> Result<Investment> {
        input.validate()?;

        let conn = self.conn()?;
        let user_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }

        let start_date = input
            .start_date
            .unwrap_or_else(|| Utc::now().date_naive());

        conn.execute(
            r#"
            INSERT INTO investments
                (user_id, name, investment_type, initial_amount, current_value,
                 monthly_contribution, expected_return_rate, description, start_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user_id,
                input.name,
                input.investment_type.as_str(),
                input.initial_amount.to_string(),
                input.current_value.to_string(),
                input.monthly_contribution.to_string(),
                input.expected_return_rate.map(|r| r.to_string()),
                input.description,
                start_date.to_string()
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(investment_id = id, user_id, "Investment created");
        self.get_investment(user_id, id)
    }

    /// Get an investment owned by the given user
    pub fn get_investment(&self, user_id: i64, investment_id: i64) -> Result<Investment> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, user_id, name, investment_type, initial_amount, current_value,
                   monthly_contribution, expected_return_rate, description, start_date,
                   is_active, created_at, updated_at
            FROM investments WHERE id = ?1 AND user_id = ?2
            "#,
            params![investment_id, user_id],
            Self::row_to_investment,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("investment {}", investment_id)))
    }

    /// List a user's investments
    pub fn list_investments(&self, user_id: i64, active_only: bool) -> Result<Vec<Investment>> {
        let conn = self.conn()?;
        let mut sql = String::from(
            r#"
            SELECT id, user_id, name, investment_type, initial_amount, current_value,
                   monthly_contribution, expected_return_rate, description, start_date,
                   is_active, created_at, updated_at
            FROM investments WHERE user_id = ?1
            "#,
        );
        if active_only {
            sql.push_str(" AND is_active = 1");
        }
        sql.push_str(" ORDER BY start_date, id");

        let mut stmt = conn.prepare(&sql)?;
        let investments = stmt
            .query_map(params![user_id], Self::row_to_investment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(investments)
    }

    /// Apply a partial update to an investment. Setting `current_value` is a
    /// manual revaluation, independent of recorded history.
    pub fn update_investment(
        &self,
        user_id: i64,
        investment_id: i64,
        input: &InvestmentUpdate,
    ) -> Result<Investment> {
        input.validate()?;

        let conn = self.conn()?;
        self.get_investment(user_id, investment_id)?;

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &input.name {
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(value) = input.current_value {
            updates.push("current_value = ?");
            values.push(Box::new(value.to_string()));
        }
        if let Some(contribution) = input.monthly_contribution {
            updates.push("monthly_contribution = ?");
            values.push(Box::new(contribution.to_string()));
        }
        if let Some(rate) = input.expected_return_rate {
            updates.push("expected_return_rate = ?");
            values.push(Box::new(rate.map(|r| r.to_string())));
        }
        if let Some(description) = &input.description {
            updates.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(is_active) = input.is_active {
            updates.push("is_active = ?");
            values.push(Box::new(is_active));
        }

        if updates.is_empty() {
            return self.get_investment(user_id, investment_id);
        }

        updates.push("updated_at = datetime('now')");
        values.push(Box::new(investment_id));

        let sql = format!("UPDATE investments SET {} WHERE id = ?", updates.join(", "));
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        self.get_investment(user_id, investment_id)
    }

    /// Soft-delete an investment. Its history stays readable.
    pub fn deactivate_investment(&self, user_id: i64, investment_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE investments SET is_active = 0, updated_at = datetime('now')
            WHERE id = ?1 AND user_id = ?2
            "#,
            params![investment_id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("investment {}", investment_id)));
        }
        debug!(investment_id, user_id, "Investment deactivated");
        Ok(())
    }

    /// Record a buy/sell/dividend entry against an investment. With
    /// `apply_to_value` the parent's `current_value` shifts by the amount
    /// (down for a `sell`, up otherwise) in the same step.
    pub fn record_investment_transaction(
        &self,
        user_id: i64,
        input: &InvestmentTransactionCreate,
        apply_to_value: bool,
    ) -> Result<InvestmentTransaction> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current_raw: Option<String> = tx
            .query_row(
                "SELECT current_value FROM investments WHERE id = ?1 AND user_id = ?2",
                params![input.investment_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let current_raw = current_raw
            .ok_or_else(|| Error::NotFound(format!("investment {}", input.investment_id)))?;

        let date = input
            .transaction_date
            .unwrap_or_else(|| Utc::now().date_naive());

        tx.execute(
            r#"
            INSERT INTO investment_transactions
                (investment_id, transaction_type, amount, quantity, price_per_unit,
                 description, transaction_date, applied_to_value)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                input.investment_id,
                input.transaction_type,
                input.amount.to_string(),
                input.quantity.map(|q| q.to_string()),
                input.price_per_unit.map(|p| p.to_string()),
                input.description,
                date.to_string(),
                apply_to_value
            ],
        )?;
        let id = tx.last_insert_rowid();

        if apply_to_value {
            let current = stored_decimal(&current_raw, "current_value")?;
            let value = if input.transaction_type.eq_ignore_ascii_case("sell") {
                current - input.amount
            } else {
                current + input.amount
            };
            tx.execute(
                r#"
                UPDATE investments SET current_value = ?1, updated_at = datetime('now')
                WHERE id = ?2
                "#,
                params![value.to_string(), input.investment_id],
            )?;
            debug!(investment_id = input.investment_id, %value, "Investment revalued");
        }

        tx.commit()?;
        debug!(
            entry_id = id,
            investment_id = input.investment_id,
            "Investment transaction recorded"
        );
        self.get_investment_transaction(user_id, id)
    }

    /// List an investment's history, newest first
    pub fn list_investment_transactions(
        &self,
        user_id: i64,
        investment_id: i64,
    ) -> Result<Vec<InvestmentTransaction>> {
        // Ownership first, so a foreign id reads as not-found, not empty
        self.get_investment(user_id, investment_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, investment_id, transaction_type, amount, quantity, price_per_unit,
                   description, transaction_date, applied_to_value, created_at
            FROM investment_transactions WHERE investment_id = ?1
            ORDER BY transaction_date DESC, id DESC
            "#,
        )?;
        let entries = stmt
            .query_map(params![investment_id], Self::row_to_investment_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Delete a history entry, reversing its valuation adjustment if it made
    /// one when recorded
    pub fn delete_investment_transaction(
        &self,
        user_id: i64,
        investment_id: i64,
        entry_id: i64,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                r#"
                SELECT it.id, it.investment_id, it.transaction_type, it.amount, it.quantity,
                       it.price_per_unit, it.description, it.transaction_date,
                       it.applied_to_value, it.created_at
                FROM investment_transactions it
                JOIN investments i ON i.id = it.investment_id
                WHERE it.id = ?1 AND it.investment_id = ?2 AND i.user_id = ?3
                "#,
                params![entry_id, investment_id, user_id],
                Self::row_to_investment_transaction,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("investment transaction {}", entry_id)))?;

        if old.applied_to_value {
            let raw: String = tx.query_row(
                "SELECT current_value FROM investments WHERE id = ?1",
                params![investment_id],
                |row| row.get(0),
            )?;
            let current = stored_decimal(&raw, "current_value")?;
            let value = if old.transaction_type.eq_ignore_ascii_case("sell") {
                current + old.amount
            } else {
                current - old.amount
            };
            tx.execute(
                r#"
                UPDATE investments SET current_value = ?1, updated_at = datetime('now')
                WHERE id = ?2
                "#,
                params![value.to_string(), investment_id],
            )?;
            debug!(investment_id, %value, "Investment revaluation reversed");
        }

        tx.execute(
            "DELETE FROM investment_transactions WHERE id = ?1",
            params![entry_id],
        )?;
        tx.commit()?;

        debug!(entry_id, investment_id, "Investment transaction deleted");
        Ok(())
    }

    fn get_investment_transaction(
        &self,
        user_id: i64,
        entry_id: i64,
    ) -> Result<InvestmentTransaction> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT it.id, it.investment_id, it.transaction_type, it.amount, it.quantity,
                   it.price_per_unit, it.description, it.transaction_date,
                   it.applied_to_value, it.created_at
            FROM investment_transactions it
            JOIN investments i ON i.id = it.investment_id
            WHERE it.id = ?1 AND i.user_id = ?2
            "#,
            params![entry_id, user_id],
            Self::row_to_investment_transaction,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("investment transaction {}", entry_id)))
    }

    pub(crate) fn row_to_investment(row: &rusqlite::Row) -> rusqlite::Result<Investment> {
        let investment_type: String = row.get(3)?;
        let initial_amount: String = row.get(4)?;
        let current_value: String = row.get(5)?;
        let monthly_contribution: String = row.get(6)?;
        let expected_return_rate: Option<String> = row.get(7)?;
        let start_date: String = row.get(9)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;
        Ok(Investment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            investment_type: text_column(3, investment_type)?,
            initial_amount: text_column(4, initial_amount)?,
            current_value: text_column(5, current_value)?,
            monthly_contribution: text_column(6, monthly_contribution)?,
            expected_return_rate: opt_text_column(7, expected_return_rate)?,
            description: row.get(8)?,
            start_date: text_column(9, start_date)?,
            is_active: row.get(10)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    pub(crate) fn row_to_investment_transaction(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<InvestmentTransaction> {
        let amount: String = row.get(3)?;
        let quantity: Option<String> = row.get(4)?;
        let price_per_unit: Option<String> = row.get(5)?;
        let transaction_date: String = row.get(7)?;
        let created_at: String = row.get(9)?;
        Ok(InvestmentTransaction {
            id: row.get(0)?,
            investment_id: row.get(1)?,
            transaction_type: row.get(2)?,
            amount: text_column(3, amount)?,
            quantity: opt_text_column(4, quantity)?,
            price_per_unit: opt_text_column(5, price_per_unit)?,
            description: row.get(6)?,
            transaction_date: text_column(7, transaction_date)?,
            applied_to_value: row.get(8)?,
            created_at: parse_datetime(&created_at),
        })
    }
}
