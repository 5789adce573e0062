//! Transaction operations and the wallet/budget consistency engine
//!
//! Every mutation here runs inside one SQL transaction:
//! - posting shifts the wallet balance by the signed amount and, for an
//!   expense, the spent/remaining of the active budget covering the
//!   posting's month
//! - updating reverses the old posting's effects, then applies the new ones
//! - deleting reverses the posting's effects
//!
//! Either every write lands or none do.

use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use super::{parse_datetime, stored_decimal, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{
    Transaction, TransactionCreate, TransactionFilter, TransactionType, TransactionUpdate,
};
use crate::validate::ValidationErrors;

impl Database {
    /// Post a transaction, shifting the wallet balance and any in-scope
    /// budget with it
    pub fn create_transaction(
        &self,
        user_id: i64,
        input: &TransactionCreate,
    ) -> Result<Transaction> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let kind = Self::category_kind(&tx, input.category_id)?;
        if !input.transaction_type.matches(kind) {
            let mut errors = ValidationErrors::new();
            errors.push("transaction_type", "must match the category type");
            return Err(errors.into());
        }
        Self::assert_wallet_owned(&tx, user_id, input.wallet_id)?;

        let date = input
            .transaction_date
            .unwrap_or_else(|| Utc::now().date_naive());

        tx.execute(
            r#"
            INSERT INTO transactions
                (user_id, category_id, wallet_id, transaction_type, amount,
                 description, notes, transaction_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                user_id,
                input.category_id,
                input.wallet_id,
                input.transaction_type.as_str(),
                input.amount.to_string(),
                input.description,
                input.notes,
                date.to_string()
            ],
        )?;
        let id = tx.last_insert_rowid();

        Self::shift_wallet_balance(
            &tx,
            input.wallet_id,
            input.transaction_type.signed(input.amount),
        )?;
        if input.transaction_type == TransactionType::Expense {
            Self::shift_budget_spent(&tx, user_id, input.category_id, date, input.amount)?;
        }

        tx.commit()?;
        debug!(transaction_id = id, user_id, "Transaction posted");
        self.get_transaction(user_id, id)
    }

    /// Get a transaction owned by the given user
    pub fn get_transaction(&self, user_id: i64, transaction_id: i64) -> Result<Transaction> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, user_id, category_id, wallet_id, transaction_type, amount,
                   description, notes, transaction_date, created_at, updated_at
            FROM transactions WHERE id = ?1 AND user_id = ?2
            "#,
            params![transaction_id, user_id],
            Self::row_to_transaction,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("transaction {}", transaction_id)))
    }

    /// List a user's transactions, newest first, with optional filters and
    /// paging
    pub fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(wallet_id) = filter.wallet_id {
            conditions.push("wallet_id = ?");
            params.push(Box::new(wallet_id));
        }
        if let Some(category_id) = filter.category_id {
            conditions.push("category_id = ?");
            params.push(Box::new(category_id));
        }
        if let Some(kind) = filter.transaction_type {
            conditions.push("transaction_type = ?");
            params.push(Box::new(kind.as_str()));
        }
        if let Some((from, to)) = filter.date_range {
            conditions.push("transaction_date >= ?");
            params.push(Box::new(from.to_string()));
            conditions.push("transaction_date <= ?");
            params.push(Box::new(to.to_string()));
        }

        let mut sql = format!(
            r#"
            SELECT id, user_id, category_id, wallet_id, transaction_type, amount,
                   description, notes, transaction_date, created_at, updated_at
            FROM transactions WHERE {}
            ORDER BY transaction_date DESC, id DESC
            "#,
            conditions.join(" AND ")
        );

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit));
            if let Some(offset) = filter.offset {
                sql.push_str(" OFFSET ?");
                params.push(Box::new(offset));
            }
        } else if let Some(offset) = filter.offset {
            // OFFSET needs a LIMIT clause; -1 leaves it unbounded
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Box::new(offset));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Apply a partial update to a transaction, rebalancing every wallet and
    /// budget the change touches. The old posting is reversed and the new
    /// one applied, so moves across wallets, categories, and months all
    /// settle correctly.
    pub fn update_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
        input: &TransactionUpdate,
    ) -> Result<Transaction> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                r#"
                SELECT id, user_id, category_id, wallet_id, transaction_type, amount,
                       description, notes, transaction_date, created_at, updated_at
                FROM transactions WHERE id = ?1 AND user_id = ?2
                "#,
                params![transaction_id, user_id],
                Self::row_to_transaction,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", transaction_id)))?;

        let category_id = input.category_id.unwrap_or(old.category_id);
        let wallet_id = input.wallet_id.unwrap_or(old.wallet_id);
        let amount = input.amount.unwrap_or(old.amount);
        let description = input
            .description
            .clone()
            .unwrap_or_else(|| old.description.clone());
        let notes = match &input.notes {
            Some(notes) => notes.clone(),
            None => old.notes.clone(),
        };
        let date = input.transaction_date.unwrap_or(old.transaction_date);

        if category_id != old.category_id {
            let kind = Self::category_kind(&tx, category_id)?;
            if !old.transaction_type.matches(kind) {
                let mut errors = ValidationErrors::new();
                errors.push("category_id", "must match the transaction type");
                return Err(errors.into());
            }
        }
        if wallet_id != old.wallet_id {
            Self::assert_wallet_owned(&tx, user_id, wallet_id)?;
        }

        // Reverse the old posting, then apply the new one
        Self::shift_wallet_balance(
            &tx,
            old.wallet_id,
            -old.transaction_type.signed(old.amount),
        )?;
        if old.transaction_type == TransactionType::Expense {
            Self::shift_budget_spent(
                &tx,
                user_id,
                old.category_id,
                old.transaction_date,
                -old.amount,
            )?;
        }

        Self::shift_wallet_balance(&tx, wallet_id, old.transaction_type.signed(amount))?;
        if old.transaction_type == TransactionType::Expense {
            Self::shift_budget_spent(&tx, user_id, category_id, date, amount)?;
        }

        tx.execute(
            r#"
            UPDATE transactions
            SET category_id = ?1, wallet_id = ?2, amount = ?3, description = ?4,
                notes = ?5, transaction_date = ?6, updated_at = datetime('now')
            WHERE id = ?7
            "#,
            params![
                category_id,
                wallet_id,
                amount.to_string(),
                description,
                notes,
                date.to_string(),
                transaction_id
            ],
        )?;

        tx.commit()?;
        debug!(transaction_id, user_id, "Transaction updated");
        self.get_transaction(user_id, transaction_id)
    }

    /// Delete a transaction, reversing its wallet and budget effects
    pub fn delete_transaction(&self, user_id: i64, transaction_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                r#"
                SELECT id, user_id, category_id, wallet_id, transaction_type, amount,
                       description, notes, transaction_date, created_at, updated_at
                FROM transactions WHERE id = ?1 AND user_id = ?2
                "#,
                params![transaction_id, user_id],
                Self::row_to_transaction,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", transaction_id)))?;

        Self::shift_wallet_balance(
            &tx,
            old.wallet_id,
            -old.transaction_type.signed(old.amount),
        )?;
        if old.transaction_type == TransactionType::Expense {
            Self::shift_budget_spent(
                &tx,
                user_id,
                old.category_id,
                old.transaction_date,
                -old.amount,
            )?;
        }

        tx.execute(
            "DELETE FROM transactions WHERE id = ?1",
            params![transaction_id],
        )?;
        tx.commit()?;

        debug!(transaction_id, user_id, "Transaction deleted");
        Ok(())
    }

    fn assert_wallet_owned(conn: &Connection, user_id: i64, wallet_id: i64) -> Result<()> {
        let owned: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM wallets WHERE id = ?1 AND user_id = ?2)",
            params![wallet_id, user_id],
            |row| row.get(0),
        )?;
        if owned {
            Ok(())
        } else {
            Err(Error::NotFound(format!("wallet {}", wallet_id)))
        }
    }

    /// Shift a wallet balance by a signed delta
    fn shift_wallet_balance(conn: &Connection, wallet_id: i64, delta: Decimal) -> Result<()> {
        let raw: String = conn.query_row(
            "SELECT balance FROM wallets WHERE id = ?1",
            params![wallet_id],
            |row| row.get(0),
        )?;
        let balance = stored_decimal(&raw, "wallet balance")? + delta;

        conn.execute(
            "UPDATE wallets SET balance = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![balance.to_string(), wallet_id],
        )?;
        debug!(wallet_id, %delta, "Wallet balance shifted");
        Ok(())
    }

    /// Shift the spent amount of the active budget covering (user, category,
    /// month of `date`). A posting with no budget in scope is a no-op here.
    fn shift_budget_spent(
        conn: &Connection,
        user_id: i64,
        category_id: i64,
        date: NaiveDate,
        delta: Decimal,
    ) -> Result<()> {
        let row = conn
            .query_row(
                r#"
                SELECT id, allocated_amount, spent_amount FROM budgets
                WHERE user_id = ?1 AND category_id = ?2 AND month = ?3 AND year = ?4
                  AND is_active = 1
                "#,
                params![user_id, category_id, date.month(), date.year()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let (budget_id, allocated_raw, spent_raw) = match row {
            Some(row) => row,
            None => return Ok(()),
        };

        let allocated = stored_decimal(&allocated_raw, "allocated_amount")?;
        let spent = stored_decimal(&spent_raw, "spent_amount")? + delta;
        let remaining = allocated - spent;

        conn.execute(
            r#"
            UPDATE budgets
            SET spent_amount = ?1, remaining_amount = ?2, updated_at = datetime('now')
            WHERE id = ?3
            "#,
            params![spent.to_string(), remaining.to_string(), budget_id],
        )?;
        debug!(budget_id, %delta, "Budget spent shifted");
        Ok(())
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let transaction_type: String = row.get(4)?;
        let amount: String = row.get(5)?;
        let transaction_date: String = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            wallet_id: row.get(3)?,
            transaction_type: text_column(4, transaction_type)?,
            amount: text_column(5, amount)?,
            description: row.get(6)?,
            notes: row.get(7)?,
            transaction_date: text_column(8, transaction_date)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
