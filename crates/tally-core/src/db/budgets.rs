//! Budget operations
//!
//! `spent_amount` and `remaining_amount` are derived columns. They are
//! backfilled from existing expense transactions on create, shifted by the
//! transaction module on every posting, and recomputed from scratch on every
//! budget update. Each budget scopes one (user, category, month, year).

use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;

use super::{map_unique_violation, parse_datetime, stored_decimal, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetCreate, BudgetUpdate, CategoryType};
use crate::validate::ValidationErrors;

impl Database {
    /// Create a budget, backfilling `spent_amount` from expense transactions
    /// already posted in its month
    pub fn create_budget(&self, user_id: i64, input: &BudgetCreate) -> Result<Budget> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let kind = Self::category_kind(&tx, input.category_id)?;
        if kind != CategoryType::Expense {
            let mut errors = ValidationErrors::new();
            errors.push("category_id", "must reference an expense category");
            return Err(errors.into());
        }

        let duplicate: bool = tx.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM budgets
                WHERE user_id = ?1 AND category_id = ?2 AND month = ?3 AND year = ?4
            )
            "#,
            params![user_id, input.category_id, input.month, input.year],
            |row| row.get(0),
        )?;
        if duplicate {
            return Err(Error::Conflict(format!(
                "budget for category {} in {}-{:02} already exists",
                input.category_id, input.year, input.month
            )));
        }

        let spent =
            Self::sum_expenses_for_scope(&tx, user_id, input.category_id, input.month, input.year)?;
        let remaining = input.allocated_amount - spent;

        tx.execute(
            r#"
            INSERT INTO budgets
                (user_id, category_id, name, allocated_amount, spent_amount,
                 remaining_amount, month, year)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                user_id,
                input.category_id,
                input.name,
                input.allocated_amount.to_string(),
                spent.to_string(),
                remaining.to_string(),
                input.month,
                input.year
            ],
        )
        .map_err(|e| map_unique_violation(e, "budget for this category and month already exists"))?;

        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(budget_id = id, user_id, %spent, "Budget created");
        self.get_budget(user_id, id)
    }

    /// Get a budget owned by the given user
    pub fn get_budget(&self, user_id: i64, budget_id: i64) -> Result<Budget> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, user_id, category_id, name, allocated_amount, spent_amount,
                   remaining_amount, month, year, is_active, created_at, updated_at
            FROM budgets WHERE id = ?1 AND user_id = ?2
            "#,
            params![budget_id, user_id],
            Self::row_to_budget,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("budget {}", budget_id)))
    }

    /// List a user's budgets, optionally narrowed to a month and/or year,
    /// most recent period first
    pub fn list_budgets(
        &self,
        user_id: i64,
        month: Option<u32>,
        year: Option<i32>,
        active_only: bool,
    ) -> Result<Vec<Budget>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(month) = month {
            conditions.push("month = ?");
            params.push(Box::new(month));
        }
        if let Some(year) = year {
            conditions.push("year = ?");
            params.push(Box::new(year));
        }
        if active_only {
            conditions.push("is_active = 1");
        }

        let sql = format!(
            r#"
            SELECT id, user_id, category_id, name, allocated_amount, spent_amount,
                   remaining_amount, month, year, is_active, created_at, updated_at
            FROM budgets WHERE {}
            ORDER BY year DESC, month DESC, id
            "#,
            conditions.join(" AND ")
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let budgets = stmt
            .query_map(params_refs.as_slice(), Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    /// Apply a partial update to a budget. The derived columns are always
    /// recomputed from the posted transactions, so a changed allocation
    /// lands with a consistent remaining amount.
    pub fn update_budget(
        &self,
        user_id: i64,
        budget_id: i64,
        input: &BudgetUpdate,
    ) -> Result<Budget> {
        input.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                r#"
                SELECT category_id, allocated_amount, month, year
                FROM budgets WHERE id = ?1 AND user_id = ?2
                "#,
                params![budget_id, user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, i32>(3)?,
                    ))
                },
            )
            .optional()?;
        let (category_id, allocated_raw, month, year) = match existing {
            Some(row) => row,
            None => return Err(Error::NotFound(format!("budget {}", budget_id))),
        };

        let allocated = match input.allocated_amount {
            Some(amount) => amount,
            None => stored_decimal(&allocated_raw, "allocated_amount")?,
        };
        let spent = Self::sum_expenses_for_scope(&tx, user_id, category_id, month, year)?;
        let remaining = allocated - spent;

        let mut updates = vec![
            "allocated_amount = ?",
            "spent_amount = ?",
            "remaining_amount = ?",
        ];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(allocated.to_string()),
            Box::new(spent.to_string()),
            Box::new(remaining.to_string()),
        ];

        if let Some(name) = &input.name {
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(is_active) = input.is_active {
            updates.push("is_active = ?");
            values.push(Box::new(is_active));
        }

        updates.push("updated_at = datetime('now')");
        values.push(Box::new(budget_id));

        let sql = format!("UPDATE budgets SET {} WHERE id = ?", updates.join(", "));
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        tx.execute(&sql, params_refs.as_slice())?;
        tx.commit()?;

        self.get_budget(user_id, budget_id)
    }

    /// Soft-delete a budget. An inactive budget keeps its history but stops
    /// tracking postings.
    pub fn deactivate_budget(&self, user_id: i64, budget_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE budgets SET is_active = 0, updated_at = datetime('now')
            WHERE id = ?1 AND user_id = ?2
            "#,
            params![budget_id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("budget {}", budget_id)));
        }
        debug!(budget_id, user_id, "Budget deactivated");
        Ok(())
    }

    /// Exact sum of expense transactions for one budget scope
    pub(crate) fn sum_expenses_for_scope(
        conn: &Connection,
        user_id: i64,
        category_id: i64,
        month: u32,
        year: i32,
    ) -> Result<Decimal> {
        let period = format!("{:04}-{:02}", year, month);
        let mut stmt = conn.prepare(
            r#"
            SELECT amount FROM transactions
            WHERE user_id = ?1 AND category_id = ?2
              AND transaction_type = 'expense'
              AND substr(transaction_date, 1, 7) = ?3
            "#,
        )?;
        let amounts = stmt
            .query_map(params![user_id, category_id, period], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut total = Decimal::ZERO;
        for raw in &amounts {
            total += stored_decimal(raw, "transaction amount")?;
        }
        Ok(total)
    }

    pub(crate) fn row_to_budget(row: &rusqlite::Row) -> rusqlite::Result<Budget> {
        let allocated: String = row.get(4)?;
        let spent: String = row.get(5)?;
        let remaining: String = row.get(6)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;
        Ok(Budget {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            name: row.get(3)?,
            allocated_amount: text_column(4, allocated)?,
            spent_amount: text_column(5, spent)?,
            remaining_amount: text_column(6, remaining)?,
            month: row.get(7)?,
            year: row.get(8)?,
            is_active: row.get(9)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
