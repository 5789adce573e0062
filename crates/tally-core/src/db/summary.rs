//! Aggregation queries for dashboards and trends
//!
//! SQL narrows the rows, Rust folds the money. Amounts are stored as
//! decimal TEXT, so summing happens here with `rust_decimal` instead of in
//! SQLite, where SUM would go through binary floats.
//!
//! Every range is inclusive on both ends. Budgets carry a (year, month)
//! scope instead of a date, so a range covers a budget when the scope falls
//! between the endpoints' months.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use super::{stored_decimal, Database};
use crate::error::Result;
use crate::models::{
    CategorySummary, CategoryType, DashboardSummary, MonthlyTrend, TransactionType,
};

fn period_in_range(year: i32, month: u32, range: Option<(NaiveDate, NaiveDate)>) -> bool {
    match range {
        None => true,
        Some((from, to)) => {
            let period = (year, month);
            (from.year(), from.month()) <= period && period <= (to.year(), to.month())
        }
    }
}

impl Database {
    /// Totals across transactions, budgets, investments, and wallets.
    /// Without a range the whole history counts. With no data at all, every
    /// field is zero.
    pub fn dashboard_summary(
        &self,
        user_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<DashboardSummary> {
        let conn = self.conn()?;
        let mut summary = DashboardSummary::default();

        // Transactions in range
        let mut sql = String::from(
            "SELECT transaction_type, amount FROM transactions WHERE user_id = ?",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];
        if let Some((from, to)) = range {
            sql.push_str(" AND transaction_date >= ? AND transaction_date <= ?");
            params.push(Box::new(from.to_string()));
            params.push(Box::new(to.to_string()));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (kind_raw, amount_raw) in &rows {
            let amount = stored_decimal(amount_raw, "transaction amount")?;
            let kind: TransactionType = kind_raw.parse().map_err(|_| {
                crate::error::Error::Consistency(format!(
                    "stored transaction type {:?} is unknown",
                    kind_raw
                ))
            })?;
            match kind {
                TransactionType::Income => summary.total_income += amount,
                TransactionType::Expense => summary.total_expenses += amount,
            }
        }
        summary.net_income = summary.total_income - summary.total_expenses;

        // Active budgets whose (year, month) scope falls in range
        let mut stmt = conn.prepare(
            r#"
            SELECT allocated_amount, remaining_amount, month, year
            FROM budgets WHERE user_id = ?1 AND is_active = 1
            "#,
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (allocated_raw, remaining_raw, month, year) in &rows {
            if !period_in_range(*year, *month, range) {
                continue;
            }
            summary.total_budget += stored_decimal(allocated_raw, "allocated_amount")?;
            summary.budget_remaining += stored_decimal(remaining_raw, "remaining_amount")?;
        }

        // Active investments and all wallets are point-in-time, not ranged
        let mut stmt = conn.prepare(
            "SELECT current_value FROM investments WHERE user_id = ?1 AND is_active = 1",
        )?;
        let rows = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for raw in &rows {
            summary.total_investments += stored_decimal(raw, "current_value")?;
        }

        let mut stmt = conn.prepare("SELECT balance FROM wallets WHERE user_id = ?1")?;
        let rows = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for raw in &rows {
            summary.wallet_balance += stored_decimal(raw, "wallet balance")?;
        }

        Ok(summary)
    }

    /// Per-month income/expense totals in range, oldest month first. Months
    /// with no transactions are absent rather than zero-filled.
    pub fn monthly_trend(
        &self,
        user_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<MonthlyTrend>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT transaction_date, transaction_type, amount FROM transactions WHERE user_id = ?",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];
        if let Some((from, to)) = range {
            sql.push_str(" AND transaction_date >= ? AND transaction_date <= ?");
            params.push(Box::new(from.to_string()));
            params.push(Box::new(to.to_string()));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // BTreeMap keyed by (year, month) keeps the fold chronological
        let mut months: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();
        for (date_raw, kind_raw, amount_raw) in &rows {
            let date: NaiveDate = date_raw.parse().map_err(|_| {
                crate::error::Error::Consistency(format!(
                    "stored transaction date {:?} is not a date",
                    date_raw
                ))
            })?;
            let amount = stored_decimal(amount_raw, "transaction amount")?;
            let kind: TransactionType = kind_raw.parse().map_err(|_| {
                crate::error::Error::Consistency(format!(
                    "stored transaction type {:?} is unknown",
                    kind_raw
                ))
            })?;
            let entry = months.entry((date.year(), date.month())).or_default();
            match kind {
                TransactionType::Income => entry.0 += amount,
                TransactionType::Expense => entry.1 += amount,
            }
        }

        Ok(months
            .into_iter()
            .map(|((year, month), (income, expenses))| MonthlyTrend {
                month,
                year,
                income,
                expenses,
                net: income - expenses,
            })
            .collect())
    }

    /// Per-category totals in range, largest first, joined with the user's
    /// active budgets whose scope falls in the same range
    pub fn category_summary(
        &self,
        user_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<CategorySummary>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            r#"
            SELECT t.category_id, c.name, c.category_type, t.amount
            FROM transactions t
            JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = ?
            "#,
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];
        if let Some((from, to)) = range {
            sql.push_str(" AND t.transaction_date >= ? AND t.transaction_date <= ?");
            params.push(Box::new(from.to_string()));
            params.push(Box::new(to.to_string()));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        struct Acc {
            name: String,
            kind: CategoryType,
            total: Decimal,
            count: i64,
        }

        let mut categories: BTreeMap<i64, Acc> = BTreeMap::new();
        for (category_id, name, kind_raw, amount_raw) in rows {
            let kind: CategoryType = kind_raw.parse().map_err(|_| {
                crate::error::Error::Consistency(format!(
                    "stored category type {:?} is unknown",
                    kind_raw
                ))
            })?;
            let amount = stored_decimal(&amount_raw, "transaction amount")?;
            let acc = categories.entry(category_id).or_insert(Acc {
                name,
                kind,
                total: Decimal::ZERO,
                count: 0,
            });
            acc.total += amount;
            acc.count += 1;
        }

        // Budget sums per category, same range rule as the dashboard
        let mut stmt = conn.prepare(
            r#"
            SELECT category_id, allocated_amount, remaining_amount, month, year
            FROM budgets WHERE user_id = ?1 AND is_active = 1
            "#,
        )?;
        let budget_rows = stmt
            .query_map([user_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut budgets: HashMap<i64, (Decimal, Decimal)> = HashMap::new();
        for (category_id, allocated_raw, remaining_raw, month, year) in &budget_rows {
            if !period_in_range(*year, *month, range) {
                continue;
            }
            let entry = budgets.entry(*category_id).or_default();
            entry.0 += stored_decimal(allocated_raw, "allocated_amount")?;
            entry.1 += stored_decimal(remaining_raw, "remaining_amount")?;
        }

        let mut summaries: Vec<CategorySummary> = categories
            .into_iter()
            .map(|(category_id, acc)| {
                let budget = budgets.get(&category_id);
                CategorySummary {
                    category_id,
                    category_name: acc.name,
                    category_type: acc.kind,
                    total_amount: acc.total,
                    transaction_count: acc.count,
                    budget_allocated: budget.map(|b| b.0),
                    budget_remaining: budget.map(|b| b.1),
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.category_name.cmp(&b.category_name))
        });
        Ok(summaries)
    }
}
