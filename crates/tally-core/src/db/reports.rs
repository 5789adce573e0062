//! Report generation and retrieval
//!
//! A report is a snapshot: generating one runs the requested aggregation
//! immediately and stores the result as JSON. Reads never recompute, so a
//! report reflects the books as they stood at generation time. An expired
//! report reads as not-found until a purge removes the row.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::info;

use super::{format_datetime, json_column, parse_datetime, text_column, Database};
use crate::error::{Error, Result};
use crate::models::{Report, ReportCreate, ReportType};
use crate::validate::ValidationErrors;

fn param_month(parameters: &Value) -> Result<Option<u32>> {
    match parameters.get("month") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(month @ 1..=12) => Ok(Some(month as u32)),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.push("parameters", "month must be an integer between 1 and 12");
                Err(errors.into())
            }
        },
    }
}

fn param_year(parameters: &Value) -> Result<Option<i32>> {
    match parameters.get("year") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_i64() {
            Some(year @ 2000..=9999) => Ok(Some(year as i32)),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.push("parameters", "year must be an integer between 2000 and 9999");
                Err(errors.into())
            }
        },
    }
}

/// First through last day of one month, inclusive
fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1);
    let to = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
    }
    .and_then(|first_of_next| first_of_next.pred_opt());
    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(Error::Consistency(format!(
            "period {}-{:02} is not a calendar month",
            year, month
        ))),
    }
}

fn year_range(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1);
    let to = NaiveDate::from_ymd_opt(year, 12, 31);
    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(Error::Consistency(format!(
            "year {} is out of calendar range",
            year
        ))),
    }
}

impl Database {
    /// Run the aggregation named by the payload and store the result.
    /// Month/year default to the current date when the parameters omit
    /// them; the expiry defaults to the configured report TTL.
    pub fn generate_report(&self, user_id: i64, input: &ReportCreate) -> Result<Report> {
        input.validate()?;

        let today = Utc::now().date_naive();
        let generated_data = match input.report_type {
            ReportType::Monthly => {
                let month = param_month(&input.parameters)?.unwrap_or_else(|| today.month());
                let year = param_year(&input.parameters)?.unwrap_or_else(|| today.year());
                let summary = self.dashboard_summary(user_id, Some(month_range(year, month)?))?;
                serde_json::to_value(summary)?
            }
            ReportType::Yearly => {
                let year = param_year(&input.parameters)?.unwrap_or_else(|| today.year());
                let trend = self.monthly_trend(user_id, Some(year_range(year)?))?;
                serde_json::to_value(trend)?
            }
            ReportType::Category => {
                let month = param_month(&input.parameters)?.unwrap_or_else(|| today.month());
                let year = param_year(&input.parameters)?.unwrap_or_else(|| today.year());
                let summaries = self.category_summary(user_id, Some(month_range(year, month)?))?;
                serde_json::to_value(summaries)?
            }
            ReportType::Investment => {
                let investments = self.list_investments(user_id, true)?;
                let mut total = Decimal::ZERO;
                for investment in &investments {
                    total += investment.current_value;
                }
                json!({
                    "investments": investments,
                    "total_current_value": total,
                })
            }
        };

        let expires_at = input.expires_at.or_else(|| {
            self.report_ttl_days()
                .map(|days| Utc::now() + Duration::days(i64::from(days)))
        });
        let parameters = match &input.parameters {
            Value::Null => json!({}),
            parameters => parameters.clone(),
        };

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO reports
                (user_id, report_type, title, parameters, generated_data, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user_id,
                input.report_type.as_str(),
                input.title,
                parameters.to_string(),
                generated_data.to_string(),
                expires_at.map(format_datetime)
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!(report_id = id, user_id, kind = %input.report_type, "Report generated");
        self.get_report_row(user_id, id)
    }

    /// Get a report owned by the given user. Expired reads as not-found.
    pub fn get_report(&self, user_id: i64, report_id: i64) -> Result<Report> {
        let report = self.get_report_row(user_id, report_id)?;
        if let Some(expires_at) = report.expires_at {
            if expires_at <= Utc::now() {
                return Err(Error::NotFound(format!("report {}", report_id)));
            }
        }
        Ok(report)
    }

    /// List a user's unexpired reports, newest first
    pub fn list_reports(&self, user_id: i64) -> Result<Vec<Report>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, report_type, title, parameters, generated_data,
                   generated_at, expires_at
            FROM reports
            WHERE user_id = ?1 AND (expires_at IS NULL OR expires_at > datetime('now'))
            ORDER BY generated_at DESC, id DESC
            "#,
        )?;
        let reports = stmt
            .query_map(params![user_id], Self::row_to_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    /// Delete a report. Snapshots have no soft-delete; the row goes away.
    pub fn delete_report(&self, user_id: i64, report_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM reports WHERE id = ?1 AND user_id = ?2",
            params![report_id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("report {}", report_id)));
        }
        Ok(())
    }

    /// Drop every expired report, for all users, returning the count
    pub fn purge_expired_reports(&self) -> Result<u64> {
        let conn = self.conn()?;
        let purged = conn.execute(
            "DELETE FROM reports WHERE expires_at IS NOT NULL AND expires_at <= datetime('now')",
            [],
        )?;
        if purged > 0 {
            info!(purged, "Expired reports purged");
        }
        Ok(purged as u64)
    }

    /// Fetch without the expiry filter; generation needs the row it just
    /// wrote even when the caller asked for an already-past expiry
    fn get_report_row(&self, user_id: i64, report_id: i64) -> Result<Report> {
        let conn = self.conn()?;
        conn.query_row(
            r#"
            SELECT id, user_id, report_type, title, parameters, generated_data,
                   generated_at, expires_at
            FROM reports WHERE id = ?1 AND user_id = ?2
            "#,
            params![report_id, user_id],
            Self::row_to_report,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("report {}", report_id)))
    }

    pub(crate) fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<Report> {
        let report_type: String = row.get(2)?;
        let parameters: String = row.get(4)?;
        let generated_data: String = row.get(5)?;
        let generated_at: String = row.get(6)?;
        let expires_at: Option<String> = row.get(7)?;
        Ok(Report {
            id: row.get(0)?,
            user_id: row.get(1)?,
            report_type: text_column(2, report_type)?,
            title: row.get(3)?,
            parameters: json_column(4, parameters)?,
            generated_data: json_column(5, generated_data)?,
            generated_at: parse_datetime(&generated_at),
            expires_at: expires_at.map(|s| parse_datetime(&s)),
        })
    }
}
