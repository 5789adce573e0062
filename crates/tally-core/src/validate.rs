//! Field-level validation shared by the create/update payloads
//!
//! Every payload `validate()` pushes into one [`ValidationErrors`] collector
//! so the caller sees the full set of offending fields in a single error
//! instead of fixing one field per round trip.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$")
        .expect("email pattern compiles")
});

/// A single rejected field with a user-correctable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Accumulates rejected fields across a whole payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Ok when nothing was rejected, otherwise the full error set.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }

    /// Required string: non-empty after trimming, at most `max` characters.
    pub fn require(&mut self, field: &'static str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.push(field, "must not be empty");
        } else {
            self.max_len(field, value, max);
        }
    }

    /// Length ceiling on a string, counted in characters.
    pub fn max_len(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("must be at most {} characters", max));
        }
    }

    pub fn max_len_opt(&mut self, field: &'static str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            self.max_len(field, v, max);
        }
    }

    pub fn min_len(&mut self, field: &'static str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.push(field, format!("must be at least {} characters", min));
        }
    }

    /// Fractional-digit ceiling. Trailing zeros do not count against it
    /// (120.5000 passes a 2-place check).
    pub fn scale(&mut self, field: &'static str, value: Decimal, max_places: u32) {
        if value.normalize().scale() > max_places {
            self.push(
                field,
                format!("must have at most {} decimal places", max_places),
            );
        }
    }

    pub fn scale_opt(&mut self, field: &'static str, value: Option<Decimal>, max_places: u32) {
        if let Some(v) = value {
            self.scale(field, v, max_places);
        }
    }

    pub fn positive(&mut self, field: &'static str, value: Decimal) {
        if value <= Decimal::ZERO {
            self.push(field, "must be greater than zero");
        }
    }

    pub fn non_negative(&mut self, field: &'static str, value: Decimal) {
        if value < Decimal::ZERO {
            self.push(field, "must not be negative");
        }
    }

    pub fn range(&mut self, field: &'static str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.push(field, format!("must be between {} and {}", min, max));
        }
    }

    pub fn min_value(&mut self, field: &'static str, value: i64, min: i64) {
        if value < min {
            self.push(field, format!("must be at least {}", min));
        }
    }

    pub fn email(&mut self, field: &'static str, value: &str) {
        if !EMAIL_RE.is_match(value) {
            self.push(field, "is not a valid email address");
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}
