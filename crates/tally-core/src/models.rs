//! Domain models for Tally
//!
//! Entities mirror the stored tables one to one. Each entity family also has
//! a `*Create` payload (all required fields) and a `*Update` payload (every
//! field optional, absent fields leave the stored value alone). Payloads
//! validate themselves before anything touches the database.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::validate::ValidationErrors;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A registered user of the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Produced and verified by the auth layer; never serialized outward.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload for registering a user. The password is validated here and handed
/// to the auth layer for hashing; this crate only ever stores the hash.
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: UserRole,
}

impl UserCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("username", &self.username, 50);
        errors.require("email", &self.email, 255);
        if !self.email.trim().is_empty() {
            errors.email("email", &self.email);
        }
        errors.require("full_name", &self.full_name, 100);
        errors.min_len("password", &self.password, 8);
        errors.into_result()
    }
}

/// Partial update for a user. Absent fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(username) = &self.username {
            errors.require("username", username, 50);
        }
        if let Some(email) = &self.email {
            errors.require("email", email, 255);
            if !email.trim().is_empty() {
                errors.email("email", email);
            }
        }
        if let Some(full_name) = &self.full_name {
            errors.require("full_name", full_name, 100);
        }
        errors.into_result()
    }
}

/// Login request shape. Credential verification belongs to the auth layer;
/// this type only pins down the field rules.
#[derive(Debug, Clone)]
pub struct UserLogin {
    pub username: String,
    pub password: String,
}

impl UserLogin {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("username", &self.username, 50);
        if self.password.is_empty() {
            errors.push("password", "must not be empty");
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// An income/expense classification, shared across users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    /// Hex color code, e.g. "#22c55e"
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// User who created it; shared/system categories have none
    pub created_by: Option<i64>,
}

/// Category kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown category type: {}", s)),
        }
    }
}

impl std::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CategoryCreate {
    pub name: String,
    pub description: Option<String>,
    pub category_type: CategoryType,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl CategoryCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, 100);
        errors.max_len_opt("description", self.description.as_deref(), 500);
        errors.max_len_opt("color", self.color.as_deref(), 7);
        errors.max_len_opt("icon", self.icon.as_deref(), 50);
        errors.into_result()
    }
}

/// Partial update for a category. The type is fixed at creation: budgets and
/// transactions already hang off it, so flipping income/expense would
/// invalidate history. Inner `None` on the double-Option fields clears the
/// column.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl CategoryUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name, 100);
        }
        if let Some(Some(description)) = &self.description {
            errors.max_len("description", description, 500);
        }
        if let Some(Some(color)) = &self.color {
            errors.max_len("color", color, 7);
        }
        if let Some(Some(icon)) = &self.icon {
            errors.max_len("icon", icon, 50);
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

/// A money container owned by a user, holding a running balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Running balance; goes negative on overdraft
    pub balance: Decimal,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WalletCreate {
    pub name: String,
    /// Opening balance
    pub balance: Decimal,
    pub is_primary: bool,
}

impl WalletCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, 100);
        errors.scale("balance", self.balance, 2);
        errors.into_result()
    }
}

/// Partial update for a wallet. Setting `balance` overwrites the running
/// balance (manual correction); transaction posting adjusts it relative to
/// whatever is stored.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub name: Option<String>,
    pub balance: Option<Decimal>,
    pub is_primary: Option<bool>,
}

impl WalletUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name, 100);
        }
        errors.scale_opt("balance", self.balance, 2);
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Budgets
// ---------------------------------------------------------------------------

/// A per-category, per-month spending allocation.
///
/// `spent_amount` and `remaining_amount` are derived: they are recomputed by
/// every transaction write that matches the budget's (category, month, year)
/// scope and by budget updates, never edited directly.
/// `remaining_amount == allocated_amount - spent_amount` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub name: String,
    pub allocated_amount: Decimal,
    pub spent_amount: Decimal,
    pub remaining_amount: Decimal,
    pub month: u32,
    pub year: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BudgetCreate {
    pub category_id: i64,
    pub name: String,
    pub allocated_amount: Decimal,
    pub month: u32,
    pub year: i32,
}

impl BudgetCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, 100);
        errors.scale("allocated_amount", self.allocated_amount, 2);
        errors.non_negative("allocated_amount", self.allocated_amount);
        errors.range("month", i64::from(self.month), 1, 12);
        errors.min_value("year", i64::from(self.year), 2000);
        errors.into_result()
    }
}

/// Partial update for a budget. The (category, month, year) scope is fixed;
/// a different scope is a different budget.
#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub name: Option<String>,
    pub allocated_amount: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl BudgetUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name, 100);
        }
        if let Some(allocated) = self.allocated_amount {
            errors.scale("allocated_amount", allocated, 2);
            errors.non_negative("allocated_amount", allocated);
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A single income or expense posting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub wallet_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Always positive; `transaction_type` carries the sign
    pub amount: Decimal,
    pub description: String,
    pub notes: Option<String>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Whether this transaction kind may post against the given category.
    pub fn matches(&self, category_type: CategoryType) -> bool {
        matches!(
            (self, category_type),
            (Self::Income, CategoryType::Income) | (Self::Expense, CategoryType::Expense)
        )
    }

    /// The wallet-balance delta for an amount of this kind.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TransactionCreate {
    pub category_id: i64,
    pub wallet_id: i64,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub notes: Option<String>,
    /// Defaults to today when absent
    pub transaction_date: Option<NaiveDate>,
}

impl TransactionCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.positive("amount", self.amount);
        errors.scale("amount", self.amount, 2);
        errors.require("description", &self.description, 500);
        errors.max_len_opt("notes", self.notes.as_deref(), 1000);
        errors.into_result()
    }
}

/// Partial update for a transaction. The type is immutable: flipping
/// income/expense would silently re-sign history, so that case is a delete
/// plus a create.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub category_id: Option<i64>,
    pub wallet_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub notes: Option<Option<String>>,
    pub transaction_date: Option<NaiveDate>,
}

impl TransactionUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(amount) = self.amount {
            errors.positive("amount", amount);
            errors.scale("amount", amount, 2);
        }
        if let Some(description) = &self.description {
            errors.require("description", description, 500);
        }
        if let Some(Some(notes)) = &self.notes {
            errors.max_len("notes", notes, 1000);
        }
        errors.into_result()
    }
}

/// Filters for transaction listing; fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    /// Inclusive on both ends
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Investments
// ---------------------------------------------------------------------------

/// A tracked investment position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub investment_type: InvestmentType,
    pub initial_amount: Decimal,
    pub current_value: Decimal,
    pub monthly_contribution: Decimal,
    /// Annualized, four decimal places (0.0750 = 7.5%)
    pub expected_return_rate: Option<Decimal>,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Investment vehicle kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentType {
    Stock,
    Bond,
    MutualFund,
    Cryptocurrency,
    RealEstate,
    Gold,
    Other,
}

impl InvestmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Bond => "bond",
            Self::MutualFund => "mutual_fund",
            Self::Cryptocurrency => "cryptocurrency",
            Self::RealEstate => "real_estate",
            Self::Gold => "gold",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for InvestmentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "bond" => Ok(Self::Bond),
            "mutual_fund" | "mutualfund" => Ok(Self::MutualFund),
            "cryptocurrency" | "crypto" => Ok(Self::Cryptocurrency),
            "real_estate" | "realestate" => Ok(Self::RealEstate),
            "gold" => Ok(Self::Gold),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown investment type: {}", s)),
        }
    }
}

impl std::fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct InvestmentCreate {
    pub name: String,
    pub investment_type: InvestmentType,
    pub initial_amount: Decimal,
    pub current_value: Decimal,
    pub monthly_contribution: Decimal,
    pub expected_return_rate: Option<Decimal>,
    pub description: Option<String>,
    /// Defaults to today when absent
    pub start_date: Option<NaiveDate>,
}

impl InvestmentCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, 100);
        errors.scale("initial_amount", self.initial_amount, 2);
        errors.non_negative("initial_amount", self.initial_amount);
        errors.scale("current_value", self.current_value, 2);
        errors.non_negative("current_value", self.current_value);
        errors.scale("monthly_contribution", self.monthly_contribution, 2);
        errors.non_negative("monthly_contribution", self.monthly_contribution);
        errors.scale_opt("expected_return_rate", self.expected_return_rate, 4);
        errors.max_len_opt("description", self.description.as_deref(), 1000);
        errors.into_result()
    }
}

/// Partial update for an investment. `initial_amount` and `start_date` are
/// historical facts and stay fixed.
#[derive(Debug, Clone, Default)]
pub struct InvestmentUpdate {
    pub name: Option<String>,
    pub current_value: Option<Decimal>,
    pub monthly_contribution: Option<Decimal>,
    pub expected_return_rate: Option<Option<Decimal>>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl InvestmentUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name, 100);
        }
        if let Some(value) = self.current_value {
            errors.scale("current_value", value, 2);
            errors.non_negative("current_value", value);
        }
        if let Some(contribution) = self.monthly_contribution {
            errors.scale("monthly_contribution", contribution, 2);
            errors.non_negative("monthly_contribution", contribution);
        }
        if let Some(Some(rate)) = self.expected_return_rate {
            errors.scale("expected_return_rate", rate, 4);
        }
        if let Some(Some(description)) = &self.description {
            errors.max_len("description", description, 1000);
        }
        errors.into_result()
    }
}

/// One buy/sell/dividend entry in an investment's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentTransaction {
    pub id: i64,
    pub investment_id: i64,
    /// Free-form kind: "buy", "sell", "dividend", ...
    pub transaction_type: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub description: String,
    pub transaction_date: NaiveDate,
    /// Whether this entry adjusted the parent's `current_value` when it was
    /// recorded. Deleting the entry reverses the adjustment only if it did.
    pub applied_to_value: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InvestmentTransactionCreate {
    pub investment_id: i64,
    pub transaction_type: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub description: String,
    /// Defaults to today when absent
    pub transaction_date: Option<NaiveDate>,
}

impl InvestmentTransactionCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("transaction_type", &self.transaction_type, 20);
        errors.positive("amount", self.amount);
        errors.scale("amount", self.amount, 2);
        errors.scale_opt("quantity", self.quantity, 4);
        errors.scale_opt("price_per_unit", self.price_per_unit, 4);
        errors.require("description", &self.description, 500);
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A snapshotted aggregation result.
///
/// Immutable once generated; `expires_at` drives invalidation. Expired
/// reports read as not-found and can be purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    pub report_type: ReportType,
    pub title: String,
    /// Inputs the snapshot was generated from
    pub parameters: Value,
    /// The snapshot itself
    pub generated_data: Value,
    pub generated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Report kinds and the aggregation each one snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Dashboard summary for one (month, year)
    Monthly,
    /// Monthly trend rows for one year
    Yearly,
    /// Category summaries for one (month, year)
    Category,
    /// Per-investment valuations plus portfolio totals
    Investment,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Category => "category",
            Self::Investment => "investment",
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "category" => Ok(Self::Category),
            "investment" => Ok(Self::Investment),
            _ => Err(format!("Unknown report type: {}", s)),
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ReportCreate {
    pub report_type: ReportType,
    pub title: String,
    /// JSON object of generation inputs ("month", "year", ...). `Null` is
    /// read as an empty object.
    pub parameters: Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReportCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("title", &self.title, 200);
        if !self.parameters.is_object() && !self.parameters.is_null() {
            errors.push("parameters", "must be a JSON object");
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// Aggregation views
// ---------------------------------------------------------------------------

/// Top-line numbers for a user's dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`
    pub net_income: Decimal,
    pub total_budget: Decimal,
    pub budget_remaining: Decimal,
    pub total_investments: Decimal,
    pub wallet_balance: Decimal,
}

/// Income/expense totals for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: u32,
    pub year: i32,
    pub income: Decimal,
    pub expenses: Decimal,
    /// `income - expenses`
    pub net: Decimal,
}

/// Per-category totals, joined with any matching budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: i64,
    pub category_name: String,
    pub category_type: CategoryType,
    pub total_amount: Decimal,
    pub transaction_count: i64,
    /// None when the user has no matching budget in scope
    pub budget_allocated: Option<Decimal>,
    pub budget_remaining: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_type_round_trips() {
        for t in [TransactionType::Income, TransactionType::Expense] {
            let parsed: TransactionType = t.as_str().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn investment_type_accepts_aliases() {
        assert_eq!(
            "mutualfund".parse::<InvestmentType>().unwrap(),
            InvestmentType::MutualFund
        );
        assert_eq!(
            "crypto".parse::<InvestmentType>().unwrap(),
            InvestmentType::Cryptocurrency
        );
        assert!("stocks".parse::<InvestmentType>().is_err());
    }

    #[test]
    fn type_match_is_symmetric_per_kind() {
        assert!(TransactionType::Income.matches(CategoryType::Income));
        assert!(TransactionType::Expense.matches(CategoryType::Expense));
        assert!(!TransactionType::Income.matches(CategoryType::Expense));
        assert!(!TransactionType::Expense.matches(CategoryType::Income));
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(TransactionType::Income.signed(dec!(10)), dec!(10));
        assert_eq!(TransactionType::Expense.signed(dec!(10)), dec!(-10));
    }

    #[test]
    fn user_create_rejects_bad_fields() {
        let payload = UserCreate {
            username: "".into(),
            email: "nope".into(),
            full_name: "A".repeat(101),
            password: "short".into(),
            role: UserRole::User,
        };
        let err = payload.validate().unwrap_err();
        match err {
            crate::Error::Validation(errors) => {
                let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
                assert!(fields.contains(&"username"));
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"full_name"));
                assert!(fields.contains(&"password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn user_login_requires_credentials() {
        let ok = UserLogin {
            username: "grace".into(),
            password: "hunter2hunter2".into(),
        };
        assert!(ok.validate().is_ok());

        let blank = UserLogin {
            username: "".into(),
            password: "".into(),
        };
        let err = blank.validate().unwrap_err();
        match err {
            crate::Error::Validation(errors) => {
                let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["username", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let long = UserLogin {
            username: "g".repeat(51),
            password: "hunter2hunter2".into(),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn budget_create_checks_period() {
        let payload = BudgetCreate {
            category_id: 1,
            name: "Groceries".into(),
            allocated_amount: dec!(500.00),
            month: 13,
            year: 1999,
        };
        let err = payload.validate().unwrap_err();
        match err {
            crate::Error::Validation(errors) => {
                let fields: Vec<_> = errors.errors().iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["month", "year"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn transaction_create_requires_positive_two_place_amount() {
        let base = TransactionCreate {
            category_id: 1,
            wallet_id: 1,
            transaction_type: TransactionType::Expense,
            amount: dec!(12.345),
            description: "Lunch".into(),
            notes: None,
            transaction_date: None,
        };
        assert!(base.validate().is_err());

        let ok = TransactionCreate {
            amount: dec!(12.34),
            ..base.clone()
        };
        assert!(ok.validate().is_ok());

        let zero = TransactionCreate {
            amount: Decimal::ZERO,
            ..base
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn update_payloads_accept_empty() {
        assert!(UserUpdate::default().validate().is_ok());
        assert!(CategoryUpdate::default().validate().is_ok());
        assert!(WalletUpdate::default().validate().is_ok());
        assert!(BudgetUpdate::default().validate().is_ok());
        assert!(TransactionUpdate::default().validate().is_ok());
        assert!(InvestmentUpdate::default().validate().is_ok());
    }

    #[test]
    fn report_parameters_must_be_object_or_null() {
        let mut payload = ReportCreate {
            report_type: ReportType::Monthly,
            title: "May".into(),
            parameters: serde_json::json!({"month": 5, "year": 2024}),
            expires_at: None,
        };
        assert!(payload.validate().is_ok());

        payload.parameters = Value::Null;
        assert!(payload.validate().is_ok());

        payload.parameters = serde_json::json!([1, 2, 3]);
        assert!(payload.validate().is_err());
    }
}
