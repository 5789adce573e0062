//! Tally Core Library
//!
//! Persistence and validation layer for the Tally personal finance tracker:
//! - Entity store over pooled SQLite: users, categories, wallets, budgets,
//!   transactions, investments, reports
//! - Validated create/update payloads with field-attributed error sets
//! - Budget consistency engine keeping wallet balances and budget
//!   spent/remaining in sync with transaction writes, atomically
//! - Aggregation queries (dashboard, monthly trend, category summaries)
//!   computed with exact decimal arithmetic

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod validate;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use models::{
    Budget, BudgetCreate, BudgetUpdate, Category, CategoryCreate, CategorySummary, CategoryType,
    CategoryUpdate, DashboardSummary, Investment, InvestmentCreate, InvestmentTransaction,
    InvestmentTransactionCreate, InvestmentType, InvestmentUpdate, MonthlyTrend, Report,
    ReportCreate, ReportType, Transaction, TransactionCreate, TransactionFilter, TransactionType,
    TransactionUpdate, User, UserCreate, UserLogin, UserRole, UserUpdate, Wallet, WalletCreate,
    WalletUpdate,
};
pub use validate::{FieldError, ValidationErrors};
