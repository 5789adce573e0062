//! Integration tests for tally-core
//!
//! These tests exercise the full register → post → budget → report workflow
//! the way a consuming application would drive it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tally_core::{
    BudgetCreate, BudgetUpdate, CategoryCreate, CategoryType, Config, Database, Error,
    InvestmentCreate, InvestmentTransactionCreate, InvestmentType, ReportCreate, ReportType,
    TransactionCreate, TransactionFilter, TransactionType, TransactionUpdate, UserCreate,
    UserRole, WalletCreate,
};

/// Register a user the way an account-creation endpoint would: validate the
/// payload, hash the password elsewhere, store the hash.
fn register(db: &Database, username: &str) -> i64 {
    db.create_user(
        &UserCreate {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: format!("{} Example", username),
            password: "a-long-enough-password".to_string(),
            role: UserRole::User,
        },
        "argon2id$integration-hash",
    )
    .expect("Failed to create user")
    .id
}

fn post(
    db: &Database,
    user_id: i64,
    category_id: i64,
    wallet_id: i64,
    kind: TransactionType,
    amount: Decimal,
    date: &str,
) -> i64 {
    db.create_transaction(
        user_id,
        &TransactionCreate {
            category_id,
            wallet_id,
            transaction_type: kind,
            amount,
            description: "integration posting".to_string(),
            notes: None,
            transaction_date: Some(date.parse().expect("Bad test date")),
        },
    )
    .expect("Failed to create transaction")
    .id
}

// =============================================================================
// Full Workflow Integration Tests
// =============================================================================

#[test]
fn test_month_of_usage_workflow() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config {
        db_path: dir.path().join("data/tally.db"),
        report_ttl_days: None,
    };
    let db = Database::open(&config).expect("Failed to open database");

    // Two households on the same install; their books never mix
    let ada = register(&db, "ada");
    let grace = register(&db, "grace");

    // Shared category catalog
    let food = db
        .create_category(
            Some(ada),
            &CategoryCreate {
                name: "Food".to_string(),
                description: Some("Groceries and eating out".to_string()),
                category_type: CategoryType::Expense,
                color: Some("#44AA44".to_string()),
                icon: Some("basket".to_string()),
            },
        )
        .expect("Failed to create category")
        .id;
    let rent = db
        .create_category(
            Some(ada),
            &CategoryCreate {
                name: "Rent".to_string(),
                description: None,
                category_type: CategoryType::Expense,
                color: None,
                icon: None,
            },
        )
        .unwrap()
        .id;
    let salary = db
        .create_category(
            Some(ada),
            &CategoryCreate {
                name: "Salary".to_string(),
                description: None,
                category_type: CategoryType::Income,
                color: None,
                icon: None,
            },
        )
        .unwrap()
        .id;

    // Wallets
    let checking = db
        .create_wallet(
            ada,
            &WalletCreate {
                name: "Checking".to_string(),
                balance: dec!(2000.00),
                is_primary: true,
            },
        )
        .expect("Failed to create wallet")
        .id;
    let grace_wallet = db
        .create_wallet(
            grace,
            &WalletCreate {
                name: "Checking".to_string(),
                balance: Decimal::ZERO,
                is_primary: true,
            },
        )
        .unwrap()
        .id;

    // May 2024 budgets
    let food_budget = db
        .create_budget(
            ada,
            &BudgetCreate {
                category_id: food,
                name: "Food May".to_string(),
                allocated_amount: dec!(400.00),
                month: 5,
                year: 2024,
            },
        )
        .expect("Failed to create budget")
        .id;
    db.create_budget(
        ada,
        &BudgetCreate {
            category_id: rent,
            name: "Rent May".to_string(),
            allocated_amount: dec!(1200.00),
            month: 5,
            year: 2024,
        },
    )
    .unwrap();

    // A month of postings
    post(&db, ada, salary, checking, TransactionType::Income, dec!(3000.00), "2024-05-01");
    post(&db, ada, rent, checking, TransactionType::Expense, dec!(1150.00), "2024-05-02");
    let lunch = post(&db, ada, food, checking, TransactionType::Expense, dec!(18.40), "2024-05-06");
    post(&db, ada, food, checking, TransactionType::Expense, dec!(102.35), "2024-05-11");

    // Wallet: 2000 + 3000 - 1150 - 18.40 - 102.35
    let wallet = db.get_wallet(ada, checking).expect("Failed to get wallet");
    assert_eq!(wallet.balance, dec!(3729.25));

    // Food budget tracked both postings
    let budget = db.get_budget(ada, food_budget).unwrap();
    assert_eq!(budget.spent_amount, dec!(120.75));
    assert_eq!(budget.remaining_amount, dec!(279.25));

    // The lunch was actually 21.90, paid on the 7th
    db.update_transaction(
        ada,
        lunch,
        &TransactionUpdate {
            amount: Some(dec!(21.90)),
            transaction_date: Some("2024-05-07".parse().unwrap()),
            ..Default::default()
        },
    )
    .expect("Failed to update transaction");

    let budget = db.get_budget(ada, food_budget).unwrap();
    assert_eq!(budget.spent_amount, dec!(124.25));
    assert_eq!(budget.remaining_amount, dec!(275.75));
    let wallet = db.get_wallet(ada, checking).unwrap();
    assert_eq!(wallet.balance, dec!(3725.75));

    // Mid-month allocation change keeps the derived columns consistent
    let budget = db
        .update_budget(
            ada,
            food_budget,
            &BudgetUpdate {
                allocated_amount: Some(dec!(350.00)),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(budget.spent_amount, dec!(124.25));
    assert_eq!(budget.remaining_amount, dec!(225.75));

    // Grace's books are untouched by all of the above
    assert_eq!(db.get_wallet(grace, grace_wallet).unwrap().balance, Decimal::ZERO);
    assert!(db
        .list_transactions(grace, &TransactionFilter::default())
        .unwrap()
        .is_empty());
    assert!(matches!(
        db.get_budget(grace, food_budget).unwrap_err(),
        Error::NotFound(_)
    ));

    // Dashboard for May
    let may = Some((
        "2024-05-01".parse().unwrap(),
        "2024-05-31".parse().unwrap(),
    ));
    let summary = db.dashboard_summary(ada, may).unwrap();
    assert_eq!(summary.total_income, dec!(3000.00));
    assert_eq!(summary.total_expenses, dec!(1275.90));
    assert_eq!(summary.net_income, dec!(1724.10));
    assert_eq!(summary.total_budget, dec!(1550.00));
    assert_eq!(summary.wallet_balance, dec!(3725.75));

    // Category breakdown, largest spend first
    let categories = db.category_summary(ada, may).unwrap();
    assert_eq!(categories[0].category_name, "Rent");
    assert_eq!(categories[0].total_amount, dec!(1150.00));
    assert_eq!(categories[1].category_name, "Food");
    assert_eq!(categories[1].budget_allocated, Some(dec!(350.00)));

    // Snapshot the month; later postings must not rewrite it
    let report = db
        .generate_report(
            ada,
            &ReportCreate {
                report_type: ReportType::Monthly,
                title: "May 2024 close".to_string(),
                parameters: json!({ "month": 5, "year": 2024 }),
                expires_at: None,
            },
        )
        .expect("Failed to generate report");
    let snapshot = report.generated_data.clone();

    post(&db, ada, food, checking, TransactionType::Expense, dec!(55.00), "2024-05-30");
    let reread = db.get_report(ada, report.id).unwrap();
    assert_eq!(reread.generated_data, snapshot, "reports are immutable snapshots");

    let fresh = db.dashboard_summary(ada, may).unwrap();
    assert_eq!(fresh.total_expenses, dec!(1330.90));
}

#[test]
fn test_investment_portfolio_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let ada = register(&db, "ada");

    let fund = db
        .create_investment(
            ada,
            &InvestmentCreate {
                name: "Pension fund".to_string(),
                investment_type: InvestmentType::MutualFund,
                initial_amount: dec!(5000.00),
                current_value: dec!(5000.00),
                monthly_contribution: dec!(250.00),
                expected_return_rate: Some(dec!(0.0550)),
                description: None,
                start_date: Some("2023-01-01".parse().unwrap()),
            },
        )
        .expect("Failed to create investment")
        .id;

    // Monthly contribution lands and is applied to the valuation
    let entry = db
        .record_investment_transaction(
            ada,
            &InvestmentTransactionCreate {
                investment_id: fund,
                transaction_type: "buy".to_string(),
                amount: dec!(250.00),
                quantity: None,
                price_per_unit: None,
                description: "May contribution".to_string(),
                transaction_date: Some("2024-05-01".parse().unwrap()),
            },
            true,
        )
        .expect("Failed to record investment transaction");
    assert_eq!(
        db.get_investment(ada, fund).unwrap().current_value,
        dec!(5250.00)
    );

    // Portfolio report picks up the adjusted valuation
    let report = db
        .generate_report(
            ada,
            &ReportCreate {
                report_type: ReportType::Investment,
                title: "Portfolio".to_string(),
                parameters: json!({}),
                expires_at: None,
            },
        )
        .unwrap();
    assert_eq!(report.generated_data["total_current_value"], json!("5250.00"));

    // The contribution was a mistake; removing it restores the valuation
    db.delete_investment_transaction(ada, fund, entry.id)
        .expect("Failed to delete investment transaction");
    assert_eq!(
        db.get_investment(ada, fund).unwrap().current_value,
        dec!(5000.00)
    );
    assert!(db.list_investment_transactions(ada, fund).unwrap().is_empty());
}

#[test]
fn test_rejected_posting_leaves_no_partial_state() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let ada = register(&db, "ada");
    let food = db
        .create_category(
            None,
            &CategoryCreate {
                name: "Food".to_string(),
                description: None,
                category_type: CategoryType::Expense,
                color: None,
                icon: None,
            },
        )
        .unwrap()
        .id;
    let wallet = db
        .create_wallet(
            ada,
            &WalletCreate {
                name: "Checking".to_string(),
                balance: dec!(100.00),
                is_primary: true,
            },
        )
        .unwrap()
        .id;
    db.create_budget(
        ada,
        &BudgetCreate {
            category_id: food,
            name: "Food May".to_string(),
            allocated_amount: dec!(200.00),
            month: 5,
            year: 2024,
        },
    )
    .unwrap();

    // Nonexistent category: the whole posting must vanish
    let err = db
        .create_transaction(
            ada,
            &TransactionCreate {
                category_id: 9999,
                wallet_id: wallet,
                transaction_type: TransactionType::Expense,
                amount: dec!(10.00),
                description: "ghost".to_string(),
                notes: None,
                transaction_date: Some("2024-05-10".parse().unwrap()),
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(db.get_wallet(ada, wallet).unwrap().balance, dec!(100.00));
    assert!(db
        .list_transactions(ada, &TransactionFilter::default())
        .unwrap()
        .is_empty());
    let budgets = db.list_budgets(ada, Some(5), Some(2024), true).unwrap();
    assert_eq!(budgets[0].spent_amount, Decimal::ZERO);
}
