//! This file defines the `Transaction` type, the database queries for
//! transactions and the route handlers for recording and deleting spending.
//!
//! A transaction is a single purchase: where the money came from (the
//! institution), what was bought, how much it cost and which budget category
//! it counts against.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    response::Redirect,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    budget::budget_category_exists,
    endpoints,
    reconciliation::{
        apply_transaction_to_budget, revert_transaction_from_budget, update_income_usage,
    },
    user::UserID,
};

/// Alias for the integer type used for transaction row IDs.
pub type TransactionID = i64;

/// The date format used for transactions in forms, e.g., "2024-03-10".
pub const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A single purchase recorded against a budget category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionID,
    /// The user that recorded the transaction.
    pub user_id: UserID,
    /// The bank or account the money came from, e.g., 'Checking'.
    pub institution: String,
    /// What was bought.
    pub product: String,
    /// How much it cost.
    pub price: f64,
    /// When the purchase happened.
    pub date: Date,
    /// The budget category the purchase counts against.
    pub category: String,
}

/// Create the transaction table.
///
/// The table is named `txn` because `transaction` is an SQL keyword.
///
/// # Errors
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS txn (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                institution TEXT NOT NULL,
                product TEXT NOT NULL,
                price REAL NOT NULL,
                date TEXT NOT NULL,
                category TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new transaction, add its price to the matching
/// budget and recompute income usage.
///
/// The category must be covered by an existing budget (owned by anyone).
/// The price is applied to the budget matching the category and the
/// transaction date's month and year; if no budget covers that exact period
/// the transaction is still recorded but no budget is updated.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if no budget covers the category, or
/// [Error::SqlError] if an SQL error occurred.
pub fn create_transaction(
    user_id: UserID,
    institution: &str,
    product: &str,
    price: f64,
    date: Date,
    category: &str,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let category = category.trim();

    if !budget_category_exists(category, connection)? {
        return Err(Error::CategoryNotFound(category.to_string()));
    }

    connection.execute(
        "INSERT INTO txn (user_id, institution, product, price, date, category) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            user_id.as_i64(),
            institution,
            product,
            price,
            date,
            category,
        ),
    )?;
    let id = connection.last_insert_rowid();

    apply_transaction_to_budget(category, price, date.month() as u8, date.year(), connection)?;
    update_income_usage(connection)?;

    Ok(Transaction {
        id,
        user_id,
        institution: institution.to_string(),
        product: product.to_string(),
        price,
        date,
        category: category.to_string(),
    })
}

/// Get the transaction with the ID `transaction_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no transaction has the ID, or
/// [Error::SqlError] if an SQL error occurred.
pub fn get_transaction(
    transaction_id: TransactionID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, user_id, institution, product, price, date, category \
            FROM txn WHERE id = :id;",
        )?
        .query_row(&[(":id", &transaction_id)], map_row)
        .map_err(|error| error.into())
}

/// Get all transactions belonging to `user_id`, most recent first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, institution, product, price, date, category \
            FROM txn WHERE user_id = :user_id ORDER BY date DESC, id DESC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the total spent per institution for `user_id`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_institution_totals(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<(String, f64)>, Error> {
    connection
        .prepare(
            "SELECT institution, COALESCE(SUM(price), 0) FROM txn \
            WHERE user_id = :user_id GROUP BY institution ORDER BY institution ASC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .map(|maybe_total| maybe_total.map_err(|error| error.into()))
        .collect()
}

/// Delete the transaction with `transaction_id`, subtract its price from
/// the matching budget and recompute income usage.
///
/// # Errors
/// Returns [Error::NotFound] if no transaction has the ID, or
/// [Error::SqlError] if an SQL error occurred.
pub fn delete_transaction(
    transaction_id: TransactionID,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = get_transaction(transaction_id, connection)?;

    revert_transaction_from_budget(&transaction.category, transaction.price, connection)?;
    update_income_usage(connection)?;

    connection.execute("DELETE FROM txn WHERE id = ?1", [transaction_id])?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        institution: row.get(2)?,
        product: row.get(3)?,
        price: row.get(4)?,
        date: row.get(5)?,
        category: row.get(6)?,
    })
}

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionEndpointState {
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data submitted from the transaction form on the dashboard.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransactionFormData {
    /// The bank or account the money came from.
    pub institution: String,
    /// What was bought.
    pub product: String,
    /// How much it cost.
    pub price: f64,
    /// When the purchase happened, as "YYYY-MM-DD".
    pub date: String,
    /// The budget category the purchase counts against.
    pub category: String,
}

/// A route handler for recording a transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionEndpointState>,
    Extension(user_id): Extension<UserID>,
    Form(form_data): Form<CreateTransactionFormData>,
) -> Result<Redirect, Error> {
    let date = Date::parse(&form_data.date, DATE_FORMAT)
        .map_err(|error| Error::InvalidDateFormat(error.to_string(), form_data.date.clone()))?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    create_transaction(
        user_id,
        &form_data.institution,
        &form_data.product,
        form_data.price,
        date,
        &form_data.category,
        &connection,
    )?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}

/// The data submitted from the transaction delete button's form.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTransactionFormData {
    /// The ID of the transaction to delete.
    pub transaction_id: TransactionID,
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionEndpointState>,
    Form(form_data): Form<DeleteTransactionFormData>,
) -> Result<Redirect, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(form_data.transaction_id, &connection)?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}

#[cfg(test)]
mod transaction_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error, PasswordHash,
        budget::{create_budget, get_budget},
        db::initialize,
        income::{create_income, get_income},
        user::{UserID, create_user},
    };

    use super::{
        create_transaction, delete_transaction, get_institution_totals, get_transaction,
        get_transactions_by_user,
    };

    fn get_test_db_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        // The tests below refer to users 1 and 2, which rowids assign in
        // insertion order.
        create_user("alice", PasswordHash::new_unchecked("hunter2"), &connection)
            .expect("Could not create test user");
        create_user("bob", PasswordHash::new_unchecked("hunter2"), &connection)
            .expect("Could not create test user");

        connection
    }

    #[test]
    fn create_transaction_updates_matching_budget() {
        let connection = get_test_db_connection();
        let user = UserID::new(1);
        let budget = create_budget(user, "Food", 200.0, 3, 2024, &connection).unwrap();

        let transaction = create_transaction(
            user,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            "Food",
            &connection,
        )
        .expect("Could not create transaction");

        assert!(transaction.id > 0);
        let budget = get_budget(budget.id, &connection).unwrap();
        assert_eq!(budget.used, 50.0);
        assert_eq!(budget.remaining, 150.0);
    }

    #[test]
    fn create_transaction_fails_on_unknown_category_and_persists_nothing() {
        let connection = get_test_db_connection();
        let user = UserID::new(1);

        let result = create_transaction(
            user,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            "Food",
            &connection,
        );

        assert_eq!(result, Err(Error::CategoryNotFound("Food".to_string())));
        assert_eq!(get_transactions_by_user(user, &connection).unwrap(), vec![]);
    }

    #[test]
    fn create_transaction_trims_category_before_matching() {
        let connection = get_test_db_connection();
        let user = UserID::new(1);
        let budget = create_budget(user, "Food", 200.0, 3, 2024, &connection).unwrap();

        create_transaction(
            user,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            " Food ",
            &connection,
        )
        .expect("Could not create transaction");

        let budget = get_budget(budget.id, &connection).unwrap();
        assert_eq!(budget.used, 50.0);
    }

    #[test]
    fn create_then_delete_restores_budget_and_income() {
        let connection = get_test_db_connection();
        let user = UserID::new(1);
        let budget = create_budget(user, "Food", 200.0, 3, 2024, &connection).unwrap();
        let income = create_income(user, 1000.0, 3, 2024, &connection).unwrap();

        let transaction = create_transaction(
            user,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            "Food",
            &connection,
        )
        .unwrap();

        let budget_after_create = get_budget(budget.id, &connection).unwrap();
        assert_eq!(budget_after_create.used, 50.0);
        assert_eq!(budget_after_create.remaining, 150.0);
        let income_after_create = get_income(income.id, &connection).unwrap();
        assert_eq!(income_after_create.used, 50.0);
        assert_eq!(income_after_create.remaining, 950.0);

        delete_transaction(transaction.id, &connection).unwrap();

        let budget_after_delete = get_budget(budget.id, &connection).unwrap();
        assert_eq!(budget_after_delete.used, 0.0);
        assert_eq!(budget_after_delete.remaining, 200.0);
        let income_after_delete = get_income(income.id, &connection).unwrap();
        assert_eq!(income_after_delete.used, 0.0);
        assert_eq!(income_after_delete.remaining, 1000.0);
        assert_eq!(
            get_transaction(transaction.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_transaction_fails_with_unknown_id() {
        let connection = get_test_db_connection();

        assert_eq!(delete_transaction(999, &connection), Err(Error::NotFound));
    }

    #[test]
    fn get_transactions_by_user_only_returns_own_transactions() {
        let connection = get_test_db_connection();
        let alice = UserID::new(1);
        let bob = UserID::new(2);
        create_budget(alice, "Food", 200.0, 3, 2024, &connection).unwrap();
        let alices_transaction = create_transaction(
            alice,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            "Food",
            &connection,
        )
        .unwrap();
        create_transaction(
            bob,
            "Savings",
            "Takeaways",
            30.0,
            date!(2024 - 03 - 11),
            "Food",
            &connection,
        )
        .unwrap();

        let transactions = get_transactions_by_user(alice, &connection).unwrap();

        assert_eq!(transactions, vec![alices_transaction]);
    }

    #[test]
    fn get_institution_totals_sums_per_institution() {
        let connection = get_test_db_connection();
        let user = UserID::new(1);
        create_budget(user, "Food", 200.0, 3, 2024, &connection).unwrap();
        create_transaction(
            user,
            "Checking",
            "Groceries",
            50.0,
            date!(2024 - 03 - 10),
            "Food",
            &connection,
        )
        .unwrap();
        create_transaction(
            user,
            "Checking",
            "Takeaways",
            25.0,
            date!(2024 - 03 - 11),
            "Food",
            &connection,
        )
        .unwrap();
        create_transaction(
            user,
            "Credit Card",
            "Snacks",
            10.0,
            date!(2024 - 03 - 12),
            "Food",
            &connection,
        )
        .unwrap();

        let totals = get_institution_totals(user, &connection).unwrap();

        assert_eq!(
            totals,
            vec![
                ("Checking".to_string(), 75.0),
                ("Credit Card".to_string(), 10.0)
            ]
        );
    }
}
