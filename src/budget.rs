//! This file defines the `Budget` type, the database queries for budgets and
//! the route handlers for creating and deleting budgets.
//!
//! A budget sets aside an amount of money for a category of spending in a
//! particular month, and tracks how much of that amount transactions have
//! used up.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base, text_input},
    navigation::NavBar,
    reconciliation::update_income_usage,
    user::UserID,
};

/// Alias for the integer type used for budget row IDs.
pub type BudgetID = i64;

/// An amount of money set aside for a category of spending in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetID,
    /// The user that created the budget.
    pub user_id: UserID,
    /// The category of spending the budget covers, e.g., 'Groceries'.
    pub category: String,
    /// The amount of money set aside.
    pub amount: f64,
    /// The total price of the transactions recorded against the budget.
    pub used: f64,
    /// The amount left over, i.e. `amount - used`.
    pub remaining: f64,
    /// The month (1-12) the budget covers.
    pub month: u8,
    /// The year the budget covers.
    pub year: i32,
}

/// Create the budget table.
///
/// # Errors
/// This function will return an error if the SQL query failed.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                used REAL NOT NULL,
                remaining REAL NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new budget into the database.
///
/// The category is stored trimmed of surrounding whitespace, and the budget
/// starts with nothing used.
///
/// # Errors
/// Returns [Error::MonthOutOfRange] or [Error::YearOutOfRange] if the period
/// is invalid, or [Error::SqlError] if an SQL error occurred.
pub fn create_budget(
    user_id: UserID,
    category: &str,
    amount: f64,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<Budget, Error> {
    if !(1..=12).contains(&month) {
        return Err(Error::MonthOutOfRange(month));
    }

    let current_year = OffsetDateTime::now_utc().year();
    if !(1900..=current_year).contains(&year) {
        return Err(Error::YearOutOfRange(year));
    }

    let category = category.trim();
    connection.execute(
        "INSERT INTO budget (user_id, category, amount, used, remaining, month, year) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            user_id.as_i64(),
            category,
            amount,
            0.0,
            amount,
            month,
            year,
        ),
    )?;

    Ok(Budget {
        id: connection.last_insert_rowid(),
        user_id,
        category: category.to_string(),
        amount,
        used: 0.0,
        remaining: amount,
        month,
        year,
    })
}

/// Get the budget with the ID `budget_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no budget has the ID, or [Error::SqlError]
/// if an SQL error occurred.
pub fn get_budget(budget_id: BudgetID, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare(
            "SELECT id, user_id, category, amount, used, remaining, month, year \
            FROM budget WHERE id = :id;",
        )?
        .query_row(&[(":id", &budget_id)], map_row)
        .map_err(|error| error.into())
}

/// Get all budgets belonging to `user_id`, most recent period first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_budgets_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, category, amount, used, remaining, month, year \
            FROM budget WHERE user_id = :user_id \
            ORDER BY year DESC, month DESC, category ASC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Check whether any budget (owned by anyone) covers `category`.
///
/// The comparison is made on the trimmed category string.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn budget_category_exists(category: &str, connection: &Connection) -> Result<bool, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM budget WHERE TRIM(category) = TRIM(:category);",
        &[(":category", &category)],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// Delete the budget with `budget_id` along with all of the owner's
/// transactions in the budget's category, then recompute income usage.
///
/// # Errors
/// Returns [Error::NotFound] if no budget has the ID,
/// [Error::AccessDenied] if the budget belongs to a user other than
/// `user_id`, or [Error::SqlError] if an SQL error occurred.
pub fn delete_budget(
    budget_id: BudgetID,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let budget = get_budget(budget_id, connection)?;

    if budget.user_id != user_id {
        return Err(Error::AccessDenied);
    }

    connection.execute(
        "DELETE FROM txn WHERE user_id = ?1 AND category = ?2",
        (user_id.as_i64(), &budget.category),
    )?;
    connection.execute("DELETE FROM budget WHERE id = ?1", [budget_id])?;

    update_income_usage(connection)
}

fn map_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category: row.get(2)?,
        amount: row.get(3)?,
        used: row.get(4)?,
        remaining: row.get(5)?,
        month: row.get(6)?,
        year: row.get(7)?,
    })
}

fn new_budget_view() -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_BUDGET_VIEW).into_html();

    let form = html! {
        form
            method="post"
            action=(endpoints::ADD_BUDGET)
            class="w-full space-y-4 md:space-y-6"
        {
            (text_input("category", "Category", "text", ""))
            (text_input("amount", "Amount", "number", ""))
            (text_input("month", "Month (1-12)", "number", ""))
            (text_input("year", "Year", "number", ""))

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add Budget" }
        }
    };

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-xl font-bold mb-4" { "New Budget" }
            (form)
        }
    };

    base("New Budget", &content)
}

/// Route handler for the budget creation page.
pub async fn get_new_budget_page() -> Response {
    new_budget_view().into_response()
}

/// The state needed for the budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetEndpointState {
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data submitted from the budget creation form.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBudgetFormData {
    /// The category of spending the budget covers.
    pub category: String,
    /// The amount of money to set aside.
    pub amount: f64,
    /// The month (1-12) the budget covers.
    pub month: u8,
    /// The year the budget covers.
    pub year: i32,
}

/// A route handler for creating a new budget.
pub async fn create_budget_endpoint(
    State(state): State<BudgetEndpointState>,
    Extension(user_id): Extension<UserID>,
    Form(form_data): Form<CreateBudgetFormData>,
) -> Result<Redirect, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    create_budget(
        user_id,
        &form_data.category,
        form_data.amount,
        form_data.month,
        form_data.year,
        &connection,
    )?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}

/// The data submitted from the budget delete button's form.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteBudgetFormData {
    /// The ID of the budget to delete.
    pub budget_id: BudgetID,
}

/// A route handler for deleting a budget and its transactions.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetEndpointState>,
    Extension(user_id): Extension<UserID>,
    Form(form_data): Form<DeleteBudgetFormData>,
) -> Result<Redirect, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_budget(form_data.budget_id, user_id, &connection)?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}
