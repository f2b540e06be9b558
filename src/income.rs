//! This file defines the `Income` type, the database queries for incomes and
//! the route handlers for recording and deleting income.
//!
//! An income records the money a user received in a month, and tracks how
//! much of it the budgets have allocated.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    response::Redirect,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, endpoints, reconciliation::update_income_usage, user::UserID,
};

/// Alias for the integer type used for income row IDs.
pub type IncomeID = i64;

/// Money received by a user in one month.
///
/// Only one income may exist per user, month and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    /// The ID of the income record.
    pub id: IncomeID,
    /// The user that received the income.
    pub user_id: UserID,
    /// The amount of money received.
    pub amount: f64,
    /// The portion of the income the budgets have used.
    pub used: f64,
    /// The amount left over, i.e. `amount - used`.
    pub remaining: f64,
    /// The month (1-12) the income was received in.
    pub month: u8,
    /// The year the income was received in.
    pub year: i32,
}

/// Create the income table.
///
/// # Errors
/// This function will return an error if the SQL query failed.
pub fn create_income_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS income (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                amount REAL NOT NULL,
                used REAL NOT NULL,
                remaining REAL NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                UNIQUE(user_id, month, year)
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new income record, then recompute income usage so the
/// new record immediately reflects the money the budgets have already used.
///
/// # Errors
/// Returns [Error::DuplicateIncome] if an income already exists for the
/// user, month and year, or [Error::SqlError] if an SQL error occurred.
pub fn create_income(
    user_id: UserID,
    amount: f64,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<Income, Error> {
    connection.execute(
        "INSERT INTO income (user_id, amount, used, remaining, month, year) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (user_id.as_i64(), amount, 0.0, amount, month, year),
    )?;

    let id = connection.last_insert_rowid();
    update_income_usage(connection)?;

    get_income(id, connection)
}

/// Get the income record with the ID `income_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no income has the ID, or [Error::SqlError]
/// if an SQL error occurred.
pub fn get_income(income_id: IncomeID, connection: &Connection) -> Result<Income, Error> {
    connection
        .prepare(
            "SELECT id, user_id, amount, used, remaining, month, year \
            FROM income WHERE id = :id;",
        )?
        .query_row(&[(":id", &income_id)], map_row)
        .map_err(|error| error.into())
}

/// Get all income records belonging to `user_id`, most recent first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_incomes_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Income>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, amount, used, remaining, month, year \
            FROM income WHERE user_id = :user_id ORDER BY year DESC, month DESC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_income| maybe_income.map_err(|error| error.into()))
        .collect()
}

/// Delete the income record with `income_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no income has the ID, or [Error::SqlError]
/// if an SQL error occurred.
pub fn delete_income(income_id: IncomeID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM income WHERE id = ?1", [income_id])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Income, rusqlite::Error> {
    Ok(Income {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        used: row.get(3)?,
        remaining: row.get(4)?,
        month: row.get(5)?,
        year: row.get(6)?,
    })
}

/// The state needed for the income endpoints.
#[derive(Debug, Clone)]
pub struct IncomeEndpointState {
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for IncomeEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data submitted from the income form on the dashboard.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateIncomeFormData {
    /// The amount of money received.
    pub amount: f64,
    /// The month (1-12) the income was received in.
    pub month: u8,
    /// The year the income was received in.
    pub year: i32,
}

/// A route handler for recording an income.
pub async fn create_income_endpoint(
    State(state): State<IncomeEndpointState>,
    Extension(user_id): Extension<UserID>,
    Form(form_data): Form<CreateIncomeFormData>,
) -> Result<Redirect, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    create_income(
        user_id,
        form_data.amount,
        form_data.month,
        form_data.year,
        &connection,
    )?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}

/// The data submitted from the income delete button's form.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteIncomeFormData {
    /// The ID of the income record to delete.
    pub income_id: IncomeID,
}

/// A route handler for deleting an income record.
pub async fn delete_income_endpoint(
    State(state): State<IncomeEndpointState>,
    Form(form_data): Form<DeleteIncomeFormData>,
) -> Result<Redirect, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_income(form_data.income_id, &connection)?;

    Ok(Redirect::to(endpoints::DASHBOARD_VIEW))
}
