//! Database initialization for the application's domain models.

use rusqlite::Connection;

use crate::{
    budget::create_budget_table, income::create_income_table,
    transaction::create_transaction_table, user::create_user_table,
};

/// Create the tables for all of the application's domain models.
///
/// Tables are only created if they do not already exist, so it is safe to
/// call this function on every start-up.
///
/// # Errors
/// Returns an error if any of the SQL statements fail.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute("PRAGMA foreign_keys = ON;", ())?;

    create_user_table(connection)?;
    create_budget_table(connection)?;
    create_income_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}
