//! Budgetio is a web app for tracking monthly budgets, incomes and spending.
//!
//! This library provides an HTTP server that directly serves HTML pages.
//! Users register an account, record transactions against per-category
//! monthly budgets, and see how much of each budget and income remains.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth_cookie;
mod auth_middleware;
mod budget;
mod dashboard;
mod db;
mod endpoints;
mod html;
mod income;
mod internal_server_error;
mod log_in;
mod log_out;
mod logging;
mod navigation;
mod not_found;
mod password;
mod reconciliation;
mod register_user;
mod routing;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;

use crate::{
    html::error_view, internal_server_error::InternalServerError,
    not_found::get_404_not_found_response,
};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The username chosen at registration is already taken.
    #[error("the username is already taken")]
    UserExists,

    /// The user provided an invalid combination of username and password.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// Either the user ID or expiry cookie is missing from the cookie jar in
    /// the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// There was an error parsing the date in the cookie or creating the new
    /// expiry date time.
    ///
    /// Callers should pass in the original error as a string and the date
    /// string that caused the error.
    #[error("could not format expiry cookie date-time string \"{1}\": {0}")]
    InvalidDateFormat(String, String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A transaction was created with a category that no budget covers.
    #[error("no budget exists for the category \"{0}\"")]
    CategoryNotFound(String),

    /// A budget was created with a month outside 1-12.
    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfRange(u8),

    /// A budget was created with a year before 1900 or after the current year.
    #[error("year must be between 1900 and the current year, got {0}")]
    YearOutOfRange(i32),

    /// An income record already exists for this user, month and year.
    #[error("an income already exists for this month and year")]
    DuplicateIncome,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The resource exists but is owned by a different user.
    #[error("the requested resource belongs to another user")]
    AccessDenied,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.username") =>
            {
                Error::UserExists
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("income.") =>
            {
                Error::DuplicateIncome
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::CategoryNotFound(_) => render_error_page(
                StatusCode::NOT_FOUND,
                "Category Not Found",
                "404",
                &self.to_string(),
                "Create a budget for this category first, then add the transaction again.",
            ),
            Error::MonthOutOfRange(_) | Error::YearOutOfRange(_) => render_error_page(
                StatusCode::BAD_REQUEST,
                "Invalid Budget Period",
                "400",
                &self.to_string(),
                "Go back and double check the month and year fields.",
            ),
            Error::DuplicateIncome => render_error_page(
                StatusCode::CONFLICT,
                "Duplicate Income",
                "409",
                &self.to_string(),
                "Delete the existing income for this month first if you want to replace it.",
            ),
            Error::AccessDenied => render_error_page(
                StatusCode::FORBIDDEN,
                "Access Denied",
                "403",
                &self.to_string(),
                "Check that you are logged in with the right account.",
            ),
            Error::UserExists => render_error_page(
                StatusCode::CONFLICT,
                "Username Taken",
                "409",
                &self.to_string(),
                "Go back and choose a different username.",
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

fn render_error_page(
    status_code: StatusCode,
    title: &str,
    header: &str,
    description: &str,
    fix: &str,
) -> Response {
    (
        status_code,
        Html(error_view(title, header, description, fix).into_string()),
    )
        .into_response()
}
