//! The application's route URIs.

/// The landing page with the log-in form.
pub const ROOT: &str = "/";
/// The route for logging in a user.
pub const LOG_IN: &str = "/login";
/// The registration page (GET) and the route for creating an account (POST).
pub const REGISTER: &str = "/register";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/logout";
/// The landing page for logged in users.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The page for creating a new budget.
pub const NEW_BUDGET_VIEW: &str = "/add";
/// The route to record a transaction.
pub const ADD_TRANSACTION: &str = "/add-transaction";
/// The route to delete a transaction.
pub const DELETE_TRANSACTION: &str = "/delete-transaction";
/// The route to create a budget.
pub const ADD_BUDGET: &str = "/add-budget";
/// The route to delete a budget and its transactions.
pub const DELETE_BUDGET: &str = "/delete-budget";
/// The route to record a monthly income.
pub const ADD_INCOME: &str = "/add-income";
/// The route to delete a monthly income.
pub const DELETE_INCOME: &str = "/delete-income";
/// The route for static files.
pub const STATIC: &str = "/static";
