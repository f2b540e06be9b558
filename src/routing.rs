//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth_middleware::auth_guard,
    budget::{create_budget_endpoint, delete_budget_endpoint, get_new_budget_page},
    dashboard::get_dashboard_page,
    endpoints,
    income::{create_income_endpoint, delete_income_endpoint},
    log_in::{get_landing_page, post_log_in},
    log_out::get_log_out,
    not_found::get_404_not_found,
    register_user::{get_register_page, post_register_user},
    transaction::{create_transaction_endpoint, delete_transaction_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_landing_page))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(
            endpoints::REGISTER,
            get(get_register_page).post(post_register_user),
        )
        .route(endpoints::LOG_OUT, get(get_log_out));

    let protected_routes = Router::new()
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(endpoints::NEW_BUDGET_VIEW, get(get_new_budget_page))
        .route(endpoints::ADD_TRANSACTION, post(create_transaction_endpoint))
        .route(
            endpoints::DELETE_TRANSACTION,
            post(delete_transaction_endpoint),
        )
        .route(endpoints::ADD_BUDGET, post(create_budget_endpoint))
        .route(endpoints::DELETE_BUDGET, post(delete_budget_endpoint))
        .route(endpoints::ADD_INCOME, post(create_income_endpoint))
        .route(endpoints::DELETE_INCOME, post(delete_income_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}
