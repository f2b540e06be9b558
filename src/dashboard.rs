//! This file defines the dashboard route and its templates.
//!
//! The dashboard is the main page of the application. It lists the signed-in
//! user's transactions, budgets and incomes, shows how much each income has
//! left after the budgets, and totals spending per institution.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    budget::{Budget, get_budgets_by_user},
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        format_currency,
    },
    income::{Income, get_incomes_by_user},
    navigation::NavBar,
    transaction::{Transaction, get_institution_totals, get_transactions_by_user},
    user::{UserID, get_user_by_id},
};

fn transactions_view(transactions: &[Transaction]) -> Markup {
    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-lg font-bold mb-2" { "Transactions" }

            @if transactions.is_empty() {
                p class="text-gray-500 dark:text-gray-400" { "No transactions yet." }
            } @else {
                table class="w-full text-sm text-left"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th class=(TABLE_CELL_STYLE) { "Date" }
                            th class=(TABLE_CELL_STYLE) { "Institution" }
                            th class=(TABLE_CELL_STYLE) { "Product" }
                            th class=(TABLE_CELL_STYLE) { "Category" }
                            th class=(TABLE_CELL_STYLE) { "Price" }
                            th class=(TABLE_CELL_STYLE) { "" }
                        }
                    }

                    tbody
                    {
                        @for transaction in transactions {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE) { (transaction.date) }
                                td class=(TABLE_CELL_STYLE) { (transaction.institution) }
                                td class=(TABLE_CELL_STYLE) { (transaction.product) }
                                td class=(TABLE_CELL_STYLE) { (transaction.category) }
                                td class=(TABLE_CELL_STYLE) { (format_currency(transaction.price)) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    form method="post" action=(endpoints::DELETE_TRANSACTION)
                                    {
                                        input
                                            type="hidden"
                                            name="transaction_id"
                                            value=(transaction.id);
                                        button type="submit" class=(BUTTON_DELETE_STYLE) { "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn new_transaction_form_view() -> Markup {
    let labelled_input = |name: &str, label: &str, input_type: &str| {
        html! {
            div
            {
                label for=(name) class=(FORM_LABEL_STYLE) { (label) }
                input
                    id=(name)
                    type=(input_type)
                    name=(name)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);
            }
        }
    };

    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-lg font-bold mb-2" { "Add Transaction" }

            form
                method="post"
                action=(endpoints::ADD_TRANSACTION)
                class="grid grid-cols-2 gap-4 lg:grid-cols-5"
            {
                (labelled_input("institution", "Institution", "text"))
                (labelled_input("product", "Product", "text"))
                (labelled_input("price", "Price", "number"))
                (labelled_input("date", "Date", "date"))
                (labelled_input("category", "Category", "text"))

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add" }
            }
        }
    }
}

fn budgets_view(budgets: &[Budget]) -> Markup {
    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-lg font-bold mb-2" { "Budgets" }

            @if budgets.is_empty() {
                p class="text-gray-500 dark:text-gray-400"
                {
                    "No budgets yet. "
                    a href=(endpoints::NEW_BUDGET_VIEW) { "Create one." }
                }
            } @else {
                table class="w-full text-sm text-left"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th class=(TABLE_CELL_STYLE) { "Category" }
                            th class=(TABLE_CELL_STYLE) { "Period" }
                            th class=(TABLE_CELL_STYLE) { "Amount" }
                            th class=(TABLE_CELL_STYLE) { "Used" }
                            th class=(TABLE_CELL_STYLE) { "Remaining" }
                            th class=(TABLE_CELL_STYLE) { "" }
                        }
                    }

                    tbody
                    {
                        @for budget in budgets {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE) { (budget.category) }
                                td class=(TABLE_CELL_STYLE) { (budget.month) "/" (budget.year) }
                                td class=(TABLE_CELL_STYLE) { (format_currency(budget.amount)) }
                                td class=(TABLE_CELL_STYLE) { (format_currency(budget.used)) }
                                td class=(TABLE_CELL_STYLE) { (format_currency(budget.remaining)) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    form method="post" action=(endpoints::DELETE_BUDGET)
                                    {
                                        input type="hidden" name="budget_id" value=(budget.id);
                                        button type="submit" class=(BUTTON_DELETE_STYLE) { "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn incomes_view(incomes: &[Income], budgets: &[Budget]) -> Markup {
    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-lg font-bold mb-2" { "Income" }

            @if incomes.is_empty() {
                p class="text-gray-500 dark:text-gray-400" { "No income recorded yet." }
            } @else {
                @for income in incomes {
                    div class="mb-4"
                    {
                        h3 class="font-semibold"
                        {
                            (income.month) "/" (income.year) ": "
                            (format_currency(income.amount))
                            " (" (format_currency(income.remaining)) " remaining)"
                        }

                        p class="text-sm text-gray-500 dark:text-gray-400"
                        {
                            "Used: " (format_currency(income.used))
                        }

                        // Budgets covering the same month as the income.
                        @let related = budgets
                            .iter()
                            .filter(|budget| {
                                budget.month == income.month && budget.year == income.year
                            })
                            .collect::<Vec<_>>();
                        @if !related.is_empty() {
                            ul class="list-disc list-inside text-sm"
                            {
                                @for budget in related {
                                    li
                                    {
                                        (budget.category) ": "
                                        (format_currency(budget.used))
                                        " of "
                                        (format_currency(budget.amount))
                                    }
                                }
                            }
                        }

                        form method="post" action=(endpoints::DELETE_INCOME) class="mt-1"
                        {
                            input type="hidden" name="income_id" value=(income.id);
                            button type="submit" class=(BUTTON_DELETE_STYLE) { "Delete" }
                        }
                    }
                }
            }

            form
                method="post"
                action=(endpoints::ADD_INCOME)
                class="grid grid-cols-2 gap-4 lg:grid-cols-4 mt-4"
            {
                div
                {
                    label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }
                    input id="amount" type="number" name="amount" required
                        class=(FORM_TEXT_INPUT_STYLE);
                }
                div
                {
                    label for="month" class=(FORM_LABEL_STYLE) { "Month" }
                    input id="month" type="number" name="month" required
                        class=(FORM_TEXT_INPUT_STYLE);
                }
                div
                {
                    label for="year" class=(FORM_LABEL_STYLE) { "Year" }
                    input id="year" type="number" name="year" required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add Income" }
            }
        }
    }
}

fn institution_totals_view(totals: &[(String, f64)]) -> Markup {
    html! {
        section class="w-full max-w-4xl mb-8"
        {
            h2 class="text-lg font-bold mb-2" { "Spending by Institution" }

            @if totals.is_empty() {
                p class="text-gray-500 dark:text-gray-400" { "Nothing spent yet." }
            } @else {
                ul class="list-disc list-inside"
                {
                    @for (institution, total) in totals {
                        li { (institution) ": " (format_currency(*total)) }
                    }
                }
            }
        }
    }
}

fn dashboard_view(
    username: &str,
    transactions: &[Transaction],
    budgets: &[Budget],
    incomes: &[Income],
    institution_totals: &[(String, f64)],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-4" { "Welcome back, " (username) }

            (incomes_view(incomes, budgets))
            (budgets_view(budgets))
            (transactions_view(transactions))
            (new_transaction_form_view())
            (institution_totals_view(institution_totals))
        }
    };

    base("Dashboard", &content)
}

/// The state needed for the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display a page with an overview of the signed-in user's data.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;
    let transactions = get_transactions_by_user(user_id, &connection)?;
    let budgets = get_budgets_by_user(user_id, &connection)?;
    let incomes = get_incomes_by_user(user_id, &connection)?;
    let institution_totals = get_institution_totals(user_id, &connection)?;

    Ok(dashboard_view(
        &user.username,
        &transactions,
        &budgets,
        &incomes,
        &institution_totals,
    )
    .into_response())
}
