//! This file defines the registration page and the handler for creating new
//! user accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::create_cookie_key,
    auth_cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, LINK_STYLE, auth_card, base, password_input, text_input},
    internal_server_error::InternalServerError,
    password::PasswordHash,
    user::create_user,
};

fn register_form_view(username: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            method="post"
            action=(endpoints::REGISTER)
            class="space-y-4 md:space-y-6"
        {
            (text_input("username", "Username", "text", username))
            (password_input(error_message))

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Create account" }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Already have an account? "
                a href=(endpoints::ROOT) class=(LINK_STYLE) { "Log in" }
            }
        }
    }
}

fn register_view(username: &str, error_message: Option<&str>) -> Markup {
    let form = register_form_view(username, error_message);

    base("Register", &auth_card("Create an account", &form))
}

/// Display the registration page.
pub async fn get_register_page() -> Response {
    register_view("", None).into_response()
}

/// The state needed to register a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl RegistrationState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the registration form.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterFormData {
    /// Username entered during registration.
    pub username: String,
    /// Password entered during registration.
    pub password: String,
}

/// Handler for registration requests via the POST method.
///
/// On success the account is created, the auth cookie is set and the client
/// is redirected to the dashboard page. If the username is taken or the
/// password is too weak, the registration form is returned with an error
/// message explaining the problem.
pub async fn post_register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Form(form_data): Form<RegisterFormData>,
) -> Response {
    let username = form_data.username.trim();
    if username.is_empty() {
        return register_view("", Some("Please enter a username.")).into_response();
    }

    let password_hash =
        match PasswordHash::from_raw_password(&form_data.password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => password_hash,
            Err(Error::TooWeak(feedback)) => {
                return register_view(username, Some(&feedback)).into_response();
            }
            Err(error) => {
                tracing::error!("Unhandled error while hashing password: {error}");
                return InternalServerError::default().into_response();
            }
        };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let user = match create_user(username, password_hash, &connection) {
        Ok(user) => user,
        Err(Error::UserExists) => {
            return register_view(username, Some("That username is already taken."))
                .into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while creating user: {error}");
            return InternalServerError::default().into_response();
        }
    };
    drop(connection);

    match set_auth_cookie(jar.clone(), user.id, state.cookie_duration) {
        Ok(updated_jar) => {
            (updated_jar, Redirect::to(endpoints::DASHBOARD_VIEW)).into_response()
        }
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            (
                invalidate_auth_cookie(jar),
                InternalServerError::default(),
            )
                .into_response()
        }
    }
}


#[cfg(test)]
mod register_user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Form,
        body::Body,
        extract::State,
        http::{Response, StatusCode, header::LOCATION},
    };
    use axum_extra::extract::PrivateCookieJar;
    use rusqlite::Connection;

    use crate::{
        endpoints,
        user::{create_user_table, get_user_by_username},
    };

    use super::{RegisterFormData, RegistrationState, post_register_user};

    fn get_test_state() -> RegistrationState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        create_user_table(&connection).expect("Could not create user table");

        RegistrationState::new("foobar", Arc::new(Mutex::new(connection)))
    }

    async fn new_register_request(
        state: RegistrationState,
        form: RegisterFormData,
    ) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_register_user(State(state), jar, Form(form)).await
    }

    #[tokio::test]
    async fn register_succeeds_and_redirects_to_dashboard() {
        let state = get_test_state();
        let db_connection = state.db_connection.clone();

        let response = new_register_request(
            state,
            RegisterFormData {
                username: "alice".to_string(),
                password: "averystrongandlongpassword".to_string(),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            endpoints::DASHBOARD_VIEW
        );

        let connection = db_connection.lock().unwrap();
        let user = get_user_by_username("alice", &connection).expect("User was not created");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn register_fails_with_weak_password() {
        let state = get_test_state();
        let db_connection = state.db_connection.clone();

        let response = new_register_request(
            state,
            RegisterFormData {
                username: "alice".to_string(),
                password: "password".to_string(),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let connection = db_connection.lock().unwrap();
        assert!(get_user_by_username("alice", &connection).is_err());
    }

    #[tokio::test]
    async fn register_fails_with_duplicate_username() {
        let state = get_test_state();

        let first_response = new_register_request(
            state.clone(),
            RegisterFormData {
                username: "alice".to_string(),
                password: "averystrongandlongpassword".to_string(),
            },
        )
        .await;
        assert_eq!(first_response.status(), StatusCode::SEE_OTHER);

        let response = new_register_request(
            state,
            RegisterFormData {
                username: "alice".to_string(),
                password: "anotherverystrongpassword".to_string(),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();
        assert!(
            text.contains("already taken"),
            "response body should mention the username is taken, got {text}"
        );
    }
}
