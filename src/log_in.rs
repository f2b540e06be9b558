//! This file defines the landing page with the log-in form and the handler
//! for log-in requests. The auth_cookie module handles the lower level
//! cookie logic.

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
    user::{User, get_user_by_username},
};

/// The error message shown when the username or password is wrong.
pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect username or password.";

fn log_in_form_view(username: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            method="post"
            action=(endpoints::LOG_IN)
            class="space-y-4 md:space-y-6"
        {
            (text_input("username", "Username", "text", username))
            (password_input(error_message))

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Log in" }

            p class="text-sm font-light text-gray-500 dark:text-gray-400"
            {
                "Don't have an account yet? "
                a href=(endpoints::REGISTER) class=(LINK_STYLE) { "Register" }
            }
        }
    }
}

fn landing_view(username: &str, error_message: Option<&str>) -> Markup {
    let form = log_in_form_view(username, error_message);

    base("Log in", &auth_card("Log in to your account", &form))
}

/// Display the landing page with the log-in form.
pub async fn get_landing_page() -> Response {
    landing_view("", None).into_response()
}

/// The state needed to perform a log-in.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// Handle to the application database.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl LogInState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
///
/// The username and password are stored as plain strings. There is no need
/// for validation here since they will be compared against the username and
/// password in the database, which have been verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Username entered during log-in.
    pub username: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie is set and the client is
/// redirected to the dashboard page. Otherwise, the landing page is returned
/// with an error message explaining the problem.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let username = &user_data.username;

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let user: User = match get_user_by_username(username, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => {
            return landing_view(username, Some(INVALID_CREDENTIALS_ERROR_MSG)).into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return landing_view(
                username,
                Some("An internal error occurred. Please try again later."),
            )
            .into_response();
        }
    };
    drop(connection);

    let is_password_valid = match user.password_hash.verify(&user_data.password) {
        Ok(is_password_valid) => is_password_valid,
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return landing_view(
                username,
                Some("An internal error occurred. Please try again later."),
            )
            .into_response();
        }
    };

    if !is_password_valid {
        return landing_view(username, Some(INVALID_CREDENTIALS_ERROR_MSG)).into_response();
    }

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
mod log_in_tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use axum::{
        Form, Router,
        body::Body,
        extract::State,
        http::{Response, StatusCode, header::LOCATION, header::SET_COOKIE},
        routing::post,
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        PasswordHash,
        auth_cookie::{COOKIE_EXPIRY, COOKIE_USER_ID},
        endpoints,
        user::{User, create_user, create_user_table},
    };

    use super::{INVALID_CREDENTIALS_ERROR_MSG, LogInData, LogInState, post_log_in};

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_app_config(true);

        let response = new_log_in_request(
            state,
            LogInData {
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
        assert_set_cookie(&response);
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_username() {
        let state = get_test_app_config(false);

        let response = new_log_in_request(
            state,
            LogInData {
                username: "nobody".to_string(),
                password: "test".to_string(),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_password() {
        let state = get_test_app_config(true);

        let response = new_log_in_request(
            state,
            LogInData {
                username: "alice".to_string(),
                password: "wrongpassword".to_string(),
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_fails_with_missing_credentials() {
        let state = get_test_app_config(false);
        let app = Router::new()
            .route(endpoints::LOG_IN, post(post_log_in))
            .with_state(state);
        let server = TestServer::new(app);

        server
            .post(endpoints::LOG_IN)
            .content_type("application/x-www-form-urlencoded")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn form_deserialises() {
        let state = get_test_app_config(false);
        let app = Router::new()
            .route(endpoints::LOG_IN, post(post_log_in))
            .with_state(state);
        let server = TestServer::new(app);
        let form = [("username", "alice"), ("password", "test")];

        let response = server.post(endpoints::LOG_IN).form(&form).await;

        assert_ne!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    fn get_test_app_config(with_test_user: bool) -> LogInState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        create_user_table(&connection).expect("Could not create user table");

        if with_test_user {
            let password_hash =
                PasswordHash::from_raw_password("averystrongandlongpassword", 4)
                    .expect("Could not hash test password");
            let _: User = create_user("alice", password_hash, &connection)
                .expect("Could not create test user");
        }

        LogInState::new("foobar", Arc::new(Mutex::new(connection)))
    }

    async fn new_log_in_request(state: LogInState, log_in_form: LogInData) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_log_in(State(state), jar, Form(log_in_form)).await
    }

    #[track_caller]
    fn assert_set_cookie(response: &Response<Body>) {
        let mut found_cookies = HashSet::new();

        for cookie_headers in response.headers().get_all(SET_COOKIE) {
            let cookie_string = cookie_headers.to_str().unwrap();
            let cookie = Cookie::parse(cookie_string).unwrap();

            match cookie.name() {
                COOKIE_USER_ID | COOKIE_EXPIRY => {
                    assert!(cookie.expires_datetime() > Some(OffsetDateTime::now_utc()));
                    found_cookies.insert(cookie.name().to_string());
                }
                _ => panic!("Unexpected cookie found: {}", cookie.name()),
            }
        }

        assert!(
            found_cookies.contains(COOKIE_USER_ID),
            "could not find cookie '{COOKIE_USER_ID}' in {found_cookies:?}"
        );
        assert!(
            found_cookies.contains(COOKIE_EXPIRY),
            "could not find cookie '{COOKIE_EXPIRY}' in {found_cookies:?}"
        );
    }

    async fn assert_body_contains_message(response: Response<Body>, message: &str) {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        assert!(
            text.contains(message),
            "response body should contain the text '{message}' but got {text}"
        );
    }
}
