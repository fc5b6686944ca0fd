use crate::{
    auth::{RollcallSession, backend::RollcallAuthCredentials},
    error::RollcallResult,
    maud_conveniences::{error_alert, form_submit_button, simple_form_element, title},
    state::RollcallState,
};
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Clone, Copy)]
enum LoginKind {
    Admin,
    Student,
}

impl LoginKind {
    const fn failure_message(self) -> &'static str {
        match self {
            Self::Admin => "Invalid credentials",
            Self::Student => "Invalid roll number or password",
        }
    }
}

fn login_form(kind: LoginKind, login_failed: bool) -> Markup {
    html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-sm" {
            @match kind {
                LoginKind::Admin => (title("Admin Login")),
                LoginKind::Student => (title("Student Login")),
            }
            @if login_failed {
                (error_alert(kind.failure_message()))
            }

            form method="post" {
                @match kind {
                    LoginKind::Admin => (simple_form_element("username", "Username", true, None, None)),
                    LoginKind::Student => (simple_form_element("roll_no", "Roll Number", true, None, None)),
                }
                (simple_form_element("password", "Password", true, Some("password"), None))
                (form_submit_button(Some("Login")))
            }
        }
    }
}

fn render_login(state: &RollcallState, session: RollcallSession, kind: LoginKind) -> Response {
    if let Some(user) = &session.user {
        return Redirect::to(user.home()).into_response();
    }

    state.render(session, login_form(kind, false)).into_response()
}

/// Blank fields never reach the auth backend.
fn non_empty(field: &str, password: Option<SecretString>) -> Option<(String, SecretString)> {
    let field = field.trim();
    let password = password.filter(|password| !password.expose_secret().is_empty())?;
    (!field.is_empty()).then(|| (field.to_string(), password))
}

async fn attempt_login(
    state: &RollcallState,
    mut session: RollcallSession,
    kind: LoginKind,
    creds: Option<RollcallAuthCredentials>,
) -> RollcallResult<Response> {
    let user = match creds {
        Some(creds) => session.authenticate(creds).await?,
        None => None,
    };

    let Some(user) = user else {
        warn!(kind = kind.failure_message(), "Failed login attempt");
        return Ok(state
            .render(session, login_form(kind, true))
            .into_response());
    };

    session.login(&user).await?;
    info!(principal = %axum_login::AuthUser::id(&user), "Logged in");
    Ok(Redirect::to(user.home()).into_response())
}

pub async fn get_login(State(state): State<RollcallState>, session: RollcallSession) -> Response {
    render_login(&state, session, LoginKind::Admin)
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    password: Option<SecretString>,
}

pub async fn post_login(
    State(state): State<RollcallState>,
    session: RollcallSession,
    Form(LoginForm { username, password }): Form<LoginForm>,
) -> RollcallResult<Response> {
    let creds = non_empty(&username, password)
        .map(|(username, password)| RollcallAuthCredentials::Admin { username, password });
    attempt_login(&state, session, LoginKind::Admin, creds).await
}

pub async fn get_student_login(
    State(state): State<RollcallState>,
    session: RollcallSession,
) -> Response {
    render_login(&state, session, LoginKind::Student)
}

#[derive(Deserialize)]
pub struct StudentLoginForm {
    #[serde(default)]
    roll_no: String,
    password: Option<SecretString>,
}

pub async fn post_student_login(
    State(state): State<RollcallState>,
    session: RollcallSession,
    Form(StudentLoginForm { roll_no, password }): Form<StudentLoginForm>,
) -> RollcallResult<Response> {
    let creds = non_empty(&roll_no, password)
        .map(|(roll_no, password)| RollcallAuthCredentials::Student { roll_no, password });
    attempt_login(&state, session, LoginKind::Student, creds).await
}

pub async fn get_logout(mut session: RollcallSession) -> RollcallResult<Redirect> {
    if let Some(user) = session.logout().await? {
        info!(principal = %axum_login::AuthUser::id(&user), "Logged out");
    }
    Ok(Redirect::to("/login"))
}
