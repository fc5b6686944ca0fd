#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use crate::{
    auth::{AdminCredentials, backend::RollcallAuthBackend, postgres_store::PostgresSessionStore},
    cli::{AddStudentArgs, Cli, Command},
    config::RuntimeConfiguration,
    data::{
        DataType,
        student::{AddStudentForm, Student},
    },
    routes::app,
    state::RollcallState,
};
use axum_login::tower_sessions::ExpiredDeletion;
use bcrypt::DEFAULT_COST;
use clap::Parser;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod auth;
mod cli;
mod config;
mod data;
mod error;
mod maud_conveniences;
mod routes;
mod state;

async fn shutdown_signal(state: RollcallState) {
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
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
    state.close().await;
}

async fn serve(state: RollcallState) {
    let session_store = PostgresSessionStore::new(state.clone());
    if let Err(e) = session_store.delete_expired().await {
        warn!(?e, "Unable to clear out expired sessions");
    }

    let session_key = state.config().server_config().session_key();
    let admin = AdminCredentials::new(&state.config().admin_config(), &session_key, DEFAULT_COST)
        .await
        .expect("unable to hash admin password");
    let auth_backend = RollcallAuthBackend::new(state.clone(), admin);

    let app = app(state.clone(), auth_backend, session_store);

    let server_addr = state.config().server_config().socket_addr();
    let listener = TcpListener::bind(server_addr)
        .await
        .expect("unable to listen on server address");

    info!(%server_addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("unable to serve app");
}

async fn add_student(state: RollcallState, args: AddStudentArgs) {
    let AddStudentArgs {
        name,
        roll_no,
        year_of_study,
        phone_number,
        branch,
        gender,
        password,
    } = args;

    let mut conn = state
        .get_connection()
        .await
        .expect("unable to get db connection");
    let form = AddStudentForm {
        name,
        roll_no: roll_no.clone(),
        year_of_study,
        phone_number,
        branch,
        gender,
        password: SecretString::from(password),
        bcrypt_cost: DEFAULT_COST,
    };

    match Student::insert_into_database(form, &mut conn).await {
        Ok(id) => info!(id, %roll_no, "Added student"),
        Err(e) => {
            error!(?e, %roll_no, "Unable to add student");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");
    if let Err(e) = dotenv_result {
        info!(?e, "No `.env` file loaded, using the process environment");
    }

    let cli = Cli::parse();

    let options = PgPoolOptions::new().max_connections(15);
    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = RollcallState::new(options, config)
        .await
        .expect("unable to create state");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::AddStudent(args) => add_student(state, args).await,
    }
}
