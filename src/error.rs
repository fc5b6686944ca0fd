use crate::auth::{PermissionsTarget, backend::RollcallAuthBackend};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::num::ParseIntError;

pub type RollcallResult<T> = Result<T, RollcallError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RollcallError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error commiting SQL transaction"))]
    CommitTransaction { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Found unknown attendance status {:?} in the database", found))]
    CorruptStatus { found: String },
    #[snafu(display("Error serialising with rmp_serde"))]
    RmpSerdeEncode { source: rmp_serde::encode::Error },
    #[snafu(display("Error deserialising with rmp_serde"))]
    RmpSerdeDecode { source: rmp_serde::decode::Error },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse IP port"))]
    ParsePort { source: ParseIntError },
    #[snafu(display("`SECRET_KEY` must be at least 64 bytes long, found {}", len))]
    SecretKeyTooShort { len: usize },
    #[snafu(display("Missing attendance date"))]
    MissingDate,
    #[snafu(display("Unable to parse date {:?}", original))]
    ParseDate {
        source: time::error::Parse,
        original: String,
    },
    #[snafu(display("Unable to parse student id {:?}", original))]
    ParseStudentId {
        source: ParseIntError,
        original: String,
    },
    #[snafu(display("Unknown attendance status {:?}", original))]
    ParseStatus { original: String },
    #[snafu(display("Error with hashing/password verification"))]
    Bcrypt { source: bcrypt::BcryptError },
    #[snafu(display("Error with sessions"))]
    TowerSession {
        source: axum_login::tower_sessions::session::Error,
    },
    #[snafu(display("Tried to {:?}, only had {:?}", needed.iter_names().collect::<Vec<_>>(), found.iter_names().collect::<Vec<_>>()))]
    IncorrectPermissions {
        needed: PermissionsTarget,
        found: PermissionsTarget,
    },
}

impl From<axum_login::Error<RollcallAuthBackend>> for RollcallError {
    fn from(value: axum_login::Error<RollcallAuthBackend>) -> Self {
        match value {
            axum_login::Error::Session(source) => Self::TowerSession { source },
            axum_login::Error::Backend(backend) => backend,
        }
    }
}

impl RollcallError {
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const NA: StatusCode = StatusCode::FORBIDDEN; //not allowed
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { source } => match source {
                sqlx::Error::RowNotFound => NF,
                _ => ISE,
            },
            Self::CommitTransaction { .. } => ISE,
            Self::CorruptStatus { .. } => ISE,
            Self::RmpSerdeEncode { .. } => ISE,
            Self::RmpSerdeDecode { .. } => BI,
            Self::BadEnvVar { .. } | Self::ParsePort { .. } | Self::SecretKeyTooShort { .. } => {
                ISE
            }
            Self::MissingDate
            | Self::ParseDate { .. }
            | Self::ParseStudentId { .. }
            | Self::ParseStatus { .. } => BI,
            Self::Bcrypt { .. } => ISE,
            Self::TowerSession { .. } => ISE,
            Self::IncorrectPermissions { .. } => NA,
        }
    }
}

impl IntoResponse for RollcallError {
    fn into_response(self) -> Response {
        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Rollcall Error"}
                    span {(desc)}
                }
            }
        };

        let status_code = self.status_code();

        error!(?self, %status_code, "Error!");
        (status_code, Html(basic_error(self.to_string()))).into_response()
    }
}
