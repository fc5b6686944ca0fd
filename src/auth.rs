use crate::{
    auth::backend::RollcallAuthBackend,
    config::AdminConfig,
    data::student::Student,
    error::{BcryptSnafu, IncorrectPermissionsSnafu, RollcallResult, TowerSessionSnafu},
};
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_login::{
    AuthSession, AuthUser,
    tower_sessions::{Session, cookie::Key},
};
use bitflags::bitflags;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use std::fmt;

pub mod backend;
pub mod postgres_store;

pub type RollcallSession = AuthSession<RollcallAuthBackend>;

const FLASH_KEY: &str = "rollcall.flash";

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PermissionsTarget: u8 {
        const VIEW_ROSTER =         0b0000_0001;
        const MARK_ATTENDANCE =     0b0000_0010;
        const VIEW_ANY_ATTENDANCE = 0b0000_0100;
        const VIEW_OWN_ATTENDANCE = 0b0000_1000;
    }
}

/// Whoever is logged in. The admin is never stored in the database.
#[derive(Debug, Clone)]
pub enum Principal {
    Admin {
        username: String,
        bcrypt_hashed_password: SecretString,
    },
    Student(Student),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalId {
    Admin,
    Student { roll_no: String },
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Student { roll_no } => write!(f, "student:{roll_no}"),
        }
    }
}

impl Principal {
    pub fn get_permissions(&self) -> PermissionsTarget {
        match self {
            Self::Admin { .. } => {
                PermissionsTarget::VIEW_ROSTER
                    | PermissionsTarget::MARK_ATTENDANCE
                    | PermissionsTarget::VIEW_ANY_ATTENDANCE
            }
            Self::Student(_) => PermissionsTarget::VIEW_OWN_ATTENDANCE,
        }
    }

    pub fn roll_no(&self) -> Option<&str> {
        match self {
            Self::Admin { .. } => None,
            Self::Student(student) => Some(&student.roll_no),
        }
    }

    /// Where this principal lands after logging in.
    pub const fn home(&self) -> &'static str {
        match self {
            Self::Admin { .. } => "/dashboard",
            Self::Student(_) => "/student-dashboard",
        }
    }
}

impl AuthUser for Principal {
    type Id = PrincipalId;

    fn id(&self) -> Self::Id {
        match self {
            Self::Admin { .. } => PrincipalId::Admin,
            Self::Student(student) => PrincipalId::Student {
                roll_no: student.roll_no.clone(),
            },
        }
    }

    fn session_auth_hash(&self) -> &[u8] {
        let hash = match self {
            Self::Admin {
                bcrypt_hashed_password,
                ..
            } => bcrypt_hashed_password,
            Self::Student(student) => &student.bcrypt_hashed_password,
        };
        hash.expose_secret().as_bytes()
    }
}

/// The configured admin identity, with the password hashed once at startup.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    username: String,
    bcrypt_hashed_password: SecretString,
}

impl AdminCredentials {
    /// The salt is derived from the session signing key, so the hash (and with it every admin
    /// session) stays valid across restarts until the password or the key changes.
    pub async fn new(config: &AdminConfig, session_key: &Key, cost: u32) -> RollcallResult<Self> {
        let password = config.password.clone();
        let signing_key = session_key.signing().to_vec();

        let hashed = tokio::task::spawn_blocking(move || {
            let derived = bcrypt::bcrypt(cost, [0; 16], &signing_key);
            let mut salt = [0; 16];
            salt.copy_from_slice(&derived[..16]);

            bcrypt::hash_with_salt(password.expose_secret(), cost, salt)
                .map(|parts| parts.format_for_version(bcrypt::Version::TwoB))
        })
        .await
        .expect("unable to join tokio task")
        .context(BcryptSnafu)?;

        Ok(Self {
            username: config.username.clone(),
            bcrypt_hashed_password: SecretString::from(hashed),
        })
    }

    pub fn principal(&self) -> Principal {
        Principal::Admin {
            username: self.username.clone(),
            bcrypt_hashed_password: self.bcrypt_hashed_password.clone(),
        }
    }

    pub async fn verify(&self, username: &str, password: SecretString) -> RollcallResult<bool> {
        if username != self.username {
            return Ok(false);
        }
        verify_password(password, self.bcrypt_hashed_password.clone()).await
    }
}

pub async fn hash_password(password: SecretString, cost: u32) -> RollcallResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), cost))
        .await
        .expect("unable to join tokio task")
        .context(BcryptSnafu)
}

pub async fn verify_password(password: SecretString, hash: SecretString) -> RollcallResult<bool> {
    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password.expose_secret(), hash.expose_secret())
    })
    .await
    .expect("unable to join tokio task")
    .context(BcryptSnafu)
}

pub trait AuthUtilities {
    fn permissions(&self) -> PermissionsTarget;

    fn can(&self, needed: PermissionsTarget) -> bool {
        self.permissions().contains(needed)
    }

    fn ensure_can(&self, needed: PermissionsTarget) -> RollcallResult<()> {
        let found = self.permissions();
        ensure!(
            found.contains(needed),
            IncorrectPermissionsSnafu { needed, found }
        );
        Ok(())
    }
}

impl AuthUtilities for Principal {
    fn permissions(&self) -> PermissionsTarget {
        self.get_permissions()
    }
}

impl AuthUtilities for RollcallSession {
    fn permissions(&self) -> PermissionsTarget {
        self.user
            .as_ref()
            .map_or_else(PermissionsTarget::empty, Principal::get_permissions)
    }
}

/// Route guard: anonymous requests are sent to the admin login page.
pub async fn require_auth(session: RollcallSession, request: Request, next: Next) -> Response {
    if session.user.is_some() {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "Unauthenticated request, redirecting to login");
        Redirect::to("/login").into_response()
    }
}

pub async fn set_flash(session: &Session, message: impl Into<String>) -> RollcallResult<()> {
    session
        .insert(FLASH_KEY, message.into())
        .await
        .context(TowerSessionSnafu)
}

/// Flash messages are shown once, so reading one removes it.
pub async fn take_flash(session: &Session) -> RollcallResult<Option<String>> {
    session
        .remove::<String>(FLASH_KEY)
        .await
        .context(TowerSessionSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: 7,
            name: "Grace".into(),
            roll_no: "21CS007".into(),
            year_of_study: 3,
            phone_number: "9000000007".into(),
            branch: "CSE".into(),
            gender: "F".into(),
            bcrypt_hashed_password: SecretString::from("$2b$04$hash"),
        }
    }

    #[test]
    fn admins_and_students_get_disjoint_permissions() {
        let admin = Principal::Admin {
            username: "admin".into(),
            bcrypt_hashed_password: SecretString::from("x"),
        };
        let student = Principal::Student(student());

        assert!(admin.get_permissions().contains(PermissionsTarget::MARK_ATTENDANCE));
        assert!(!admin.get_permissions().contains(PermissionsTarget::VIEW_OWN_ATTENDANCE));
        assert_eq!(student.get_permissions(), PermissionsTarget::VIEW_OWN_ATTENDANCE);
        assert!(!student.get_permissions().intersects(PermissionsTarget::VIEW_ROSTER));
    }

    #[test]
    fn principal_ids_round_trip_through_session_encoding() {
        let student = Principal::Student(student());
        let id = student.id();
        assert_eq!(
            id,
            PrincipalId::Student {
                roll_no: "21CS007".into()
            }
        );
        assert_eq!(id.to_string(), "student:21CS007");

        let encoded = rmp_serde::to_vec(&id).unwrap();
        let decoded: PrincipalId = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn student_session_hash_is_their_password_hash() {
        let student = Principal::Student(student());
        assert_eq!(student.session_auth_hash(), b"$2b$04$hash");
        assert_eq!(student.roll_no(), Some("21CS007"));
        assert_eq!(student.home(), "/student-dashboard");
    }

    fn admin_config(password: &str) -> AdminConfig {
        AdminConfig {
            username: "admin".into(),
            password: SecretString::from(password),
        }
    }

    fn key(byte: u8) -> Key {
        Key::from(&[byte; 64])
    }

    #[tokio::test]
    async fn admin_credentials_only_accept_the_configured_pair() {
        let creds = AdminCredentials::new(&admin_config("adminpassword"), &key(b'k'), 4)
            .await
            .unwrap();

        assert!(creds.verify("admin", SecretString::from("adminpassword")).await.unwrap());
        assert!(!creds.verify("admin", SecretString::from("wrong")).await.unwrap());
        assert!(!creds.verify("root", SecretString::from("adminpassword")).await.unwrap());
        assert!(!creds.verify("", SecretString::from("")).await.unwrap());

        let principal = creds.principal();
        assert_eq!(principal.id(), PrincipalId::Admin);
        assert_eq!(principal.roll_no(), None);
        assert_eq!(principal.home(), "/dashboard");
    }

    #[tokio::test]
    async fn admin_session_hash_survives_a_restart() {
        let first = AdminCredentials::new(&admin_config("adminpassword"), &key(b'k'), 4)
            .await
            .unwrap()
            .principal();
        let restarted = AdminCredentials::new(&admin_config("adminpassword"), &key(b'k'), 4)
            .await
            .unwrap()
            .principal();
        assert_eq!(first.session_auth_hash(), restarted.session_auth_hash());

        let new_password = AdminCredentials::new(&admin_config("changed"), &key(b'k'), 4)
            .await
            .unwrap()
            .principal();
        assert_ne!(first.session_auth_hash(), new_password.session_auth_hash());

        let new_key = AdminCredentials::new(&admin_config("adminpassword"), &key(b'q'), 4)
            .await
            .unwrap()
            .principal();
        assert_ne!(first.session_auth_hash(), new_key.session_auth_hash());
    }

    #[tokio::test]
    async fn derived_admin_hash_is_a_standard_bcrypt_hash() {
        let creds = AdminCredentials::new(&admin_config("adminpassword"), &key(b'k'), 4)
            .await
            .unwrap();

        let hash = creds.principal().session_auth_hash().to_vec();
        assert!(hash.starts_with(b"$2b$04$"));
        assert!(
            verify_password(
                SecretString::from("adminpassword"),
                SecretString::from(String::from_utf8(hash).unwrap()),
            )
            .await
            .unwrap()
        );
    }

    #[test]
    fn principals_report_their_own_permissions() {
        let student = Principal::Student(student());
        assert!(student.can(PermissionsTarget::VIEW_OWN_ATTENDANCE));
        assert!(!student.can(PermissionsTarget::MARK_ATTENDANCE));
    }
}
