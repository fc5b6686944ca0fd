use crate::error::{BadEnvVarSnafu, ParsePortSnafu, RollcallResult, SecretKeyTooShortSnafu};
use axum_login::tower_sessions::cookie::Key;
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::{ResultExt, ensure};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "adminpassword";

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    server_config: Arc<ServerConfig>,
    admin_config: Arc<AdminConfig>,
}

impl RuntimeConfiguration {
    pub fn new() -> RollcallResult<Self> {
        Ok(Self::from_parts(
            DbConfig::new()?,
            ServerConfig::new()?,
            AdminConfig::new(),
        ))
    }

    pub fn from_parts(db: DbConfig, server: ServerConfig, admin: AdminConfig) -> Self {
        Self {
            db_config: Arc::new(db),
            server_config: Arc::new(server),
            admin_config: Arc::new(admin),
        }
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server_config.clone()
    }

    pub fn admin_config(&self) -> Arc<AdminConfig> {
        self.admin_config.clone()
    }
}

#[derive(Debug)]
pub struct DbConfig {
    url: SecretString,
}

impl DbConfig {
    pub fn new() -> RollcallResult<Self> {
        Ok(Self {
            url: SecretString::from(var("DATABASE_URL").context(BadEnvVarSnafu {
                name: "DATABASE_URL",
            })?),
        })
    }

    pub const fn from_url(url: SecretString) -> Self {
        Self { url }
    }

    pub fn get_db_path(&self) -> &str {
        self.url.expose_secret()
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    port: u16,
    secret_key: SecretString,
}

impl ServerConfig {
    pub fn new() -> RollcallResult<Self> {
        let secret_key = var("SECRET_KEY").context(BadEnvVarSnafu { name: "SECRET_KEY" })?;
        Self::from_values(var("PORT").ok(), SecretString::from(secret_key))
    }

    pub fn from_values(port: Option<String>, secret_key: SecretString) -> RollcallResult<Self> {
        let port = match port.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PORT,
            Some(port) => port.parse().context(ParsePortSnafu)?,
        };

        // cookie::Key needs 512 bits of material
        let len = secret_key.expose_secret().len();
        ensure!(len >= 64, SecretKeyTooShortSnafu { len });

        Ok(Self { port, secret_key })
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn session_key(&self) -> Key {
        Key::from(self.secret_key.expose_secret().as_bytes())
    }
}

#[derive(Debug)]
pub struct AdminConfig {
    pub username: String,
    pub password: SecretString,
}

impl AdminConfig {
    pub fn new() -> Self {
        let username = var("ADMIN_USERNAME").unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.to_string());
        let password = var("ADMIN_PASSWORD").unwrap_or_else(|_| {
            warn!("`ADMIN_PASSWORD` not set, falling back to the default admin password");
            DEFAULT_ADMIN_PASSWORD.to_string()
        });

        Self {
            username,
            password: SecretString::from(password),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: SecretString::from(DEFAULT_ADMIN_PASSWORD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RollcallError;

    fn long_secret() -> SecretString {
        SecretString::from("s".repeat(64))
    }

    #[test]
    fn port_defaults_when_absent_or_blank() {
        let absent = ServerConfig::from_values(None, long_secret()).unwrap();
        assert_eq!(absent.port(), DEFAULT_PORT);

        let blank = ServerConfig::from_values(Some("  ".into()), long_secret()).unwrap();
        assert_eq!(blank.port(), DEFAULT_PORT);
    }

    #[test]
    fn port_is_parsed_and_bound_on_all_interfaces() {
        let config = ServerConfig::from_values(Some("8080".into()), long_secret()).unwrap();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_values(Some("eighty".into()), long_secret()).unwrap_err();
        assert!(matches!(err, RollcallError::ParsePort { .. }));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = ServerConfig::from_values(None, SecretString::from("hunter2")).unwrap_err();
        assert!(matches!(err, RollcallError::SecretKeyTooShort { len: 7 }));
    }
}
