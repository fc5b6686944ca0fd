use crate::{
    auth::{AdminCredentials, Principal, PrincipalId, verify_password},
    data::student::Student,
    error::RollcallError,
    state::RollcallState,
};
use async_trait::async_trait;
use axum_login::{AuthnBackend, UserId};
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Clone)]
pub struct RollcallAuthBackend {
    state: RollcallState,
    admin: Arc<AdminCredentials>,
}

impl RollcallAuthBackend {
    pub fn new(state: RollcallState, admin: AdminCredentials) -> Self {
        Self {
            state,
            admin: Arc::new(admin),
        }
    }
}

pub enum RollcallAuthCredentials {
    Admin {
        username: String,
        password: SecretString,
    },
    Student {
        roll_no: String,
        password: SecretString,
    },
}

#[async_trait]
impl AuthnBackend for RollcallAuthBackend {
    type User = Principal;
    type Credentials = RollcallAuthCredentials;
    type Error = RollcallError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        match creds {
            RollcallAuthCredentials::Admin { username, password } => {
                Ok(if self.admin.verify(&username, password).await? {
                    Some(self.admin.principal())
                } else {
                    None
                })
            }
            RollcallAuthCredentials::Student { roll_no, password } => {
                let mut conn = self.state.get_connection().await?;
                let Some(student) = Student::get_by_roll(&roll_no, &mut conn).await? else {
                    return Ok(None);
                };

                let password_verification_result =
                    verify_password(password, student.bcrypt_hashed_password.clone()).await?;

                Ok(if password_verification_result {
                    Some(Principal::Student(student))
                } else {
                    None
                })
            }
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        match user_id {
            PrincipalId::Admin => Ok(Some(self.admin.principal())),
            PrincipalId::Student { roll_no } => {
                let mut conn = self.state.get_connection().await?;
                Ok(Student::get_by_roll(roll_no, &mut conn)
                    .await?
                    .map(Principal::Student))
            }
        }
    }
}
