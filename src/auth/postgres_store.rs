use crate::{
    error::{MakeQuerySnafu, RmpSerdeDecodeSnafu, RmpSerdeEncodeSnafu, RollcallError},
    state::RollcallState,
};
use async_trait::async_trait;
use axum_login::tower_sessions::{
    ExpiredDeletion, SessionStore,
    session::{Id, Record},
    session_store::Error as SSError,
};
use snafu::ResultExt;
use sqlx::PgConnection;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    state: RollcallState,
}

impl PostgresSessionStore {
    pub const fn new(state: RollcallState) -> Self {
        Self { state }
    }
}

impl PostgresSessionStore {
    async fn id_exists(id: Id, conn: &mut PgConnection) -> Result<bool, RollcallError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM public.sessions WHERE id = $1)")
            .bind(id.to_string())
            .fetch_one(conn)
            .await
            .context(MakeQuerySnafu)
    }

    async fn save_session(record: &Record, conn: &mut PgConnection) -> Result<(), RollcallError> {
        let serialised_data = rmp_serde::to_vec(&record.data).context(RmpSerdeEncodeSnafu)?;

        sqlx::query("INSERT INTO public.sessions (id, data, expiry_date) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET data = excluded.data, expiry_date = excluded.expiry_date")
            .bind(record.id.to_string())
            .bind(serialised_data)
            .bind(record.expiry_date)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        Ok(())
    }

    async fn load_session(id: &Id, conn: &mut PgConnection) -> Result<Option<Record>, RollcallError> {
        let Some((data, expiry_date)): Option<(Vec<u8>, OffsetDateTime)> = sqlx::query_as(
            "SELECT data, expiry_date FROM public.sessions WHERE id = $1 AND expiry_date > now()",
        )
        .bind(id.to_string())
        .fetch_optional(conn)
        .await
        .context(MakeQuerySnafu)?
        else {
            return Ok(None);
        };

        let data = rmp_serde::from_slice(&data).context(RmpSerdeDecodeSnafu)?;

        Ok(Some(Record {
            id: *id,
            data,
            expiry_date,
        }))
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, session_record: &mut Record) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        while Self::id_exists(session_record.id, &mut connection)
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?
        {
            session_record.id = Id::default();
        }

        Self::save_session(session_record, &mut connection)
            .await
            .map_err(|e| SSError::Encode(e.to_string()))?;

        Ok(())
    }

    async fn save(&self, session_record: &Record) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        Self::save_session(session_record, &mut connection)
            .await
            .map_err(|e| SSError::Encode(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, session_id: &Id) -> Result<Option<Record>, SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        Self::load_session(session_id, &mut connection)
            .await
            .map_err(|e| SSError::Decode(e.to_string()))
    }

    async fn delete(&self, session_id: &Id) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM public.sessions WHERE id = $1")
            .bind(session_id.to_string())
            .execute(&mut *connection)
            .await
            .context(MakeQuerySnafu)
            .map_err(|e| SSError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for PostgresSessionStore {
    async fn delete_expired(&self) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        let deleted = sqlx::query("DELETE FROM public.sessions WHERE expiry_date < now()")
            .execute(&mut *connection)
            .await
            .context(MakeQuerySnafu)
            .map_err(|e| SSError::Backend(e.to_string()))?
            .rows_affected();
        debug!(deleted, "Removed expired sessions");

        Ok(())
    }
}
