use crate::error::RollcallResult;
use sqlx::PgConnection;

pub mod attendance;
pub mod student;

pub trait DataType: Sized {
    type Id;
    type FormForAdding;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut PgConnection) -> RollcallResult<Option<Self>>;
    async fn get_all(conn: &mut PgConnection) -> RollcallResult<Vec<Self>>;
    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> RollcallResult<Self::Id>;
}
