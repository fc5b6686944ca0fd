use crate::{
    auth::hash_password,
    data::DataType,
    error::{MakeQuerySnafu, RollcallResult},
};
use maud::Render;
use secrecy::SecretString;
use snafu::ResultExt;
use sqlx::{FromRow, PgConnection};

#[derive(Debug, Clone)]
pub struct Student {
    pub id: i32,
    pub name: String,
    pub roll_no: String,
    pub year_of_study: i32,
    pub phone_number: String,
    pub branch: String,
    pub gender: String,
    pub bcrypt_hashed_password: SecretString,
}

#[derive(FromRow)]
struct StudentRow {
    id: i32,
    name: String,
    roll_no: String,
    year_of_study: i32,
    phone_number: String,
    branch: String,
    gender: String,
    bcrypt_hashed_password: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            roll_no: row.roll_no,
            year_of_study: row.year_of_study,
            phone_number: row.phone_number,
            branch: row.branch,
            gender: row.gender,
            bcrypt_hashed_password: SecretString::from(row.bcrypt_hashed_password),
        }
    }
}

pub struct AddStudentForm {
    pub name: String,
    pub roll_no: String,
    pub year_of_study: i32,
    pub phone_number: String,
    pub branch: String,
    pub gender: String,
    pub password: SecretString,
    pub bcrypt_cost: u32,
}

impl DataType for Student {
    type Id = i32;
    type FormForAdding = AddStudentForm;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut PgConnection) -> RollcallResult<Option<Self>> {
        Ok(
            sqlx::query_as::<_, StudentRow>("SELECT * FROM public.students WHERE id = $1")
                .bind(id)
                .fetch_optional(conn)
                .await
                .context(MakeQuerySnafu)?
                .map(Self::from),
        )
    }

    async fn get_all(conn: &mut PgConnection) -> RollcallResult<Vec<Self>> {
        Ok(
            sqlx::query_as::<_, StudentRow>("SELECT * FROM public.students ORDER BY id")
                .fetch_all(conn)
                .await
                .context(MakeQuerySnafu)?
                .into_iter()
                .map(Self::from)
                .collect(),
        )
    }

    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> RollcallResult<Self::Id> {
        let AddStudentForm {
            name,
            roll_no,
            year_of_study,
            phone_number,
            branch,
            gender,
            password,
            bcrypt_cost,
        } = to_be_added;

        let bcrypt_hashed_password = hash_password(password, bcrypt_cost).await?;

        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO public.students (name, roll_no, year_of_study, phone_number, branch, gender, bcrypt_hashed_password) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(name)
        .bind(roll_no)
        .bind(year_of_study)
        .bind(phone_number)
        .bind(branch)
        .bind(gender)
        .bind(bcrypt_hashed_password)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)?;

        Ok(id)
    }
}

impl Student {
    pub async fn get_by_roll(roll_no: &str, conn: &mut PgConnection) -> RollcallResult<Option<Self>> {
        Ok(
            sqlx::query_as::<_, StudentRow>("SELECT * FROM public.students WHERE roll_no = $1")
                .bind(roll_no)
                .fetch_optional(conn)
                .await
                .context(MakeQuerySnafu)?
                .map(Self::from),
        )
    }
}

impl Render for Student {
    fn render_to(&self, buffer: &mut String) {
        self.name.render_to(buffer);
        buffer.push_str(" (");
        self.roll_no.render_to(buffer);
        buffer.push(')');
    }
}
