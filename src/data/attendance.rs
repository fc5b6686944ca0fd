use crate::{
    data::{DataType, student::Student},
    error::{
        CommitTransactionSnafu, CorruptStatusSnafu, MakeQuerySnafu, MissingDateSnafu,
        ParseDateSnafu, ParseStatusSnafu, ParseStudentIdSnafu, RollcallError, RollcallResult,
    },
};
use maud::{Markup, Render, html};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use sqlx::{FromRow, PgConnection, Postgres, Transaction};
use std::{collections::BTreeMap, fmt, str::FromStr};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Prefix of the per-student radio fields on the mark attendance form.
pub const STUDENT_FIELD_PREFIX: &str = "student_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub const ALL: [Self; 2] = [Self::Present, Self::Absent];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = RollcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .context(ParseStatusSnafu { original: s })
    }
}

impl Render for AttendanceStatus {
    fn render(&self) -> Markup {
        let colour = match self {
            Self::Present => "bg-green-700",
            Self::Absent => "bg-red-700",
        };

        html! {
            span class={"px-2 py-1 rounded text-sm font-semibold " (colour)} {(self.as_str())}
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: i32,
    pub student_id: i32,
    pub date: Date,
    pub status: AttendanceStatus,
}

#[derive(FromRow)]
struct AttendanceRow {
    id: i32,
    student_id: i32,
    date: Date,
    status: String,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = RollcallError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let Ok(status) = row.status.parse() else {
            return CorruptStatusSnafu { found: row.status }.fail();
        };

        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            date: row.date,
            status,
        })
    }
}

pub struct AddAttendance {
    pub student_id: i32,
    pub date: Date,
    pub status: AttendanceStatus,
}

impl DataType for AttendanceRecord {
    type Id = i32;
    type FormForAdding = AddAttendance;

    async fn get_from_db_by_id(id: Self::Id, conn: &mut PgConnection) -> RollcallResult<Option<Self>> {
        sqlx::query_as::<_, AttendanceRow>("SELECT * FROM public.attendance WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    async fn get_all(conn: &mut PgConnection) -> RollcallResult<Vec<Self>> {
        sqlx::query_as::<_, AttendanceRow>("SELECT * FROM public.attendance ORDER BY date, student_id")
            .fetch_all(conn)
            .await
            .context(MakeQuerySnafu)?
            .into_iter()
            .map(Self::try_from)
            .collect()
    }

    /// Re-marking a student on a date they already have a record for replaces the status.
    async fn insert_into_database(
        to_be_added: Self::FormForAdding,
        conn: &mut PgConnection,
    ) -> RollcallResult<Self::Id> {
        let AddAttendance {
            student_id,
            date,
            status,
        } = to_be_added;

        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO public.attendance (student_id, date, status) VALUES ($1, $2, $3) ON CONFLICT (student_id, date) DO UPDATE SET status = excluded.status RETURNING id",
        )
        .bind(student_id)
        .bind(date)
        .bind(status.as_str())
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)?;

        Ok(id)
    }
}

impl AttendanceRecord {
    pub async fn get_all_for_student(
        student_id: i32,
        conn: &mut PgConnection,
    ) -> RollcallResult<Vec<Self>> {
        sqlx::query_as::<_, AttendanceRow>(
            "SELECT * FROM public.attendance WHERE student_id = $1 ORDER BY date",
        )
        .bind(student_id)
        .fetch_all(conn)
        .await
        .context(MakeQuerySnafu)?
        .into_iter()
        .map(Self::try_from)
        .collect()
    }
}

/// A student (if the roll number resolved) alongside all of their records.
#[derive(Debug)]
pub struct StudentAttendance {
    pub student: Option<Student>,
    pub records: Vec<AttendanceRecord>,
}

impl StudentAttendance {
    pub async fn for_roll(roll_no: &str, conn: &mut PgConnection) -> RollcallResult<Self> {
        let Some(student) = Student::get_by_roll(roll_no, &mut *conn).await? else {
            return Ok(Self {
                student: None,
                records: vec![],
            });
        };

        let records = AttendanceRecord::get_all_for_student(student.id, conn).await?;
        Ok(Self {
            student: Some(student),
            records,
        })
    }

    pub fn days_present(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == AttendanceStatus::Present)
            .count()
    }

    /// Share of marked days the student was present for, `None` before any marking.
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage_present(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.days_present() as f64 * 100.0 / self.records.len() as f64)
    }
}

/// One submission of the mark attendance form.
#[derive(Debug, PartialEq, Eq)]
pub struct AttendanceSheet {
    pub date: Date,
    pub statuses: BTreeMap<i32, AttendanceStatus>,
}

impl AttendanceSheet {
    /// Parses `date` plus `student_<id>` fields. Blank statuses mean the student was not marked.
    pub fn from_form(fields: Vec<(String, String)>) -> RollcallResult<Self> {
        let mut date = None;
        let mut statuses = BTreeMap::new();

        for (key, value) in fields {
            if key == "date" {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    date = Some(
                        Date::parse(trimmed, DATE_FORMAT).context(ParseDateSnafu {
                            original: value.clone(),
                        })?,
                    );
                }
                continue;
            }

            let Some(id) = key.strip_prefix(STUDENT_FIELD_PREFIX) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }

            let id = id
                .parse::<i32>()
                .context(ParseStudentIdSnafu { original: id })?;
            statuses.insert(id, value.parse::<AttendanceStatus>()?);
        }

        Ok(Self {
            date: date.context(MissingDateSnafu)?,
            statuses,
        })
    }

    /// Writes every marked status in one transaction. Ids without a matching student are skipped.
    pub async fn record(&self, mut tx: Transaction<'_, Postgres>) -> RollcallResult<usize> {
        let ids: Vec<i32> = self.statuses.keys().copied().collect();
        let existing: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM public.students WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&mut *tx)
                .await
                .context(MakeQuerySnafu)?;

        let mut written = 0;
        for (&student_id, &status) in &self.statuses {
            if !existing.contains(&student_id) {
                debug!(student_id, "Skipping attendance for unknown student");
                continue;
            }

            AttendanceRecord::insert_into_database(
                AddAttendance {
                    student_id,
                    date: self.date,
                    status,
                },
                &mut *tx,
            )
            .await?;
            written += 1;
        }

        tx.commit().await.context(CommitTransactionSnafu)?;
        Ok(written)
    }
}
