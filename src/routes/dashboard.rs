use crate::{
    auth::{AuthUtilities, PermissionsTarget, RollcallSession, set_flash, take_flash},
    data::{
        DataType,
        attendance::{AttendanceSheet, AttendanceStatus, STUDENT_FIELD_PREFIX},
        student::Student,
    },
    error::RollcallResult,
    maud_conveniences::{form_submit_button, render_table, simple_form_element, success_alert},
    state::RollcallState,
};
use axum::{Form, extract::State, response::Redirect};
use axum_login::tower_sessions::Session;
use maud::{Markup, html};
use time::OffsetDateTime;

fn roll_link(student: &Student) -> Markup {
    html! {
        a href={"/attendance/" (student.roll_no)} class="hover:text-blue-300 underline" {(student.roll_no)}
    }
}

fn mark_attendance_form(students: &[Student]) -> Markup {
    let today = OffsetDateTime::now_utc().date().to_string();

    html! {
        form method="post" action="/mark-attendance" class="mt-6" {
            (simple_form_element("date", "Date", true, Some("date"), Some(today.as_str())))
            (render_table(
                "Mark Attendance",
                ["Student", "Roll Number", "Status"],
                students
                    .iter()
                    .map(|student| {
                        let field = format!("{STUDENT_FIELD_PREFIX}{}", student.id);
                        [
                            html! {(student.name)},
                            roll_link(student),
                            html! {
                                div class="flex flex-row space-x-4" {
                                    @for status in AttendanceStatus::ALL {
                                        label class="flex items-center space-x-1" {
                                            input type="radio" name=(field) value=(status.as_str()) {}
                                            span {(status.as_str())}
                                        }
                                    }
                                }
                            },
                        ]
                    })
                    .collect(),
            ))
            div class="mt-4" {
                (form_submit_button(Some("Submit Attendance")))
            }
        }
    }
}

pub async fn get_dashboard(
    State(state): State<RollcallState>,
    session: RollcallSession,
    flash_session: Session,
) -> RollcallResult<Markup> {
    session.ensure_can(PermissionsTarget::VIEW_ROSTER)?;

    let flash = take_flash(&flash_session).await?;
    let students = Student::get_all(&mut *state.get_connection().await?).await?;

    Ok(state.render(session, html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-4xl w-full flex flex-col space-y-4" {
            @if let Some(flash) = flash {
                (success_alert(flash))
            }
            p class="text-gray-300" {
                (students.len()) " students on the roster. Leave a student unselected to skip them for the day."
            }
            (mark_attendance_form(&students))
        }
    }))
}

pub async fn get_students(
    State(state): State<RollcallState>,
    session: RollcallSession,
) -> RollcallResult<Markup> {
    session.ensure_can(PermissionsTarget::VIEW_ROSTER)?;

    let students = Student::get_all(&mut *state.get_connection().await?).await?;

    Ok(state.render(session, html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full" {
            (render_table(
                "Students",
                ["Name", "Roll Number", "Year", "Phone", "Branch", "Gender"],
                students
                    .iter()
                    .map(|student| {
                        [
                            html! {(student.name)},
                            roll_link(student),
                            html! {(student.year_of_study)},
                            html! {(student.phone_number)},
                            html! {(student.branch)},
                            html! {(student.gender)},
                        ]
                    })
                    .collect(),
            ))
        }
    }))
}

pub async fn post_mark_attendance(
    State(state): State<RollcallState>,
    session: RollcallSession,
    flash_session: Session,
    Form(fields): Form<Vec<(String, String)>>,
) -> RollcallResult<Redirect> {
    session.ensure_can(PermissionsTarget::MARK_ATTENDANCE)?;

    let sheet = AttendanceSheet::from_form(fields)?;
    let written = sheet.record(state.get_transaction().await?).await?;
    info!(date = %sheet.date, written, "Recorded attendance");

    set_flash(&flash_session, "Attendance has been recorded successfully!").await?;
    Ok(Redirect::to("/dashboard"))
}
