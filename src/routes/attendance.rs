use crate::{
    auth::{AuthUtilities, PermissionsTarget, Principal, RollcallSession},
    data::attendance::StudentAttendance,
    error::RollcallResult,
    maud_conveniences::{error_alert, render_table, subtitle, title},
    state::RollcallState,
};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};

fn attendance_table(view: &StudentAttendance) -> Markup {
    render_table(
        "Attendance Records",
        ["Date", "Day", "Status"],
        view.records
            .iter()
            .map(|record| {
                [
                    html! {(record.date.to_string())},
                    html! {(record.date.weekday().to_string())},
                    html! {(record.status)},
                ]
            })
            .collect(),
    )
}

fn summary(view: &StudentAttendance) -> Markup {
    html! {
        @if let Some(percentage) = view.percentage_present() {
            p class="text-gray-200 mb-4" {
                "Present on " (view.days_present()) " of " (view.records.len()) " marked days "
                "(" (format!("{percentage:.1}")) "%)"
            }
        } @else {
            p class="text-gray-400 italic mb-4" {"No attendance has been marked yet."}
        }
    }
}

fn attendance_page(roll_no: &str, view: &StudentAttendance) -> Markup {
    html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-3xl w-full" {
            @if let Some(student) = &view.student {
                (title(student))
                (subtitle(html! {(student.branch) ", year " (student.year_of_study)}))
                (summary(view))
            } @else {
                (title("Attendance"))
                (error_alert(html! {"No student found with roll number " strong {(roll_no)}}))
            }
            (attendance_table(view))
        }
    }
}

/// The logged in student's roll number, or a redirect for admins.
fn own_roll_no(session: &RollcallSession) -> Result<String, Response> {
    match &session.user {
        Some(Principal::Student(student)) => Ok(student.roll_no.clone()),
        Some(admin @ Principal::Admin { .. }) => Err(Redirect::to(admin.home()).into_response()),
        None => Err(Redirect::to("/login").into_response()),
    }
}

pub async fn get_student_dashboard(
    State(state): State<RollcallState>,
    session: RollcallSession,
) -> RollcallResult<Response> {
    let roll_no = match own_roll_no(&session) {
        Ok(roll_no) => roll_no,
        Err(redirect) => return Ok(redirect),
    };
    session.ensure_can(PermissionsTarget::VIEW_OWN_ATTENDANCE)?;

    let view = StudentAttendance::for_roll(&roll_no, &mut *state.get_connection().await?).await?;
    let name = view
        .student
        .as_ref()
        .map_or_else(|| roll_no.clone(), |student| student.name.clone());

    Ok(state
        .render(session, html! {
            div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-3xl w-full" {
                (title(html! {"Welcome, " (name)}))
                (summary(&view))
                (attendance_table(&view))
            }
        })
        .into_response())
}

pub async fn get_own_attendance(
    State(state): State<RollcallState>,
    session: RollcallSession,
) -> RollcallResult<Response> {
    let roll_no = match own_roll_no(&session) {
        Ok(roll_no) => roll_no,
        Err(redirect) => return Ok(redirect),
    };
    session.ensure_can(PermissionsTarget::VIEW_OWN_ATTENDANCE)?;

    let view = StudentAttendance::for_roll(&roll_no, &mut *state.get_connection().await?).await?;
    Ok(state
        .render(session, attendance_page(&roll_no, &view))
        .into_response())
}

/// Admins can look up anyone; students only themselves.
pub async fn get_attendance_for_roll(
    State(state): State<RollcallState>,
    session: RollcallSession,
    Path(roll_no): Path<String>,
) -> RollcallResult<Markup> {
    let viewing_self = session.user.as_ref().and_then(Principal::roll_no) == Some(roll_no.as_str());
    if viewing_self {
        session.ensure_can(PermissionsTarget::VIEW_OWN_ATTENDANCE)?;
    } else {
        session.ensure_can(PermissionsTarget::VIEW_ANY_ATTENDANCE)?;
    }

    let view = StudentAttendance::for_roll(&roll_no, &mut *state.get_connection().await?).await?;
    Ok(state.render(session, attendance_page(&roll_no, &view)))
}
