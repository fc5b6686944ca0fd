use crate::{auth::RollcallSession, state::RollcallState};
use axum::extract::State;
use maud::{Markup, html};

pub async fn get_index_route(State(state): State<RollcallState>, session: RollcallSession) -> Markup {
    let home = session.user.as_ref().map(|user| user.home());

    state.render(session, html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            h1 class="text-2xl font-semibold mb-6 text-center" {
                "Rollcall"
            }
            p class="text-gray-300 mb-6 text-center" {
                "Daily attendance for administrators and students."
            }

            div class="flex flex-row space-x-4 justify-center" {
                @if let Some(home) = home {
                    a href=(home) class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                        "Continue"
                    }
                } @else {
                    a href="/login" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                        "Admin Login"
                    }
                    a href="/student-login" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                        "Student Login"
                    }
                }
            }
        }
    })
}
