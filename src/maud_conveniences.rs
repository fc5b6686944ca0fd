use crate::auth::{AuthUtilities, PermissionsTarget, Principal};
use maud::{Markup, Render, html};

pub fn render_table<const N: usize>(
    overall_title: &'static str,
    titles: [&'static str; N],
    items: Vec<[Markup; N]>,
) -> Markup {
    html! {
        div class="container mx-auto" {
            (title(overall_title))
            div class="overflow-x-auto" {
                table class="min-w-full bg-gray-800 rounded shadow-md" {
                    thead class="bg-gray-700" {
                        tr {
                            @for title in titles {
                                th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                            }
                        }
                    }
                    tbody {
                        @if items.is_empty() {
                            tr {
                                td colspan=(N) class="py-2 px-4 italic text-gray-400" {"Nothing to show yet."}
                            }
                        }
                        @for row in items {
                            tr {
                                @for col in row {
                                    td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, input: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-gray-300 text-sm font-bold mb-2" {(label)}
            (input)
        }
    }
}

pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    required: bool,
    ty: Option<&'static str>,
    value: Option<&str>,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type=(ty.unwrap_or("text")) id=(id) name=(id) required[required] value=[value] class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
        },
    )
}

pub fn form_submit_button(text: Option<&'static str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
        }
    }
}

pub fn error_alert(message: impl Render) -> Markup {
    html! {
        div role="alert" class="bg-red-100 border border-red-400 text-red-700 px-4 py-4 rounded relative mb-4" {
            span class="block sm:inline" {(message)}
        }
    }
}

pub fn success_alert(message: impl Render) -> Markup {
    html! {
        div role="status" class="bg-green-100 border border-green-400 text-green-700 px-4 py-4 rounded relative mb-4" {
            span class="block sm:inline" {(message)}
        }
    }
}

pub fn render_nav(user: Option<&Principal>) -> Markup {
    let link_class = "hover:text-blue-300 underline";

    html! {
        nav class="w-full bg-gray-800 p-4 mb-8 flex flex-row space-x-6 justify-end" {
            a href="/" class=(link_class) {"Home"}
            @if let Some(user) = user {
                @if user.can(PermissionsTarget::VIEW_ROSTER) {
                    a href="/dashboard" class=(link_class) {"Dashboard"}
                    a href="/students" class=(link_class) {"Students"}
                }
                @if user.can(PermissionsTarget::VIEW_OWN_ATTENDANCE) {
                    a href="/student-dashboard" class=(link_class) {"My Attendance"}
                }
                span class="text-gray-400" {
                    "Signed in as "
                    @match user {
                        Principal::Admin { username, .. } => (username),
                        Principal::Student(student) => (student),
                    }
                }
                a href="/logout" class=(link_class) {"Logout"}
            } @else {
                a href="/login" class=(link_class) {"Admin Login"}
                a href="/student-login" class=(link_class) {"Student Login"}
            }
        }
    }
}
