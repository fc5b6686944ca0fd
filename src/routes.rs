use crate::{
    auth::{backend::RollcallAuthBackend, require_auth},
    routes::{
        attendance::{get_attendance_for_roll, get_own_attendance, get_student_dashboard},
        dashboard::{get_dashboard, get_students, post_mark_attendance},
        index::get_index_route,
        login::{
            get_login, get_logout, get_student_login, post_login, post_student_login,
        },
    },
    state::RollcallState,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{Expiry, SessionManagerLayer, SessionStore},
};
use time::Duration;
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

pub mod attendance;
pub mod dashboard;
pub mod index;
pub mod login;

const MAX_FORM_BYTES: usize = 256 * 1024;

pub fn app<Store>(state: RollcallState, auth_backend: RollcallAuthBackend, session_store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(5)))
        .with_signed(state.config().server_config().session_key());
    let auth_layer = AuthManagerLayerBuilder::new(auth_backend, session_layer).build();

    let protected = Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/students", get(get_students))
        .route("/student-dashboard", get(get_student_dashboard))
        .route("/attendance", get(get_own_attendance))
        .route("/attendance/{roll_no}", get(get_attendance_for_roll))
        .route("/mark-attendance", post(post_mark_attendance))
        .route("/logout", get(get_logout))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .route("/", get(get_index_route))
        .route("/login", get(get_login).post(post_login))
        .route(
            "/student-login",
            get(get_student_login).post(post_student_login),
        )
        .merge(protected)
        .layer(auth_layer)
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AdminCredentials, Principal, backend::RollcallAuthCredentials},
        config::{AdminConfig, DbConfig, RuntimeConfiguration, ServerConfig},
        data::{
            DataType,
            attendance::{AttendanceRecord, AttendanceStatus},
            student::{Student, tests::sample_student},
        },
    };
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode, header},
    };
    use axum_login::AuthnBackend;
    use secrecy::SecretString;
    use sqlx::{PgPool, postgres::PgPoolOptions};
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    async fn backend_with_pool(pool: PgPool) -> (RollcallState, RollcallAuthBackend) {
        let config = RuntimeConfiguration::from_parts(
            DbConfig::from_url(SecretString::from("postgres://rollcall@localhost/rollcall")),
            ServerConfig::from_values(None, SecretString::from("k".repeat(64))).unwrap(),
            AdminConfig::default(),
        );
        let session_key = config.server_config().session_key();
        let admin = AdminCredentials::new(&AdminConfig::default(), &session_key, 4)
            .await
            .unwrap();
        let state = RollcallState::from_pool(pool, config);
        (state.clone(), RollcallAuthBackend::new(state, admin))
    }

    async fn app_with_pool(pool: PgPool) -> Router {
        let (state, backend) = backend_with_pool(pool).await;
        app(state, backend, MemoryStore::default())
    }

    // nothing exercised here reaches the database, so the pool never connects
    async fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://rollcall@localhost/rollcall")
            .unwrap();
        app_with_pool(pool).await
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    fn session_cookie(response: &Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("response should set a session cookie");
        set_cookie
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn admin_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_form(
                "/login",
                "username=admin&password=adminpassword",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");
        session_cookie(&response)
    }

    #[tokio::test]
    async fn landing_page_is_public() {
        let response = test_app().await.oneshot(get("/", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Rollcall"));
        assert!(body.contains("href=\"/student-login\""));
    }

    #[tokio::test]
    async fn protected_routes_redirect_anonymous_users_to_login() {
        let app = test_app().await;

        for uri in [
            "/dashboard",
            "/students",
            "/student-dashboard",
            "/attendance",
            "/attendance/21CS001",
            "/logout",
        ] {
            let response = app.clone().oneshot(get(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/login", "{uri}");
        }

        let response = app
            .oneshot(post_form("/mark-attendance", "date=2024-05-01", None))
            .await
            .unwrap();
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn bad_admin_credentials_rerender_the_form() {
        let app = test_app().await;

        for body in [
            "username=admin&password=nope",
            "username=root&password=adminpassword",
            "username=&password=",
            "",
        ] {
            let response = app
                .clone()
                .oneshot(post_form("/login", body, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{body:?}");
            assert!(body_text(response).await.contains("Invalid credentials"));
        }
    }

    #[tokio::test]
    async fn blank_student_login_is_rejected_without_a_lookup() {
        let response = test_app()
            .await
            .oneshot(post_form("/student-login", "roll_no=&password=pw", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            body_text(response)
                .await
                .contains("Invalid roll number or password")
        );
    }

    #[tokio::test]
    async fn admin_session_lasts_until_logout() {
        let app = test_app().await;
        let cookie = admin_cookie(&app).await;

        let response = app.clone().oneshot(get("/login", Some(&cookie))).await.unwrap();
        assert_eq!(location(&response), "/dashboard");

        // the admin has no roll number of their own
        let response = app
            .clone()
            .oneshot(get("/attendance", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let response = app.clone().oneshot(get("/logout", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");

        for uri in ["/attendance", "/dashboard", "/logout"] {
            let response = app.clone().oneshot(get(uri, Some(&cookie))).await.unwrap();
            assert_eq!(location(&response), "/login", "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_attendance_submissions_are_rejected() {
        let app = test_app().await;
        let cookie = admin_cookie(&app).await;

        for body in [
            "student_1=Present",
            "date=2024-13-40&student_1=Present",
            "date=2024-05-01&student_1=Late",
            "date=2024-05-01&student_one=Present",
        ] {
            let response = app
                .clone()
                .oneshot(post_form("/mark-attendance", body, Some(&cookie)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body:?}");
        }
    }

    async fn student_cookie(app: &Router, roll_no: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_form(
                "/student-login",
                &format!("roll_no={roll_no}&password={password}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/student-dashboard");
        session_cookie(&response)
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn students_only_reach_their_own_attendance(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        Student::insert_into_database(sample_student("R1", "9000000001", "right"), &mut conn)
            .await
            .unwrap();
        Student::insert_into_database(sample_student("R2", "9000000002", "other"), &mut conn)
            .await
            .unwrap();
        drop(conn);
        let app = app_with_pool(pool).await;

        for body in ["roll_no=R1&password=wrong", "roll_no=R9&password=right"] {
            let response = app
                .clone()
                .oneshot(post_form("/student-login", body, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{body}");
            assert!(
                body_text(response)
                    .await
                    .contains("Invalid roll number or password")
            );
        }

        let cookie = student_cookie(&app, "R1", "right").await;

        for uri in ["/dashboard", "/students", "/attendance/R2"] {
            let response = app.clone().oneshot(get(uri, Some(&cookie))).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        }
        let response = app
            .clone()
            .oneshot(post_form(
                "/mark-attendance",
                "date=2024-05-01&student_1=Present",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        for uri in ["/student-dashboard", "/attendance", "/attendance/R1"] {
            let response = app.clone().oneshot(get(uri, Some(&cookie))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert!(body_text(response).await.contains("Student R1"), "{uri}");
        }
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn student_login_resolves_to_the_stored_student(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let id = Student::insert_into_database(sample_student("R1", "9000000001", "right"), &mut conn)
            .await
            .unwrap();
        let stored = Student::get_by_roll("R1", &mut conn).await.unwrap().unwrap();
        assert_eq!(stored.id, id);

        let (_, backend) = backend_with_pool(pool).await;

        let rejected = backend
            .authenticate(RollcallAuthCredentials::Student {
                roll_no: "R1".into(),
                password: SecretString::from("wrong"),
            })
            .await
            .unwrap();
        assert!(rejected.is_none());

        let Some(Principal::Student(student)) = backend
            .authenticate(RollcallAuthCredentials::Student {
                roll_no: "R1".into(),
                password: SecretString::from("right"),
            })
            .await
            .unwrap()
        else {
            panic!("the right password should log the student in");
        };
        assert_eq!(student.id, stored.id);
        assert_eq!(student.roll_no, stored.roll_no);
        assert_eq!(student.name, stored.name);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn marking_attendance_flashes_once(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let present = Student::insert_into_database(sample_student("A1", "9000000001", "pw"), &mut conn)
            .await
            .unwrap();
        let absent = Student::insert_into_database(sample_student("A2", "9000000002", "pw"), &mut conn)
            .await
            .unwrap();
        let app = app_with_pool(pool).await;
        let cookie = admin_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(post_form(
                "/mark-attendance",
                &format!("date=2024-05-01&student_{present}=Present&student_{absent}=Absent&student_999=Present"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        let flash = "Attendance has been recorded successfully!";
        let response = app.clone().oneshot(get("/dashboard", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(flash));

        let response = app.clone().oneshot(get("/dashboard", Some(&cookie))).await.unwrap();
        assert!(!body_text(response).await.contains(flash));

        let records = AttendanceRecord::get_all_for_student(present, &mut conn).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Present);
        let records = AttendanceRecord::get_all_for_student(absent, &mut conn).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Absent);
        assert_eq!(AttendanceRecord::get_all(&mut conn).await.unwrap().len(), 2);
    }
}
