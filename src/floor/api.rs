use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Extension, Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, patch, post, put},
};
use chrono::Utc;

use crate::errors::{FloorError, FloorResult};

use super::andon_service::AndonService;
use super::auth::{self, AuthSettings, CurrentUser, redirect, require_admin};
use super::db::{DbHandle, FloorDb};
use super::models::{AndonSettings, Line};
use super::repository::{
    AndonConfigRepository, AndonLayoutRepository, LineRepository, ProcessRepository,
    ProductionLineRepository, WorkerRepository,
};
use super::requests::{
    CreateLineRequest, CreateProcessRequest, CreateWorkerRequest, DefectiveRequest,
    PayloadRequest, SensorEventRequest, StartProductionRequest, UpdateAndonConfigRequest,
    UpdateLineWorkerRequest,
};
use super::switch_service::SwitchService;
use super::views::{self, Datatable};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub auth: AuthSettings,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unprocessable(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<FloorError> for ApiError {
    fn from(e: FloorError) -> Self {
        match e {
            FloorError::ModelNotFound { .. } => ApiError::NotFound(e.to_string()),
            FloorError::Validation(msg) => ApiError::Unprocessable(msg),
            FloorError::Unauthenticated => ApiError::Unauthorized(e.to_string()),
            FloorError::Forbidden => ApiError::Forbidden(e.to_string()),
            FloorError::UpdateFailed { .. }
            | FloorError::LockPoisoned
            | FloorError::Database(_)
            | FloorError::Other(_) => {
                tracing::error!(error = ?e, "Request failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// Every route, behind the session middleware. Public paths are let
/// through by the middleware itself.
pub fn api_router(state: SharedState) -> Router<SharedState> {
    Router::new()
        // Browser
        .route("/", get(root))
        .route("/home", get(home))
        .route("/date", get(date))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/workers", get(workers_page).post(create_worker_form))
        .route("/workers/create", get(new_worker_page))
        .route("/processes", get(processes_page).post(create_process_form))
        .route("/processes/create", get(new_process_page))
        .route(
            "/processes/{id}/lines",
            get(lines_page).post(create_line_form),
        )
        .route("/processes/{id}/lines/create", get(new_line_page))
        // JSON
        .route("/api/andon/processes", get(andon_processes))
        .route(
            "/api/andon/config",
            get(get_andon_config).put(update_andon_config),
        )
        .route("/api/workers", get(list_workers).post(create_worker))
        .route("/api/processes", post(create_process))
        .route(
            "/api/processes/{id}/lines",
            get(list_lines).post(create_line),
        )
        .route("/api/processes/{id}/line-workers", put(update_line_workers))
        .route("/api/processes/{id}/production/start", post(start_production))
        .route("/api/processes/{id}/production/stop", post(stop_production))
        .route("/api/processes/{id}/sensor-events", post(create_sensor_event))
        .route("/api/production-lines/{id}/payloads", post(create_payload))
        .route("/api/production-lines/{id}", patch(set_defective))
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(state, auth::require_session))
}

// ── Browser handlers ──────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn root() -> Response {
    redirect("/home")
}

async fn date() -> impl IntoResponse {
    Json(serde_json::json!({"date": Utc::now().to_rfc3339()}))
}

async fn home(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let user_id = user.user_id;
    let (config, processes) = state
        .db
        .call(move |db| {
            let processes = AndonService::from_db(db).processes(user_id)?;
            Ok((db.andon_config()?, processes))
        })
        .await?;
    Ok(Html(views::board(&user, &config, &processes)))
}

async fn workers_page(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let workers = state
        .db
        .call(|db| Ok(WorkerRepository::all(db)?))
        .await?;
    let table = Datatable {
        title: "Workers",
        headers: &["Identification number", "Name"],
        rows: workers
            .into_iter()
            .map(|w| vec![w.identification_number, w.name])
            .collect(),
        add_href: Some("/workers/create"),
    };
    Ok(Html(table.render(&user)))
}

async fn processes_page(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    let user_id = user.user_id;
    let processes = state
        .db
        .call(move |db| Ok(ProcessRepository::all(db, &[], user_id)?))
        .await?;
    let table = Datatable {
        title: "Processes",
        headers: &["ID", "Name", "Production"],
        rows: processes
            .into_iter()
            .map(|p| {
                let production = match p.process.production_history_id {
                    Some(id) => format!("Run {}", id),
                    None => "Idle".to_string(),
                };
                vec![p.process.process_id.to_string(), p.process.name, production]
            })
            .collect(),
        add_href: Some("/processes/create"),
    };
    Ok(Html(table.render(&user)))
}

async fn lines_page(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let (process, lines, workers) = state
        .db
        .call(move |db| {
            let process = ProcessRepository::find(db, id)?
                .ok_or_else(|| FloorError::not_found("process", id))?;
            let workers: HashMap<i64, String> = WorkerRepository::all(db)?
                .into_iter()
                .map(|w| (w.worker_id, w.name))
                .collect();
            Ok((process, db.for_process(id)?, workers))
        })
        .await?;

    let title = format!("{} lines", process.name);
    let add_href = format!("/processes/{}/lines/create", id);
    let table = Datatable {
        title: &title,
        headers: &["Order", "Name", "Worker"],
        rows: lines
            .into_iter()
            .map(|l| {
                let worker = l
                    .worker_id
                    .and_then(|w| workers.get(&w).cloned())
                    .unwrap_or_else(|| "-".to_string());
                vec![l.order.to_string(), l.name, worker]
            })
            .collect(),
        add_href: Some(&add_href),
    };
    Ok(Html(table.render(&user)))
}

async fn new_worker_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    require_admin(&user)?;
    Ok(Html(views::create_form(
        &user,
        "New worker",
        "/workers",
        &[("name", "Name"), ("identification_number", "Identification number")],
    )))
}

async fn create_worker_form(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(req): Form<CreateWorkerRequest>,
) -> Result<Response, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    state
        .db
        .call(move |db| Ok(WorkerRepository::create(db, &req.name, &req.identification_number)?))
        .await?;
    Ok(redirect("/workers"))
}

async fn new_process_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, ApiError> {
    require_admin(&user)?;
    Ok(Html(views::create_form(
        &user,
        "New process",
        "/processes",
        &[("name", "Name")],
    )))
}

async fn create_process_form(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(req): Form<CreateProcessRequest>,
) -> Result<Response, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    state
        .db
        .call(move |db| Ok(ProcessRepository::create(db, &req.name)?))
        .await?;
    Ok(redirect("/processes"))
}

async fn new_line_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    require_admin(&user)?;
    Ok(Html(views::create_form(
        &user,
        "New line",
        &format!("/processes/{}/lines", id),
        &[("name", "Name")],
    )))
}

async fn create_line_form(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(req): Form<CreateLineRequest>,
) -> Result<Response, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    state.db.call(move |db| add_line(db, id, &req)).await?;
    Ok(redirect(&format!("/processes/{}/lines", id)))
}

// ── JSON handlers ─────────────────────────────────────────────────────

async fn andon_processes(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.user_id;
    let processes = state
        .db
        .call(move |db| AndonService::from_db(db).processes(user_id))
        .await?;
    Ok(Json(processes))
}

fn andon_settings(db: &FloorDb, user_id: i64) -> FloorResult<AndonSettings> {
    Ok(AndonSettings {
        config: db.andon_config()?,
        layouts: db.layouts(user_id)?,
    })
}

async fn get_andon_config(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.user_id;
    let settings = state
        .db
        .call(move |db| andon_settings(db, user_id))
        .await?;
    Ok(Json(settings))
}

async fn update_andon_config(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateAndonConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let user_id = user.user_id;
    let settings = state
        .db
        .call(move |db| {
            AndonService::from_db(db).update(&req, user_id)?;
            andon_settings(db, user_id)
        })
        .await?;
    Ok(Json(settings))
}

async fn list_workers(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let workers = state
        .db
        .call(|db| Ok(WorkerRepository::all(db)?))
        .await?;
    Ok(Json(workers))
}

async fn create_worker(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateWorkerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    let worker = state
        .db
        .call(move |db| Ok(WorkerRepository::create(db, &req.name, &req.identification_number)?))
        .await?;
    tracing::info!(worker_id = worker.worker_id, "Worker created");
    Ok((StatusCode::CREATED, Json(worker)))
}

async fn create_process(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateProcessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    let process = state
        .db
        .call(move |db| Ok(ProcessRepository::create(db, &req.name)?))
        .await?;
    tracing::info!(process_id = process.process_id, "Process created");
    Ok((StatusCode::CREATED, Json(process)))
}

async fn list_lines(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state
        .db
        .call(move |db| {
            ProcessRepository::find(db, id)?.ok_or_else(|| FloorError::not_found("process", id))?;
            Ok(db.for_process(id)?)
        })
        .await?;
    Ok(Json(lines))
}

/// Create a line at the requested order, or after the last existing line.
fn add_line(db: &FloorDb, process_id: i64, req: &CreateLineRequest) -> FloorResult<Line> {
    ProcessRepository::find(db, process_id)?
        .ok_or_else(|| FloorError::not_found("process", process_id))?;
    let order = match req.order {
        Some(order) => order,
        None => db
            .for_process(process_id)?
            .iter()
            .map(|l| l.order + 1)
            .max()
            .unwrap_or(0),
    };
    Ok(LineRepository::create(db, process_id, &req.name, order)?)
}

async fn create_line(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CreateLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    let line = state.db.call(move |db| add_line(db, id, &req)).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

async fn update_line_workers(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLineWorkerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state
        .db
        .call(move |db| {
            let process = ProcessRepository::find(db, id)?
                .ok_or_else(|| FloorError::not_found("process", id))?;
            let line_ids: Vec<i64> = db.for_process(id)?.iter().map(|l| l.line_id).collect();
            req.validate(&line_ids)?;
            SwitchService::from_db(db).update_line_worker(&req, &process)?;
            Ok(db.for_process(id)?)
        })
        .await?;
    Ok(Json(lines))
}

async fn start_production(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<StartProductionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    req.validate()?;
    let history = state
        .db
        .call(move |db| db.start_production(id, req.plan_count, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(history)))
}

async fn stop_production(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    let history = state
        .db
        .call(move |db| db.stop_production(id, Utc::now()))
        .await?;
    Ok(Json(history))
}

async fn create_sensor_event(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<SensorEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let event = state
        .db
        .call(move |db| db.record_sensor_event(id, &req.sensor_type, req.signal, Utc::now()))
        .await?;
    tracing::debug!(process_id = id, signal = event.signal.as_str(), "Sensor event recorded");
    Ok((StatusCode::CREATED, Json(event)))
}

async fn create_payload(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<PayloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let payload = state
        .db
        .call(move |db| db.record_payload(id, req.count, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

async fn set_defective(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<DefectiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let production_line = state
        .db
        .call(move |db| {
            if !db.set_defective(id, req.defective)? {
                return Err(FloorError::not_found("production line", id));
            }
            db.get_production_line(id)?
                .ok_or_else(|| FloorError::not_found("production line", id))
        })
        .await?;
    tracing::info!(production_line_id = id, defective = req.defective, "Production line flagged");
    Ok(Json(production_line))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::floor::db::tests::seed_floor;

    struct TestApp {
        router: Router,
        state: SharedState,
        admin_cookie: String,
        member_cookie: String,
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    fn cookie_for(state: &SharedState, user_id: i64) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        state
            .db
            .lock_sync()
            .unwrap()
            .create_session(&token, user_id, Utc::now() + chrono::Duration::hours(1))
            .unwrap();
        format!("{}={}", state.auth.cookie_name, token)
    }

    fn test_app() -> TestApp {
        let db = FloorDb::new_in_memory().unwrap();
        let admin = db
            .create_user("Ada", "ada@example.com", "unused", true)
            .unwrap();
        let member = db
            .create_user("Max", "max@example.com", "unused", false)
            .unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            auth: AuthSettings::default(),
        });
        let admin_cookie = cookie_for(&state, admin.user_id);
        let member_cookie = cookie_for(&state, member.user_id);
        TestApp {
            router: api_router(state.clone()).with_state(state.clone()),
            state,
            admin_cookie,
            member_cookie,
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn config_body() -> serde_json::Value {
        serde_json::json!({
            "row_count": 3, "column_count": 4, "auto_play": true, "auto_play_speed": 15,
            "item_column_count": 2, "is_show_part_number": true, "is_show_start": true,
            "is_show_good_rate": false, "is_show_plan_count": true,
            "is_show_achievement_rate": true
        })
    }

    // ── Routing and auth ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_health_check_is_public() {
        let app = test_app();
        let response = app.send(get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response.into_body()).await, "ok");
    }

    #[tokio::test]
    async fn test_root_redirects_to_home() {
        let app = test_app();
        let response = app.send(get("/", None)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/home");
    }

    #[tokio::test]
    async fn test_home_requires_login() {
        let app = test_app();
        let response = app.send(get("/home", None)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_date_requires_login() {
        let app = test_app();
        let response = app.send(get("/date", None)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_unknown_session_is_treated_as_logged_out() {
        let app = test_app();
        let response = app
            .send(get("/home", Some("andon_session=not-a-session")))
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_api_requires_login_with_401() {
        let app = test_app();
        let response = app.send(get("/api/workers", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("Authentication"));
    }

    #[tokio::test]
    async fn test_home_and_date_render_for_logged_in_user() {
        let app = test_app();
        let response = app.send(get("/home", Some(&app.member_cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response.into_body()).await.contains("class=\"board\""));

        let response = app.send(get("/date", Some(&app.member_cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(chrono::DateTime::parse_from_rfc3339(body["date"].as_str().unwrap()).is_ok());
    }

    /// Registers a user with a real argon2 hash and returns the login body.
    fn with_login(app: &TestApp) -> &'static str {
        let hash = auth::hash_password("correct horse").unwrap();
        app.state
            .db
            .lock_sync()
            .unwrap()
            .create_user("Lin", "lin@example.com", &hash, false)
            .unwrap();
        "email=lin%40example.com&password=correct+horse"
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_redirects_home() {
        let app = test_app();
        let form = with_login(&app);
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/home");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        let session = cookie.split(';').next().unwrap().to_string();
        assert!(session.starts_with("andon_session="));

        let response = app.send(get("/home", Some(&session))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let app = test_app();
        with_login(&app);
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=lin%40example.com&password=wrong"))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, &app.member_cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");

        let response = app.send(get("/home", Some(&app.member_cookie))).await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    // ── Admin gate ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_workers_page_shows_add_only_to_admin() {
        let app = test_app();
        let response = app.send(get("/workers", Some(&app.admin_cookie))).await;
        assert!(body_text(response.into_body()).await.contains("class=\"add\""));

        let response = app.send(get("/workers", Some(&app.member_cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!body_text(response.into_body()).await.contains("class=\"add\""));
    }

    #[tokio::test]
    async fn test_create_worker_requires_admin() {
        let app = test_app();
        let body = serde_json::json!({"name": "Cleo", "identification_number": "W-9"});

        let response = app
            .send(json("POST", "/api/workers", &app.member_cookie, body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send(json("POST", "/api/workers", &app.admin_cookie, body))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let worker: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(worker["name"], "Cleo");
    }

    #[tokio::test]
    async fn test_create_worker_form_redirects_to_list() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/workers")
            .header(header::COOKIE, &app.admin_cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=Cleo&identification_number=W-9"))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/workers");

        let response = app.send(get("/workers", Some(&app.member_cookie))).await;
        assert!(body_text(response.into_body()).await.contains("<td>Cleo</td>"));
    }

    // ── Andon config ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_update_andon_config() {
        let app = test_app();
        let process_id = {
            let db = app.state.db.lock_sync().unwrap();
            ProcessRepository::create(&*db, "Press").unwrap().process_id
        };
        let mut body = config_body();
        body["layouts"] = serde_json::json!([
            {"process_id": process_id, "is_display": false, "order": 3}
        ]);

        let response = app
            .send(json("PUT", "/api/andon/config", &app.member_cookie, body))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let settings: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(settings["config"]["row_count"], 3);
        assert_eq!(settings["config"]["column_count"], 4);
        assert_eq!(settings["layouts"][0]["order"], 3);
        assert_eq!(settings["layouts"][0]["is_display"], false);
    }

    #[tokio::test]
    async fn test_update_andon_config_rejects_invalid() {
        let app = test_app();
        let mut body = config_body();
        body["row_count"] = serde_json::json!(0);
        let response = app
            .send(json("PUT", "/api/andon/config", &app.member_cookie, body))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_update_andon_config_unknown_process_is_404() {
        let app = test_app();
        let mut body = config_body();
        body["layouts"] = serde_json::json!([{"process_id": 404, "is_display": true, "order": 0}]);
        let response = app
            .send(json("PUT", "/api/andon/config", &app.member_cookie, body))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.send(get("/api/andon/config", Some(&app.member_cookie))).await;
        let settings: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(settings["config"]["row_count"], 2);
    }

    // ── Floor operations ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_production_run_and_line_worker_switch() {
        let app = test_app();
        let floor = {
            let db = app.state.db.lock_sync().unwrap();
            seed_floor(&db).unwrap()
        };
        let pid = floor.process.process_id;

        let response = app
            .send(json(
                "POST",
                &format!("/api/processes/{}/production/start", pid),
                &app.admin_cookie,
                serde_json::json!({"plan_count": 40}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let history: serde_json::Value = body_json(response.into_body()).await;
        let indicator = history["indicator_line_id"].as_i64().unwrap();

        let response = app
            .send(json(
                "PUT",
                &format!("/api/processes/{}/line-workers", pid),
                &app.member_cookie,
                serde_json::json!({"lines": [
                    {"line_id": floor.lines[0].line_id, "worker_id": floor.workers[1].worker_id},
                    {"line_id": floor.lines[1].line_id, "worker_id": null}
                ]}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let lines: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert_eq!(lines[0]["worker_id"], floor.workers[1].worker_id);
        assert!(lines[1]["worker_id"].is_null());

        let response = app
            .send(json(
                "POST",
                &format!("/api/production-lines/{}/payloads", indicator),
                &app.member_cookie,
                serde_json::json!({"count": 10}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .send(get("/api/andon/processes", Some(&app.member_cookie)))
            .await;
        let processes: Vec<serde_json::Value> = body_json(response.into_body()).await;
        let payloads = &processes[0]["production_history"]["indicator_line"]["payloads"];
        assert_eq!(payloads[0]["count"], 10);
    }

    #[tokio::test]
    async fn test_line_workers_rejects_foreign_line() {
        let app = test_app();
        let floor = {
            let db = app.state.db.lock_sync().unwrap();
            seed_floor(&db).unwrap()
        };
        let response = app
            .send(json(
                "PUT",
                &format!("/api/processes/{}/line-workers", floor.process.process_id),
                &app.member_cookie,
                serde_json::json!({"lines": [{"line_id": 9999, "worker_id": null}]}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_line_workers_unknown_process_is_404() {
        let app = test_app();
        let response = app
            .send(json(
                "PUT",
                "/api/processes/77/line-workers",
                &app.member_cookie,
                serde_json::json!({"lines": [{"line_id": 1}]}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_production_requires_admin() {
        let app = test_app();
        let floor = {
            let db = app.state.db.lock_sync().unwrap();
            seed_floor(&db).unwrap()
        };
        let response = app
            .send(json(
                "POST",
                &format!("/api/processes/{}/production/start", floor.process.process_id),
                &app.member_cookie,
                serde_json::json!({"plan_count": 40}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_sensor_event_and_defective_flag() {
        let app = test_app();
        let floor = {
            let db = app.state.db.lock_sync().unwrap();
            seed_floor(&db).unwrap()
        };
        let pid = floor.process.process_id;

        let response = app
            .send(json(
                "POST",
                &format!("/api/processes/{}/sensor-events", pid),
                &app.member_cookie,
                serde_json::json!({"sensor_type": "light", "signal": "call"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let event: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(event["signal"], "call");

        let response = app
            .send(json(
                "PATCH",
                "/api/production-lines/12345",
                &app.member_cookie,
                serde_json::json!({"defective": true}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_line_appends_after_last() {
        let app = test_app();
        let floor = {
            let db = app.state.db.lock_sync().unwrap();
            seed_floor(&db).unwrap()
        };
        let response = app
            .send(json(
                "POST",
                &format!("/api/processes/{}/lines", floor.process.process_id),
                &app.admin_cookie,
                serde_json::json!({"name": "Line C"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let line: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(line["order"], 2);
    }
}
