pub mod auth;
pub mod error;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::core::{GoalConfig, GoalPatch, Outlook, build_outlook};

use self::auth::{AuthUser, SessionVerifier, StaticSessions};
use self::error::ApiError;
use self::store::{CheckIn, MemoryStore, Month};

pub struct AppState {
    pub store: MemoryStore,
    pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
    pub fn new(store: MemoryStore, sessions: Arc<dyn SessionVerifier>) -> Self {
        Self { store, sessions }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub frontend_origin: HeaderValue,
    pub sessions: StaticSessions,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectionQuery {
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CheckInPayload {
    corpus_value: Option<f64>,
    month: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct GoalResponse {
    success: bool,
    goal: GoalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckInResponse {
    success: bool,
    check_in: CheckIn,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckInHistoryResponse {
    success: bool,
    check_ins: Vec<CheckIn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    success: bool,
    latest_check_in: Option<CheckIn>,
    #[serde(flatten)]
    outlook: Outlook,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route("/api/goal/save", post(goal_save_handler))
        .route("/api/goal/load", get(goal_load_handler))
        .route("/api/checkin/save", post(check_in_save_handler))
        .route("/api/checkin/latest", get(check_in_latest_handler))
        .route("/api/checkin/history", get(check_in_history_handler))
        .route("/api/progress", get(progress_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    if config.sessions.is_empty() {
        warn!("no sessions configured; authenticated routes will reject every request");
    }

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.clone())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    let state = Arc::new(AppState::new(
        MemoryStore::new(),
        Arc::new(config.sessions.clone()),
    ));
    let app = router(state).layer(cors);

    let listener = TcpListener::bind(config.addr).await?;
    info!(
        sessions = config.sessions.len(),
        "VANTAGE API listening on http://{}", config.addr
    );

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("Not found")
}

async fn projection_get_handler(
    query: Result<Query<ProjectionQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let goal = goal_from_query(query.q.as_deref());
    projection_response(&goal)
}

async fn projection_post_handler(
    payload: Result<Json<GoalPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(patch) = payload?;
    projection_response(&patch.apply_to(GoalConfig::default()))
}

fn projection_response(goal: &GoalConfig) -> Result<Response, ApiError> {
    let outlook = build_outlook(goal, goal.initial_corpus, current_year())?;
    Ok(json_response(StatusCode::OK, outlook))
}

/// Partial goal JSON merged over the defaults; unparseable input falls back to the defaults.
fn goal_from_query(raw: Option<&str>) -> GoalConfig {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return GoalConfig::default();
    };
    match serde_json::from_str::<GoalPatch>(raw) {
        Ok(patch) => patch.apply_to(GoalConfig::default()),
        Err(e) => {
            warn!("ignoring unparseable goal query: {e}");
            GoalConfig::default()
        }
    }
}

async fn goal_save_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<GoalPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    info!(user = %user_id, "goal save requested");
    let Json(patch) = payload?;
    let Some(goal) = patch.into_complete() else {
        warn!(user = %user_id, "goal save missing required fields");
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };
    goal.validate()?;

    let goal = state.store.save_goal(&user_id, goal);
    info!(user = %user_id, "goal saved");
    Ok(json_response(
        StatusCode::OK,
        GoalResponse {
            success: true,
            goal,
        },
    ))
}

async fn goal_load_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let Some(goal) = state.store.load_goal(&user_id) else {
        info!(user = %user_id, "no goal found");
        return Err(ApiError::NotFound("No goal found"));
    };
    info!(user = %user_id, "goal loaded");
    Ok(json_response(
        StatusCode::OK,
        GoalResponse {
            success: true,
            goal,
        },
    ))
}

async fn check_in_save_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CheckInPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let month = payload.month.filter(|month| !month.is_empty());
    let (Some(corpus_value), Some(month)) = (payload.corpus_value, month) else {
        return Err(ApiError::BadRequest(
            "Missing required fields: corpusValue and month".to_string(),
        ));
    };
    let month: Month = month.parse()?;
    if corpus_value < 0.0 {
        return Err(ApiError::BadRequest("corpusValue must be >= 0".to_string()));
    }

    let check_in = state.store.save_check_in(&user_id, month, corpus_value);
    info!(user = %user_id, month = %check_in.month, "check-in saved");
    Ok(json_response(
        StatusCode::OK,
        CheckInResponse {
            success: true,
            check_in,
        },
    ))
}

async fn check_in_latest_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let check_in = state
        .store
        .latest_check_in(&user_id)
        .ok_or(ApiError::NotFound("No check-in found"))?;
    Ok(json_response(
        StatusCode::OK,
        CheckInResponse {
            success: true,
            check_in,
        },
    ))
}

async fn check_in_history_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Response {
    let check_ins = state.store.check_in_history(&user_id);
    info!(user = %user_id, count = check_ins.len(), "check-in history loaded");
    json_response(
        StatusCode::OK,
        CheckInHistoryResponse {
            success: true,
            check_ins,
        },
    )
}

/// Projects the saved goal from the latest observed corpus, or from the
/// goal's initial corpus when the user has not checked in yet.
async fn progress_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, ApiError> {
    let mut goal = state
        .store
        .load_goal(&user_id)
        .ok_or(ApiError::NotFound("No goal found"))?;
    let latest_check_in = state.store.latest_check_in(&user_id);
    if let Some(check_in) = &latest_check_in {
        goal.initial_corpus = check_in.corpus_value;
    }

    let outlook = build_outlook(&goal, goal.initial_corpus, current_year())?;
    Ok(json_response(
        StatusCode::OK,
        ProgressResponse {
            success: true,
            latest_check_in,
            outlook,
        },
    ))
}

fn current_year() -> i32 {
    Utc::now().year()
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";

    fn test_app() -> Router {
        let sessions = StaticSessions::new()
            .with_session(ALICE, "alice")
            .with_session(BOB, "bob");
        router(Arc::new(AppState::new(MemoryStore::new(), Arc::new(sessions))))
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).expect("valid request")
    }

    fn post_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("readable body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn full_goal() -> Value {
        json!({
            "targetMultiple": 25,
            "initialCorpus": 250,
            "emergencyCorpus": 40,
            "annualIncome": 150,
            "annualExpense": 60,
            "allocation": {"highRisk": 32, "safe": 68},
            "rates": {"emergency": 1, "highRisk": 10, "safe": 6}
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(&test_app(), get_request("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let (status, body) = send(&test_app(), get_request("/api/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn projection_without_query_uses_default_goal() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(get_request("/api/projection", None))
            .await
            .expect("infallible");
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );

        let (status, body) = send(&app, get_request("/api/projection", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["targetNumber"], 1500.0);
        assert_eq!(body["monthlyContribution"], 7.5);
        assert_eq!(body["yearsToFire"], 9.0);
        let data = body["data"].as_array().expect("data array");
        assert_eq!(data.len(), 10);
        assert_eq!(data[0]["year"], 0);
        assert_eq!(data[0]["emergency"], 40.0);
        assert!(data[0]["highRisk"].is_number());
        assert!(data[0]["safe"].is_number());
    }

    #[tokio::test]
    async fn projection_query_merges_partial_goal() {
        // q = {"targetMultiple":30,"rates":{"safe":7}}
        let uri = "/api/projection?q=%7B%22targetMultiple%22%3A30%2C%22rates%22%3A%7B%22safe%22%3A7%7D%7D";
        let (status, body) = send(&test_app(), get_request(uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["targetNumber"], 1800.0);
        assert_eq!(body["progress"]["current"], 250.0);
    }

    #[tokio::test]
    async fn projection_query_with_invalid_json_falls_back_to_defaults() {
        let (status, body) = send(
            &test_app(),
            get_request("/api/projection?q=invalid-json", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["targetNumber"], 1500.0);
    }

    #[tokio::test]
    async fn projection_malformed_query_string_returns_json_error() {
        let (status, body) = send(
            &test_app(),
            get_request("/api/projection?q=%7B%7D&q=%7B%7D", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().expect("error message");
        assert!(error.starts_with("Invalid query string"), "{error}");
    }

    #[tokio::test]
    async fn projection_post_rejects_invalid_allocation() {
        let payload = json!({"allocation": {"highRisk": 70, "safe": 70}});
        let (status, body) =
            send(&test_app(), post_request("/api/projection", None, payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("sum to 100"), "{message}");
    }

    #[tokio::test]
    async fn projection_post_reports_unreachable_as_null() {
        let payload = json!({
            "initialCorpus": 100,
            "emergencyCorpus": 0,
            "annualIncome": 60,
            "annualExpense": 60,
            "rates": {"emergency": 0, "highRisk": 0, "safe": 0}
        });
        let (status, body) =
            send(&test_app(), post_request("/api/projection", None, payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["yearsToFire"].is_null());
        assert!(body["fireYear"].is_null());
        assert_eq!(body["data"].as_array().map(Vec::len), Some(101));
    }

    #[tokio::test]
    async fn goal_routes_require_authentication() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/api/goal/load", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        let (status, body) = send(&app, get_request("/api/goal/load", Some("forged"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired session");
    }

    #[tokio::test]
    async fn goal_save_then_load_round_trips_per_user() {
        let app = test_app();
        let (status, _) = send(&app, get_request("/api/goal/load", Some(ALICE))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, post_request("/api/goal/save", Some(ALICE), full_goal())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let cookie_request = Request::builder()
            .uri("/api/goal/load")
            .header(header::COOKIE, format!("{}={ALICE}", auth::SESSION_COOKIE))
            .body(Body::empty())
            .expect("valid request");
        let (status, body) = send(&app, cookie_request).await;
        assert_eq!(status, StatusCode::OK);
        let loaded: GoalConfig = serde_json::from_value(body["goal"].clone()).expect("goal");
        assert_eq!(loaded, GoalConfig::default());

        let (status, body) = send(&app, get_request("/api/goal/load", Some(BOB))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No goal found");
    }

    #[tokio::test]
    async fn goal_save_requires_every_field() {
        let mut goal = full_goal();
        goal.as_object_mut().expect("object").remove("rates");
        let (status, body) =
            send(&test_app(), post_request("/api/goal/save", Some(ALICE), goal)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn goal_save_rejects_malformed_json() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/goal/save")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
            .body(Body::from("{not json"))
            .expect("valid request");
        let (status, body) = send(&test_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn check_in_save_validates_payload() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post_request("/api/checkin/save", Some(ALICE), json!({"corpusValue": 255})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: corpusValue and month");

        let (status, body) = send(
            &app,
            post_request(
                "/api/checkin/save",
                Some(ALICE),
                json!({"corpusValue": 255, "month": "2025/01"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid month format. Expected YYYY-MM");
    }

    #[tokio::test]
    async fn check_ins_upsert_and_list_newest_first() {
        let app = test_app();
        let (status, _) = send(&app, get_request("/api/checkin/latest", Some(ALICE))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for (month, value) in [("2025-01", 250.0), ("2025-03", 270.0), ("2025-01", 255.0)] {
            let (status, body) = send(
                &app,
                post_request(
                    "/api/checkin/save",
                    Some(ALICE),
                    json!({"corpusValue": value, "month": month}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["checkIn"]["month"], month);
            assert_eq!(body["checkIn"]["userId"], "alice");
        }

        let (status, body) = send(&app, get_request("/api/checkin/latest", Some(ALICE))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkIn"]["month"], "2025-03");
        assert_eq!(body["checkIn"]["corpusValue"], 270.0);

        let (status, body) = send(&app, get_request("/api/checkin/history", Some(ALICE))).await;
        assert_eq!(status, StatusCode::OK);
        let history = body["checkIns"].as_array().expect("history array");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["month"], "2025-03");
        assert_eq!(history[1]["month"], "2025-01");
        assert_eq!(history[1]["corpusValue"], 255.0);

        let (status, body) = send(&app, get_request("/api/checkin/history", Some(BOB))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkIns"], json!([]));
    }

    #[tokio::test]
    async fn progress_uses_latest_check_in_as_current_corpus() {
        let app = test_app();
        let (status, _) = send(&app, get_request("/api/progress", Some(ALICE))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, post_request("/api/goal/save", Some(ALICE), full_goal())).await;
        let (status, body) = send(&app, get_request("/api/progress", Some(ALICE))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["latestCheckIn"].is_null());
        assert_eq!(body["progress"]["current"], 250.0);

        send(
            &app,
            post_request(
                "/api/checkin/save",
                Some(ALICE),
                json!({"corpusValue": 2000, "month": "2026-10"}),
            ),
        )
        .await;
        let (status, body) = send(&app, get_request("/api/progress", Some(ALICE))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["latestCheckIn"]["month"], "2026-10");
        assert_eq!(body["progress"]["current"], 2000.0);
        assert_eq!(body["progress"]["percentage"], 100.0);
        assert_eq!(body["yearsToFire"], 0.0);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn goal_from_query_handles_blank_and_partial_input() {
        assert_eq!(goal_from_query(None), GoalConfig::default());
        assert_eq!(goal_from_query(Some("  ")), GoalConfig::default());

        let goal = goal_from_query(Some(r#"{"initialCorpus": 300, "rates": {"emergency": 2}}"#));
        assert_eq!(goal.initial_corpus, 300.0);
        assert_eq!(goal.rates.get("emergency"), Some(&2.0));
        assert_eq!(goal.annual_income, GoalConfig::default().annual_income);
    }
}
