use axum::{
    extract::State,
    http::Method,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/", get(health))
        // The webhook route sits outside the auth stack; the processor
        // authenticates with its signature, not a bearer token.
        .route("/api/order/webhook", post(webhooks::handle_payment_webhook))
        .merge(orders::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "message": "Server is running", "error": false, "success": true }))
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, impl IntoResponse> {
    // The service runs behind a reverse proxy, so the client address comes
    // from X-Forwarded-For rather than the socket.
    let ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("local")
        .trim()
        .to_string();
    let key = format!("ratelimit:{}", ip);

    match state
        .redis
        .check_rate_limit(&key, state.rate_limit_per_minute, 60)
        .await
    {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err((
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded",
        )),
        Err(_) => Ok(next.run(req).await), // Fail open
    }
}
