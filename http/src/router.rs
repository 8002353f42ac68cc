use crate::error::AppError;
use axum::{
    extract::State,
    http::header,
    response::{
        Html,
        IntoResponse,
        Response,
    },
    routing::get,
    Router,
};
use prometheus::{
    Encoder,
    Registry,
    TextEncoder,
};

const LANDING_PAGE: &str = r#"<html>
<head><title>Swift Health Exporter</title></head>
<body>
<h1>Swift Health Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="https://github.com/sapcc/swift-health-exporter">Source Code</a></p>
</body>
</html>"#;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

pub fn create_router(registry: Registry) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/", get(landing_page))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serves whatever the scraper cached last, gathering never runs a command.
async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&state.registry.gather(), &mut buffer)?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response())
}
