use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use sms_core::ApiResponse;
use sms_web_generic::{ListParams, MessageProcessor, ResponseConverter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub processor: MessageProcessor,
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = Response;

    fn from_api_response(response: ApiResponse) -> Self::ResponseType {
        let status = StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, response.content_type)],
            response.body,
        )
            .into_response()
    }
}

/// Build the public API router: liveness, diagnostics, schema and messages.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/hello", get(hello))
        .route("/test", get(diagnostics))
        .route("/schema", get(schema))
        .route("/api/messages", get(list_messages).post(create_message))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open policy: any origin, method and header.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Response {
    AxumResponseConverter::from_api_response(state.processor.root())
}

/// GET /api/hello
pub async fn hello(State(state): State<AppState>) -> Response {
    AxumResponseConverter::from_api_response(state.processor.hello())
}

/// GET /test
pub async fn diagnostics(State(state): State<AppState>) -> Response {
    AxumResponseConverter::from_api_response(state.processor.diagnostics().await)
}

/// GET /schema
pub async fn schema(State(state): State<AppState>) -> Response {
    AxumResponseConverter::from_api_response(state.processor.schema())
}

/// POST /api/messages
pub async fn create_message(State(state): State<AppState>, body: Bytes) -> Response {
    AxumResponseConverter::from_api_response(state.processor.create_message(&body).await)
}

/// GET /api/messages?limit=N
pub async fn list_messages(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let response = match params {
        Ok(Query(params)) => state.processor.list_messages(params).await,
        Err(rejection) => state.processor.invalid_query(&rejection.body_text()),
    };
    AxumResponseConverter::from_api_response(response)
}
