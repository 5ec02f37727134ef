use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::*;
use serde_json::{json, Value};

use crate::{
    commands::{list_tools, ToolArgs, Toolbox},
    NearMeError,
};

const ROUTES: [&str; 4] = ["/", "/tools", "/call/:tool_name", "/debug"];

pub fn router(toolbox: Arc<Toolbox>) -> Router {
    Router::new()
        .route(ROUTES[0], get(root))
        .route(ROUTES[1], get(tools))
        .route(ROUTES[2], get(call_tool))
        .route(ROUTES[3], get(debug))
        .with_state(toolbox)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Near-Me MCP Server is running" }))
}

async fn tools() -> Json<Value> {
    Json(json!({ "tools": list_tools() }))
}

async fn call_tool(
    State(toolbox): State<Arc<Toolbox>>,
    Path(tool_name): Path<String>,
    args: Result<Query<ToolArgs>, QueryRejection>,
) -> Result<Json<Value>, NearMeError> {
    let Query(args) =
        args.map_err(|rejection| NearMeError::InvalidArgument(rejection.body_text()))?;
    toolbox.call(&tool_name, args).await.map(Json)
}

async fn debug() -> Json<Value> {
    Json(json!({ "tools": list_tools(), "routes": ROUTES }))
}

impl IntoResponse for NearMeError {
    fn into_response(self) -> Response {
        let status = match &self {
            _ if self.is_backend_failure() => StatusCode::BAD_GATEWAY,
            NearMeError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            NearMeError::InvalidBearerToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            error!("{self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
