use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::dispatch::Dispatcher;
use crate::jsonp;
use crate::normalizer::{ExecutionFailure, ResponseBody};
use crate::types::{ExecOptions, ExecutionRequest, Language, Transport};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const JAVASCRIPT_CONTENT_TYPE: &str = "text/javascript; charset=utf-8";

/// What an endpoint name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub language: Language,
    pub transport: Transport,
}

/// Endpoint name (without the leading slash) to route.
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// `exec_<stem>` and `exec_<stem>_jsonp` for every language.
    pub fn standard() -> Self {
        let mut routes = HashMap::new();
        for language in Language::ALL {
            let stem = language.path_stem();
            routes.insert(
                format!("exec_{stem}"),
                Route {
                    language,
                    transport: Transport::Plain,
                },
            );
            routes.insert(
                format!("exec_{stem}_jsonp"),
                Route {
                    language,
                    transport: Transport::Callback,
                },
            );
        }
        Self { routes }
    }

    pub fn resolve(&self, endpoint: &str) -> Option<Route> {
        self.routes.get(endpoint).copied()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            routes: Arc::new(RouteTable::standard()),
        }
    }
}

/// Recognised query parameters. Unknown keys are ignored.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecQuery {
    pub user_script: Option<String>,
    pub options_json: Option<String>,
    pub callback: Option<String>,
}

impl ExecQuery {
    /// The first occurrence of a repeated key wins.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "user_script" => &mut query.user_script,
                "options_json" => &mut query.options_json,
                "callback" => &mut query.callback,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/{endpoint}", get(exec))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn exec(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let Some(route) = state.routes.resolve(&endpoint) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let query = match pairs {
        Ok(Query(pairs)) => ExecQuery::from_pairs(pairs),
        Err(e) => {
            warn!(%endpoint, error = %e, "unreadable query string");
            ExecQuery::default()
        }
    };

    let Some(code) = query.user_script else {
        warn!(%endpoint, "request without user_script");
        let body = ResponseBody::Envelope(ExecutionFailure::MissingParameter.envelope(state.dispatcher.timeout()));
        return render(&body, route.transport, query.callback.as_deref());
    };

    let options = match query.options_json.as_deref() {
        Some(raw) => ExecOptions::from_json(raw).unwrap_or_else(|e| {
            warn!(%endpoint, error = %e, "ignoring malformed options_json");
            ExecOptions::default()
        }),
        None => ExecOptions::default(),
    };

    let request = ExecutionRequest {
        language: route.language,
        code,
        options,
        transport: route.transport,
    };
    let body = state.dispatcher.execute(&request).await;
    render(&body, route.transport, query.callback.as_deref())
}

/// Always 200 unless the body cannot be serialized.
fn render(body: &ResponseBody, transport: Transport, callback: Option<&str>) -> Response {
    let bytes = match body.to_json_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let callback = match transport {
        Transport::Callback => callback.map(jsonp::sanitize_callback).filter(|cb| !cb.is_empty()),
        Transport::Plain => None,
    };

    match callback {
        Some(cb) => {
            let wrapped = jsonp::wrap(&cb, &String::from_utf8_lossy(&bytes));
            let mut response = (StatusCode::OK, [(header::CONTENT_TYPE, JAVASCRIPT_CONTENT_TYPE)], wrapped).into_response();
            response
                .headers_mut()
                .insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            response
        }
        None => (StatusCode::OK, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], bytes).into_response(),
    }
}
