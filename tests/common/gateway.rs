//! A scripted HTTP server standing in for RADOS Gateway.
//!
//! Routes are matched in mount order; the first match answers. Unmatched
//! requests get an empty 404. Every request is recorded.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use tokio::net::TcpListener;

/// A request as the gateway received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw path, still percent-encoded.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Lowercased names.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_query(&self, name: &str) -> bool {
        self.query.iter().any(|(n, _)| n == name)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A request matcher and its scripted reply.
#[derive(Debug, Clone)]
pub struct Route {
    method: String,
    path: Option<String>,
    query: Vec<(String, Option<String>)>,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    json_body: Option<Value>,
    status: u16,
    reply_headers: Vec<(String, String)>,
    reply_body: Vec<u8>,
}

impl Route {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            path: None,
            query: vec![],
            headers: vec![],
            body: None,
            json_body: None,
            status: 200,
            reply_headers: vec![],
            reply_body: vec![],
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The query must carry `name`, with any value.
    pub fn query(mut self, name: &str) -> Self {
        self.query.push((name.to_string(), None));
        self
    }

    pub fn query_value(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), Some(value.to_string())));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The body must parse to `value`, regardless of key order.
    pub fn json_body(mut self, value: Value) -> Self {
        self.json_body = Some(value);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn reply_header(mut self, name: &str, value: &str) -> Self {
        self.reply_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn reply(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.reply_body = body.into();
        self
    }

    pub fn reply_json(self, value: Value) -> Self {
        self.reply_header("content-type", "application/json")
            .reply(value.to_string())
    }

    fn matches(&self, request: &RecordedRequest) -> bool {
        if self.method != request.method {
            return false;
        }
        if self.path.as_ref().is_some_and(|p| *p != request.path) {
            return false;
        }
        let query_matches = self.query.iter().all(|(name, value)| match value {
            Some(value) => request.query_value(name) == Some(value.as_str()),
            None => request.has_query(name),
        });
        if !query_matches {
            return false;
        }
        let headers_match = self
            .headers
            .iter()
            .all(|(name, value)| request.header(name).as_deref() == Some(value.as_str()));
        if !headers_match {
            return false;
        }
        if self.body.as_ref().is_some_and(|b| *b != request.body) {
            return false;
        }
        if let Some(expected) = &self.json_body {
            if serde_json::from_slice::<Value>(&request.body).ok().as_ref() != Some(expected) {
                return false;
            }
        }
        true
    }

    fn response(&self) -> Response {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.reply_headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(self.reply_body.clone()))
            .unwrap()
    }
}

#[derive(Default)]
struct GatewayState {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct FakeGateway {
    addr: SocketAddr,
    state: Arc<GatewayState>,
}

impl FakeGateway {
    pub async fn start() -> Self {
        let state = Arc::new(GatewayState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn mount(&self, route: Route) {
        self.state.routes.lock().unwrap().push(route);
    }

    /// Every received request, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

async fn handle(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default(),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };

    let response = state
        .routes
        .lock()
        .unwrap()
        .iter()
        .find(|route| route.matches(&recorded))
        .map(Route::response);
    state.requests.lock().unwrap().push(recorded);

    response.unwrap_or_else(|| {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap()
    })
}
