// src/test_support.rs
// =============================================================================
// A scripted HTTP server for tests, built on an axum router.
//
// Each route maps a request target to a canned response. The server counts
// every request it receives so tests can assert how many network calls a
// piece of code made. Nothing here touches the real network.
// =============================================================================

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::checker::{client_builder, CheckSettings, HttpChecker};

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    delay: Option<Duration>,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: None,
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status).header("Location", location)
    }

    pub fn json(body: &str) -> Self {
        let mut response = Self::status(200).header("Content-Type", "application/json");
        response.body = body.to_string();
        response
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = Response::builder().status(status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

struct Script {
    routes: Vec<(String, MockResponse)>,
    requests: Mutex<Vec<String>>,
}

impl Script {
    // Routes starting with '/' match the request path exactly. Other patterns
    // match when they occur anywhere in the target (useful for query
    // parameters).
    fn find(&self, target: &str) -> Option<MockResponse> {
        let path = target.split('?').next().unwrap_or(target);
        self.routes
            .iter()
            .find(|(pattern, _)| pattern == path)
            .or_else(|| {
                self.routes
                    .iter()
                    .find(|(pattern, _)| !pattern.starts_with('/') && target.contains(pattern.as_str()))
            })
            .map(|(_, response)| response.clone())
    }
}

pub struct MockServer {
    addr: SocketAddr,
    script: Arc<Script>,
    handle: JoinHandle<()>,
}

impl MockServer {
    // Unmatched requests get a 404.
    pub async fn start(routes: Vec<(&str, MockResponse)>) -> Self {
        let script = Arc::new(Script {
            routes: routes
                .into_iter()
                .map(|(pattern, response)| (pattern.to_string(), response))
                .collect(),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(respond).with_state(script.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            script,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.script.requests.lock().unwrap().len()
    }

    pub fn hits_for(&self, pattern: &str) -> usize {
        self.script
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|target| target.contains(pattern))
            .count()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(State(script): State<Arc<Script>>, uri: Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    script.requests.lock().unwrap().push(target.clone());

    let response = script.find(&target).unwrap_or_else(|| MockResponse::status(404));
    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }
    response.into_response()
}

// A checker whose client ignores proxy environment variables, so requests to
// 127.0.0.1 always reach the mock server
pub fn test_checker(settings: CheckSettings) -> HttpChecker {
    let client = client_builder(&settings).no_proxy().build().unwrap();
    HttpChecker::with_client(client, settings)
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

// A URL on 127.0.0.1 where nothing is listening
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}
