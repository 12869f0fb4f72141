//! `POST /analyze` over HTTP.
//!
//! `tiny_http` accepts connections on a blocking thread; every request is
//! handed to the tokio runtime and runs the shared [`Pipeline`] with a child
//! of the server's cancellation token.

use crate::error::{CheckerError, Result};
use crate::pipeline::Pipeline;
use crate::types::summary::AnalysisReport;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

const ANALYZE_PATH: &str = "/analyze";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    #[serde(default)]
    repo_url: Option<String>,
}

/// Status code and JSON body for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    fn failure(err: &CheckerError) -> Self {
        Self {
            status: 500,
            body: json!({ "error": err.to_string(), "category": err.category() }),
        }
    }
}

pub struct ApiServer {
    server: Server,
}

impl ApiServer {
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| CheckerError::Serve(format!("cannot bind {addr}: {e}")))?;
        Ok(Self { server })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn run(self, pipeline: Arc<Pipeline>, shutdown: CancellationToken) -> Result<()> {
        if let Some(addr) = self.local_addr() {
            tracing::info!(%addr, "listening");
        }
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || self.accept_loop(&pipeline, &shutdown, &handle))
            .await
            .map_err(|e| CheckerError::Io(std::io::Error::other(e)))?
    }

    fn accept_loop(
        &self,
        pipeline: &Arc<Pipeline>,
        shutdown: &CancellationToken,
        handle: &Handle,
    ) -> Result<()> {
        while !shutdown.is_cancelled() {
            let Some(mut request) = self.server.recv_timeout(POLL_INTERVAL)? else {
                continue;
            };

            let method = request.method().clone();
            let path = request.url().to_string();
            let mut body = Vec::new();
            if let Err(err) = request
                .as_reader()
                .take(MAX_BODY_BYTES)
                .read_to_end(&mut body)
            {
                tracing::warn!(error = %err, "cannot read request body");
                respond(request, ApiResponse::error(400, "request body is unreadable"));
                continue;
            }

            let pipeline = Arc::clone(pipeline);
            let cancel = shutdown.child_token();
            handle.spawn(async move {
                let reply = route(&pipeline, &method, &path, &body, &cancel).await;
                tracing::info!(%method, path, status = reply.status, "request handled");
                if let Err(err) = tokio::task::spawn_blocking(move || respond(request, reply)).await
                {
                    tracing::warn!(error = %err, "response task failed");
                }
            });
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

/// Dispatches one request. Query strings are ignored.
pub async fn route(
    pipeline: &Pipeline,
    method: &Method,
    path: &str,
    body: &[u8],
    cancel: &CancellationToken,
) -> ApiResponse {
    let path = path.split('?').next().unwrap_or(path);
    if path != ANALYZE_PATH {
        return ApiResponse::error(404, "not found");
    }
    if *method != Method::Post {
        return ApiResponse::error(405, "method not allowed");
    }
    analyze(pipeline, body, cancel).await
}

async fn analyze(pipeline: &Pipeline, body: &[u8], cancel: &CancellationToken) -> ApiResponse {
    let repo_url = serde_json::from_slice::<AnalyzeRequest>(body)
        .ok()
        .and_then(|request| request.repo_url)
        .filter(|url| !url.trim().is_empty());
    let Some(repo_url) = repo_url else {
        return ApiResponse::error(400, "repoUrl is required");
    };

    match pipeline.run(&repo_url, cancel).await {
        Ok(summary) => match serde_json::to_value(AnalysisReport::from(&summary)) {
            Ok(body) => ApiResponse { status: 200, body },
            Err(err) => ApiResponse::failure(&CheckerError::Json(err)),
        },
        Err(err) => {
            tracing::warn!(repo_url, category = err.category(), error = %err, "analysis failed");
            ApiResponse::failure(&err)
        }
    }
}

fn respond(request: Request, reply: ApiResponse) {
    let mut response =
        Response::from_string(reply.body.to_string()).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        tracing::warn!(error = %err, "cannot write response");
    }
}
