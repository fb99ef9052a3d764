//! HTTP front end for the crawl service.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::CrawlService;
use crate::error::{CrawlError, ServerError};

/// Greeting returned by `GET /`.
pub const GREETING: &str = "Hello, this is the crawler API!";

const REQUEST_ID: &str = "x-request-id";

/// A bound HTTP listener serving one [`CrawlService`].
pub struct Server {
    service: Arc<CrawlService>,
    listener: TcpListener,
}

impl Server {
    /// Binds `addr`; port 0 picks a free port.
    pub async fn bind(addr: &str, service: Arc<CrawlService>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { service, listener })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(ServerError::AcceptFailed)
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(addr = ?self.listener.local_addr().ok(), "Starting crawl service");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted.map_err(ServerError::AcceptFailed)?,
                _ = &mut shutdown => {
                    info!("Crawl service shutting down");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let service = self.service.clone();

            tokio::spawn(async move {
                let handler = service_fn(move |req: Request<Incoming>| {
                    let service = service.clone();
                    async move { Ok::<_, Infallible>(route(&service, req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                    error!(peer = %peer, error = %e, "Error serving connection");
                }
            });
        }
    }
}

/// Dispatches one request. The body is never read; parameters come from the query.
pub async fn route<B>(service: &CrawlService, req: Request<B>) -> Response<Full<Bytes>> {
    let request_id = req
        .headers()
        .get(REQUEST_ID)
        .cloned()
        .unwrap_or_else(new_request_id);

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    debug!(method = %method, path = %path, "Request received");

    let mut response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => empty(StatusCode::NO_CONTENT),
        (&Method::GET, "/") => json_response(StatusCode::OK, &json!({ "message": GREETING })),
        (&Method::GET, "/metrics") => match service.metrics().gather() {
            Ok(text) => text_response(StatusCode::OK, text),
            Err(e) => detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        (&Method::GET | &Method::POST, "/api/crawl") => match query_param(query.as_deref(), "url") {
            Some(url) => match service.crawl(&url).await {
                Ok(body) => json_response(StatusCode::OK, &body),
                Err(e @ CrawlError::InvalidUrl(_)) => detail(StatusCode::BAD_REQUEST, e.to_string()),
                Err(e @ CrawlError::Engine(_)) => {
                    detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            },
            None => detail(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Missing required query parameter 'url'".to_string(),
            ),
        },
        (_, "/" | "/metrics" | "/api/crawl") => {
            detail(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
        }
        _ => detail(StatusCode::NOT_FOUND, "Not Found".to_string()),
    };

    apply_common_headers(&mut response, request_id);
    response
}

/// First value of `name` in a query string, percent-decoded.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Permissive CORS headers plus the request id.
fn apply_common_headers(response: &mut Response<Full<Bytes>>, request_id: HeaderValue) {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(REQUEST_ID, request_id);
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn detail(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "detail": message }))
}
