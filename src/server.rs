//! HTTP Server
//!
//! Serves the exposition endpoint and a couple of helper pages:
//!
//! | path       | response                                  |
//! |------------|-------------------------------------------|
//! | `/metrics` | current snapshot, Prometheus text format  |
//! | `/health`  | `OK`                                      |
//! | `/`        | HTML landing page                         |
//! | other      | 404                                       |

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::collector::{Aggregate, SnapshotCache, CONTENT_TYPE as EXPOSITION_CONTENT_TYPE};
use crate::error::Result;

/// Pause after a failed accept, so a persistent error such as `EMFILE`
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>FreeIPA Exporter</title>
</head>
<body>
    <h1>FreeIPA Exporter</h1>
    <p>This exporter provides metrics for FreeIPA monitoring.</p>
    <ul>
        <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
        <li><a href="/health">/health</a> - Health check endpoint</li>
    </ul>
</body>
</html>
"#;

/// Accept connections on `addr` until `shutdown` resolves.
pub async fn serve<A, F>(addr: SocketAddr, cache: Arc<SnapshotCache<A>>, shutdown: F) -> Result<()>
where
    A: Aggregate + 'static,
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(addr).await?;
    info!("FreeIPA exporter listening on {}", listener.local_addr()?);
    run(listener, cache, shutdown).await
}

/// Serve on an already bound listener.
pub async fn run<A, F>(listener: TcpListener, cache: Arc<SnapshotCache<A>>, shutdown: F) -> Result<()>
where
    A: Aggregate + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    accept_error_backoff(&e).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down exporter");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let cache = cache.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let cache = cache.clone();
                async move { Ok::<_, Infallible>(respond(req.method(), req.uri().path(), &cache).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

async fn accept_error_backoff(e: &std::io::Error) {
    warn!("Accept error: {}", e);
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Route a request to its response.
pub async fn respond<A: Aggregate + 'static>(
    method: &Method,
    path: &str,
    cache: &SnapshotCache<A>,
) -> Response<Full<Bytes>> {
    debug!(%method, path, "HTTP request");

    if *method != Method::GET && *method != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    match path {
        "/metrics" => match cache.get().await {
            Ok(snapshot) => response(
                StatusCode::OK,
                EXPOSITION_CONTENT_TYPE,
                snapshot.exposition().clone(),
            ),
            Err(e) => {
                error!("Failed to produce metrics: {}", e);
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to collect metrics: {}", e),
                )
            }
        },
        "/health" => text(StatusCode::OK, "OK"),
        "/" => response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            Bytes::from_static(INDEX_HTML.as_bytes()),
        ),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    response(status, "text/plain; charset=utf-8", body.into())
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{HostFixture, InMemoryProbe};
    use crate::collector::{HostAggregator, HostScraper, Snapshot};
    use crate::config::Credentials;
    use crate::domain::checks::USERS;
    use crate::domain::CHECKS;
    use crate::error::Error;
    use async_trait::async_trait;
    use http_body_util::BodyExt;

    fn cache() -> SnapshotCache<HostAggregator> {
        let probe = InMemoryProbe::new().with_host(
            "ipa1.example.com",
            HostFixture::new("ipa1").attribute(USERS, 7i64),
        );
        let scraper = HostScraper::new(
            Arc::new(probe),
            Credentials::new("example.com", "cn=Directory Manager", "secret"),
            CHECKS,
        );
        SnapshotCache::new(
            HostAggregator::new(vec!["ipa1.example.com".into()], scraper),
            Duration::from_secs(60),
        )
    }

    async fn body(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let response = respond(&Method::GET, "/metrics", &cache()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
        let body = body(response).await;
        assert!(body.contains("ipa_users{host=\"ipa1\"} 7"));
        assert!(body.contains("ipa_up{host=\"ipa1\"} 1"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = respond(&Method::GET, "/health", &cache()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "OK");
    }

    #[tokio::test]
    async fn test_index_page() {
        let response = respond(&Method::GET, "/", &cache()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.contains("FreeIPA Exporter"));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let cache = cache();
        let response = respond(&Method::GET, "/nope", &cache).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = respond(&Method::POST, "/metrics", &cache).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        // the rejected request must not have triggered a scrape
        assert!(cache.peek().is_none());
    }

    struct FailingAggregator;

    #[async_trait]
    impl Aggregate for FailingAggregator {
        async fn aggregate(&self) -> Result<Snapshot> {
            Err(Error::Aggregation("no hosts answered".into()))
        }
    }

    #[tokio::test]
    async fn test_metrics_without_any_snapshot_is_500() {
        let cache = SnapshotCache::new(FailingAggregator, Duration::from_secs(60));
        let response = respond(&Method::GET, "/metrics", &cache).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(response).await.contains("no hosts answered"));
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run(listener, Arc::new(cache()), async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_error_backs_off() {
        let started = tokio::time::Instant::now();
        let e = std::io::Error::from_raw_os_error(24);
        accept_error_backoff(&e).await;
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
