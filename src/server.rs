//! HTTP listener and graceful shutdown.
//!
//! The server is a thin adapter: it reads one hyper request, builds a
//! [`Request`], hands it to [`Dispatcher::dispatch`], and writes back
//! whatever the [`Response`] holds afterwards. Routing and middleware live
//! entirely in the dispatcher.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use portico::Server;
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid socket address `{addr}`: {e}")))?;
        Ok(Self { addr })
    }

    pub fn from_config(config: &Config) -> Self {
        Self { addr: config.addr }
    }

    /// Starts accepting connections and dispatching them through
    /// `dispatcher`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        self.serve_with_shutdown(dispatcher, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves.
    pub async fn serve_with_shutdown(
        self,
        dispatcher: Dispatcher,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %self.addr, routes = dispatcher.routes().len(), "portico listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting, even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { handle(&dispatcher, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("portico stopped");
        Ok(())
    }
}

// ── Request adaptation ────────────────────────────────────────────────────────

/// Converts one hyper request, dispatches it, converts the result back.
///
/// Errors never reach hyper: an unknown method is `405`, an unreadable body
/// `400`, and an error returned by the handler chain `500`.
async fn handle<B>(
    dispatcher: &Dispatcher,
    req: http::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        return Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed"));
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(plain(StatusCode::BAD_REQUEST, "400 Bad Request"));
        }
    };

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut request = Request::new(method, target).with_body(body.to_vec());
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => request.insert_header(name.as_str(), value),
            Err(_) => warn!(header = %name, "skipping non-ascii request header"),
        }
    }

    let mut response = dispatcher.response();
    match dispatcher.dispatch(&mut request, &mut response) {
        Ok(()) => Ok(response.into_http()),
        Err(e) => {
            error!(method = %method, path = request.path(), "request failed: {e}");
            Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error"))
        }
    }
}

fn plain(status: StatusCode, body: &str) -> http::Response<Full<Bytes>> {
    let mut res = Response::new();
    res.set_status_code(status).set_content_type("text/plain; charset=utf-8").send(body);
    res.into_http()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only
/// Ctrl-C is available.
///
/// A handler that fails to install is logged and never fires; the other
/// one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Action, Controller, Descriptor};
    use crate::router::Router;

    struct Echo;

    impl Echo {
        fn echo(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
            let who = req.query("who").unwrap_or("nobody").to_owned();
            let agent = req.header("user-agent").unwrap_or("").to_owned();
            res.set_header("x-agent", &agent);
            res.send(format!("{who}:"));
            res.send(req.body());
            Ok(())
        }

        fn fail(&self, _: &mut Request, res: &mut Response) -> Result<(), Error> {
            res.set_status_code(StatusCode::ACCEPTED);
            Err(Error::handler("database unavailable"))
        }
    }

    impl Controller for Echo {
        fn describe(&self) -> Descriptor<Self> {
            Descriptor::new()
                .action(Action::new("echo", Self::echo).post("/echo"))
                .action(Action::new("fail", Self::fail).get("/fail"))
        }
    }

    fn dispatcher() -> Dispatcher {
        Router::new().register(Echo, "/api").unwrap().build()
    }

    fn request(method: &str, uri: &str, body: &'static str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "test")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_of(res: http::Response<Full<Bytes>>) -> Bytes {
        res.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn round_trips_through_the_dispatcher() {
        let res = handle(&dispatcher(), request("POST", "/api//echo?who=ada", "hi")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-agent"], "test");
        assert_eq!(body_of(res).await, "ada:hi");
    }

    #[tokio::test]
    async fn unmatched_route_is_404() {
        let res = handle(&dispatcher(), request("GET", "/api/echo", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(res).await, "404 Not Found");
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let res = handle(&dispatcher(), request("BREW", "/api/echo", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn handler_error_is_500() {
        let res = handle(&dispatcher(), request("GET", "/api/fail", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(res).await, "500 Internal Server Error");
    }
}
