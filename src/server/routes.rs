//! HTTP surface of the remoclip server

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures_util::stream;
use serde::Serialize;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use warp::http::{HeaderMap, StatusCode};
use warp::{Filter, Rejection, Reply};

use super::{ActionResult, ClipboardService, ServiceSettings};
use crate::auth::TOKEN_HEADER;
use crate::clipboard::select_backend;
use crate::config::Config;
use crate::store::EventStore;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// All remoclip routes
pub fn routes(
    service: Arc<ClipboardService>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone {
    let copy = warp::path!("copy")
        .and(warp::post())
        .and(with_service(Arc::clone(&service)))
        .and(with_request())
        .and_then(|service: Arc<ClipboardService>, token: Option<Vec<u8>>, body: Bytes| async move {
            Ok::<_, Infallible>(into_response(
                "copy",
                service.copy(token.as_deref(), &body).await,
            ))
        });

    let paste = warp::path!("paste")
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and(with_request())
        .and_then(|service: Arc<ClipboardService>, token: Option<Vec<u8>>, body: Bytes| async move {
            Ok::<_, Infallible>(into_response(
                "paste",
                service.paste(token.as_deref(), &body).await,
            ))
        });

    let history = warp::path!("history")
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and(with_request())
        .and_then(|service: Arc<ClipboardService>, token: Option<Vec<u8>>, body: Bytes| async move {
            Ok::<_, Infallible>(into_response(
                "history",
                service.history(token.as_deref(), &body).await,
            ))
        });

    let delete = warp::path!("history")
        .and(warp::delete())
        .and(with_service(service))
        .and(with_request())
        .and_then(|service: Arc<ClipboardService>, token: Option<Vec<u8>>, body: Bytes| async move {
            Ok::<_, Infallible>(into_response(
                "delete",
                service.delete(token.as_deref(), &body).await,
            ))
        });

    copy.or(paste)
        .unify()
        .or(history)
        .unify()
        .or(delete)
        .unify()
        .recover(handle_rejection)
        .with(warp::trace::request())
        .map(|reply| Reply::into_response(reply))
}

fn with_service(
    service: Arc<ClipboardService>,
) -> impl Filter<Extract = (Arc<ClipboardService>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&service))
}

/// Raw token header bytes and raw body of a request
fn with_request() -> impl Filter<Extract = (Option<Vec<u8>>, Bytes), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .map(|headers: HeaderMap| {
            headers
                .get(TOKEN_HEADER)
                .map(|value| value.as_bytes().to_vec())
        })
        .and(warp::body::bytes())
}

fn into_response<T: Serialize>(action: &str, result: ActionResult<T>) -> warp::reply::Response {
    match result {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => {
            if err.is_unexpected() {
                error!("Failed to handle {} request: {:?}", action, err);
            } else {
                warn!("Rejected {} request: {}", action, err);
            }

            let body = ErrorBody {
                error: err.client_message(),
            };
            warp::reply::with_status(warp::reply::json(&body), err.status()).into_response()
        }
    }
}

/// Start the server described by `config` and run until Ctrl-C
pub async fn run(config: &Config) -> Result<()> {
    let store = Arc::new(
        EventStore::open(&config.server.db)
            .await
            .with_context(|| format!("Failed to open database {}", config.server.db.display()))?,
    );

    let selection = select_backend(config.server.clipboard_backend, &store).await?;
    let service = Arc::new(ClipboardService::new(
        ServiceSettings::from(config),
        store,
        selection.backend,
    ));

    info!("Using {} clipboard backend", service.backend_name());
    if !service.requires_token() {
        warn!("No security_token configured; all requests are accepted");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    let addr = resolve_addr(&config.server.host, config.server.port).await?;
    let (bound, tcp_server) = warp::serve(routes(Arc::clone(&service)))
        .try_bind_with_graceful_shutdown(addr, wait_for_shutdown(shutdown_rx.clone()))
        .with_context(|| format!("Failed to listen on {}", addr))?;
    info!("Listening on http://{}", bound);

    match &config.server.socket {
        Some(socket_path) => {
            let unix_server = serve_unix(
                routes(Arc::clone(&service)),
                socket_path,
                wait_for_shutdown(shutdown_rx),
            )?;
            tokio::join!(tcp_server, unix_server);

            if let Err(e) = std::fs::remove_file(socket_path) {
                warn!("Failed to remove socket {}: {}", socket_path.display(), e);
            }
        }
        None => tcp_server.await,
    }

    Ok(())
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}", host))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}", host))
}

fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) -> impl Future<Output = ()> + Send {
    async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Serve `routes` on a Unix domain socket
fn serve_unix<F>(
    routes: F,
    socket_path: &Path,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<impl Future<Output = ()>>
where
    F: Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone + Send + Sync + 'static,
{
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove stale socket {}", socket_path.display()))?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket {}", socket_path.display()))?;
    info!("Listening on unix socket {}", socket_path.display());

    let incoming = Box::pin(stream::unfold(listener, |listener| async move {
        let accepted = listener.accept().await.map(|(conn, _)| conn);
        Some((accepted, listener))
    }));

    Ok(warp::serve(routes).serve_incoming_with_graceful_shutdown(incoming, shutdown))
}

/// Fallback for unknown paths, keeping the `{"error": ...}` shape
async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        warn!("Rejected request: {:?}", rejection);
        (StatusCode::BAD_REQUEST, "bad request".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        status,
    ))
}
