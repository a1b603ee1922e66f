use std::{
    future::{
        Future,
        IntoFuture as _,
    },
    net::SocketAddr,
};

use axum::{
    extract::{
        FromRef,
        State,
    },
    response::{
        IntoResponse,
        Response,
    },
    routing::get,
    Json,
    Router,
};
use eyre::WrapErr as _;
use futures::FutureExt as _;
use http::status::StatusCode;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::fraud_detector::VerifiedBlockStatus;

/// A future wrapping a type-erased [`axum::serve::Serve`].
pub(crate) struct Serve {
    local_addr: SocketAddr,
    fut: futures::future::BoxFuture<'static, std::io::Result<()>>,
}

impl Serve {
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Future for Serve {
    type Output = std::io::Result<()>;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        self.fut.as_mut().poll(cx)
    }
}

#[derive(Clone)]
/// `AppState` is used for as an axum extractor in its method handlers.
struct AppState {
    verified_block_status: watch::Receiver<VerifiedBlockStatus>,
}

impl FromRef<AppState> for watch::Receiver<VerifiedBlockStatus> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.verified_block_status.clone()
    }
}

pub(crate) async fn serve(
    socket_addr: SocketAddr,
    verified_block_status: watch::Receiver<VerifiedBlockStatus>,
    shutdown_token: CancellationToken,
) -> eyre::Result<Serve> {
    // GET and POST on the root are served identically; downstream monitors of
    // the original service poll either verb.
    let app = Router::new()
        .route("/", get(get_status).post(get_status))
        .route("/healthz", get(get_healthz))
        .route("/readyz", get(get_readyz))
        .route("/status", get(get_status))
        .with_state(AppState {
            verified_block_status,
        });
    let listener = tokio::net::TcpListener::bind(socket_addr)
        .await
        .wrap_err_with(|| format!("failed to bind TCP socket at `{socket_addr}`"))?;
    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_token.cancelled_owned());
    let local_addr = serve
        .local_addr()
        .wrap_err("bound TCP listener failed to produce local addr")?;

    Ok(Serve {
        local_addr,
        fut: serve.into_future().boxed(),
    })
}

/// Handler of a call to `/healthz`.
///
/// Reports `Degraded` once the engine has halted on a mismatch so that the
/// condition shows up in infrastructure probes; the status itself keeps being
/// served.
#[instrument(skip_all)]
async fn get_healthz(
    State(verified_block_status): State<watch::Receiver<VerifiedBlockStatus>>,
) -> Healthz {
    if verified_block_status.borrow().is_halted() {
        Healthz::Degraded
    } else {
        Healthz::Ok
    }
}

/// Handler of a call to `/readyz`.
///
/// Returns `Readyz::Ok` once the reconciliation engine has started its scan
/// loop and published its first checkpoint snapshot.
#[instrument(skip_all)]
async fn get_readyz(
    State(verified_block_status): State<watch::Receiver<VerifiedBlockStatus>>,
) -> Readyz {
    if verified_block_status.borrow().is_ready() {
        Readyz::Ok
    } else {
        Readyz::NotReady
    }
}

#[instrument(skip_all)]
async fn get_status(
    State(verified_block_status): State<watch::Receiver<VerifiedBlockStatus>>,
) -> Json<VerifiedBlockStatus> {
    Json(verified_block_status.borrow().clone())
}

enum Healthz {
    Ok,
    Degraded,
}

impl IntoResponse for Healthz {
    fn into_response(self) -> Response {
        #[derive(Debug, Serialize)]
        struct HealthzBody {
            status: &'static str,
        }
        let (status, msg) = match self {
            Self::Ok => (StatusCode::OK, "ok"),
            Self::Degraded => (StatusCode::INTERNAL_SERVER_ERROR, "degraded"),
        };
        let mut response = Json(HealthzBody {
            status: msg,
        })
        .into_response();
        *response.status_mut() = status;
        response
    }
}

enum Readyz {
    Ok,
    NotReady,
}

impl IntoResponse for Readyz {
    fn into_response(self) -> Response {
        #[derive(Debug, Serialize)]
        struct ReadyzBody {
            status: &'static str,
        }
        let (status, msg) = match self {
            Self::Ok => (StatusCode::OK, "ok"),
            Self::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        };
        let mut response = Json(ReadyzBody {
            status: msg,
        })
        .into_response();
        *response.status_mut() = status;
        response
    }
}
