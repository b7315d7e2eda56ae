//! HTTP transport for the control service.
//!
//! All control routes are nested under a configurable prefix; `/health` is
//! always served at the root.
//!
//! Handlers run service calls on the blocking pool: a snapshot holds the
//! service lock for the whole export.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flightrec_core::{
    ControlError, ControlService, ErrorKind, ErrorResponse, Recorder, StatusResponse,
    UpdateRequest,
};
use log::{debug, error, info};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::broadcast,
    task::{spawn_blocking, JoinError},
};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::Cli;

const STATUS_URI: &str = "/status";
const START_URI: &str = "/start";
const STOP_URI: &str = "/stop";
const SNAPSHOT_URI: &str = "/snapshot";
const UPDATE_URI: &str = "/update";
pub const HEALTH_URI: &str = "/health";

const SNAPSHOT_CONTENT_TYPE: &str = "application/octet-stream";

type SharedService<R> = Arc<ControlService<R>>;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Socket operation failed")]
    Io(#[from] io::Error),
}

/// Error returned by a request handler.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("service task failed: {0}")]
    Join(#[from] JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Control(e) => match e.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}

/// Turn a user supplied prefix into a nestable path.
///
/// `""` and `"/"` both mean "no prefix" and yield an empty string.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Build the router for `service` with the control routes under `prefix`.
pub fn router<R: Recorder + 'static>(service: SharedService<R>, prefix: &str) -> Router {
    let api = Router::new()
        .route(STATUS_URI, get(get_status::<R>))
        .route(START_URI, post(start_handler::<R>))
        .route(STOP_URI, post(stop_handler::<R>))
        .route(SNAPSHOT_URI, get(snapshot_handler::<R>))
        .route(UPDATE_URI, post(update_handler::<R>))
        .with_state(service);

    let prefix = normalize_prefix(prefix);
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    app.route(HEALTH_URI, get(health_handler))
        .layer(middleware::from_fn(no_cache_middleware))
}

pub struct Web<R: Recorder + 'static> {
    service: SharedService<R>,
    address: IpAddr,
    port: u16,
    prefix: String,
    shutdown_tx: broadcast::Sender<()>,
}

impl<R: Recorder + 'static> Web<R> {
    pub fn new(service: SharedService<R>, args: &Cli) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Web {
            service,
            address: args.address,
            port: args.port,
            prefix: normalize_prefix(&args.prefix),
            shutdown_tx,
        }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), WebError> {
        let listener = TcpListener::bind(SocketAddr::new(self.address, self.port))
            .await
            .map_err(WebError::Io)?;
        let local_addr = listener.local_addr()?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_tx = self.shutdown_tx.clone();

        let app = router(self.service, &self.prefix);

        info!("Starting HTTP web server on {}", local_addr);
        info!(
            "Flight recorder control at http://{}{}/{{status,start,stop,update,snapshot}}",
            local_addr, self.prefix
        );

        tokio::select! { biased;
            _ = subsys.on_shutdown_requested() => {
                let _ = shutdown_tx.send(());
            },
            r = axum::serve(listener, app)
                    .with_graceful_shutdown(
                        async move {
                            _ = shutdown_rx.recv().await;
                        }
                    ) => {
                return r.map_err(WebError::Io);
            }
        }
        Ok(())
    }
}

/// Middleware to add no-cache headers to API responses
async fn no_cache_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

/// GET {prefix}/status
async fn get_status<R: Recorder + 'static>(
    State(service): State<SharedService<R>>,
) -> Result<Json<StatusResponse>, ApiError> {
    debug!("GET status");

    let status = spawn_blocking(move || service.status()).await?;
    Ok(Json(status.into()))
}

/// POST {prefix}/start
async fn start_handler<R: Recorder + 'static>(
    State(service): State<SharedService<R>>,
) -> Result<StatusCode, ApiError> {
    debug!("POST start");

    spawn_blocking(move || service.start()).await??;
    info!("Flight recorder started");
    Ok(StatusCode::OK)
}

/// POST {prefix}/stop
async fn stop_handler<R: Recorder + 'static>(
    State(service): State<SharedService<R>>,
) -> Result<StatusCode, ApiError> {
    debug!("POST stop");

    spawn_blocking(move || service.stop()).await??;
    info!("Flight recorder stopped");
    Ok(StatusCode::OK)
}

/// POST {prefix}/update - body is an `UpdateRequest`, fields optional
async fn update_handler<R: Recorder + 'static>(
    State(service): State<SharedService<R>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: UpdateRequest = serde_json::from_slice(&body)?;
    debug!("POST update {:?}", request);

    spawn_blocking(move || service.update(request.into())).await?;
    Ok(StatusCode::OK)
}

/// GET {prefix}/snapshot - raw trace bytes
///
/// The export is synchronous and may be large, so it runs on the blocking pool.
async fn snapshot_handler<R: Recorder + 'static>(
    State(service): State<SharedService<R>>,
) -> Result<Response, ApiError> {
    debug!("GET snapshot");

    let trace = spawn_blocking(move || service.snapshot()).await??;
    debug!("Snapshot of {} bytes", trace.len());

    let headers = [
        (header::CONTENT_TYPE, SNAPSHOT_CONTENT_TYPE),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"snapshot.trace\"",
        ),
    ];
    Ok((headers, trace).into_response())
}

async fn health_handler() -> &'static str {
    "OK"
}
