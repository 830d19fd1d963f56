use crate::config::ProofServiceConfig;
use crate::handlers;
use crate::services::{
    AnalysisClient, BackendClient, DocumentConverter, HostedStorage, LocalStorage,
    ReconciliationService, ReconciliationSettings, Storage,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Files accepted in one analysis request.
const MAX_FILES_PER_REQUEST: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProofServiceConfig>,
    pub service: Arc<ReconciliationService>,
}

impl AppState {
    pub async fn new(config: ProofServiceConfig) -> Result<Self, AppError> {
        let backend = BackendClient::new(&config.backend)?;

        let storage: Arc<dyn Storage> = match &config.storage.local_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using local blob storage");
                Arc::new(LocalStorage::new(path).await.map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        path.display(),
                        e
                    );
                    e
                })?)
            }
            None => Arc::new(HostedStorage::new(backend.clone())),
        };

        let analysis = AnalysisClient::new(backend.clone(), &config.backend.analyze_function);
        let converter = DocumentConverter::new(&config.converter);

        let service = ReconciliationService::new(
            backend,
            storage,
            analysis,
            converter,
            ReconciliationSettings {
                temp_bucket: config.storage.temp_bucket.clone(),
                proof_bucket: config.storage.proof_bucket.clone(),
                max_upload_bytes: config.max_upload_bytes,
            },
        );

        Ok(Self {
            config: Arc::new(config),
            service: Arc::new(service),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST);
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/siren/:siren", get(handlers::siren::check_siren))
        .route(
            "/payments/:payment_id/proofs",
            get(handlers::proofs::list_proofs),
        )
        .route(
            "/payments/:payment_id/proofs/analyze",
            post(handlers::proofs::analyze_proof),
        )
        .route(
            "/payments/:payment_id/proofs/confirm",
            post(handlers::proofs::confirm_proof),
        )
        .route(
            "/payments/:payment_id/proofs/discard",
            post(handlers::proofs::discard_analysis),
        )
        .route("/proofs/:proof_id", delete(handlers::proofs::delete_proof))
        .route(
            "/tranches/:tranche_id/matches",
            post(handlers::matches::match_statement),
        )
        .route(
            "/tranches/:tranche_id/matches/apply",
            post(handlers::matches::apply_matches),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route_layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: ProofServiceConfig) -> Result<Self, AppError> {
        let port = config.common.port;
        let state = AppState::new(config).await?;
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
