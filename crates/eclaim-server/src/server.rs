use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use eclaim_core::Credentials;
use eclaim_db_postgres::{PostgresAuditStore, PostgresEpisodeRegistry, create_pool};
use eclaim_storage::{DynAuditStore, DynEpisodeRegistry};
use eclaim_transport::{ClaimSubmitter, ServiceTypeResolver, TransportClient};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{AppConfig, StorageBackend},
    handlers,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub submitter: ClaimSubmitter,
    pub credentials: Arc<Credentials>,
}

impl AppState {
    /// Wire the submission pipeline from configuration, connecting storage.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let credentials = Arc::new(cfg.credentials());
        let transport = TransportClient::new(credentials.clone(), cfg.transport())
            .context("failed to build clearinghouse client")?;

        let (audit, registry) = open_storage(cfg).await?;
        tracing::info!(
            backend = %cfg.storage.backend,
            endpoint = %transport.endpoint(),
            consumer_id = %credentials.consumer_id,
            "Submission pipeline ready"
        );

        let submitter = ClaimSubmitter::new(
            transport,
            ServiceTypeResolver::new(Some(registry)),
            audit,
            cfg.facility_info(),
        );
        Ok(Self {
            submitter,
            credentials,
        })
    }
}

async fn open_storage(cfg: &AppConfig) -> anyhow::Result<(DynAuditStore, DynEpisodeRegistry)> {
    match cfg.storage.backend {
        StorageBackend::Memory => Ok((
            eclaim_db_memory::create_audit_store(),
            eclaim_db_memory::create_episode_registry(),
        )),
        StorageBackend::Postgres => {
            let pg = cfg
                .storage
                .postgres
                .as_ref()
                .context("storage.postgres config is required")?;
            let pool = create_pool(pg).await.context("failed to connect to PostgreSQL")?;
            let store = PostgresAuditStore::new(pool.clone());
            store
                .ensure_tables()
                .await
                .context("failed to prepare the claim_audit table")?;
            let audit: DynAuditStore = Arc::new(store);
            let registry: DynEpisodeRegistry = Arc::new(PostgresEpisodeRegistry::new(pool));
            Ok((audit, registry))
        }
    }
}

pub struct EclaimServer {
    addr: SocketAddr,
    app: Router,
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg).await?;
    Ok(router(state, cfg.server.body_limit_bytes))
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/claims/settings", get(handlers::settings))
        .route(
            "/claims/medical-records",
            post(handlers::submit_medical_record).get(handlers::list_medical_records),
        )
        .route(
            "/claims/medical-records/{no_sep}",
            get(handlers::get_medical_record).delete(handlers::delete_medical_record),
        )
        .route(
            "/claims/medical-records/{no_sep}/bundle",
            get(handlers::get_medical_record_bundle),
        )
        .route(
            "/claims/medical-records/{no_sep}/response",
            get(handlers::get_medical_record_response),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive()),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<EclaimServer> {
        let app = build_app(&self.config).await?;
        Ok(EclaimServer {
            addr: self.addr,
            app,
        })
    }
}

impl EclaimServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
