//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the authentication registry, route table and chain once
//! - Initialize subsystems in dependency order
//! - Bind the listener and wire signals to the coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The chain is assembled in one place, in its mandatory order
//! - Listeners start last (traffic only when ready)

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::auth::{AuthRegistry, AuthenticateStage, Authenticator, StaticTokenStrategy, Strategy};
use crate::config::{AppConfig, ConfigError};
use crate::http::middleware::{BodyStage, CookieStage, ObserveStage};
use crate::http::HttpServer;
use crate::lifecycle::resource::ResourceHandle;
use crate::lifecycle::shutdown::LifecycleCoordinator;
use crate::lifecycle::signals;
use crate::observability::metrics::{self, MetricsError};
use crate::persistence::Database;
use crate::pipeline::Chain;
use crate::routes;
use crate::routing::{RouteStage, RouteTable, RouteTableError};
use crate::security::{AllowedOrigins, CorsPolicy, CorsStage, ForgeryStage, HardenStage};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authentication strategy configured twice")]
    StrategyAlreadyConfigured,

    #[error(transparent)]
    Routes(#[from] RouteTableError),

    #[error("failed to configure database pool: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),
}

/// Collects the pieces the pipeline is built from.
pub struct AppBuilder {
    config: AppConfig,
    registry: Option<AuthRegistry>,
    groups: Vec<(String, Router)>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            groups: Vec::new(),
        }
    }

    /// Configure the authentication strategy. Allowed once.
    pub fn auth_strategy(mut self, strategy: impl Strategy) -> Result<Self, StartupError> {
        if self.registry.is_some() {
            return Err(StartupError::StrategyAlreadyConfigured);
        }
        self.registry = Some(AuthRegistry::configure(
            strategy,
            self.config.auth.cookie_name.clone(),
        ));
        Ok(self)
    }

    /// Mount a route group. Prefixes are validated by [`AppBuilder::build`].
    pub fn route_group(mut self, prefix: impl Into<String>, router: Router) -> Self {
        self.groups.push((prefix.into(), router));
        self
    }

    pub fn route_groups<P: Into<String>>(self, groups: impl IntoIterator<Item = (P, Router)>) -> Self {
        groups
            .into_iter()
            .fold(self, |builder, (prefix, router)| builder.route_group(prefix, router))
    }

    /// Freeze everything into an [`App`]. Without an explicit strategy the
    /// configured static tokens are used.
    pub fn build(self) -> Result<App, StartupError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => AuthRegistry::configure(
                StaticTokenStrategy::from_config(&self.config.auth),
                self.config.auth.cookie_name.clone(),
            ),
        };
        tracing::info!(strategy = registry.strategy_name(), "Authentication strategy configured");

        let table = self
            .groups
            .into_iter()
            .try_fold(RouteTable::builder(), |table, (prefix, router)| {
                table.register(&prefix, router)
            })?
            .build();

        let chain = build_chain(&self.config, Authenticator::new(registry), table);
        tracing::info!(stages = ?chain.stage_names(), "Request pipeline built");

        Ok(App {
            config: self.config,
            chain: Arc::new(chain),
        })
    }
}

/// Assemble the chain in its mandatory order.
pub fn build_chain(config: &AppConfig, authenticator: Authenticator, routes: RouteTable) -> Chain {
    let cors = CorsPolicy::from_config(&config.cors);
    if cors.allow_credentials() && cors.allowed_origins() == &AllowedOrigins::Any {
        tracing::warn!("CORS admits any origin with credentials; every origin is reflected");
    }

    let mut chain = Chain::builder()
        .register(ObserveStage::new())
        .register(HardenStage::from_config(&config.security))
        .register(BodyStage::new(config.security.max_body_size))
        .register(CookieStage::new());

    if let Some(forgery) = ForgeryStage::from_config(&config.csrf) {
        chain = chain.register(forgery);
    }

    chain
        .register(CorsStage::new(cors))
        .register(AuthenticateStage::new(authenticator))
        .register(RouteStage::new(Arc::new(routes)))
        .build()
}

/// A fully built pipeline and the configuration it came from.
pub struct App {
    config: AppConfig,
    chain: Arc<Chain>,
}

impl App {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn chain(&self) -> Arc<Chain> {
        Arc::clone(&self.chain)
    }

    /// The layered axum router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        HttpServer::new(&self.config, self.chain()).router()
    }
}

/// Run the server until a termination signal completes the shutdown
/// sequence. Returns the process exit code.
pub async fn serve(config: AppConfig) -> Result<ExitCode, StartupError> {
    if config.observability.metrics_enabled {
        metrics::init_metrics(&config.observability.metrics_address)?;
    }

    let database = ResourceHandle::new(Database::connect_lazy(&config.database)?);
    let app = AppBuilder::new(config)
        .route_groups(routes::domain_groups(database.clone()))
        .route_group(routes::docs::PREFIX, routes::docs::router())
        .build()?;

    let coordinator = Arc::new(LifecycleCoordinator::new(
        database,
        Duration::from_secs(app.config().shutdown.release_timeout_secs),
    ));
    let signals = signals::termination_signals().map_err(StartupError::Signals)?;

    let address = app.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let server = HttpServer::new(app.config(), app.chain());
    let server_task = tokio::spawn(server.run(listener, coordinator.subscribe()));

    let outcome = signals::drive(Arc::clone(&coordinator), signals).await;

    // The server stops on the coordinator's broadcast; a failure before
    // that is reported through the exit code.
    if server_task.is_finished() {
        match server_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Error: {}", err);
                return Ok(ExitCode::FAILURE);
            }
            Err(err) => {
                tracing::error!(error = %err, "Error: HTTP server task failed");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(outcome.map_or(ExitCode::SUCCESS, |outcome| outcome.exit_code()))
}
