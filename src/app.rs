//! Composition root.
//!
//! Builds every shared object once from `Settings` and runs the HTTP API and
//! the realtime gateway side by side. Nothing in the crate is a global: tests
//! build their own hubs, limiters and stores.


use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::auth::JwtAuthenticator;
use crate::config::Settings;
use crate::hub::Hub;
use crate::limiter::RateLimiter;
use crate::persistence::SledStore;
use crate::transport::websocket::{self, Gateway};
use crate::transport::{SessionConfig, UpgradeAuthorizer};
use crate::utils::error::ServiceError;

/// How long the HTTP API may drain in-flight requests after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct App {
    pub settings: Settings,
    pub store: Arc<SledStore>,
    pub jwt: Arc<JwtAuthenticator>,
    pub hub: Arc<Hub>,
    pub login_limiter: Arc<RateLimiter>,
    pub upgrade_limiter: Arc<RateLimiter>,
}

impl App {
    /// Opens storage and starts the rate limiter reset loops. Must run inside a
    /// tokio runtime.
    pub fn build(settings: Settings) -> Result<Self, ServiceError> {
        let store = Arc::new(SledStore::open(&settings.storage.path)?);
        let jwt = Arc::new(JwtAuthenticator::new(
            settings.auth.jwt_secret.as_bytes(),
            settings.auth.token_ttl(),
        ));
        let login_limiter =
            RateLimiter::start(settings.auth.login_attempts, settings.auth.login_window());
        let upgrade_limiter = RateLimiter::start(
            settings.realtime.upgrade_attempts,
            settings.realtime.upgrade_window(),
        );

        Ok(Self {
            settings,
            store,
            jwt,
            hub: Arc::new(Hub::new()),
            login_limiter,
            upgrade_limiter,
        })
    }

    pub fn api_state(&self) -> AppState {
        AppState {
            users: self.store.clone(),
            boards: self.store.clone(),
            tasks: self.store.clone(),
            jwt: self.jwt.clone(),
            hub: self.hub.clone(),
            login_limiter: self.login_limiter.clone(),
            bcrypt_cost: self.settings.auth.bcrypt_cost,
        }
    }

    pub fn gateway(&self) -> Gateway {
        let realtime = &self.settings.realtime;
        let authorizer =
            UpgradeAuthorizer::new(realtime.allowed_origins.clone(), self.jwt.clone(), self.store.clone());

        Gateway {
            hub: self.hub.clone(),
            limiter: self.upgrade_limiter.clone(),
            authorizer: Arc::new(authorizer),
            session: SessionConfig::from(realtime),
            outbound_buffer: realtime.outbound_buffer,
            max_message_bytes: realtime.max_message_bytes,
        }
    }
}

/// Binds both listeners and serves until SIGINT or SIGTERM.
pub async fn run(settings: Settings) -> Result<(), ServiceError> {
    let host = settings.server.host.clone();
    let http_listener = TcpListener::bind((host.as_str(), settings.server.http_port)).await?;
    let ws_listener = TcpListener::bind((host.as_str(), settings.server.ws_port)).await?;

    let app = App::build(settings)?;
    app.serve(http_listener, ws_listener, shutdown_signal()).await
}

impl App {
    /// Serves the HTTP API and the realtime gateway until `shutdown` resolves
    /// or either listener fails, then flushes the store.
    ///
    /// On shutdown the gateway stops accepting and the API drains in-flight
    /// requests for up to `SHUTDOWN_GRACE`. Open realtime sessions are not
    /// drained.
    pub async fn serve<F>(
        &self,
        http_listener: TcpListener,
        ws_listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        info!("HTTP API listening on http://{}", http_listener.local_addr()?);
        info!("Realtime gateway listening on ws://{}", ws_listener.local_addr()?);

        let (stop_tx, stop_rx) = watch::channel(false);
        let api = axum::serve(
            http_listener,
            api::router(self.api_state()).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(stopped(stop_rx.clone()))
        .into_future();
        let gateway = websocket::serve(ws_listener, self.gateway(), stopped(stop_rx));

        tokio::pin!(api, gateway, shutdown);
        let result = tokio::select! {
            res = &mut api => res,
            res = &mut gateway => res,
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping listeners");
                let _ = stop_tx.send(true);
                match timeout(SHUTDOWN_GRACE, async { tokio::try_join!(&mut api, &mut gateway) }).await {
                    Ok(res) => res.map(|_| ()),
                    Err(_) => {
                        warn!("HTTP API did not drain within {:?}", SHUTDOWN_GRACE);
                        Ok(())
                    }
                }
            }
        };

        let _ = stop_tx.send(true);
        self.store.flush()?;
        info!("Store flushed");
        result?;
        Ok(())
    }
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
