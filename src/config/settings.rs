use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub realtime: RealtimeSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

/// Addresses the HTTP API and the realtime gateway bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub http_port: u16,
    pub ws_port: u16,
}

/// Token signing and login throttling.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
    pub login_attempts: u32,
    pub login_window_secs: u64,
}

/// WebSocket gateway behaviour.
///
/// An empty `allowed_origins` list accepts any origin.
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub allowed_origins: Vec<String>,
    pub ping_interval_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub outbound_buffer: usize,
    /// Largest inbound frame or message a subscriber may send.
    pub max_message_bytes: usize,
    pub upgrade_attempts: u32,
    pub upgrade_window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

impl AuthSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn login_window(&self) -> Duration {
        Duration::from_secs(self.login_window_secs)
    }
}

impl RealtimeSettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn upgrade_window(&self) -> Duration {
        Duration::from_secs(self.upgrade_window_secs)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub realtime: Option<PartialRealtimeSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub ws_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAuthSettings {
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub bcrypt_cost: Option<u32>,
    pub login_attempts: Option<u32>,
    pub login_window_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRealtimeSettings {
    pub allowed_origins: Option<Vec<String>>,
    pub ping_interval_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
    pub outbound_buffer: Option<usize>,
    pub max_message_bytes: Option<usize>,
    pub upgrade_attempts: Option<u32>,
    pub upgrade_window_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        Settings {
            server: self.server.unwrap_or_default().merge(defaults.server),
            auth: self.auth.unwrap_or_default().merge(defaults.auth),
            realtime: self.realtime.unwrap_or_default().merge(defaults.realtime),
            storage: StorageSettings {
                path: self
                    .storage
                    .and_then(|s| s.path)
                    .unwrap_or(defaults.storage.path),
            },
            log: LogSettings {
                level: self.log.and_then(|l| l.level).unwrap_or(defaults.log.level),
            },
        }
    }
}

impl PartialServerSettings {
    fn merge(self, d: ServerSettings) -> ServerSettings {
        ServerSettings {
            host: self.host.unwrap_or(d.host),
            http_port: self.http_port.unwrap_or(d.http_port),
            ws_port: self.ws_port.unwrap_or(d.ws_port),
        }
    }
}

impl PartialAuthSettings {
    fn merge(self, d: AuthSettings) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.unwrap_or(d.jwt_secret),
            token_ttl_secs: self.token_ttl_secs.unwrap_or(d.token_ttl_secs),
            bcrypt_cost: self.bcrypt_cost.unwrap_or(d.bcrypt_cost),
            login_attempts: self.login_attempts.unwrap_or(d.login_attempts),
            login_window_secs: self.login_window_secs.unwrap_or(d.login_window_secs),
        }
    }
}

impl PartialRealtimeSettings {
    fn merge(self, d: RealtimeSettings) -> RealtimeSettings {
        RealtimeSettings {
            allowed_origins: self
                .allowed_origins
                .map(|origins| {
                    origins
                        .into_iter()
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(d.allowed_origins),
            ping_interval_secs: self.ping_interval_secs.unwrap_or(d.ping_interval_secs),
            read_timeout_secs: self.read_timeout_secs.unwrap_or(d.read_timeout_secs),
            write_timeout_secs: self.write_timeout_secs.unwrap_or(d.write_timeout_secs),
            outbound_buffer: self.outbound_buffer.unwrap_or(d.outbound_buffer),
            max_message_bytes: self.max_message_bytes.unwrap_or(d.max_message_bytes),
            upgrade_attempts: self.upgrade_attempts.unwrap_or(d.upgrade_attempts),
            upgrade_window_secs: self.upgrade_window_secs.unwrap_or(d.upgrade_window_secs),
        }
    }
}

/// Provides default values for `Settings`.
///
/// The JWT secret has no usable default; `load_config` rejects it until one is
/// supplied through the config file or `TASKHUB__AUTH__JWT_SECRET`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                http_port: 8080,
                ws_port: 8081,
            },
            auth: AuthSettings {
                jwt_secret: String::new(),
                token_ttl_secs: 24 * 60 * 60,
                bcrypt_cost: bcrypt::DEFAULT_COST,
                login_attempts: 5,
                login_window_secs: 15 * 60,
            },
            realtime: RealtimeSettings {
                allowed_origins: Vec::new(),
                ping_interval_secs: 30,
                read_timeout_secs: 60,
                write_timeout_secs: 10,
                outbound_buffer: 64,
                max_message_bytes: 1 << 20,
                upgrade_attempts: 5,
                upgrade_window_secs: 1,
            },
            storage: StorageSettings {
                path: "taskhub_db".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
