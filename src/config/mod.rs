mod settings;


use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    AuthSettings, LogSettings, RealtimeSettings, ServerSettings, Settings, StorageSettings,
};

/// Shortest accepted HS256 signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Loads the configuration from `config/default` and `TASKHUB__*` environment
/// variables, merges it over the defaults and validates the result.
///
/// A `.env` file in the working directory is loaded first when present.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("TASKHUB")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("realtime.allowed_origins")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge(Settings::default());

    validate(&settings)?;
    Ok(settings)
}

/// Reject settings the service cannot run with.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
        return Err(ConfigError::Message(format!(
            "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} characters"
        )));
    }

    if !(4..=31).contains(&settings.auth.bcrypt_cost) {
        return Err(ConfigError::Message(
            "auth.bcrypt_cost must be between 4 and 31".to_string(),
        ));
    }

    let realtime = &settings.realtime;
    if realtime.ping_interval_secs == 0
        || realtime.read_timeout_secs == 0
        || realtime.write_timeout_secs == 0
    {
        return Err(ConfigError::Message(
            "realtime timeouts and ping interval must be non-zero".to_string(),
        ));
    }
    if realtime.read_timeout_secs <= realtime.ping_interval_secs {
        return Err(ConfigError::Message(
            "realtime.read_timeout_secs must exceed realtime.ping_interval_secs".to_string(),
        ));
    }
    if realtime.outbound_buffer == 0 || realtime.max_message_bytes == 0 {
        return Err(ConfigError::Message(
            "realtime.outbound_buffer and realtime.max_message_bytes must be non-zero".to_string(),
        ));
    }
    if settings.auth.login_window_secs == 0 || realtime.upgrade_window_secs == 0 {
        return Err(ConfigError::Message(
            "rate limit windows must be non-zero".to_string(),
        ));
    }

    Ok(())
}
