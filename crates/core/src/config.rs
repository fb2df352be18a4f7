use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub messenger: MessengerConfig,
    pub llm: LlmConfig,
    pub payment: PaymentConfig,
    pub sheets: SheetsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MessengerConfig {
    pub page_access_token: SecretString,
    pub verify_token: SecretString,
    pub api_base_url: String,
    pub send_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub enabled: bool,
    pub api_base_url: Option<String>,
    pub merchant_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub invoice_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub api_base_url: String,
    pub api_key: Option<SecretString>,
    pub sync_cooldown_secs: u64,
    pub write_feedback: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub page_access_token: Option<String>,
    pub verify_token: Option<String>,
    pub payment_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://shopbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            messenger: MessengerConfig {
                page_access_token: String::new().into(),
                verify_token: String::new().into(),
                api_base_url: "https://graph.facebook.com/v18.0".to_string(),
                send_timeout_secs: 10,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 15,
                max_retries: 2,
            },
            payment: PaymentConfig {
                enabled: false,
                api_base_url: None,
                merchant_id: None,
                api_key: None,
                invoice_timeout_secs: 10,
            },
            sheets: SheetsConfig {
                api_base_url: "https://sheets.googleapis.com/v4".to_string(),
                api_key: None,
                sync_cooldown_secs: 3,
                write_feedback: true,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shopbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(messenger) = patch.messenger {
            if let Some(token) = messenger.page_access_token {
                self.messenger.page_access_token = secret_value(token);
            }
            if let Some(token) = messenger.verify_token {
                self.messenger.verify_token = secret_value(token);
            }
            if let Some(api_base_url) = messenger.api_base_url {
                self.messenger.api_base_url = api_base_url;
            }
            if let Some(send_timeout_secs) = messenger.send_timeout_secs {
                self.messenger.send_timeout_secs = send_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(payment) = patch.payment {
            if let Some(enabled) = payment.enabled {
                self.payment.enabled = enabled;
            }
            if let Some(api_base_url) = payment.api_base_url {
                self.payment.api_base_url = Some(api_base_url);
            }
            if let Some(merchant_id) = payment.merchant_id {
                self.payment.merchant_id = Some(merchant_id);
            }
            if let Some(api_key) = payment.api_key {
                self.payment.api_key = Some(secret_value(api_key));
            }
            if let Some(invoice_timeout_secs) = payment.invoice_timeout_secs {
                self.payment.invoice_timeout_secs = invoice_timeout_secs;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(api_base_url) = sheets.api_base_url {
                self.sheets.api_base_url = api_base_url;
            }
            if let Some(api_key) = sheets.api_key {
                self.sheets.api_key = Some(secret_value(api_key));
            }
            if let Some(sync_cooldown_secs) = sheets.sync_cooldown_secs {
                self.sheets.sync_cooldown_secs = sync_cooldown_secs;
            }
            if let Some(write_feedback) = sheets.write_feedback {
                self.sheets.write_feedback = write_feedback;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SHOPBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHOPBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SHOPBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHOPBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SHOPBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPBOT_MESSENGER_PAGE_ACCESS_TOKEN") {
            self.messenger.page_access_token = secret_value(value);
        }
        if let Some(value) = read_env("SHOPBOT_MESSENGER_VERIFY_TOKEN") {
            self.messenger.verify_token = secret_value(value);
        }
        if let Some(value) = read_env("SHOPBOT_MESSENGER_API_BASE_URL") {
            self.messenger.api_base_url = value;
        }
        if let Some(value) = read_env("SHOPBOT_MESSENGER_SEND_TIMEOUT_SECS") {
            self.messenger.send_timeout_secs =
                parse_u64("SHOPBOT_MESSENGER_SEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHOPBOT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOPBOT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SHOPBOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SHOPBOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SHOPBOT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPBOT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SHOPBOT_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SHOPBOT_PAYMENT_ENABLED") {
            self.payment.enabled = parse_bool("SHOPBOT_PAYMENT_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SHOPBOT_PAYMENT_API_BASE_URL") {
            self.payment.api_base_url = Some(value);
        }
        if let Some(value) = read_env("SHOPBOT_PAYMENT_MERCHANT_ID") {
            self.payment.merchant_id = Some(value);
        }
        if let Some(value) = read_env("SHOPBOT_PAYMENT_API_KEY") {
            self.payment.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("SHOPBOT_SHEETS_API_BASE_URL") {
            self.sheets.api_base_url = value;
        }
        if let Some(value) = read_env("SHOPBOT_SHEETS_API_KEY") {
            self.sheets.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SHOPBOT_SHEETS_SYNC_COOLDOWN_SECS") {
            self.sheets.sync_cooldown_secs =
                parse_u64("SHOPBOT_SHEETS_SYNC_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("SHOPBOT_SHEETS_WRITE_FEEDBACK") {
            self.sheets.write_feedback = parse_bool("SHOPBOT_SHEETS_WRITE_FEEDBACK", &value)?;
        }

        if let Some(value) = read_env("SHOPBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SHOPBOT_SERVER_PORT") {
            self.server.port = parse_u16("SHOPBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SHOPBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SHOPBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SHOPBOT_LOGGING_LEVEL").or_else(|| read_env("SHOPBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHOPBOT_LOGGING_FORMAT").or_else(|| read_env("SHOPBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(page_access_token) = overrides.page_access_token {
            self.messenger.page_access_token = secret_value(page_access_token);
        }
        if let Some(verify_token) = overrides.verify_token {
            self.messenger.verify_token = secret_value(verify_token);
        }
        if let Some(payment_enabled) = overrides.payment_enabled {
            self.payment.enabled = payment_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_messenger(&self.messenger)?;
        validate_llm(&self.llm)?;
        validate_payment(&self.payment)?;
        validate_sheets(&self.sheets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shopbot.toml"), PathBuf::from("config/shopbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_messenger(messenger: &MessengerConfig) -> Result<(), ConfigError> {
    if messenger.page_access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "messenger.page_access_token is required. Get it from your page's Messenger platform settings".to_string(),
        ));
    }
    if messenger.verify_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "messenger.verify_token is required. It must match the webhook verify token registered with the platform".to_string(),
        ));
    }
    if !messenger.api_base_url.starts_with("http://")
        && !messenger.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "messenger.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    if messenger.send_timeout_secs == 0 || messenger.send_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "messenger.send_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let missing = llm
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    Ok(())
}

fn validate_payment(payment: &PaymentConfig) -> Result<(), ConfigError> {
    if payment.enabled {
        if payment.merchant_id.as_deref().map(str::trim).map_or(true, str::is_empty) {
            return Err(ConfigError::Validation(
                "payment.enabled is true but payment.merchant_id is missing".to_string(),
            ));
        }
        let has_key = payment
            .api_key
            .as_ref()
            .map(|value| !value.expose_secret().trim().is_empty())
            .unwrap_or(false);
        if !has_key {
            return Err(ConfigError::Validation(
                "payment.enabled is true but payment.api_key is missing".to_string(),
            ));
        }
    }

    if let Some(base_url) = &payment.api_base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "payment.api_base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if !sheets.api_base_url.starts_with("http://") && !sheets.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "sheets.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if sheets.sync_cooldown_secs == 0 || sheets.sync_cooldown_secs > 3600 {
        return Err(ConfigError::Validation(
            "sheets.sync_cooldown_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    messenger: Option<MessengerPatch>,
    llm: Option<LlmPatch>,
    payment: Option<PaymentPatch>,
    sheets: Option<SheetsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessengerPatch {
    page_access_token: Option<String>,
    verify_token: Option<String>,
    api_base_url: Option<String>,
    send_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentPatch {
    enabled: Option<bool>,
    api_base_url: Option<String>,
    merchant_id: Option<String>,
    api_key: Option<String>,
    invoice_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    api_base_url: Option<String>,
    api_key: Option<String>,
    sync_cooldown_secs: Option<u64>,
    write_feedback: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
