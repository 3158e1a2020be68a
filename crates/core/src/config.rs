use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::PricingPolicy;
use crate::shipping::{FeeLadder, FeeTier};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub payments: PaymentsConfig,
    pub shipping: ShippingConfig,
    pub pricing: PricingPolicy,
    pub sessions: SessionsConfig,
    pub business_hours: BusinessHoursConfig,
    pub catalog: CatalogConfig,
    pub receipts: ReceiptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Messaging gateway. Without `api_url` outbound messages are only logged.
#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub api_url: Option<String>,
    pub token: Option<SecretString>,
    pub admin_numbers: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PaymentsConfig {
    pub api_url: String,
    pub access_token: Option<SecretString>,
    pub notification_url: Option<String>,
    pub payer_email: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ShippingConfig {
    pub postal_lookup_url: String,
    pub distance_url: String,
    pub api_key: Option<SecretString>,
    pub origin: String,
    pub tiers: Vec<FeeTier>,
    pub contingency_fee: Option<Decimal>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub inactivity_timeout_secs: u64,
}

/// Opening window in local time. Weekdays are ISO numbers, 1 = Monday.
#[derive(Clone, Debug)]
pub struct BusinessHoursConfig {
    pub enabled: bool,
    pub utc_offset_hours: i32,
    pub open_hour: u32,
    pub close_hour: u32,
    pub weekdays: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub business_name: String,
}

#[derive(Clone, Debug)]
pub struct ReceiptsConfig {
    pub enabled: bool,
    pub converter: String,
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
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub catalog_path: Option<PathBuf>,
    pub whatsapp_api_url: Option<String>,
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
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            whatsapp: WhatsAppConfig {
                api_url: None,
                token: None,
                admin_numbers: Vec::new(),
                timeout_secs: 15,
            },
            payments: PaymentsConfig {
                api_url: "https://api.mercadopago.com".to_string(),
                access_token: None,
                notification_url: None,
                payer_email: "pedidos@marmita.local".to_string(),
                timeout_secs: 15,
            },
            shipping: ShippingConfig {
                postal_lookup_url: "https://viacep.com.br/ws".to_string(),
                distance_url: "https://maps.googleapis.com/maps/api/distancematrix/json"
                    .to_string(),
                api_key: None,
                origin: String::new(),
                tiers: FeeLadder::default().tiers().to_vec(),
                contingency_fee: None,
                timeout_secs: 10,
            },
            pricing: PricingPolicy::default(),
            sessions: SessionsConfig {
                idle_timeout_secs: 3_600,
                sweep_interval_secs: 60,
                inactivity_timeout_secs: 600,
            },
            business_hours: BusinessHoursConfig {
                enabled: true,
                utc_offset_hours: -3,
                open_hour: 10,
                close_hour: 15,
                weekdays: vec![1, 2, 3, 4, 5, 6],
            },
            catalog: CatalogConfig {
                path: PathBuf::from("config/catalog.toml"),
                business_name: "Marmitaria".to_string(),
            },
            receipts: ReceiptsConfig { enabled: true, converter: "wkhtmltopdf".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

impl ShippingConfig {
    pub fn ladder(&self) -> FeeLadder {
        FeeLadder::new(self.tiers.clone())
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("marmita.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(api_url) = whatsapp.api_url {
                self.whatsapp.api_url = Some(api_url);
            }
            if let Some(whatsapp_token_value) = whatsapp.token {
                self.whatsapp.token = Some(secret_value(whatsapp_token_value));
            }
            if let Some(admin_numbers) = whatsapp.admin_numbers {
                self.whatsapp.admin_numbers = admin_numbers;
            }
            if let Some(timeout_secs) = whatsapp.timeout_secs {
                self.whatsapp.timeout_secs = timeout_secs;
            }
        }

        if let Some(payments) = patch.payments {
            if let Some(api_url) = payments.api_url {
                self.payments.api_url = api_url;
            }
            if let Some(access_token_value) = payments.access_token {
                self.payments.access_token = Some(secret_value(access_token_value));
            }
            if let Some(notification_url) = payments.notification_url {
                self.payments.notification_url = Some(notification_url);
            }
            if let Some(payer_email) = payments.payer_email {
                self.payments.payer_email = payer_email;
            }
            if let Some(timeout_secs) = payments.timeout_secs {
                self.payments.timeout_secs = timeout_secs;
            }
        }

        if let Some(shipping) = patch.shipping {
            if let Some(postal_lookup_url) = shipping.postal_lookup_url {
                self.shipping.postal_lookup_url = postal_lookup_url;
            }
            if let Some(distance_url) = shipping.distance_url {
                self.shipping.distance_url = distance_url;
            }
            if let Some(api_key_value) = shipping.api_key {
                self.shipping.api_key = Some(secret_value(api_key_value));
            }
            if let Some(origin) = shipping.origin {
                self.shipping.origin = origin;
            }
            if let Some(tiers) = shipping.tiers {
                self.shipping.tiers = tiers;
            }
            if let Some(contingency_fee) = shipping.contingency_fee {
                self.shipping.contingency_fee = Some(contingency_fee);
            }
            if let Some(timeout_secs) = shipping.timeout_secs {
                self.shipping.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(standard_unit_price) = pricing.standard_unit_price {
                self.pricing.standard_unit_price = standard_unit_price;
            }
            if let Some(promotional_unit_price) = pricing.promotional_unit_price {
                self.pricing.promotional_unit_price = promotional_unit_price;
            }
            if let Some(bulk_threshold) = pricing.bulk_threshold {
                self.pricing.bulk_threshold = bulk_threshold;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(idle_timeout_secs) = sessions.idle_timeout_secs {
                self.sessions.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = sessions.sweep_interval_secs {
                self.sessions.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(inactivity_timeout_secs) = sessions.inactivity_timeout_secs {
                self.sessions.inactivity_timeout_secs = inactivity_timeout_secs;
            }
        }

        if let Some(hours) = patch.business_hours {
            if let Some(enabled) = hours.enabled {
                self.business_hours.enabled = enabled;
            }
            if let Some(utc_offset_hours) = hours.utc_offset_hours {
                self.business_hours.utc_offset_hours = utc_offset_hours;
            }
            if let Some(open_hour) = hours.open_hour {
                self.business_hours.open_hour = open_hour;
            }
            if let Some(close_hour) = hours.close_hour {
                self.business_hours.close_hour = close_hour;
            }
            if let Some(weekdays) = hours.weekdays {
                self.business_hours.weekdays = weekdays;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = path;
            }
            if let Some(business_name) = catalog.business_name {
                self.catalog.business_name = business_name;
            }
        }

        if let Some(receipts) = patch.receipts {
            if let Some(enabled) = receipts.enabled {
                self.receipts.enabled = enabled;
            }
            if let Some(converter) = receipts.converter {
                self.receipts.converter = converter;
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
        if let Some(value) = read_env("MARMITA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MARMITA_SERVER_PORT") {
            self.server.port = parse_u16("MARMITA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MARMITA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MARMITA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("MARMITA_WHATSAPP_API_URL") {
            self.whatsapp.api_url = Some(value);
        }
        if let Some(value) = read_env("MARMITA_WHATSAPP_TOKEN") {
            self.whatsapp.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("MARMITA_WHATSAPP_ADMIN_NUMBERS") {
            self.whatsapp.admin_numbers = value
                .split(',')
                .map(str::trim)
                .filter(|number| !number.is_empty())
                .map(str::to_owned)
                .collect();
        }

        if let Some(value) = read_env("MARMITA_PAYMENTS_API_URL") {
            self.payments.api_url = value;
        }
        if let Some(value) = read_env("MARMITA_PAYMENTS_ACCESS_TOKEN") {
            self.payments.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("MARMITA_PAYMENTS_NOTIFICATION_URL") {
            self.payments.notification_url = Some(value);
        }

        if let Some(value) = read_env("MARMITA_SHIPPING_API_KEY") {
            self.shipping.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MARMITA_SHIPPING_ORIGIN") {
            self.shipping.origin = value;
        }
        if let Some(value) = read_env("MARMITA_SHIPPING_CONTINGENCY_FEE") {
            self.shipping.contingency_fee =
                Some(parse_decimal("MARMITA_SHIPPING_CONTINGENCY_FEE", &value)?);
        }

        if let Some(value) = read_env("MARMITA_SESSIONS_IDLE_TIMEOUT_SECS") {
            self.sessions.idle_timeout_secs =
                parse_u64("MARMITA_SESSIONS_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MARMITA_SESSIONS_SWEEP_INTERVAL_SECS") {
            self.sessions.sweep_interval_secs =
                parse_u64("MARMITA_SESSIONS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("MARMITA_SESSIONS_INACTIVITY_TIMEOUT_SECS") {
            self.sessions.inactivity_timeout_secs =
                parse_u64("MARMITA_SESSIONS_INACTIVITY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MARMITA_BUSINESS_HOURS_ENABLED") {
            self.business_hours.enabled = parse_bool("MARMITA_BUSINESS_HOURS_ENABLED", &value)?;
        }

        if let Some(value) = read_env("MARMITA_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }

        let log_level =
            read_env("MARMITA_LOGGING_LEVEL").or_else(|| read_env("MARMITA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MARMITA_LOGGING_FORMAT").or_else(|| read_env("MARMITA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = catalog_path;
        }
        if let Some(api_url) = overrides.whatsapp_api_url {
            self.whatsapp.api_url = Some(api_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_payments(&self.payments)?;
        validate_shipping(&self.shipping)?;
        validate_pricing(&self.pricing)?;
        validate_sessions(&self.sessions)?;
        validate_business_hours(&self.business_hours)?;
        validate_catalog(&self.catalog)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("marmita.toml"), PathBuf::from("config/marmita.toml")]
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    if let Some(api_url) = &whatsapp.api_url {
        if !is_http_url(api_url) {
            return Err(ConfigError::Validation(
                "whatsapp.api_url must start with http:// or https://".to_string(),
            ));
        }
        let missing_token = whatsapp
            .token
            .as_ref()
            .map(|token| token.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_token {
            return Err(ConfigError::Validation(
                "whatsapp.token is required when whatsapp.api_url is set. Copy the client \
                 token from your gateway instance settings"
                    .to_string(),
            ));
        }
    }

    if whatsapp.timeout_secs == 0 || whatsapp.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "whatsapp.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_payments(payments: &PaymentsConfig) -> Result<(), ConfigError> {
    if !is_http_url(&payments.api_url) {
        return Err(ConfigError::Validation(
            "payments.api_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(notification_url) = &payments.notification_url {
        if !is_http_url(notification_url) {
            return Err(ConfigError::Validation(
                "payments.notification_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if !payments.payer_email.contains('@') {
        return Err(ConfigError::Validation(
            "payments.payer_email must be an email address".to_string(),
        ));
    }

    if payments.timeout_secs == 0 || payments.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "payments.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_shipping(shipping: &ShippingConfig) -> Result<(), ConfigError> {
    if !is_http_url(&shipping.postal_lookup_url) || !is_http_url(&shipping.distance_url) {
        return Err(ConfigError::Validation(
            "shipping.postal_lookup_url and shipping.distance_url must start with http:// or \
             https://"
                .to_string(),
        ));
    }

    if shipping.tiers.is_empty() {
        return Err(ConfigError::Validation(
            "shipping.tiers must list at least one `{ max_km, fee }` tier".to_string(),
        ));
    }

    let invalid_tier =
        shipping.tiers.iter().any(|tier| tier.max_km <= Decimal::ZERO || tier.fee.is_sign_negative());
    if invalid_tier {
        return Err(ConfigError::Validation(
            "shipping.tiers need a positive max_km and a non-negative fee".to_string(),
        ));
    }

    if shipping.contingency_fee.is_some_and(|fee| fee.is_sign_negative()) {
        return Err(ConfigError::Validation(
            "shipping.contingency_fee must not be negative".to_string(),
        ));
    }

    if shipping.timeout_secs == 0 || shipping.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "shipping.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingPolicy) -> Result<(), ConfigError> {
    if pricing.standard_unit_price <= Decimal::ZERO || pricing.promotional_unit_price <= Decimal::ZERO
    {
        return Err(ConfigError::Validation(
            "pricing.standard_unit_price and pricing.promotional_unit_price must be positive"
                .to_string(),
        ));
    }

    if pricing.promotional_unit_price > pricing.standard_unit_price {
        return Err(ConfigError::Validation(
            "pricing.promotional_unit_price must not exceed pricing.standard_unit_price"
                .to_string(),
        ));
    }

    if pricing.bulk_threshold == 0 {
        return Err(ConfigError::Validation(
            "pricing.bulk_threshold must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_sessions(sessions: &SessionsConfig) -> Result<(), ConfigError> {
    if sessions.idle_timeout_secs == 0
        || sessions.sweep_interval_secs == 0
        || sessions.inactivity_timeout_secs == 0
    {
        return Err(ConfigError::Validation(
            "sessions.idle_timeout_secs, sessions.sweep_interval_secs and \
             sessions.inactivity_timeout_secs must be greater than zero"
                .to_string(),
        ));
    }

    if sessions.sweep_interval_secs > sessions.idle_timeout_secs {
        return Err(ConfigError::Validation(
            "sessions.sweep_interval_secs must not exceed sessions.idle_timeout_secs".to_string(),
        ));
    }

    Ok(())
}

fn validate_business_hours(hours: &BusinessHoursConfig) -> Result<(), ConfigError> {
    if !(-12..=14).contains(&hours.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "business_hours.utc_offset_hours must be in range -12..=14".to_string(),
        ));
    }

    if hours.open_hour >= hours.close_hour || hours.close_hour > 24 {
        return Err(ConfigError::Validation(
            "business_hours.open_hour must be before business_hours.close_hour (0..=24)"
                .to_string(),
        ));
    }

    if hours.weekdays.is_empty() || hours.weekdays.iter().any(|day| !(1..=7).contains(day)) {
        return Err(ConfigError::Validation(
            "business_hours.weekdays must list ISO weekdays between 1 (Monday) and 7 (Sunday)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.path is required".to_string()));
    }

    if catalog.business_name.trim().is_empty() {
        return Err(ConfigError::Validation("catalog.business_name is required".to_string()));
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

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    whatsapp: Option<WhatsAppPatch>,
    payments: Option<PaymentsPatch>,
    shipping: Option<ShippingPatch>,
    pricing: Option<PricingPatch>,
    sessions: Option<SessionsPatch>,
    business_hours: Option<BusinessHoursPatch>,
    catalog: Option<CatalogPatch>,
    receipts: Option<ReceiptsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    api_url: Option<String>,
    token: Option<String>,
    admin_numbers: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentsPatch {
    api_url: Option<String>,
    access_token: Option<String>,
    notification_url: Option<String>,
    payer_email: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ShippingPatch {
    postal_lookup_url: Option<String>,
    distance_url: Option<String>,
    api_key: Option<String>,
    origin: Option<String>,
    tiers: Option<Vec<FeeTier>>,
    contingency_fee: Option<Decimal>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    standard_unit_price: Option<Decimal>,
    promotional_unit_price: Option<Decimal>,
    bulk_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    inactivity_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BusinessHoursPatch {
    enabled: Option<bool>,
    utc_offset_hours: Option<i32>,
    open_hour: Option<u32>,
    close_hour: Option<u32>,
    weekdays: Option<Vec<u32>>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    business_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReceiptsPatch {
    enabled: Option<bool>,
    converter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
