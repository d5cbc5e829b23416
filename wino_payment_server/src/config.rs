use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use indexer_tools::IndexerConfig;
use log::*;
use wino_payment_engine::invoice_objects::{
    InvoiceOptions,
    MatchRules,
    DEFAULT_AMOUNT_TOLERANCE,
    DEFAULT_CLOCK_SKEW_GUARD_SECONDS,
    DEFAULT_INVOICE_TTL_SECONDS,
    DEFAULT_MATCHING_KEY_ATTEMPTS,
    DEFAULT_POLL_BUDGET_MS,
};
use wpg_common::{
    helpers::{parse_boolean_flag, parse_integer},
    Secret,
    TokenAmount,
    DEFAULT_TOKEN_DECIMALS,
};

const DEFAULT_WPG_HOST: &str = "127.0.0.1";
const DEFAULT_WPG_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/wino_store.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub webhook: WebhookAuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address. Only enable this behind a trusted proxy.
    pub use_x_forwarded_for: bool,
    pub invoice_options: InvoiceOptions,
    pub match_rules: MatchRules,
    /// Hard time budget for the ledger lookup of a status poll
    pub poll_budget: StdDuration,
    pub indexer: IndexerConfig,
    /// If set, only token transfers of this mint are treated as payments
    pub payment_mint: Option<String>,
    pub token_decimals: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WPG_HOST.to_string(),
            port: DEFAULT_WPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            webhook: WebhookAuthConfig::default(),
            use_x_forwarded_for: false,
            invoice_options: InvoiceOptions::default(),
            match_rules: MatchRules::default(),
            poll_budget: StdDuration::from_millis(DEFAULT_POLL_BUDGET_MS),
            indexer: IndexerConfig::default(),
            payment_mint: None,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WPG_HOST").ok().unwrap_or_else(|| DEFAULT_WPG_HOST.into());
        let port = env_integer("WPG_PORT", DEFAULT_WPG_PORT);
        let database_url = env::var("WPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ WPG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let webhook = WebhookAuthConfig::from_env();
        let use_x_forwarded_for = parse_boolean_flag(env::var("WPG_USE_X_FORWARDED_FOR").ok(), false);
        let invoice_options = configure_invoice_options();
        let match_rules = configure_match_rules();
        let poll_budget = StdDuration::from_millis(env_positive("WPG_POLL_BUDGET_MS", DEFAULT_POLL_BUDGET_MS));
        let indexer = IndexerConfig::new_from_env_or_default();
        let payment_mint = env::var("WPG_PAYMENT_MINT").ok().filter(|s| !s.trim().is_empty());
        if payment_mint.is_none() {
            warn!("🪛️ WPG_PAYMENT_MINT is not set. Transfers of any token will be considered as payments.");
        }
        let token_decimals = env_integer("WPG_TOKEN_DECIMALS", DEFAULT_TOKEN_DECIMALS);
        Self {
            host,
            port,
            database_url,
            webhook,
            use_x_forwarded_for,
            invoice_options,
            match_rules,
            poll_budget,
            indexer,
            payment_mint,
            token_decimals,
        }
    }
}

fn configure_invoice_options() -> InvoiceOptions {
    let ttl = env_positive("WPG_INVOICE_TTL", DEFAULT_INVOICE_TTL_SECONDS);
    let attempts = env_positive("WPG_MATCHING_KEY_ATTEMPTS", DEFAULT_MATCHING_KEY_ATTEMPTS);
    let default_ttl = Duration::try_seconds(ttl).unwrap_or_else(|| {
        error!("🪛️ WPG_INVOICE_TTL of {ttl}s is out of range. Using the default instead.");
        Duration::seconds(DEFAULT_INVOICE_TTL_SECONDS)
    });
    InvoiceOptions { default_ttl, matching_key_attempts: attempts }
}

fn configure_match_rules() -> MatchRules {
    let guard = env_integer("WPG_CLOCK_SKEW_GUARD", DEFAULT_CLOCK_SKEW_GUARD_SECONDS).max(0);
    let tolerance = env_integer("WPG_AMOUNT_TOLERANCE", DEFAULT_AMOUNT_TOLERANCE).max(0);
    let guard = Duration::try_seconds(guard).unwrap_or_else(|| {
        error!("🪛️ WPG_CLOCK_SKEW_GUARD of {guard}s is out of range. Using the default instead.");
        Duration::seconds(DEFAULT_CLOCK_SKEW_GUARD_SECONDS)
    });
    MatchRules::default()
        .with_clock_skew_guard(guard)
        .with_amount_tolerance(TokenAmount::from(tolerance))
}

/// Reads an integer setting, logging and falling back to `default` if it is missing or malformed.
fn env_integer<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match parse_integer::<T>(env::var(name).ok()) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            error!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
            default
        },
        None => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// Like [`env_integer`], but zero and negative values are rejected too.
fn env_positive<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy + PartialOrd + Default,
    T::Err: Display,
{
    let value = env_integer(name, default);
    if value > T::default() {
        value
    } else {
        error!("🪛️ {name} must be positive. Using the default, {default}, instead.");
        default
    }
}

//-------------------------------------------------  WebhookAuthConfig  ------------------------------------------------
/// The shared secret the indexer presents when it delivers transfers.
#[derive(Clone, Debug, Default)]
pub struct WebhookAuthConfig {
    pub secret: Option<Secret<String>>,
}

impl WebhookAuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { secret: Some(Secret::new(secret.to_string())) }
    }

    pub fn from_env() -> Self {
        let secret = env::var("WPG_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if secret.is_none() {
            error!(
                "🪛️ WPG_WEBHOOK_SECRET is not set. The transfer webhook will reject every delivery until it is \
                 configured."
            );
        }
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.as_ref().is_some_and(|s| !s.is_empty())
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub payment_mint: Option<String>,
    pub token_decimals: u8,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { use_x_forwarded_for: false, payment_mint: None, token_decimals: DEFAULT_TOKEN_DECIMALS }
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            payment_mint: config.payment_mint.clone(),
            token_decimals: config.token_decimals,
        }
    }
}
