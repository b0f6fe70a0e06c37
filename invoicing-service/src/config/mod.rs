use serde::Deserialize;
use service_core::config as core_config;
use service_core::config::get_env;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub smtp: SmtpConfig,
    pub fx: FxConfig,
    pub auth: AuthConfig,
    pub issuer: IssuerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for verifying bearer tokens minted by the auth service.
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
    pub connect_timeout_secs: u64,
    pub greeting_timeout_secs: u64,
    pub socket_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FxConfig {
    /// Rate source returning `{ "rates": { "USD": 0.012, ... } }` relative
    /// to the base currency.
    pub rates_url: String,
    pub ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuerConfig {
    pub name: String,
    pub company_name: Option<String>,
    pub email: String,
    /// Optional PNG logo rendered on invoice documents.
    pub logo_path: Option<String>,
}

impl InvoicingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(InvoicingConfig {
            common,
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some(""), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some(""), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Invoice Studio"), is_prod)?,
                enabled: env::var("SMTP_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                connect_timeout_secs: parse_env_u64("SMTP_CONNECT_TIMEOUT_SECS", 20),
                greeting_timeout_secs: parse_env_u64("SMTP_GREETING_TIMEOUT_SECS", 20),
                socket_timeout_secs: parse_env_u64("SMTP_SOCKET_TIMEOUT_SECS", 30),
            },
            fx: FxConfig {
                rates_url: get_env(
                    "FX_RATES_URL",
                    Some("https://open.er-api.com/v6/latest/INR"),
                    is_prod,
                )?,
                ttl_secs: parse_env_u64("FX_TTL_SECS", 3600),
                request_timeout_secs: parse_env_u64("FX_REQUEST_TIMEOUT_SECS", 10),
                enabled: env::var("FX_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            auth: AuthConfig {
                jwt_secret: get_env("JWT_SECRET", Some("dev-secret"), is_prod)?,
            },
            issuer: IssuerConfig {
                name: get_env("ISSUER_NAME", Some("Invoice Studio"), is_prod)?,
                company_name: env::var("ISSUER_COMPANY_NAME").ok(),
                email: get_env("ISSUER_EMAIL", Some("billing@example.com"), is_prod)?,
                logo_path: env::var("ISSUER_LOGO_PATH").ok(),
            },
        })
    }
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
