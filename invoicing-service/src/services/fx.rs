//! Exchange rates relative to the base currency.
//!
//! Rates come from an external source and are cached with a TTL. The cache is
//! the only cross-request mutable state in the service: one caller refreshes a
//! stale table while everyone else keeps reading the previous one
//! (stale-while-revalidate).

use crate::services::totals::SUPPORTED_CURRENCIES;
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Invoices are authored and stored in INR; every rate is INR -> target.
pub const BASE_CURRENCY: &str = "INR";

/// Uppercase and validate a currency code against the supported set.
pub fn normalize_currency_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_uppercase();
    let code = if code.is_empty() {
        BASE_CURRENCY.to_string()
    } else {
        code
    };
    if SUPPORTED_CURRENCIES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(AppError::UnsupportedCurrency(code))
    }
}

/// Where rate tables come from.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self) -> Result<HashMap<String, Decimal>, AppError>;
}

/// Fetches a base-relative rate table over HTTP.
///
/// Expects a JSON body with a `rates` object mapping currency code to the
/// INR -> target multiplier.
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[derive(serde::Deserialize)]
struct RatesPayload {
    rates: HashMap<String, serde_json::Value>,
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self) -> Result<HashMap<String, Decimal>, AppError> {
        let payload: RatesPayload = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::RateUnavailable(format!("rate fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::RateUnavailable(format!("rate source error: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::RateUnavailable(format!("malformed rate payload: {}", e)))?;

        let rates = payload
            .rates
            .iter()
            .filter_map(|(code, value)| {
                let rate = crate::models::coerce_decimal(value);
                (rate > Decimal::ZERO).then(|| (code.to_uppercase(), rate))
            })
            .collect();
        Ok(rates)
    }
}

/// Fixed rate table. Used in tests and when live rates are disabled.
pub struct StaticRateSource {
    rates: HashMap<String, Decimal>,
    fail: bool,
}

impl StaticRateSource {
    pub fn new(rates: HashMap<String, Decimal>) -> Self {
        Self { rates, fail: false }
    }

    /// A source whose every fetch fails. Exercises the stale-fallback path.
    pub fn failing() -> Self {
        Self {
            rates: HashMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    async fn fetch(&self) -> Result<HashMap<String, Decimal>, AppError> {
        if self.fail {
            return Err(AppError::RateUnavailable("static source failure".to_string()));
        }
        Ok(self.rates.clone())
    }
}

struct RateTable {
    rates: HashMap<String, Decimal>,
    fetched_at: Instant,
}

/// Releases the refresh slot on drop, so a caller cancelled mid-fetch can
/// never wedge the cache with the flag stuck on.
struct RefreshSlot<'a>(&'a AtomicBool);

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// TTL cache over a [`RateSource`].
pub struct FxCache {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    table: RwLock<Option<RateTable>>,
    refreshing: AtomicBool,
}

impl FxCache {
    pub fn new(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            table: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// INR -> `target` multiplier.
    ///
    /// The base currency is exactly 1 with no lookup. A stale table is served
    /// while a refresh is in flight or failing; `RateUnavailable` is returned
    /// only when no table has ever been cached.
    pub async fn get_rate(&self, target: &str) -> Result<Decimal, AppError> {
        let code = normalize_currency_code(target)?;
        if code == BASE_CURRENCY {
            return Ok(Decimal::ONE);
        }

        let rates = self.current_rates().await?;
        rates
            .get(&code)
            .copied()
            .ok_or_else(|| AppError::RateUnavailable(format!("no rate cached for {}", code)))
    }

    async fn current_rates(&self) -> Result<HashMap<String, Decimal>, AppError> {
        let stale = {
            let guard = self.table.read().await;
            match guard.as_ref() {
                Some(table) if table.fetched_at.elapsed() < self.ttl => {
                    return Ok(table.rates.clone());
                }
                Some(table) => Some(table.rates.clone()),
                None => None,
            }
        };

        // Only one caller refreshes; the rest keep the stale table so reads
        // never block on a refresh they didn't trigger.
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return match stale {
                Some(rates) => Ok(rates),
                // Cold cache with a refresh already in flight elsewhere.
                None => Err(AppError::RateUnavailable(
                    "rate table not yet populated".to_string(),
                )),
            };
        }
        let _slot = RefreshSlot(&self.refreshing);

        match self.source.fetch().await {
            Ok(rates) => {
                info!(currencies = rates.len(), "Exchange rate table refreshed");
                let mut guard = self.table.write().await;
                *guard = Some(RateTable {
                    rates: rates.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(rates)
            }
            Err(e) => match stale {
                Some(rates) => {
                    warn!(error = %e, "Rate refresh failed, serving stale table");
                    Ok(rates)
                }
                None => Err(e),
            },
        }
    }
}
