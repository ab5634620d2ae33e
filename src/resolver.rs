//! Offset resolution against the remote time service.
//!
//! Provides the [`OffsetResolver`] trait the clock runtime consumes, and
//! [`HttpOffsetResolver`], which speaks the worldtimeapi.org JSON dialect:
//!
//! - `GET {base}/timezone` returns a JSON array of zone names
//! - `GET {base}/timezone/{id}` returns an object with at least `utc_offset`
//!   (`±HH:MM`) and `utc_datetime` (RFC 3339) or `unixtime` (seconds)
//!
//! Responses are untrusted. Anything malformed fails with
//! [`ResolveError::InvalidResponse`] instead of falling back to a default.

use crate::config::ClockConfig;
use crate::offset::UtcOffset;
use crate::sample::{OffsetSample, TimezoneId};
use crate::time::{TimeInstant, TimeSource, TokioTimeSource};
use chrono::{DateTime, Utc};
use core::future::Future;
use core::time::Duration;
use serde::Deserialize;

/// Errors produced while resolving an offset. Neither is fatal to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Transport failure, non-success status or timeout.
    Network(String),

    /// The service answered, but not with a usable offset and instant.
    InvalidResponse(String),
}

impl core::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ResolveError::Network(reason) => write!(f, "network error: {}", reason),
            ResolveError::InvalidResponse(reason) => write!(f, "invalid response: {}", reason),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ResolveError::InvalidResponse(err.to_string())
        } else {
            ResolveError::Network(err.to_string())
        }
    }
}

/// Source of authoritative offsets for the clock.
///
/// Implementations must not touch clock state; they only answer questions
/// about the remote service. Dropping the returned future cancels the call.
pub trait OffsetResolver<I: TimeInstant>: Send + Sync + 'static {
    /// Fetches the current offset and instant for `timezone`.
    fn fetch_offset(
        &self,
        timezone: &TimezoneId,
    ) -> impl Future<Output = Result<OffsetSample<I>, ResolveError>> + Send;

    /// Lists the zones the service accepts.
    fn list_timezones(&self) -> impl Future<Output = Result<Vec<TimezoneId>, ResolveError>> + Send;
}

/// Wire shape of `GET /timezone/{id}`. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TimezoneResponse {
    utc_offset: Option<String>,
    utc_datetime: Option<String>,
    unixtime: Option<i64>,
}

/// Turns a `GET /timezone/{id}` body into a sample stamped with `local_now`.
pub fn parse_timezone_response<I: TimeInstant>(
    timezone: &TimezoneId,
    body: &[u8],
    local_now: I,
) -> Result<OffsetSample<I>, ResolveError> {
    let response: TimezoneResponse = serde_json::from_slice(body)
        .map_err(|e| ResolveError::InvalidResponse(format!("malformed JSON: {}", e)))?;

    let offset_text = response
        .utc_offset
        .ok_or_else(|| ResolveError::InvalidResponse("missing utc_offset".into()))?;
    let utc_offset = UtcOffset::parse(&offset_text).map_err(|e| {
        ResolveError::InvalidResponse(format!("utc_offset {:?}: {}", offset_text, e))
    })?;

    let remote_instant = remote_instant(response.utc_datetime.as_deref(), response.unixtime)?;

    Ok(OffsetSample {
        timezone: timezone.clone(),
        utc_offset,
        remote_instant,
        local_instant_at_fetch: local_now,
    })
}

fn remote_instant(
    utc_datetime: Option<&str>,
    unixtime: Option<i64>,
) -> Result<DateTime<Utc>, ResolveError> {
    if let Some(text) = utc_datetime {
        return DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ResolveError::InvalidResponse(format!("utc_datetime {:?}: {}", text, e)));
    }

    match unixtime {
        Some(secs) => DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            ResolveError::InvalidResponse(format!("unixtime {} out of range", secs))
        }),
        None => Err(ResolveError::InvalidResponse(
            "missing utc_datetime and unixtime".into(),
        )),
    }
}

/// Turns a `GET /timezone` body into zone identifiers.
///
/// Entries that are not valid identifiers make the whole listing invalid.
pub fn parse_timezone_list(body: &[u8]) -> Result<Vec<TimezoneId>, ResolveError> {
    let names: Vec<String> = serde_json::from_slice(body)
        .map_err(|e| ResolveError::InvalidResponse(format!("malformed JSON: {}", e)))?;

    names
        .into_iter()
        .map(|name| TimezoneId::new(name).map_err(|e| ResolveError::InvalidResponse(e.to_string())))
        .collect()
}

/// [`OffsetResolver`] backed by HTTP.
///
/// Every request carries its own timeout, which configuration keeps shorter
/// than the resync cadence.
#[derive(Debug, Clone)]
pub struct HttpOffsetResolver<T = TokioTimeSource> {
    client: reqwest::Client,
    base_url: String,
    time_source: T,
}

impl HttpOffsetResolver<TokioTimeSource> {
    /// Builds a resolver from clock configuration, reading tokio's clock.
    pub fn from_config(config: &ClockConfig) -> Result<Self, ResolveError> {
        Self::new(
            &config.base_url,
            config.request_timeout(),
            TokioTimeSource,
        )
    }
}

impl<T> HttpOffsetResolver<T> {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        time_source: T,
    ) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ResolveError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            time_source,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_body(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        tracing::debug!(url, "requesting time service");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Network(format!("{} returned {}", url, status)));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl<I, T> OffsetResolver<I> for HttpOffsetResolver<T>
where
    I: TimeInstant + Send + Sync + 'static,
    T: TimeSource<I> + Send + Sync + 'static,
{
    async fn fetch_offset(&self, timezone: &TimezoneId) -> Result<OffsetSample<I>, ResolveError> {
        let url = format!("{}/timezone/{}", self.base_url, timezone);
        let body = self.get_body(&url).await?;
        let local_now = self.time_source.now();
        parse_timezone_response(timezone, &body, local_now)
    }

    async fn list_timezones(&self) -> Result<Vec<TimezoneId>, ResolveError> {
        let url = format!("{}/timezone", self.base_url);
        let body = self.get_body(&url).await?;
        parse_timezone_list(&body)
    }
}
