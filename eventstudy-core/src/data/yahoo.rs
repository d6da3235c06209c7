//! Yahoo Finance data provider.
//!
//! Prices come from the v8 chart API, analyst actions from the v10
//! quoteSummary `upgradeDowngradeHistory` module. Retries with exponential
//! backoff on connection failures, timeouts, 429 and 5xx responses.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{
    within_period, MarketDataProvider, ProviderError, RawBar, RawRecommendation,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance v10 quoteSummary response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<SummaryModules>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    upgrade_downgrade_history: Option<UpgradeDowngradeHistory>,
}

#[derive(Debug, Deserialize)]
struct UpgradeDowngradeHistory {
    #[serde(default)]
    history: Vec<GradeChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeChange {
    epoch_grade_date: i64,
    #[serde(default)]
    firm: String,
    #[serde(default)]
    to_grade: String,
    #[serde(default)]
    from_grade: String,
    #[serde(default)]
    action: String,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
            + 86_399;
        format!(
            "{BASE_URL}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    fn summary_url(symbol: &str) -> String {
        format!("{BASE_URL}/v10/finance/quoteSummary/{symbol}?modules=upgradeDowngradeHistory")
    }

    fn api_error(symbol: &str, err: Option<ApiError>) -> ProviderError {
        match err {
            Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
        }
    }

    /// Parse the chart API response into RawBars.
    fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, ProviderError> {
        let ChartResult { result, error } = resp.chart;
        let result = result.ok_or_else(|| Self::api_error(symbol, error))?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Holidays come back as all-null rows
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                adj_close: adj_close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(bars)
    }

    /// Parse the quoteSummary response into raw recommendations, oldest first.
    fn parse_summary(
        symbol: &str,
        resp: SummaryResponse,
    ) -> Result<Vec<RawRecommendation>, ProviderError> {
        let SummaryResult { result, error } = resp.quote_summary;
        let result = result.ok_or_else(|| Self::api_error(symbol, error))?;

        let history = result
            .into_iter()
            .next()
            .and_then(|m| m.upgrade_downgrade_history)
            .map(|h| h.history)
            .unwrap_or_default();

        let mut recs = history
            .into_iter()
            .map(|g| {
                let timestamp = chrono::DateTime::from_timestamp(g.epoch_grade_date, 0)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| {
                        ProviderError::ResponseFormatChanged(format!(
                            "invalid grade timestamp: {}",
                            g.epoch_grade_date
                        ))
                    })?;
                Ok(RawRecommendation {
                    timestamp,
                    firm: g.firm,
                    to_grade: g.to_grade,
                    from_grade: g.from_grade,
                    action: g.action,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        recs.sort_by_key(|r| r.timestamp);
        Ok(recs)
    }

    /// GET a JSON document with retry.
    fn get_json<T: DeserializeOwned>(&self, symbol: &str, url: &str) -> Result<T, ProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(symbol, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(ProviderError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(ProviderError::AuthenticationRequired(format!(
                            "Yahoo Finance returned {status} for {symbol}"
                        )));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ProviderError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if status.is_server_error() {
                        last_error =
                            Some(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                    }

                    return resp.json::<T>().map_err(|e| {
                        ProviderError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(ProviderError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError> {
        let chart: ChartResponse = self.get_json(ticker, &Self::chart_url(ticker, start, end))?;
        Self::parse_chart(ticker, chart)
    }

    fn fetch_recommendations(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecommendation>, ProviderError> {
        let summary: SummaryResponse = self.get_json(ticker, &Self::summary_url(ticker))?;
        let recs = Self::parse_summary(ticker, summary)?;
        Ok(within_period(recs, start, end))
    }
}
