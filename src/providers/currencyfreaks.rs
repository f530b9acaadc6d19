use super::util::{RETRY_DELAY_MS, with_retry};
use crate::core::config::ProviderConfig;
use crate::core::provider::RateProvider;
use crate::core::rates::{DATE_FORMAT, RateParsing, RateSnapshot, parse_rate, parse_upstream_date};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Base currency of every upstream snapshot.
pub const UPSTREAM_BASE: &str = "USD";

const BODY_EXCERPT_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    rates: HashMap<String, serde_json::Value>,
}

/// Client for currencyfreaks-style `latest` and `historical` rate endpoints.
pub struct CurrencyFreaksProvider {
    latest_url: String,
    historical_url: String,
    api_key: String,
    retries: usize,
    rate_parsing: RateParsing,
    client: reqwest::Client,
}

impl CurrencyFreaksProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing upstream API key"))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("ratekeeper/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            latest_url: config.latest_url.clone(),
            historical_url: config.historical_url.clone(),
            api_key,
            retries: config.retries,
            rate_parsing: config.rate_parsing,
            client,
        })
    }

    async fn request(
        &self,
        url: &str,
        currencies: &[String],
        date: Option<NaiveDate>,
    ) -> Result<reqwest::Response> {
        let symbols = currencies.join(",");
        let mut params = vec![("apikey", self.api_key.clone()), ("symbols", symbols)];
        if let Some(date) = date {
            params.push(("date", date.format(DATE_FORMAT).to_string()));
        }
        // The query carries the API key, so only the bare URL is logged.
        debug!(url, symbols = %params[1].1, ?date, "Requesting rates");

        with_retry(
            "Rates request",
            || self.client.get(url).query(&params).send(),
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Request error for {url}"))
    }

    /// Turns an upstream body into a snapshot. A missing or unreadable date
    /// falls back to `fallback_date`.
    pub fn parse_response(&self, body: &str, fallback_date: NaiveDate) -> Result<RateSnapshot> {
        let response: RatesResponse = serde_json::from_str(body).with_context(|| {
            debug!(body, "Unparsable rates response");
            format!("Failed to parse rates response: '{}'", body_excerpt(body))
        })?;

        let date = response
            .date
            .as_deref()
            .and_then(parse_upstream_date)
            .unwrap_or_else(|| {
                debug!(raw = ?response.date, %fallback_date, "Unreadable upstream date");
                fallback_date
            });

        let rates = response
            .rates
            .iter()
            .map(|(currency, raw)| {
                parse_rate(currency, raw, self.rate_parsing).map(|r| (currency.to_uppercase(), r))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(RateSnapshot::new(
            date,
            response
                .base
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| UPSTREAM_BASE.to_string()),
            rates,
        ))
    }
}

/// Leading part of an upstream body, short enough for an error message.
fn body_excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    format!("{head}...")
}

#[async_trait]
impl RateProvider for CurrencyFreaksProvider {
    #[instrument(name = "FetchLatest", skip(self))]
    async fn fetch_latest(&self, currencies: &[String]) -> Result<RateSnapshot> {
        let response = self.request(&self.latest_url, currencies, None).await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} for latest rates", response.status()));
        }

        let body = response
            .text()
            .await
            .context("Failed to get response text for latest rates")?;
        self.parse_response(&body, Utc::now().date_naive())
    }

    #[instrument(name = "FetchForDate", skip(self))]
    async fn fetch_for_date(&self, currencies: &[String], date: NaiveDate) -> Result<RateSnapshot> {
        let response = self
            .request(&self.historical_url, currencies, Some(date))
            .await?;

        // Historical data depends on the subscription plan; a refusal means
        // there is nothing for this date.
        if !response.status().is_success() {
            warn!(status = %response.status(), %date, "Historical rates unavailable");
            return Ok(RateSnapshot::empty(date, UPSTREAM_BASE));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for {date}"))?;
        if body.trim().is_empty() {
            return Ok(RateSnapshot::empty(date, UPSTREAM_BASE));
        }
        self.parse_response(&body, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LATEST_JSON: &str = r#"{"date":"2024-04-29 12:34:56+00","base":"USD","rates":{"RON":"4.648225","EUR":"0.9340084415835656","USD":"1.0","UAH":"39.65869122539661"}}"#;

    fn currencies() -> Vec<String> {
        ["USD", "UAH", "EUR", "RON"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn provider_for(server: &MockServer, rate_parsing: RateParsing) -> CurrencyFreaksProvider {
        CurrencyFreaksProvider::new(&ProviderConfig {
            latest_url: format!("{}/latest", server.uri()),
            historical_url: format!("{}/historical", server.uri()),
            api_key: Some("test-key".to_string()),
            retries: 0,
            timeout_secs: 5,
            rate_parsing,
        })
        .unwrap()
    }

    async fn mount(server: &MockServer, endpoint: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_latest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("apikey", "test-key"))
            .and(query_param("symbols", "USD,UAH,EUR,RON"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LATEST_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let snapshot = provider.fetch_latest(&currencies()).await.unwrap();

        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
        assert_eq!(snapshot.base, "USD");
        assert_eq!(snapshot.rates.len(), 4);
        assert_eq!(snapshot.rate("USD"), Some(1.0));
        assert_eq!(snapshot.rate("UAH"), Some(39.65869122539661));
        assert_eq!(snapshot.rate("EUR"), Some(0.9340084415835656));
        assert_eq!(snapshot.rate("RON"), Some(4.648225));
    }

    #[tokio::test]
    async fn test_fetch_for_date_sends_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/historical"))
            .and(query_param("date", "2024-04-20"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"date":"2024-04-20","base":"USD","rates":{"UAH":"39.4"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let date = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let snapshot = provider.fetch_for_date(&currencies(), date).await.unwrap();

        assert_eq!(snapshot.date, date);
        assert_eq!(snapshot.rate("UAH"), Some(39.4));
    }

    #[tokio::test]
    async fn test_historical_refusal_is_empty_snapshot() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/historical",
            ResponseTemplate::new(403)
                .set_body_string(r#"{"success":false,"error":{"message":"upgrade your plan"}}"#),
        )
        .await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let date = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let snapshot = provider.fetch_for_date(&currencies(), date).await.unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.date, date);
    }

    #[tokio::test]
    async fn test_historical_without_rates_is_empty_snapshot() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/historical",
            ResponseTemplate::new(200).set_body_string(r#"{"date":"2024-04-20 00:00:00+00"}"#),
        )
        .await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let date = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let snapshot = provider.fetch_for_date(&currencies(), date).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_latest_error_status() {
        let server = MockServer::start().await;
        mount(&server, "/latest", ResponseTemplate::new(500)).await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let result = provider.fetch_latest(&currencies()).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for latest rates"
        );
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/latest",
            ResponseTemplate::new(200).set_body_string(&LATEST_JSON[..LATEST_JSON.len() - 2]),
        )
        .await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let result = provider.fetch_latest(&currencies()).await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse rates response")
        );
    }

    #[tokio::test]
    async fn test_unparsable_rate_policies() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/latest",
            ResponseTemplate::new(200).set_body_string(
                r#"{"date":"2024-04-29 12:34:56+00","base":"USD","rates":{"UAH":"39.6","EUR":"oops"}}"#,
            ),
        )
        .await;

        let lenient = provider_for(&server, RateParsing::Lenient);
        let snapshot = lenient.fetch_latest(&currencies()).await.unwrap();
        assert_eq!(snapshot.rate("UAH"), Some(39.6));
        assert_eq!(snapshot.rate("EUR"), Some(0.0));

        let strict = provider_for(&server, RateParsing::Strict);
        let err = strict.fetch_latest(&currencies()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid rate for EUR"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = CurrencyFreaksProvider::new(&ProviderConfig {
            latest_url: format!("http://{addr}/latest"),
            historical_url: format!("http://{addr}/historical"),
            api_key: Some("test-key".to_string()),
            retries: 1,
            timeout_secs: 5,
            rate_parsing: RateParsing::Lenient,
        })
        .unwrap();

        let err = provider.fetch_latest(&currencies()).await.unwrap_err();
        assert!(err.to_string().contains("Request error"));
        assert!(err.downcast_ref::<reqwest::Error>().is_some_and(|e| e.is_connect()));

        let date = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
        let err = provider.fetch_for_date(&currencies(), date).await.unwrap_err();
        assert!(err.to_string().contains("Request error"));
    }

    #[tokio::test]
    async fn test_parse_error_does_not_echo_whole_body() {
        let server = MockServer::start().await;
        let body = format!("<html>{}secret-tail</html>", "x".repeat(500));
        mount(&server, "/latest", ResponseTemplate::new(200).set_body_string(body)).await;

        let provider = provider_for(&server, RateParsing::Lenient);
        let err = provider.fetch_latest(&currencies()).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to parse rates response"));
        assert!(message.contains("<html>"));
        assert!(!message.contains("secret-tail"));
    }

    #[test]
    fn test_missing_api_key() {
        let result = CurrencyFreaksProvider::new(&ProviderConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_parse_response_without_date_uses_fallback() {
        let server = MockServer::start().await;
        let provider = provider_for(&server, RateParsing::Lenient);
        let fallback = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let snapshot = provider
            .parse_response(r#"{"rates":{"uah":"39.0"}}"#, fallback)
            .unwrap();
        assert_eq!(snapshot.date, fallback);
        assert_eq!(snapshot.base, "USD");
        assert_eq!(snapshot.rate("UAH"), Some(39.0));
    }
}
