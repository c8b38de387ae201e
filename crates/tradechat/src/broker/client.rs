use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::args::{CandlesArgs, HistoryArgs, PlaceOrderArgs, SearchAssetsArgs};
use super::error::BrokerError;

pub const FINAM_BASE_URL: &str = "https://api.finam.ru";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Http client for the Finam TradeAPI rest gateway
#[derive(Clone)]
pub struct FinamClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl FinamClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, BrokerError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Send one request and decode the json reply. A 2xx with an empty body
    /// becomes a plain success marker.
    pub async fn execute_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, BrokerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "broker request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", &self.access_token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let details = if bytes.is_empty() {
                None
            } else {
                Some(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }))
            };
            warn!(%method, path, status = status.as_u16(), "broker request failed");
            return Err(BrokerError::Http {
                status_code: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
                details,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(json!({"status": "success", "message": "Operation completed"}));
        }
        serde_json::from_slice(&bytes).map_err(|e| BrokerError::Decode(e.to_string()))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BrokerError> {
        self.execute_request(Method::GET, path, query, None).await
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/instruments/{}/quotes/latest", symbol), &[])
            .await
    }

    pub async fn get_orderbook(&self, symbol: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/instruments/{}/orderbook", symbol), &[])
            .await
    }

    pub async fn get_instrument_trades_latest(&self, symbol: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/instruments/{}/trades/latest", symbol), &[])
            .await
    }

    pub async fn get_candles(&self, args: &CandlesArgs) -> Result<Value, BrokerError> {
        let mut query = vec![("timeframe", args.timeframe.code().to_string())];
        query.extend(interval(&args.start, &args.end));
        self.get(&format!("/v1/instruments/{}/bars", args.symbol), &query)
            .await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/accounts/{}", account_id), &[]).await
    }

    pub async fn get_orders(&self, account_id: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/accounts/{}/orders", account_id), &[])
            .await
    }

    pub async fn get_order(&self, account_id: &str, order_id: &str) -> Result<Value, BrokerError> {
        self.get(
            &format!("/v1/accounts/{}/orders/{}", account_id, order_id),
            &[],
        )
        .await
    }

    pub async fn place_order(&self, args: &PlaceOrderArgs) -> Result<Value, BrokerError> {
        let payload =
            serde_json::to_value(args).map_err(|e| BrokerError::Decode(e.to_string()))?;
        self.execute_request(
            Method::POST,
            &format!("/v1/accounts/{}/orders", args.account_id),
            &[],
            Some(&payload),
        )
        .await
    }

    pub async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<Value, BrokerError> {
        self.execute_request(
            Method::DELETE,
            &format!("/v1/accounts/{}/orders/{}", account_id, order_id),
            &[],
            None,
        )
        .await
    }

    pub async fn get_trades(&self, args: &HistoryArgs) -> Result<Value, BrokerError> {
        self.get(
            &format!("/v1/accounts/{}/trades", args.account_id),
            &history_query(args),
        )
        .await
    }

    pub async fn get_transactions(&self, args: &HistoryArgs) -> Result<Value, BrokerError> {
        self.get(
            &format!("/v1/accounts/{}/transactions", args.account_id),
            &history_query(args),
        )
        .await
    }

    pub async fn get_session_details(&self) -> Result<Value, BrokerError> {
        let body = json!({"token": self.access_token});
        self.execute_request(Method::POST, "/v1/sessions/details", &[], Some(&body))
            .await
    }

    pub async fn get_exchanges(&self) -> Result<Value, BrokerError> {
        self.get("/v1/exchanges", &[]).await
    }

    pub async fn search_assets(&self, args: &SearchAssetsArgs) -> Result<Value, BrokerError> {
        let mut query = Vec::new();
        if let Some(ticker) = &args.ticker {
            query.push(("ticker", ticker.clone()));
        }
        if let Some(isin) = &args.isin {
            query.push(("isin", isin.clone()));
        }
        if let Some(mic) = &args.mic {
            query.push(("mic", mic.clone()));
        }
        if let Some(asset_type) = &args.asset_type {
            query.push(("type", asset_type.clone()));
        }
        if let Some(limit) = args.limit {
            query.push(("limit", limit.to_string()));
        }
        self.get("/v1/assets", &query).await
    }

    pub async fn get_asset(
        &self,
        symbol: &str,
        account_id: Option<&str>,
    ) -> Result<Value, BrokerError> {
        let query: Vec<_> = account_id
            .map(|id| ("account_id", id.to_string()))
            .into_iter()
            .collect();
        self.get(&format!("/v1/assets/{}", symbol), &query).await
    }

    pub async fn get_asset_params(
        &self,
        symbol: &str,
        account_id: &str,
    ) -> Result<Value, BrokerError> {
        self.get(
            &format!("/v1/assets/{}/params", symbol),
            &[("account_id", account_id.to_string())],
        )
        .await
    }

    pub async fn get_asset_schedule(&self, symbol: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/assets/{}/schedule", symbol), &[])
            .await
    }

    pub async fn get_asset_options(&self, symbol: &str) -> Result<Value, BrokerError> {
        self.get(&format!("/v1/assets/{}/options", symbol), &[])
            .await
    }
}

fn interval(start: &Option<String>, end: &Option<String>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(start) = start {
        query.push(("interval.start_time", start.clone()));
    }
    if let Some(end) = end {
        query.push(("interval.end_time", end.clone()));
    }
    query
}

fn history_query(args: &HistoryArgs) -> Vec<(&'static str, String)> {
    let mut query = interval(&args.start, &args.end);
    if let Some(limit) = args.limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::args::TimeFrame;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> FinamClient {
        FinamClient::new(server.uri(), "secret-token").unwrap()
    }

    #[tokio::test]
    async fn test_get_quote_sends_raw_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instruments/SBER@MISX/quotes/latest"))
            .and(header("Authorization", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "SBER@MISX",
                "quote": {"last": {"value": "300.50"}}
            })))
            .mount(&server)
            .await;

        let quote = client(&server).await.get_quote("SBER@MISX").await.unwrap();
        assert_eq!(quote["quote"]["last"]["value"], "300.50");
    }

    #[tokio::test]
    async fn test_get_candles_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instruments/GAZP@MISX/bars"))
            .and(query_param("timeframe", "12"))
            .and(query_param("interval.start_time", "2024-01-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bars": []})))
            .mount(&server)
            .await;

        let args = CandlesArgs {
            symbol: "GAZP@MISX".to_string(),
            timeframe: TimeFrame::H1,
            start: Some("2024-01-01T00:00:00Z".to_string()),
            end: None,
        };
        let bars = client(&server).await.get_candles(&args).await.unwrap();
        assert_eq!(bars, json!({"bars": []}));
    }

    #[tokio::test]
    async fn test_empty_body_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/accounts/A1/orders/42"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let reply = client(&server)
            .await
            .cancel_order("A1", "42")
            .await
            .unwrap();
        assert_eq!(
            reply,
            json!({"status": "success", "message": "Operation completed"})
        );
    }

    #[tokio::test]
    async fn test_place_order_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts/A1/orders"))
            .and(body_json(json!({
                "symbol": "SBER@MISX",
                "quantity": "1",
                "side": "long",
                "type": "ORDER_TYPE_MARKET"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order_id": "77"})))
            .mount(&server)
            .await;

        let args: PlaceOrderArgs = serde_json::from_value(json!({
            "account_id": "A1",
            "symbol": "SBER@MISX",
            "quantity": "1",
            "side": "long",
            "type": "ORDER_TYPE_MARKET"
        }))
        .unwrap();
        let reply = client(&server).await.place_order(&args).await.unwrap();
        assert_eq!(reply["order_id"], "77");
    }

    #[tokio::test]
    async fn test_http_error_keeps_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/accounts/A1"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).await.get_account("A1").await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.to_payload()["details"]["message"], "token expired");
    }

    #[tokio::test]
    async fn test_non_json_error_body_kept_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/exchanges"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server).await.get_exchanges().await.unwrap_err();
        assert_eq!(err.to_payload()["details"], "bad gateway");
        assert_eq!(err.kind(), "http");
    }
}
