use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::ToolProvider;
use crate::broker::args::{
    check_path_segment, AccountArgs, AssetArgs, AssetParamsArgs, CandlesArgs, HistoryArgs,
    OrderArgs, PlaceOrderArgs, SearchAssetsArgs, SymbolArgs,
};
use crate::broker::FinamClient;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Broker operations exposed as tools, run in-process against the Finam api
pub struct BrokerTools {
    client: FinamClient,
    tools: Vec<Tool>,
}

impl BrokerTools {
    pub fn new(client: FinamClient) -> Self {
        Self {
            client,
            tools: broker_tool_definitions(),
        }
    }
}

fn parse<T: DeserializeOwned>(tool_call: &ToolCall) -> AgentResult<T> {
    serde_json::from_value(tool_call.arguments.clone()).map_err(|e| {
        AgentError::InvalidParameters(format!("{}: {}", tool_call.name, e))
    })
}

fn segment<'a>(field: &str, value: &'a str) -> AgentResult<&'a str> {
    check_path_segment(field, value).map_err(AgentError::InvalidParameters)?;
    Ok(value)
}

#[async_trait]
impl ToolProvider for BrokerTools {
    fn name(&self) -> &str {
        "finam"
    }

    async fn list_tools(&self) -> AgentResult<Vec<Tool>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        debug!(tool = %tool_call.name, "calling broker tool");
        let client = &self.client;
        let result = match tool_call.name.as_str() {
            "get_quote" => {
                let args: SymbolArgs = parse(&tool_call)?;
                client.get_quote(segment("symbol", &args.symbol)?).await
            }
            "get_orderbook" => {
                let args: SymbolArgs = parse(&tool_call)?;
                client.get_orderbook(segment("symbol", &args.symbol)?).await
            }
            "get_instrument_trades_latest" => {
                let args: SymbolArgs = parse(&tool_call)?;
                client
                    .get_instrument_trades_latest(segment("symbol", &args.symbol)?)
                    .await
            }
            "get_candles" => {
                let args: CandlesArgs = parse(&tool_call)?;
                segment("symbol", &args.symbol)?;
                client.get_candles(&args).await
            }
            "get_account" => {
                let args: AccountArgs = parse(&tool_call)?;
                client
                    .get_account(segment("account_id", &args.account_id)?)
                    .await
            }
            "get_orders" => {
                let args: AccountArgs = parse(&tool_call)?;
                client
                    .get_orders(segment("account_id", &args.account_id)?)
                    .await
            }
            "get_order" => {
                let args: OrderArgs = parse(&tool_call)?;
                client
                    .get_order(
                        segment("account_id", &args.account_id)?,
                        segment("order_id", &args.order_id)?,
                    )
                    .await
            }
            "create_order" => {
                let args: PlaceOrderArgs = parse(&tool_call)?;
                segment("account_id", &args.account_id)?;
                args.validate().map_err(AgentError::InvalidParameters)?;
                client.place_order(&args).await
            }
            "cancel_order" => {
                let args: OrderArgs = parse(&tool_call)?;
                client
                    .cancel_order(
                        segment("account_id", &args.account_id)?,
                        segment("order_id", &args.order_id)?,
                    )
                    .await
            }
            "get_trades" => {
                let args: HistoryArgs = parse(&tool_call)?;
                segment("account_id", &args.account_id)?;
                client.get_trades(&args).await
            }
            "get_transactions" => {
                let args: HistoryArgs = parse(&tool_call)?;
                segment("account_id", &args.account_id)?;
                client.get_transactions(&args).await
            }
            "get_session_details" => client.get_session_details().await,
            "get_exchanges" => client.get_exchanges().await,
            "search_assets" => {
                let args: SearchAssetsArgs = parse(&tool_call)?;
                client.search_assets(&args).await
            }
            "get_asset" => {
                let args: AssetArgs = parse(&tool_call)?;
                let account_id = match &args.account_id {
                    Some(id) => Some(segment("account_id", id)?),
                    None => None,
                };
                client
                    .get_asset(segment("symbol", &args.symbol)?, account_id)
                    .await
            }
            "get_asset_params" => {
                let args: AssetParamsArgs = parse(&tool_call)?;
                client
                    .get_asset_params(segment("symbol", &args.symbol)?, &args.account_id)
                    .await
            }
            "get_asset_schedule" => {
                let args: SymbolArgs = parse(&tool_call)?;
                client
                    .get_asset_schedule(segment("symbol", &args.symbol)?)
                    .await
            }
            "get_asset_options" => {
                let args: SymbolArgs = parse(&tool_call)?;
                client
                    .get_asset_options(segment("symbol", &args.symbol)?)
                    .await
            }
            _ => return Err(AgentError::ToolNotFound(tool_call.name)),
        };

        let value = result?;
        Ok(vec![Content::json(&value)])
    }
}

fn symbol_schema() -> Value {
    json!({
        "type": "string",
        "description": "Instrument symbol as ticker@mic, e.g. SBER@MISX"
    })
}

fn account_schema() -> Value {
    json!({"type": "string", "description": "Account id"})
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn history_schema() -> Value {
    object_schema(
        json!({
            "account_id": account_schema(),
            "start": {"type": "string", "description": "Interval start, ISO 8601"},
            "end": {"type": "string", "description": "Interval end, ISO 8601"},
            "limit": {"type": "integer", "minimum": 1, "maximum": 5000}
        }),
        &["account_id"],
    )
}

fn order_id_schema() -> Value {
    object_schema(
        json!({
            "account_id": account_schema(),
            "order_id": {"type": "string", "description": "Order id"}
        }),
        &["account_id", "order_id"],
    )
}

fn symbol_only(name: &str, description: &str) -> Tool {
    Tool::new(
        name,
        description,
        object_schema(json!({"symbol": symbol_schema()}), &["symbol"]),
    )
}

/// Definitions of every broker tool, in a stable order
pub fn broker_tool_definitions() -> Vec<Tool> {
    let order_leg = json!({
        "type": "object",
        "properties": {
            "symbol": symbol_schema(),
            "quantity": {"type": "string"},
            "side": {"type": "string", "enum": ["long", "short"]},
            "type": {"type": "string", "enum": ["ORDER_TYPE_MARKET", "ORDER_TYPE_LIMIT", "ORDER_TYPE_STOP", "ORDER_TYPE_STOP_LIMIT"]},
            "time_in_force": {"type": "string", "enum": ["TIF_DAY", "TIF_IOC", "TIF_FOK", "TIF_GTC"]},
            "limit_price": {"type": "string"},
            "stop_price": {"type": "string"},
            "stop_condition": {"type": "string", "enum": ["STOP_CONDITION_GREATER_OR_EQUAL", "STOP_CONDITION_LESS_OR_EQUAL"]},
            "comment": {"type": "string", "maxLength": 128}
        },
        "required": ["symbol", "quantity", "side", "type"]
    });

    vec![
        symbol_only(
            "get_quote",
            "Latest quote for an instrument: bid, ask, last price, volume and the day's open, high, low and close.",
        ),
        symbol_only(
            "get_orderbook",
            "Current order book for an instrument: price levels with buy and sell sizes.",
        ),
        Tool::new(
            "get_candles",
            "Historical candles for an instrument: timestamp, open, high, low, close and volume per bar.",
            object_schema(
                json!({
                    "symbol": symbol_schema(),
                    "timeframe": {
                        "type": "string",
                        "description": "Bar period: M1, M5, M15, M30, H1, H2, H4, H8, D, W, MN or QR. Defaults to D"
                    },
                    "start": {"type": "string", "description": "Interval start, ISO 8601"},
                    "end": {"type": "string", "description": "Interval end, ISO 8601"}
                }),
                &["symbol"],
            ),
        ),
        Tool::new(
            "get_account",
            "Account summary: type, status, equity, unrealized profit, cash and open positions.",
            object_schema(json!({"account_id": account_schema()}), &["account_id"]),
        ),
        Tool::new(
            "get_orders",
            "All orders of an account.",
            object_schema(json!({"account_id": account_schema()}), &["account_id"]),
        ),
        Tool::new(
            "get_order",
            "One order of an account: id, execution id and status.",
            order_id_schema(),
        ),
        Tool::new(
            "create_order",
            "Place an order. Give symbol, quantity, side and type for a single order, or legs for a multi-leg order.",
            object_schema(
                json!({
                    "account_id": account_schema(),
                    "symbol": symbol_schema(),
                    "quantity": {"type": "string", "description": "Quantity in units"},
                    "side": {"type": "string", "enum": ["long", "short"]},
                    "type": {"type": "string", "enum": ["ORDER_TYPE_MARKET", "ORDER_TYPE_LIMIT", "ORDER_TYPE_STOP", "ORDER_TYPE_STOP_LIMIT"]},
                    "time_in_force": {"type": "string", "enum": ["TIF_DAY", "TIF_IOC", "TIF_FOK", "TIF_GTC"]},
                    "limit_price": {"type": "string"},
                    "stop_price": {"type": "string"},
                    "stop_condition": {"type": "string", "enum": ["STOP_CONDITION_GREATER_OR_EQUAL", "STOP_CONDITION_LESS_OR_EQUAL"]},
                    "legs": {"type": "array", "items": order_leg},
                    "client_order_id": {"type": "string", "maxLength": 20},
                    "valid_before": {
                        "type": "object",
                        "properties": {"timestamp": {"type": "string"}},
                        "required": ["timestamp"]
                    },
                    "comment": {"type": "string", "maxLength": 128}
                }),
                &["account_id"],
            ),
        ),
        Tool::new("cancel_order", "Cancel an order.", order_id_schema()),
        Tool::new(
            "get_trades",
            "Trade history of an account: id, timestamp, price, size and side per trade.",
            history_schema(),
        ),
        Tool::new(
            "get_transactions",
            "Transactions of an account: id, category, timestamp, symbol and cash change.",
            history_schema(),
        ),
        Tool::new(
            "get_session_details",
            "Details of the current api session: creation and expiry time, account ids and market data access.",
            object_schema(json!({}), &[]),
        ),
        Tool::new(
            "get_exchanges",
            "Available exchanges with their mic codes and names.",
            object_schema(json!({}), &[]),
        ),
        Tool::new(
            "search_assets",
            "Search instruments. Returns symbol (ticker@mic), id, ticker, mic, isin, type and name for each match.",
            object_schema(
                json!({
                    "ticker": {"type": "string"},
                    "isin": {"type": "string"},
                    "mic": {"type": "string"},
                    "type": {"type": "string", "description": "Instrument type"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 1000}
                }),
                &[],
            ),
        ),
        Tool::new(
            "get_asset",
            "Instrument details: board, id, ticker, mic, isin, type, name, decimals, price step, lot size, expiration and quote currency.",
            object_schema(
                json!({"symbol": symbol_schema(), "account_id": account_schema()}),
                &["symbol"],
            ),
        ),
        Tool::new(
            "get_asset_params",
            "Trading parameters of an instrument for an account: whether trading, long and short are allowed, risk rates and margin requirements.",
            object_schema(
                json!({"symbol": symbol_schema(), "account_id": account_schema()}),
                &["symbol", "account_id"],
            ),
        ),
        symbol_only(
            "get_asset_schedule",
            "Trading schedule of an instrument: session types and their intervals.",
        ),
        symbol_only(
            "get_asset_options",
            "Option chain for an underlying instrument: symbol, type, lot, strike, multiplier and expiration per option.",
        ),
        symbol_only(
            "get_instrument_trades_latest",
            "Latest trades of an instrument: id, timestamp, price, size and side per trade.",
        ),
    ]
}
