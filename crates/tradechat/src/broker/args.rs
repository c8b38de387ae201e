use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumIter, EnumString};

pub const MAX_CLIENT_ORDER_ID_LEN: usize = 20;
pub const MAX_COMMENT_LEN: usize = 128;

/// Candle aggregation period. Parsed from short names (`D`, `H1`, `1h`) or the
/// api names (`TIME_FRAME_D`); sent to the api as its numeric code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Deserialize,
)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum TimeFrame {
    #[strum(to_string = "TIME_FRAME_M1", serialize = "M1", serialize = "1m")]
    M1,
    #[strum(to_string = "TIME_FRAME_M5", serialize = "M5", serialize = "5m")]
    M5,
    #[strum(to_string = "TIME_FRAME_M15", serialize = "M15", serialize = "15m")]
    M15,
    #[strum(to_string = "TIME_FRAME_M30", serialize = "M30", serialize = "30m")]
    M30,
    #[strum(to_string = "TIME_FRAME_H1", serialize = "H1", serialize = "1h")]
    H1,
    #[strum(to_string = "TIME_FRAME_H2", serialize = "H2", serialize = "2h")]
    H2,
    #[strum(to_string = "TIME_FRAME_H4", serialize = "H4", serialize = "4h")]
    H4,
    #[strum(to_string = "TIME_FRAME_H8", serialize = "H8", serialize = "8h")]
    H8,
    #[default]
    #[strum(to_string = "TIME_FRAME_D", serialize = "D", serialize = "1d")]
    D,
    #[strum(to_string = "TIME_FRAME_W", serialize = "W", serialize = "1w")]
    W,
    #[strum(to_string = "TIME_FRAME_MN", serialize = "MN")]
    MN,
    #[strum(to_string = "TIME_FRAME_QR", serialize = "QR")]
    QR,
}

impl TimeFrame {
    pub fn code(self) -> u8 {
        match self {
            TimeFrame::M1 => 1,
            TimeFrame::M5 => 5,
            TimeFrame::M15 => 9,
            TimeFrame::M30 => 11,
            TimeFrame::H1 => 12,
            TimeFrame::H2 => 13,
            TimeFrame::H4 => 15,
            TimeFrame::H8 => 17,
            TimeFrame::D => 19,
            TimeFrame::W => 20,
            TimeFrame::MN => 21,
            TimeFrame::QR => 22,
        }
    }
}

impl TryFrom<String> for TimeFrame {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse()
            .map_err(|_| format!("unknown timeframe '{}'", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "long", alias = "buy", alias = "BUY", alias = "SIDE_BUY")]
    Long,
    #[serde(rename = "short", alias = "sell", alias = "SELL", alias = "SIDE_SELL")]
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "ORDER_TYPE_MARKET", alias = "market")]
    Market,
    #[serde(rename = "ORDER_TYPE_LIMIT", alias = "limit")]
    Limit,
    #[serde(rename = "ORDER_TYPE_STOP", alias = "stop")]
    Stop,
    #[serde(rename = "ORDER_TYPE_STOP_LIMIT", alias = "stop_limit")]
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "TIF_DAY", alias = "day", alias = "DAY")]
    Day,
    #[serde(rename = "TIF_IOC", alias = "ioc", alias = "IOC")]
    Ioc,
    #[serde(rename = "TIF_FOK", alias = "fok", alias = "FOK")]
    Fok,
    #[serde(rename = "TIF_GTC", alias = "gtc", alias = "GTC")]
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCondition {
    #[serde(rename = "STOP_CONDITION_GREATER_OR_EQUAL")]
    GreaterOrEqual,
    #[serde(rename = "STOP_CONDITION_LESS_OR_EQUAL")]
    LessOrEqual,
}

/// Identifiers end up in url paths, so they must be a single path segment
pub fn check_path_segment(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
    {
        return Err(format!("{} '{}' is not a valid identifier", field, value));
    }
    Ok(())
}

/// Models send prices and quantities both as strings and as numbers;
/// the api wants decimal strings.
fn decimal_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a decimal string, got {}",
            other
        ))),
    }
}

fn optional_decimal_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a decimal string, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandlesArgs {
    pub symbol: String,
    #[serde(default)]
    pub timeframe: TimeFrame,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountArgs {
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderArgs {
    pub account_id: String,
    pub order_id: String,
}

/// Account history window, used for trades and transactions
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryArgs {
    pub account_id: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchAssetsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetArgs {
    pub symbol: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetParamsArgs {
    pub symbol: String,
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Leg {
    pub symbol: String,
    #[serde(deserialize_with = "decimal_string")]
    pub quantity: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(
        default,
        deserialize_with = "optional_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit_price: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_condition: Option<StopCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidBefore {
    pub timestamp: String,
}

/// Order placement. Serializes to the request body; the account id goes in the path.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaceOrderArgs {
    #[serde(skip_serializing)]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<OrderSide>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(
        default,
        deserialize_with = "optional_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit_price: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_decimal_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_condition: Option<StopCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legs: Option<Vec<Leg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_before: Option<ValidBefore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl PlaceOrderArgs {
    /// Length limits the api enforces, checked before anything is sent
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = &self.client_order_id {
            if id.chars().count() > MAX_CLIENT_ORDER_ID_LEN {
                return Err(format!(
                    "client_order_id is longer than {} characters",
                    MAX_CLIENT_ORDER_ID_LEN
                ));
            }
        }
        let comments = self
            .comment
            .iter()
            .chain(self.legs.iter().flatten().filter_map(|leg| leg.comment.as_ref()));
        for comment in comments {
            if comment.chars().count() > MAX_COMMENT_LEN {
                return Err(format!(
                    "comment is longer than {} characters",
                    MAX_COMMENT_LEN
                ));
            }
        }
        if self.symbol.is_none() && self.legs.as_ref().map_or(true, Vec::is_empty) {
            return Err("either symbol or legs must be given".to_string());
        }
        Ok(())
    }
}
