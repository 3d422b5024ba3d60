use hlmcp_bridge::{build_invocation, BridgeFields};
use hlmcp_core::*;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

/// Errors from tool dispatch. Everything except `UnknownTool` is reported to
/// the host as a failed tool result rather than a protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Missing required arguments: {}", .0.join(", "))]
    MissingArguments(Vec<&'static str>),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

// ---------------------------------------------------------------------------
// Tool names
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    GetMarketData,
    GetUserData,
    PlaceLimitOrder,
    PlaceMarketOrder,
    CancelOrder,
    UpdateLeverage,
}

impl ToolName {
    /// Bridge command each tool maps to.
    pub fn command(self) -> BridgeCommand {
        match self {
            ToolName::GetMarketData => BridgeCommand::MarketData,
            ToolName::GetUserData => BridgeCommand::UserData,
            ToolName::PlaceLimitOrder => BridgeCommand::PlaceOrder,
            ToolName::PlaceMarketOrder => BridgeCommand::MarketOrder,
            ToolName::CancelOrder => BridgeCommand::CancelOrder,
            ToolName::UpdateLeverage => BridgeCommand::UpdateLeverage,
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        let (description, fields, required): (_, _, &[&'static str]) = match self {
            ToolName::GetMarketData => (
                "Get market data from Hyperliquid: mid prices, order books, metadata, candles or funding history",
                vec![
                    SchemaField::string("dataType", "Type of market data to retrieve")
                        .one_of(&MarketDataType::names()),
                    SchemaField::string("coin", "Coin symbol, required for l2_snapshot, candles and funding_history"),
                    SchemaField::string("interval", "Candle interval (e.g. 1m, 1h, 1d)"),
                    SchemaField::integer("startTime", "Start time in milliseconds"),
                    SchemaField::integer("endTime", "End time in milliseconds"),
                ],
                &["dataType"],
            ),
            ToolName::GetUserData => (
                "Get account data from Hyperliquid: balances, positions, orders, fills, fees or staking",
                vec![
                    SchemaField::string("dataType", "Type of user data to retrieve")
                        .one_of(&UserDataType::names()),
                    SchemaField::integer("startTime", "Start time in milliseconds"),
                    SchemaField::integer("endTime", "End time in milliseconds"),
                ],
                &["dataType"],
            ),
            ToolName::PlaceLimitOrder => (
                "Place a limit order on Hyperliquid",
                vec![
                    SchemaField::string("coin", "Coin symbol"),
                    SchemaField::boolean("isBuy", "True for a buy order, false for a sell order"),
                    SchemaField::number("size", "Order size in units of the coin"),
                    SchemaField::number("price", "Limit price"),
                    SchemaField::string("timeInForce", "Time in force, defaults to Gtc")
                        .one_of(&TimeInForce::names()),
                    SchemaField::boolean("reduceOnly", "Only reduce an existing position"),
                    SchemaField::string("clientOrderId", "Client order ID (128-bit hex string)"),
                    SchemaField::object("builder", "Builder fee: {address, fee} with fee in tenths of a basis point"),
                ],
                &["coin", "isBuy", "size", "price"],
            ),
            ToolName::PlaceMarketOrder => (
                "Place a market order on Hyperliquid",
                vec![
                    SchemaField::string("coin", "Coin symbol"),
                    SchemaField::boolean("isBuy", "True for a buy order, false for a sell order"),
                    SchemaField::number("size", "Order size in units of the coin"),
                    SchemaField::number("price", "Reference price for slippage, defaults to the mid price"),
                    SchemaField::number("slippage", "Slippage tolerance as a fraction, defaults to 0.05"),
                    SchemaField::string("clientOrderId", "Client order ID (128-bit hex string)"),
                    SchemaField::object("builder", "Builder fee: {address, fee} with fee in tenths of a basis point"),
                ],
                &["coin", "isBuy", "size"],
            ),
            ToolName::CancelOrder => (
                "Cancel an open order on Hyperliquid by order ID or client order ID",
                vec![
                    SchemaField::string("coin", "Coin symbol"),
                    SchemaField::integer("orderId", "Exchange order ID"),
                    SchemaField::string("clientOrderId", "Client order ID"),
                ],
                &["coin"],
            ),
            ToolName::UpdateLeverage => (
                "Update the leverage used for a coin",
                vec![
                    SchemaField::string("coin", "Coin symbol"),
                    SchemaField::integer("leverage", "New leverage multiplier"),
                    SchemaField::boolean("isCross", "Use cross margin (default) instead of isolated"),
                ],
                &["coin", "leverage"],
            ),
        };

        ToolDescriptor {
            name: self.into(),
            description,
            input_schema: InputSchema::new(fields, required),
        }
    }
}

// ---------------------------------------------------------------------------
// Enumerated argument values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumIter, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketDataType {
    AllMids,
    #[serde(rename = "l2_snapshot")]
    #[strum(serialize = "l2_snapshot")]
    L2Snapshot,
    Meta,
    MetaAndAssetCtxs,
    SpotMeta,
    SpotMetaAndAssetCtxs,
    Candles,
    FundingHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumIter, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserDataType {
    UserState,
    SpotUserState,
    OpenOrders,
    FrontendOpenOrders,
    UserFills,
    UserFillsByTime,
    UserFundingHistory,
    UserFees,
    UserStakingSummary,
    UserStakingDelegations,
    UserStakingRewards,
    QuerySubAccounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumIter, IntoStaticStr)]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Alo,
}

macro_rules! impl_names {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// Wire names of every variant, in declaration order.
            pub fn names() -> Vec<&'static str> {
                Self::iter().map(Into::into).collect()
            }
        })*
    };
}

impl_names!(MarketDataType, UserDataType, TimeInForce);

// ---------------------------------------------------------------------------
// Tool arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataArgs {
    pub data_type: MarketDataType,
    pub coin: Option<String>,
    pub interval: Option<String>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataArgs {
    pub data_type: UserDataType,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
}

/// Builder fee attached to an order. `fee` is in tenths of a basis point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuilderFee {
    pub address: String,
    pub fee: u64,
}

impl BuilderFee {
    fn to_value(&self) -> Value {
        json!({ "b": self.address, "f": self.fee })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderArgs {
    pub coin: String,
    pub is_buy: bool,
    pub size: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    pub reduce_only: Option<bool>,
    pub client_order_id: Option<String>,
    pub builder: Option<BuilderFee>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderArgs {
    pub coin: String,
    pub is_buy: bool,
    pub size: Decimal,
    pub price: Option<Decimal>,
    pub slippage: Option<Decimal>,
    pub client_order_id: Option<String>,
    pub builder: Option<BuilderFee>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderArgs {
    pub coin: String,
    pub order_id: Option<u64>,
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeverageArgs {
    pub coin: String,
    pub leverage: u32,
    pub is_cross: Option<bool>,
}

/// A validated tool call, ready to be projected onto bridge fields.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    MarketData(MarketDataArgs),
    UserData(UserDataArgs),
    LimitOrder(LimitOrderArgs),
    MarketOrder(MarketOrderArgs),
    CancelOrder(CancelOrderArgs),
    UpdateLeverage(UpdateLeverageArgs),
}

impl ToolRequest {
    /// Validate raw arguments for `tool`.
    ///
    /// Required fields are checked by presence first so the error can name
    /// all of them at once; typed decoding then catches wrong types and
    /// values outside the enumerations.
    pub fn parse(tool: ToolName, arguments: &Map<String, Value>) -> Result<Self, ToolError> {
        let schema = tool.descriptor().input_schema;
        let missing: Vec<&'static str> = schema
            .required
            .iter()
            .copied()
            .filter(|name| arguments.get(*name).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingArguments(missing));
        }

        let request = match tool {
            ToolName::GetMarketData => ToolRequest::MarketData(decode(arguments)?),
            ToolName::GetUserData => ToolRequest::UserData(decode(arguments)?),
            ToolName::PlaceLimitOrder => ToolRequest::LimitOrder(decode(arguments)?),
            ToolName::PlaceMarketOrder => ToolRequest::MarketOrder(decode(arguments)?),
            ToolName::CancelOrder => {
                let mut args: CancelOrderArgs = decode(arguments)?;
                args.client_order_id = non_blank(args.client_order_id);
                if args.order_id.is_none() && args.client_order_id.is_none() {
                    return Err(ToolError::InvalidArguments(
                        "either orderId or clientOrderId is required".to_string(),
                    ));
                }
                ToolRequest::CancelOrder(args)
            }
            ToolName::UpdateLeverage => ToolRequest::UpdateLeverage(decode(arguments)?),
        };
        Ok(request)
    }

    /// Project onto bridge fields in the order the bridge declares them.
    pub fn into_fields(self) -> BridgeFields {
        match self {
            ToolRequest::MarketData(args) => vec![
                ("dataType", json!(<&'static str>::from(args.data_type))),
                ("coin", optional(args.coin)),
                ("interval", optional(args.interval)),
                ("startTime", optional(args.start_time)),
                ("endTime", optional(args.end_time)),
            ],
            ToolRequest::UserData(args) => vec![
                ("dataType", json!(<&'static str>::from(args.data_type))),
                ("startTime", optional(args.start_time)),
                ("endTime", optional(args.end_time)),
            ],
            ToolRequest::LimitOrder(args) => {
                let tif: &'static str = args.time_in_force.unwrap_or_default().into();
                vec![
                    ("coin", json!(args.coin)),
                    ("isBuy", json!(args.is_buy)),
                    ("size", decimal(args.size)),
                    ("price", decimal(args.price)),
                    ("orderType", json!({ "limit": { "tif": tif } })),
                    ("reduceOnly", optional(args.reduce_only)),
                    ("cloid", optional(non_blank(args.client_order_id))),
                    ("builder", builder(args.builder.as_ref())),
                ]
            }
            ToolRequest::MarketOrder(args) => vec![
                ("coin", json!(args.coin)),
                ("isBuy", json!(args.is_buy)),
                ("size", decimal(args.size)),
                ("price", args.price.map_or(Value::Null, decimal)),
                ("slippage", args.slippage.map_or(Value::Null, decimal)),
                ("cloid", optional(non_blank(args.client_order_id))),
                ("builder", builder(args.builder.as_ref())),
            ],
            ToolRequest::CancelOrder(args) => vec![
                ("coin", json!(args.coin)),
                ("oid", optional(args.order_id)),
                ("cloid", optional(non_blank(args.client_order_id))),
            ],
            ToolRequest::UpdateLeverage(args) => vec![
                ("coin", json!(args.coin)),
                ("leverage", json!(args.leverage)),
                ("isCross", optional(args.is_cross)),
            ],
        }
    }
}

fn decode<T: DeserializeOwned>(arguments: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// The bridge treats an empty client order ID as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

/// Plain notation without trailing zeros (`50000.00` → `50000`).
fn decimal(value: Decimal) -> Value {
    Value::String(value.normalize().to_string())
}

/// Builder info travels as one JSON-encoded flag.
fn builder(fee: Option<&BuilderFee>) -> Value {
    fee.map_or(Value::Null, |f| Value::String(f.to_value().to_string()))
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Validates tool calls and runs them through the bridge.
pub struct ToolDispatcher {
    config: Arc<Config>,
    executor: Arc<dyn BridgeExecutor>,
}

impl ToolDispatcher {
    pub fn new(config: Arc<Config>, executor: Arc<dyn BridgeExecutor>) -> Self {
        Self { config, executor }
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        ToolName::iter().map(ToolName::descriptor).collect()
    }

    /// Resolve, validate and marshal a call without running it.
    pub fn prepare(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<BridgeInvocation, ToolError> {
        let tool: ToolName = name
            .parse()
            .map_err(|_| ToolError::UnknownTool(name.to_string()))?;
        let request = ToolRequest::parse(tool, arguments)?;
        Ok(build_invocation(
            tool.command(),
            &self.config,
            None,
            &request.into_fields(),
        ))
    }

    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let invocation = self.prepare(name, arguments)?;
        debug!(command = %invocation.command, flags = invocation.flags.len(), "Dispatching tool");
        Ok(self.executor.run(&invocation).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeBridge};
    use rust_decimal_macros::dec;

    fn dispatcher(bridge: Arc<FakeBridge>) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(testing::config()), bridge)
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {}", other),
        }
    }

    #[test]
    fn test_six_tools_with_required_sets() {
        let tools = dispatcher(Arc::new(FakeBridge::ok(json!({})))).list_tools();
        let summary: Vec<(&str, Vec<&str>)> = tools
            .iter()
            .map(|t| (t.name, t.input_schema.required.clone()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("get_market_data", vec!["dataType"]),
                ("get_user_data", vec!["dataType"]),
                ("place_limit_order", vec!["coin", "isBuy", "size", "price"]),
                ("place_market_order", vec!["coin", "isBuy", "size"]),
                ("cancel_order", vec!["coin"]),
                ("update_leverage", vec!["coin", "leverage"]),
            ]
        );
    }

    #[test]
    fn test_listing_is_stable() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        assert_eq!(dispatcher.list_tools(), dispatcher.list_tools());
    }

    #[test]
    fn test_required_fields_are_declared_properties() {
        for tool in ToolName::iter() {
            let schema = tool.descriptor().input_schema;
            for name in &schema.required {
                assert!(schema.field(name).is_some(), "{} requires undeclared {}", tool, name);
            }
        }
    }

    #[test]
    fn test_enum_names_round_trip_through_serde() {
        for data_type in MarketDataType::iter() {
            let name: &'static str = data_type.into();
            assert_eq!(serde_json::from_value::<MarketDataType>(json!(name)).unwrap(), data_type);
        }
        for data_type in UserDataType::iter() {
            let name: &'static str = data_type.into();
            assert_eq!(serde_json::from_value::<UserDataType>(json!(name)).unwrap(), data_type);
        }
        assert_eq!(MarketDataType::names()[1], "l2_snapshot");
        assert_eq!(TimeInForce::names(), vec!["Gtc", "Ioc", "Alo"]);
    }

    #[test]
    fn test_schema_advertises_data_types() {
        let schema = ToolName::GetUserData.descriptor().input_schema;
        let values = schema.field("dataType").unwrap().enum_values.clone().unwrap();
        assert_eq!(values.len(), 12);
        assert!(values.contains(&"query_sub_accounts"));
    }

    #[test]
    fn test_decimal_rendering() {
        assert_eq!(decimal(dec!(50000.00)), json!("50000"));
        assert_eq!(decimal(dec!(0.10)), json!("0.1"));
        assert_eq!(decimal(dec!(0.00001)), json!("0.00001"));
    }

    #[test]
    fn test_limit_order_composes_order_type() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let invocation = dispatcher
            .prepare(
                "place_limit_order",
                &args(json!({
                    "coin": "BTC",
                    "isBuy": true,
                    "size": 0.1,
                    "price": 50000,
                    "timeInForce": "Gtc"
                })),
            )
            .unwrap();

        assert_eq!(invocation.command, BridgeCommand::PlaceOrder);
        assert_eq!(invocation.flag("coin"), Some("BTC"));
        assert_eq!(invocation.flag("is-buy"), Some("true"));
        assert_eq!(invocation.flag("size"), Some("0.1"));
        assert_eq!(invocation.flag("price"), Some("50000"));
        assert_eq!(invocation.flag("order-type"), Some(r#"{"limit":{"tif":"Gtc"}}"#));
        assert_eq!(invocation.flag("reduce-only"), None);
        assert_eq!(invocation.flag("builder"), None);
    }

    #[test]
    fn test_limit_order_defaults_to_gtc() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let invocation = dispatcher
            .prepare(
                "place_limit_order",
                &args(json!({"coin": "ETH", "isBuy": false, "size": "2", "price": "3000.5"})),
            )
            .unwrap();
        assert_eq!(invocation.flag("order-type"), Some(r#"{"limit":{"tif":"Gtc"}}"#));
        assert_eq!(invocation.flag("is-buy"), Some("false"));
        assert_eq!(invocation.flag("price"), Some("3000.5"));
    }

    #[test]
    fn test_market_order_with_builder() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let invocation = dispatcher
            .prepare(
                "place_market_order",
                &args(json!({
                    "coin": "SOL",
                    "isBuy": true,
                    "size": 10,
                    "slippage": 0.01,
                    "clientOrderId": "0x1234",
                    "builder": {"address": "0xbuilder", "fee": 10}
                })),
            )
            .unwrap();

        assert_eq!(invocation.command, BridgeCommand::MarketOrder);
        assert_eq!(invocation.flag("slippage"), Some("0.01"));
        assert_eq!(invocation.flag("cloid"), Some("0x1234"));
        assert_eq!(invocation.flag("builder"), Some(r#"{"b":"0xbuilder","f":10}"#));
        assert_eq!(invocation.flag("price"), None);
        assert_eq!(invocation.flag("order-type"), None);
    }

    #[test]
    fn test_cancel_renames_ids() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let invocation = dispatcher
            .prepare("cancel_order", &args(json!({"coin": "BTC", "orderId": 42})))
            .unwrap();
        assert_eq!(invocation.flag("oid"), Some("42"));
        assert_eq!(invocation.flag("cloid"), None);

        let invocation = dispatcher
            .prepare("cancel_order", &args(json!({"coin": "BTC", "clientOrderId": "0xabc"})))
            .unwrap();
        assert_eq!(invocation.flag("cloid"), Some("0xabc"));
        assert_eq!(invocation.flag("oid"), None);
    }

    #[tokio::test]
    async fn test_cancel_without_id_spawns_nothing() {
        let bridge = Arc::new(FakeBridge::ok(json!({})));
        let dispatcher = dispatcher(bridge.clone());

        let err = dispatcher
            .call("cancel_order", &args(json!({"coin": "BTC"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_with_blank_client_order_id_spawns_nothing() {
        let bridge = Arc::new(FakeBridge::ok(json!({})));
        let dispatcher = dispatcher(bridge.clone());

        for cloid in ["", "   "] {
            let err = dispatcher
                .call("cancel_order", &args(json!({"coin": "BTC", "clientOrderId": cloid})))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_blank_client_order_id_never_emitted() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let invocation = dispatcher
            .prepare(
                "cancel_order",
                &args(json!({"coin": "BTC", "orderId": 42, "clientOrderId": ""})),
            )
            .unwrap();
        assert_eq!(invocation.flag("oid"), Some("42"));
        assert_eq!(invocation.flag("cloid"), None);

        let invocation = dispatcher
            .prepare(
                "place_market_order",
                &args(json!({"coin": "SOL", "isBuy": true, "size": 1, "clientOrderId": " "})),
            )
            .unwrap();
        assert_eq!(invocation.flag("cloid"), None);
    }

    #[test]
    fn test_missing_arguments_are_all_named() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let err = dispatcher
            .prepare("place_limit_order", &args(json!({"coin": "BTC", "size": null})))
            .unwrap_err();
        match err {
            ToolError::MissingArguments(names) => assert_eq!(names, vec!["isBuy", "size", "price"]),
            other => panic!("Expected missing arguments, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_enum_value_rejected() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let err = dispatcher
            .prepare("get_market_data", &args(json!({"dataType": "order_book"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = dispatcher
            .prepare("update_leverage", &args(json!({"coin": "BTC", "leverage": "high"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_unknown_tool() {
        let dispatcher = dispatcher(Arc::new(FakeBridge::ok(json!({}))));
        let err = dispatcher.prepare("GET_MARKET_DATA", &Map::new()).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "GET_MARKET_DATA"));
    }

    #[tokio::test]
    async fn test_market_data_call_runs_bridge() {
        let bridge = Arc::new(FakeBridge::ok(json!({"BTC": "50000.5"})));
        let dispatcher = dispatcher(bridge.clone());

        let value = dispatcher
            .call(
                "get_market_data",
                &args(json!({"dataType": "candles", "coin": "BTC", "interval": "1h", "startTime": 100})),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"BTC": "50000.5"}));

        let calls = bridge.calls();
        assert_eq!(calls.len(), 1);
        let names: Vec<&str> = calls[0].flags.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            names,
            vec!["secret-key", "network", "data-type", "coin", "interval", "start-time"]
        );
        assert_eq!(calls[0].flag("start-time"), Some("100"));
    }

    #[tokio::test]
    async fn test_update_leverage_flags() {
        let bridge = Arc::new(FakeBridge::ok(json!({"status": "ok"})));
        let dispatcher = dispatcher(bridge.clone());

        dispatcher
            .call("update_leverage", &args(json!({"coin": "ETH", "leverage": 5, "isCross": false})))
            .await
            .unwrap();

        let calls = bridge.calls();
        assert_eq!(calls[0].command, BridgeCommand::UpdateLeverage);
        assert_eq!(calls[0].flag("leverage"), Some("5"));
        assert_eq!(calls[0].flag("is-cross"), Some("false"));
    }

    #[tokio::test]
    async fn test_bridge_failure_propagates() {
        let bridge = Arc::new(FakeBridge::failing("exit status: 1"));
        let dispatcher = dispatcher(bridge);

        let err = dispatcher
            .call("get_user_data", &args(json!({"dataType": "user_fees"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Bridge(_)));
    }
}
