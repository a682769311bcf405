//! WanBridge cross-chain bridge API
//!
//! Lists bridgeable token pairs and quotes quota and fees for a transfer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use vechain_core::{
    BaseContext, Capability, CapabilityDefinition, CapabilityError, CapabilityKind, CapabilitySet,
    Meta, Pagination, ToolOutput, UpstreamRequest, gen_schema_for,
};
use vechain_engine::config::ApiConf;

use crate::normalize::*;

#[derive(Debug, Clone)]
pub struct WanBridge {
    api_url: String,
}

impl WanBridge {
    pub fn new(api_url: String) -> Self {
        Self { api_url }
    }

    pub fn from_conf(conf: &ApiConf) -> Self {
        Self::new(conf.api_url.clone())
    }

    pub fn capabilities<C: BaseContext>(
        bridge: Arc<WanBridge>,
    ) -> Result<CapabilitySet<C>, CapabilityError> {
        let mut set = CapabilitySet::new();
        set.register(TokenPairsTool::new(bridge.clone()))?;
        set.register(QuotaAndFeeTool::new(bridge))?;
        Ok(set)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }

    pub async fn token_pairs<C: BaseContext>(
        &self,
        ctx: &C,
        from_chain: Option<&str>,
        to_chain: Option<&str>,
    ) -> Result<(Vec<TokenPair>, String), CapabilityError> {
        let req = UpstreamRequest::get(self.url("tokenPairs"));
        let endpoint = req.endpoint().to_string();
        let data = wanbridge_envelope(&endpoint, ctx.fetch_json(req).await?)?;
        let pairs = list_field(&endpoint, data, &["tokenPairs", "list"])?
            .iter()
            .map(TokenPair::from_value)
            .filter(|p| chain_matches(&p.from_chain, from_chain))
            .filter(|p| chain_matches(&p.to_chain, to_chain))
            .collect();
        Ok((pairs, endpoint))
    }

    pub async fn quota_and_fee<C: BaseContext>(
        &self,
        ctx: &C,
        args: &QuotaAndFeeArgs,
    ) -> Result<(BridgeQuote, String), CapabilityError> {
        let req = UpstreamRequest::get(self.url("quotaAndFee"))
            .query("fromChainType", args.from_chain.to_ascii_uppercase())
            .query("toChainType", args.to_chain.to_ascii_uppercase())
            .query("tokenPairID", args.token_pair_id.clone())
            .query("symbol", args.symbol.clone());
        let endpoint = req.endpoint().to_string();
        let d = wanbridge_envelope(&endpoint, ctx.fetch_json(req).await?)?;
        let quote = BridgeQuote {
            symbol: str_field(&d, &["symbol"]).unwrap_or_else(|| args.symbol.clone()),
            min_quota: str_field(&d, &["minQuota", "min_quota"]),
            max_quota: str_field(&d, &["maxQuota", "max_quota"]),
            network_fee: d.get("networkFee").map(Fee::from_value),
            operation_fee: d.get("operationFee").map(Fee::from_value),
        };
        Ok((quote, endpoint))
    }
}

fn chain_matches(chain: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| chain.eq_ignore_ascii_case(f))
}

/// Chains are reported either as a chain type string or as an object.
fn chain_name(v: &Value) -> String {
    match v {
        Value::Object(_) => str_field(v, &["chainType", "chainName", "symbol"]).unwrap_or_default(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token_pair_id: String,
    pub symbol: String,
    pub from_chain: String,
    pub to_chain: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub decimals: Option<u64>,
}

impl TokenPair {
    fn from_value(v: &Value) -> Self {
        let from = v
            .get("fromChain")
            .or_else(|| v.get("fromChainType"))
            .map(chain_name)
            .unwrap_or_default();
        let to = v
            .get("toChain")
            .or_else(|| v.get("toChainType"))
            .map(chain_name)
            .unwrap_or_default();
        Self {
            token_pair_id: str_field(v, &["tokenPairID", "tokenPairId", "id"]).unwrap_or_default(),
            symbol: str_field(v, &["symbol", "ancestorSymbol"]).unwrap_or_default(),
            from_chain: from,
            to_chain: to,
            from_account: str_field(v, &["fromAccount"]),
            to_account: str_field(v, &["toAccount"]),
            decimals: u64_field(v, &["decimals", "ancestorDecimals"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub value: String,
    pub is_percent: bool,
}

impl Fee {
    fn from_value(v: &Value) -> Self {
        Self {
            value: str_field(v, &["value"]).unwrap_or_else(|| "0".to_string()),
            is_percent: bool_field(v, &["isPercent", "is_percent"]).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeQuote {
    pub symbol: String,
    pub min_quota: Option<String>,
    pub max_quota: Option<String>,
    pub network_fee: Option<Fee>,
    pub operation_fee: Option<Fee>,
}

/// Arguments for listing bridgeable token pairs
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct TokenPairsArgs {
    /// Only pairs leaving this chain, e.g. "VET"
    pub from_chain: Option<String>,
    /// Only pairs arriving on this chain, e.g. "ETH"
    pub to_chain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenPairsTool {
    bridge: Arc<WanBridge>,
    schema: Value,
}

impl TokenPairsTool {
    pub const NAME: &'static str = "wanbridge_token_pairs";

    pub fn new(bridge: Arc<WanBridge>) -> Self {
        Self {
            bridge,
            schema: gen_schema_for::<TokenPairsArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for TokenPairsTool {
    type Args = TokenPairsArgs;
    type Output = Vec<TokenPair>;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "List token pairs that WanBridge can move between chains, optionally filtered by source and destination chain."
            .to_string()
    }

    fn definition(&self) -> CapabilityDefinition {
        CapabilityDefinition {
            name: Self::NAME.to_string(),
            description: Capability::<C>::description(self),
            kind: CapabilityKind::Read,
            parameters: self.schema.clone(),
            strict: None,
        }
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (pairs, endpoint) = self
            .bridge
            .token_pairs(&ctx, args.from_chain.as_deref(), args.to_chain.as_deref())
            .await?;
        let total = pairs.len() as u64;
        Ok(ToolOutput::new(
            pairs,
            Meta::new(endpoint, ctx.unix_ms()).with_pagination(Some(Pagination {
                total: Some(total),
                ..Default::default()
            })),
        ))
    }
}

/// Arguments for quoting a bridge transfer
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct QuotaAndFeeArgs {
    /// Source chain type, e.g. "VET"
    pub from_chain: String,
    /// Destination chain type, e.g. "ETH"
    pub to_chain: String,
    /// Token pair id from wanbridge_token_pairs
    pub token_pair_id: String,
    /// Token symbol, e.g. "USDT"
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct QuotaAndFeeTool {
    bridge: Arc<WanBridge>,
    schema: Value,
}

impl QuotaAndFeeTool {
    pub const NAME: &'static str = "wanbridge_quota_and_fee";

    pub fn new(bridge: Arc<WanBridge>) -> Self {
        Self {
            bridge,
            schema: gen_schema_for::<QuotaAndFeeArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for QuotaAndFeeTool {
    type Args = QuotaAndFeeArgs;
    type Output = BridgeQuote;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get the minimum and maximum amount and the fees for bridging a token pair with WanBridge."
            .to_string()
    }

    fn definition(&self) -> CapabilityDefinition {
        CapabilityDefinition {
            name: Self::NAME.to_string(),
            description: Capability::<C>::description(self),
            kind: CapabilityKind::Read,
            parameters: self.schema.clone(),
            strict: Some(true),
        }
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (quote, endpoint) = self.bridge.quota_and_fee(&ctx, &args).await?;
        Ok(ToolOutput::new(quote, Meta::new(endpoint, ctx.unix_ms())))
    }
}
