//! VeChainStats API
//!
//! Account, token, price and transaction lookups, plus the token metadata resolver
//! the transaction intent builder depends on.
//!
//! # API Reference
//! - https://docs.vechainstats.com
//!
//! # Usage
//! ```rust,ignore
//! let stats = Arc::new(VeChainStats::from_conf(&cfg.vechainstats));
//! let engine = Engine::builder()
//!     .register_capabilities(VeChainStats::capabilities(stats.clone()))?
//!     .register_capability(TokenTransferTool::new(builder, book, stats))?
//!     .build()?;
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use vechain_core::{
    BaseContext, Capability, CapabilityDefinition, CapabilityError, CapabilityKind, CapabilitySet,
    FieldError, Meta, NATIVE_DECIMALS, Network, Pagination, TokenMetadata, TokenMetadataResolver,
    TokenStandard, ToolOutput, UpstreamRequest, gen_schema_for,
};
use vechain_engine::config::VeChainStatsConf;

use crate::normalize::*;

/// Query parameter carrying the API key; never part of a reported endpoint.
static API_KEY_PARAM: &str = "VCS_API_KEY";

#[derive(Debug, Clone)]
pub struct VeChainStats {
    api_key: String,
    endpoints: BTreeMap<Network, String>,
}

/// A normalized VeChainStats response.
pub struct StatsResponse {
    pub data: Value,
    pub pagination: Option<Pagination>,
    pub endpoint: String,
}

impl VeChainStats {
    pub fn new(api_key: String, endpoints: BTreeMap<Network, String>) -> Self {
        Self { api_key, endpoints }
    }

    pub fn from_conf(conf: &VeChainStatsConf) -> Self {
        Self::new(conf.api_key.clone(), conf.endpoints.clone())
    }

    /// All VeChainStats read capabilities, sharing one client.
    pub fn capabilities<C: BaseContext>(
        stats: Arc<VeChainStats>,
    ) -> Result<CapabilitySet<C>, CapabilityError> {
        let mut set = CapabilitySet::new();
        set.register(AccountInfoTool::new(stats.clone()))?;
        set.register(TokenInfoTool::new(stats.clone()))?;
        set.register(TokenPriceTool::new(stats.clone()))?;
        set.register(TransactionInfoTool::new(stats))?;
        Ok(set)
    }

    /// GETs `path` on the network's endpoint and unwraps the envelope.
    pub async fn get<C: BaseContext>(
        &self,
        ctx: &C,
        network: Network,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<StatsResponse, CapabilityError> {
        let base = self.endpoints.get(&network).ok_or_else(|| {
            CapabilityError::field(
                "network",
                format!("VeChainStats has no endpoint for {network}"),
            )
        })?;
        let mut req = UpstreamRequest::get(format!("{}/{}", base.trim_end_matches('/'), path));
        for (k, v) in query {
            req = req.query(k, *v);
        }
        if !self.api_key.is_empty() {
            req = req.secret_query(API_KEY_PARAM, self.api_key.clone());
        }

        let endpoint = req.endpoint().to_string();
        let body = ctx.fetch_json(req).await?;
        let (data, pagination) = vechainstats_envelope(&endpoint, body)?;
        Ok(StatsResponse {
            data,
            pagination,
            endpoint,
        })
    }

    pub async fn account_info<C: BaseContext>(
        &self,
        ctx: &C,
        network: Network,
        address: &str,
    ) -> Result<(AccountInfo, StatsResponse), CapabilityError> {
        let res = self
            .get(ctx, network, "account/info", &[("address", address), ("expanded", "true")])
            .await?;
        let d = &res.data;
        let info = AccountInfo {
            address: str_field(d, &["address", "account"]).unwrap_or_else(|| address.to_string()),
            vet: str_field(d, &["vet", "vet_balance", "balance"]),
            vtho: str_field(d, &["vtho", "vtho_balance", "energy"]),
            tx_count: u64_field(d, &["tx_count", "txCount", "transactions"]),
            is_contract: bool_field(d, &["is_contract", "isContract", "contract"]),
            first_seen: u64_field(d, &["first_seen", "firstSeen", "first_tx_timestamp"]),
            last_seen: u64_field(d, &["last_seen", "lastSeen", "last_tx_timestamp"]),
        };
        Ok((info, res))
    }

    pub async fn token_info<C: BaseContext>(
        &self,
        ctx: &C,
        network: Network,
        token: &str,
    ) -> Result<(TokenMetadata, StatsResponse), CapabilityError> {
        let res = self.get(ctx, network, "token/info", &[("token", token)]).await?;
        let meta = token_metadata(&res.endpoint, token, &res.data)?;
        Ok((meta, res))
    }

    pub async fn token_price<C: BaseContext>(
        &self,
        ctx: &C,
        token: &str,
    ) -> Result<(TokenPrice, StatsResponse), CapabilityError> {
        let res = self
            .get(ctx, Network::Main, "token/price", &[("token", token)])
            .await?;
        // A single-token query may come back as a one-element list.
        let d = match &res.data {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let price = TokenPrice {
            token: str_field(&d, &["symbol", "token"]).unwrap_or_else(|| token.to_string()),
            price_usd: f64_field(&d, &["price_usd", "priceUsd", "usd", "price"]).ok_or_else(
                || CapabilityError::upstream(&res.endpoint, format!("no price for {token}")),
            )?,
            change_24h: f64_field(&d, &["change_24h", "price_change_24h", "change24h"]),
            last_updated: u64_field(&d, &["last_updated", "lastUpdated", "timestamp"]),
        };
        Ok((price, res))
    }

    pub async fn transaction_info<C: BaseContext>(
        &self,
        ctx: &C,
        network: Network,
        txid: &str,
    ) -> Result<(TransactionInfo, StatsResponse), CapabilityError> {
        let res = self
            .get(ctx, network, "transaction/info", &[("txid", txid), ("expanded", "true")])
            .await?;
        let d = &res.data;
        let clauses = match first_list(d, &["clauses"]) {
            Some(items) => items
                .iter()
                .map(|c| TxClause {
                    to: str_field(c, &["to"]),
                    value: str_field(c, &["value"]).unwrap_or_else(|| "0x0".to_string()),
                    data: str_field(c, &["data"]).unwrap_or_else(|| "0x".to_string()),
                })
                .collect(),
            None => Vec::new(),
        };
        let info = TransactionInfo {
            txid: str_field(d, &["txid", "id", "tx_id"]).unwrap_or_else(|| txid.to_string()),
            block_number: u64_field(d, &["block_number", "blockNumber", "block"]),
            timestamp: u64_field(d, &["timestamp", "block_timestamp", "blockTimestamp"]),
            origin: str_field(d, &["origin", "from", "sender"]),
            gas_used: u64_field(d, &["gas_used", "gasUsed"]),
            reverted: bool_field(d, &["reverted"]).unwrap_or(false),
            clauses,
        };
        Ok((info, res))
    }
}

fn first_list<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| v.get(*k).and_then(Value::as_array))
}

/// Builds [`TokenMetadata`] from a token/info payload.
fn token_metadata(endpoint: &str, token: &str, d: &Value) -> Result<TokenMetadata, CapabilityError> {
    let symbol = str_field(d, &["symbol"]).unwrap_or_else(|| token.to_string());
    if symbol.eq_ignore_ascii_case("VET") {
        return Ok(TokenMetadata {
            symbol,
            name: str_field(d, &["name"]).unwrap_or_else(|| "VeChain".to_string()),
            decimal_places: NATIVE_DECIMALS,
            contract_address: None,
            standard: TokenStandard::Native,
        });
    }

    let decimals = u64_field(d, &["decimals", "decimal_places", "decimalPlaces"])
        .ok_or_else(|| CapabilityError::upstream(endpoint, format!("no decimals for {token}")))?;
    let decimal_places = u8::try_from(decimals).map_err(|_| {
        CapabilityError::upstream(endpoint, format!("decimals out of range: {decimals}"))
    })?;
    Ok(TokenMetadata {
        name: str_field(d, &["name"]).unwrap_or_else(|| symbol.clone()),
        symbol,
        decimal_places,
        contract_address: str_field(d, &["contract", "address", "contract_address", "token_address"])
            .or_else(|| token.starts_with("0x").then(|| token.to_string())),
        standard: str_field(d, &["type", "standard", "token_type"])
            .map(|s| TokenStandard::parse(&s))
            .unwrap_or(TokenStandard::Vip180),
    })
}

impl<C> TokenMetadataResolver<C> for VeChainStats
where
    C: BaseContext,
{
    async fn resolve_token(
        &self,
        ctx: &C,
        network: Network,
        token: &str,
    ) -> Result<TokenMetadata, CapabilityError> {
        let (meta, _) = self.token_info(ctx, network, token).await?;
        Ok(meta)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    /// VET balance as a decimal string
    pub vet: Option<String>,
    /// VTHO balance as a decimal string
    pub vtho: Option<String>,
    pub tx_count: Option<u64>,
    pub is_contract: Option<bool>,
    pub first_seen: Option<u64>,
    pub last_seen: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPrice {
    pub token: String,
    pub price_usd: f64,
    pub change_24h: Option<f64>,
    pub last_updated: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TxClause {
    /// `None` for contract deployment
    pub to: Option<String>,
    pub value: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub txid: String,
    pub block_number: Option<u64>,
    pub timestamp: Option<u64>,
    pub origin: Option<String>,
    pub gas_used: Option<u64>,
    pub reverted: bool,
    pub clauses: Vec<TxClause>,
}

fn meta<C: BaseContext>(ctx: &C, res: StatsResponse) -> Meta {
    Meta::new(res.endpoint, ctx.unix_ms()).with_pagination(res.pagination)
}

macro_rules! read_definition {
    ($c:ty) => {
        fn definition(&self) -> CapabilityDefinition {
            CapabilityDefinition {
                name: Self::NAME.to_string(),
                description: Capability::<$c>::description(self),
                kind: CapabilityKind::Read,
                parameters: self.schema.clone(),
                strict: None,
            }
        }
    };
}

/// Arguments for looking up an account
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct AccountInfoArgs {
    /// Account address, e.g. "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed"
    pub address: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Clone)]
pub struct AccountInfoTool {
    stats: Arc<VeChainStats>,
    schema: Value,
}

impl AccountInfoTool {
    pub const NAME: &'static str = "vechainstats_account_info";

    pub fn new(stats: Arc<VeChainStats>) -> Self {
        Self {
            stats,
            schema: gen_schema_for::<AccountInfoArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for AccountInfoTool {
    type Args = AccountInfoArgs;
    type Output = AccountInfo;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get VET and VTHO balances and activity of a VeChain account from VeChainStats."
            .to_string()
    }

    read_definition!(C);

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (info, res) = self
            .stats
            .account_info(&ctx, args.network, &args.address)
            .await?;
        Ok(ToolOutput::new(info, meta(&ctx, res)))
    }
}

/// Arguments for looking up a token
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TokenInfoArgs {
    /// Token contract address or symbol, e.g. "VTHO"
    pub token: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Clone)]
pub struct TokenInfoTool {
    stats: Arc<VeChainStats>,
    schema: Value,
}

impl TokenInfoTool {
    pub const NAME: &'static str = "vechainstats_token_info";

    pub fn new(stats: Arc<VeChainStats>) -> Self {
        Self {
            stats,
            schema: gen_schema_for::<TokenInfoArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for TokenInfoTool {
    type Args = TokenInfoArgs;
    type Output = TokenMetadata;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get symbol, name, decimals, contract address and standard of a VeChain token."
            .to_string()
    }

    read_definition!(C);

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (token, res) = self
            .stats
            .token_info(&ctx, args.network, &args.token)
            .await?;
        Ok(ToolOutput::new(token, meta(&ctx, res)))
    }
}

/// Arguments for looking up a token price
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TokenPriceArgs {
    /// Token symbol or contract address, e.g. "VET"
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct TokenPriceTool {
    stats: Arc<VeChainStats>,
    schema: Value,
}

impl TokenPriceTool {
    pub const NAME: &'static str = "vechainstats_token_price";

    pub fn new(stats: Arc<VeChainStats>) -> Self {
        Self {
            stats,
            schema: gen_schema_for::<TokenPriceArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for TokenPriceTool {
    type Args = TokenPriceArgs;
    type Output = TokenPrice;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get the current USD price of a VeChain token.".to_string()
    }

    read_definition!(C);

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (price, res) = self.stats.token_price(&ctx, &args.token).await?;
        Ok(ToolOutput::new(price, meta(&ctx, res)))
    }
}

/// Arguments for looking up a transaction
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TransactionInfoArgs {
    /// Transaction id, 0x-prefixed
    pub txid: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

#[derive(Debug, Clone)]
pub struct TransactionInfoTool {
    stats: Arc<VeChainStats>,
    schema: Value,
}

impl TransactionInfoTool {
    pub const NAME: &'static str = "vechainstats_transaction_info";

    pub fn new(stats: Arc<VeChainStats>) -> Self {
        Self {
            stats,
            schema: gen_schema_for::<TransactionInfoArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for TransactionInfoTool {
    type Args = TransactionInfoArgs;
    type Output = TransactionInfo;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get status, block, gas and clauses of a VeChain transaction.".to_string()
    }

    read_definition!(C);

    fn validate(&self, args: &Self::Args) -> Vec<FieldError> {
        let hex = args.txid.trim_start_matches("0x");
        if !args.txid.starts_with("0x")
            || hex.len() != 64
            || !hex.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return vec![FieldError::new(
                "txid",
                "must be 0x followed by 64 hex digits",
            )];
        }
        Vec::new()
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (tx, res) = self
            .stats
            .transaction_info(&ctx, args.network, &args.txid)
            .await?;
        Ok(ToolOutput::new(tx, meta(&ctx, res)))
    }
}
