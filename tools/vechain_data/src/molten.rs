//! Molten DEX liquidity pools.

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

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
    pub symbol: String,
    pub address: Option<String>,
}

impl PoolToken {
    fn from_value(v: Option<&Value>) -> Self {
        match v {
            Some(Value::String(symbol)) => Self {
                symbol: symbol.clone(),
                address: None,
            },
            Some(v) => Self {
                symbol: str_field(v, &["symbol"]).unwrap_or_default(),
                address: str_field(v, &["address", "id"]),
            },
            None => Self {
                symbol: String::new(),
                address: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub address: String,
    pub token0: PoolToken,
    pub token1: PoolToken,
    pub tvl_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub apr: Option<f64>,
    pub fee: Option<f64>,
}

impl Pool {
    fn from_value(v: &Value) -> Self {
        Self {
            address: str_field(v, &["address", "id", "pool"]).unwrap_or_default(),
            token0: PoolToken::from_value(v.get("token0").or_else(|| v.get("tokenA"))),
            token1: PoolToken::from_value(v.get("token1").or_else(|| v.get("tokenB"))),
            tvl_usd: f64_field(v, &["tvlUSD", "tvlUsd", "tvl_usd", "tvl"]),
            volume_24h_usd: f64_field(v, &["volumeUSD24h", "volume24hUsd", "volume_24h", "volume24h"]),
            apr: f64_field(v, &["apr", "APR", "apy"]),
            fee: f64_field(v, &["fee", "feeTier"]),
        }
    }

    fn has_token(&self, symbol: &str) -> bool {
        self.token0.symbol.eq_ignore_ascii_case(symbol)
            || self.token1.symbol.eq_ignore_ascii_case(symbol)
    }
}

#[derive(Debug, Clone)]
pub struct Molten {
    api_url: String,
}

impl Molten {
    pub fn new(api_url: String) -> Self {
        Self { api_url }
    }

    pub fn from_conf(conf: &ApiConf) -> Self {
        Self::new(conf.api_url.clone())
    }

    pub fn capabilities<C: BaseContext>(
        molten: Arc<Molten>,
    ) -> Result<CapabilitySet<C>, CapabilityError> {
        let mut set = CapabilitySet::new();
        set.register(PoolsTool::new(molten))?;
        Ok(set)
    }

    pub async fn pools<C: BaseContext>(
        &self,
        ctx: &C,
        token: Option<&str>,
    ) -> Result<(Vec<Pool>, String), CapabilityError> {
        let req = UpstreamRequest::get(format!("{}/pools", self.api_url.trim_end_matches('/')));
        let endpoint = req.endpoint().to_string();
        let data = plain_envelope(&endpoint, ctx.fetch_json(req).await?)?;
        let mut pools: Vec<Pool> = list_field(&endpoint, data, &["pools", "items"])?
            .iter()
            .map(Pool::from_value)
            .filter(|p| token.is_none_or(|t| p.has_token(t)))
            .collect();
        // deepest pools first
        pools.sort_by(|a, b| {
            b.tvl_usd
                .unwrap_or(0.0)
                .total_cmp(&a.tvl_usd.unwrap_or(0.0))
        });
        Ok((pools, endpoint))
    }
}

/// Arguments for listing Molten pools
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct PoolsArgs {
    /// Only pools containing this token symbol, e.g. "VTHO"
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PoolsTool {
    molten: Arc<Molten>,
    schema: Value,
}

impl PoolsTool {
    pub const NAME: &'static str = "molten_pools";

    pub fn new(molten: Arc<Molten>) -> Self {
        Self {
            molten,
            schema: gen_schema_for::<PoolsArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for PoolsTool {
    type Args = PoolsArgs;
    type Output = Vec<Pool>;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "List Molten liquidity pools with TVL, volume and APR, largest first.".to_string()
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
        let (pools, endpoint) = self.molten.pools(&ctx, args.token.as_deref()).await?;
        let total = pools.len() as u64;
        Ok(ToolOutput::new(
            pools,
            Meta::new(endpoint, ctx.unix_ms()).with_pagination(Some(Pagination {
                total: Some(total),
                ..Default::default()
            })),
        ))
    }
}
