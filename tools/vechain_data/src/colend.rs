//! Colend lending protocol reserves.

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

/// A lending reserve. Rates are percentages for display.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    pub symbol: String,
    pub name: Option<String>,
    pub underlying_asset: Option<String>,
    pub decimals: Option<u64>,
    pub supply_apy: Option<f64>,
    pub borrow_apy: Option<f64>,
    pub total_supplied: Option<String>,
    pub total_borrowed: Option<String>,
    pub available_liquidity: Option<String>,
    pub ltv: Option<f64>,
}

impl Reserve {
    fn from_value(v: &Value) -> Self {
        Self {
            symbol: str_field(v, &["symbol"]).unwrap_or_default(),
            name: str_field(v, &["name"]),
            underlying_asset: str_field(v, &["underlyingAsset", "underlying_asset", "address"]),
            decimals: u64_field(v, &["decimals"]),
            supply_apy: f64_field(v, &["supplyAPY", "supplyApy", "supply_apy", "liquidityRate"]),
            borrow_apy: f64_field(v, &["borrowAPY", "borrowApy", "borrow_apy", "variableBorrowRate"]),
            total_supplied: str_field(v, &["totalSupplied", "total_supplied", "totalLiquidity"]),
            total_borrowed: str_field(v, &["totalBorrowed", "total_borrowed", "totalDebt"]),
            available_liquidity: str_field(v, &["availableLiquidity", "available_liquidity"]),
            ltv: f64_field(v, &["ltv", "baseLTVasCollateral"]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Colend {
    api_url: String,
}

impl Colend {
    pub fn new(api_url: String) -> Self {
        Self { api_url }
    }

    pub fn from_conf(conf: &ApiConf) -> Self {
        Self::new(conf.api_url.clone())
    }

    pub fn capabilities<C: BaseContext>(
        colend: Arc<Colend>,
    ) -> Result<CapabilitySet<C>, CapabilityError> {
        let mut set = CapabilitySet::new();
        set.register(ReservesTool::new(colend))?;
        Ok(set)
    }

    pub async fn reserves<C: BaseContext>(
        &self,
        ctx: &C,
        symbol: Option<&str>,
    ) -> Result<(Vec<Reserve>, String), CapabilityError> {
        let req = UpstreamRequest::get(format!("{}/reserves", self.api_url.trim_end_matches('/')));
        let endpoint = req.endpoint().to_string();
        let data = plain_envelope(&endpoint, ctx.fetch_json(req).await?)?;
        let reserves = list_field(&endpoint, data, &["reserves", "items"])?
            .iter()
            .map(Reserve::from_value)
            .filter(|r| symbol.is_none_or(|s| r.symbol.eq_ignore_ascii_case(s)))
            .collect();
        Ok((reserves, endpoint))
    }
}

/// Arguments for listing Colend reserves
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ReservesArgs {
    /// Only the reserve of this token, e.g. "VET"
    pub symbol: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReservesTool {
    colend: Arc<Colend>,
    schema: Value,
}

impl ReservesTool {
    pub const NAME: &'static str = "colend_reserves";

    pub fn new(colend: Arc<Colend>) -> Self {
        Self {
            colend,
            schema: gen_schema_for::<ReservesArgs>(),
        }
    }
}

impl<C: BaseContext> Capability<C> for ReservesTool {
    type Args = ReservesArgs;
    type Output = Vec<Reserve>;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "List Colend lending reserves with supply and borrow APY and liquidity.".to_string()
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
        let (reserves, endpoint) = self.colend.reserves(&ctx, args.symbol.as_deref()).await?;
        let total = reserves.len() as u64;
        Ok(ToolOutput::new(
            reserves,
            Meta::new(endpoint, ctx.unix_ms()).with_pagination(Some(Pagination {
                total: Some(total),
                ..Default::default()
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vechain_core::ErrorKind;
    use vechain_engine::context::mock::MockCtx;

    fn registry() -> CapabilitySet<MockCtx> {
        Colend::capabilities(Arc::new(Colend::new("https://api.colend.xyz/".to_string()))).unwrap()
    }

    #[tokio::test]
    async fn test_reserves() {
        let ctx = MockCtx::new(|req| {
            assert_eq!(req.endpoint(), "https://api.colend.xyz/reserves");
            Ok(json!({"data": {"reserves": [
                {"symbol": "VET", "supplyAPY": "1.25", "borrowAPY": 3.5, "totalSupplied": "1000000"},
                {"symbol": "B3TR", "supplyAPY": 8.1, "decimals": 18}
            ]}}))
        });
        let res = registry()
            .invoke("colend_reserves", ctx.clone(), json!({"symbol": "vet"}))
            .await;
        let data = res.data().unwrap().as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["supplyApy"], 1.25);
        assert_eq!(data[0]["totalSupplied"], "1000000");

        let res = registry()
            .invoke("colend_reserves", ctx, json!({}))
            .await;
        assert_eq!(res.data().unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reserves_upstream_error() {
        let ctx = MockCtx::new(|_| Ok(json!({"error": "maintenance"})));
        let res = registry().invoke("colend_reserves", ctx, json!({})).await;
        assert_eq!(res.error_kind(), Some(ErrorKind::Upstream));
        assert_eq!(
            res.error_message(),
            Some("https://api.colend.xyz/reserves: maintenance")
        );
    }
}
