use alloy::{primitives::U256, sol_types::SolCall};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use vechain_core::{
    BaseContext, Capability, CapabilityDefinition, CapabilityError, CapabilityKind, FieldError,
    Meta, Network, ToolOutput, TokenMetadataResolver, gen_schema_for,
};

use super::{AddressBook, BUILDER_SOURCE};
use crate::{
    abi::IColendPool,
    builder::{Approval, ApproveThenAct, IntentBuilder},
    descriptor::{Clause, TransactionDescriptor, format_address},
    units::from_base_units,
};

/// Arguments for supplying tokens to the Colend lending pool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ColendSupplyArgs {
    /// Address that will sign the transaction and receive the aTokens
    pub sender: String,
    /// Token contract address, or a known symbol such as "VTHO"
    pub token: String,
    /// Decimal token amount, e.g. "250"
    pub amount: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

/// Builds `approve(pool, amount)` followed by `Pool.supply(asset, amount, sender, 0)`.
pub struct ColendSupplyTool<R> {
    builder: Arc<IntentBuilder>,
    book: Arc<AddressBook>,
    resolver: Arc<R>,
    schema: Value,
}

impl<R> ColendSupplyTool<R> {
    pub const NAME: &'static str = "colend_supply";

    pub fn new(builder: Arc<IntentBuilder>, book: Arc<AddressBook>, resolver: Arc<R>) -> Self {
        Self {
            builder,
            book,
            resolver,
            schema: gen_schema_for::<ColendSupplyArgs>(),
        }
    }
}

fn supply_clause(approval: &Approval) -> Result<Clause, CapabilityError> {
    let data = IColendPool::supplyCall {
        asset: approval.token,
        amount: approval.amount,
        onBehalfOf: approval.sender,
        referralCode: 0,
    }
    .abi_encode();
    Ok(Clause::new(
        approval.spender,
        U256::ZERO,
        &data,
        Some(format!(
            "supply {} {} to Colend",
            from_base_units(approval.amount, approval.decimals)?,
            approval.symbol
        )),
    ))
}

impl<C, R> Capability<C> for ColendSupplyTool<R>
where
    C: BaseContext,
    R: TokenMetadataResolver<C> + 'static,
{
    type Args = ColendSupplyArgs;
    type Output = TransactionDescriptor;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::TransactionBuild
    }

    fn description(&self) -> String {
        "Build an unsigned two-clause transaction that approves the Colend pool and supplies tokens to it."
            .to_string()
    }

    fn definition(&self) -> CapabilityDefinition {
        CapabilityDefinition {
            name: Self::NAME.to_string(),
            description: Capability::<C>::description(self),
            kind: CapabilityKind::TransactionBuild,
            parameters: self.schema.clone(),
            strict: None,
        }
    }

    fn validate(&self, args: &Self::Args) -> Vec<FieldError> {
        if self.book.colend_pool(args.network).is_none() {
            return vec![FieldError::new(
                "network",
                format!(
                    "Colend is not configured on {0} (set networks.{0}.colend_pool)",
                    args.network
                ),
            )];
        }
        Vec::new()
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let pool = self.book.colend_pool(args.network).ok_or_else(|| {
            CapabilityError::field(
                "network",
                format!(
                    "Colend is not configured on {0} (set networks.{0}.colend_pool)",
                    args.network
                ),
            )
        })?;
        let pool = format_address(&pool);
        let token = self.book.token_address(args.network, &args.token)?;
        let intent = self
            .builder
            .build_approve_then_act(
                &ctx,
                self.resolver.as_ref(),
                ApproveThenAct {
                    sender: &args.sender,
                    token: &token,
                    spender: &pool,
                    amount: &args.amount,
                    network: args.network,
                    fallback_decimals: None,
                },
                supply_clause,
            )
            .await?;
        Ok(ToolOutput::new(
            intent.descriptor,
            Meta::new(BUILDER_SOURCE, ctx.unix_ms()).with_data_source(intent.data_source),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::{FixedResolver, POOL, SENDER, TOKEN};
    use alloy::primitives::Address;
    use serde_json::json;
    use vechain_core::{CapabilitySet, ErrorKind};
    use vechain_engine::context::mock::MockCtx;

    fn registry() -> CapabilitySet<MockCtx> {
        let book = AddressBook::new()
            .with_token(Network::Main, "B3TR", Address::repeat_byte(0xbb))
            .with_colend_pool(Network::Main, Address::repeat_byte(0xdd));
        let mut set = CapabilitySet::new();
        set.register(ColendSupplyTool::new(
            Arc::new(IntentBuilder::new()),
            Arc::new(book),
            Arc::new(FixedResolver::decimals(18)),
        ))
        .unwrap();
        set
    }

    #[tokio::test]
    async fn test_colend_supply() {
        let res = registry()
            .invoke(
                "colend_supply",
                MockCtx::offline(),
                json!({"sender": SENDER, "token": "B3TR", "amount": "250"}),
            )
            .await;
        let clauses = res.data().unwrap()["clauses"].as_array().unwrap().clone();
        assert_eq!(clauses.len(), 2);

        assert_eq!(clauses[0]["to"], TOKEN);
        let approve = clauses[0]["data"].as_str().unwrap();
        assert!(approve.starts_with("0x095ea7b3"));
        assert!(approve.contains(&POOL[2..]));

        assert_eq!(clauses[1]["to"], POOL);
        let supply = clauses[1]["data"].as_str().unwrap();
        assert!(supply.starts_with("0x617ba037"));
        // asset, amount, onBehalfOf, referralCode
        assert_eq!(supply.len(), 2 + 8 + 4 * 64);
        assert!(supply.contains(&TOKEN[2..]));
        assert!(supply.contains(&SENDER[2..]));
        assert_eq!(clauses[1]["comment"], "supply 250 B3TR to Colend");
    }

    #[tokio::test]
    async fn test_colend_supply_unconfigured_network() {
        let res = registry()
            .invoke(
                "colend_supply",
                MockCtx::offline(),
                json!({"sender": SENDER, "token": "B3TR", "amount": "1", "network": "test"}),
            )
            .await;
        assert_eq!(res.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(
            res.error_message(),
            Some("invalid arguments: network: Colend is not configured on test (set networks.test.colend_pool)")
        );
    }
}
