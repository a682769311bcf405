use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use vechain_core::{
    BaseContext, Capability, CapabilityDefinition, CapabilityError, CapabilityKind, FieldError,
    Meta, Network, ToolOutput, gen_schema_for,
};

use super::BUILDER_SOURCE;
use crate::{
    builder::IntentBuilder,
    descriptor::TransactionDescriptor,
    stargate::{StakingLevelInfo, StakingLevelResolver},
};

/// Component name reported in `meta.source` by tier lookups.
pub static STARGATE_SOURCE: &str = "stargate";

fn validate_level_id(level_id: u8) -> Vec<FieldError> {
    if level_id == 0 {
        return vec![FieldError::new("level_id", "StarGate levels start at 1")];
    }
    Vec::new()
}

/// Arguments for staking VET into a StarGate level
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct StargateStakeArgs {
    /// Address that will sign the transaction and own the staking NFT
    pub sender: String,
    /// StarGate level id, e.g. 1 for Strength
    pub level_id: u8,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

/// Builds a payable `stake(levelId)` call. The staked VET is fixed by the level.
pub struct StakeTool<S> {
    builder: Arc<IntentBuilder>,
    stargate: Arc<S>,
    schema: Value,
}

impl<S> StakeTool<S> {
    pub const NAME: &'static str = "stargate_stake";

    pub fn new(builder: Arc<IntentBuilder>, stargate: Arc<S>) -> Self {
        Self {
            builder,
            stargate,
            schema: gen_schema_for::<StargateStakeArgs>(),
        }
    }
}

impl<C, S> Capability<C> for StakeTool<S>
where
    C: BaseContext,
    S: StakingLevelResolver<C> + 'static,
{
    type Args = StargateStakeArgs;
    type Output = TransactionDescriptor;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::TransactionBuild
    }

    fn description(&self) -> String {
        "Build an unsigned StarGate staking transaction. The VET amount is the level's requirement, not chosen by the caller."
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
        validate_level_id(args.level_id)
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let intent = self
            .builder
            .build_stake(
                &ctx,
                self.stargate.as_ref(),
                &args.sender,
                args.level_id,
                args.network,
            )
            .await?;
        Ok(ToolOutput::new(
            intent.descriptor,
            Meta::new(BUILDER_SOURCE, ctx.unix_ms()).with_data_source(intent.data_source),
        ))
    }
}

/// Arguments for looking up a StarGate level
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct StakingLevelArgs {
    /// StarGate level id, e.g. 1 for Strength
    pub level_id: u8,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

/// Reads a StarGate level: name and required VET.
pub struct StakingLevelTool<S> {
    stargate: Arc<S>,
    schema: Value,
}

impl<S> StakingLevelTool<S> {
    pub const NAME: &'static str = "stargate_level_info";

    pub fn new(stargate: Arc<S>) -> Self {
        Self {
            stargate,
            schema: gen_schema_for::<StakingLevelArgs>(),
        }
    }
}

impl<C, S> Capability<C> for StakingLevelTool<S>
where
    C: BaseContext,
    S: StakingLevelResolver<C> + 'static,
{
    type Args = StakingLevelArgs;
    type Output = StakingLevelInfo;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Read
    }

    fn description(&self) -> String {
        "Get a StarGate staking level with the exact VET it requires. meta.dataSource tells whether it was read from the contract or from static data."
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

    fn validate(&self, args: &Self::Args) -> Vec<FieldError> {
        validate_level_id(args.level_id)
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let (level, data_source) = self
            .stargate
            .staking_level(&ctx, args.network, args.level_id)
            .await?;
        Ok(ToolOutput::new(
            level.try_into()?,
            Meta::new(STARGATE_SOURCE, ctx.unix_ms()).with_data_source(data_source),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::tests::SENDER, stargate::tests::stargate};
    use serde_json::json;
    use vechain_core::{CapabilitySet, DataSource, ErrorKind};
    use vechain_engine::context::mock::MockCtx;

    fn registry() -> CapabilitySet<MockCtx> {
        let stargate = Arc::new(stargate());
        let mut set = CapabilitySet::new();
        set.register(StakeTool::new(Arc::new(IntentBuilder::new()), stargate.clone()))
            .unwrap();
        set.register(StakingLevelTool::new(stargate)).unwrap();
        set
    }

    #[tokio::test]
    async fn test_stake_ignores_extra_amount() {
        // an amount supplied by the caller is not part of the schema and never used
        let res = registry()
            .invoke(
                "stargate_stake",
                MockCtx::offline(),
                json!({"sender": SENDER, "level_id": 1, "network": "test", "amount": "1"}),
            )
            .await;
        let data = res.data().unwrap();
        assert_eq!(data["clauses"].as_array().unwrap().len(), 1);
        assert_eq!(data["clauses"][0]["value"], "0x7f0e10af47c1c7000000");
        assert_eq!(
            res.meta().unwrap().data_source,
            Some(DataSource::Fallback)
        );
    }

    #[tokio::test]
    async fn test_level_info() {
        let set = registry();
        let res = set
            .invoke(
                "stargate_level_info",
                MockCtx::offline(),
                json!({"level_id": 1, "network": "test"}),
            )
            .await;
        assert_eq!(
            res.data().unwrap(),
            &json!({
                "id": 1,
                "name": "VeThorX",
                "vetRequired": "600000",
                "vetRequiredBase": "0x7f0e10af47c1c7000000"
            })
        );
        assert_eq!(res.meta().unwrap().source, STARGATE_SOURCE);

        let res = set
            .invoke(
                "stargate_level_info",
                MockCtx::offline(),
                json!({"level_id": 0}),
            )
            .await;
        assert_eq!(res.error_kind(), Some(ErrorKind::Validation));
    }
}
