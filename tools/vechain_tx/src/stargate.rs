//! StarGate staking tiers.
//!
//! Tiers are read from the StarGate NFT contract through a [`ThorNode`] call. When the
//! read fails, the configured static tier table answers instead and the result is
//! marked [`DataSource::Fallback`].

use alloy::{
    primitives::{Address, U256},
    sol_types::{SolCall, SolType},
};
use serde::Serialize;
use std::{collections::BTreeMap, future::Future};
use vechain_core::{BaseContext, BoxError, CapabilityError, DataSource, NATIVE_DECIMALS, Network};
use vechain_engine::config::Conf;

use crate::{
    abi::{IStargateNFT, Level},
    descriptor::parse_address,
    thor::ThorNode,
    units::{from_base_units, to_base_units, to_hex_quantity},
};

/// A staking tier; the stake amount is fixed by the tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingLevel {
    pub id: u8,
    pub name: String,
    /// VET in base units
    pub vet_required: U256,
    pub is_x: Option<bool>,
    pub maturity_blocks: Option<u64>,
}

impl StakingLevel {
    pub fn new(id: u8, name: impl Into<String>, vet_required: U256) -> Self {
        Self {
            id,
            name: name.into(),
            vet_required,
            is_x: None,
            maturity_blocks: None,
        }
    }
}

/// Serialized view of a [`StakingLevel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingLevelInfo {
    pub id: u8,
    pub name: String,
    /// Decimal VET, e.g. "600000"
    pub vet_required: String,
    /// Hex quantity in base units, as it appears in a stake clause
    pub vet_required_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_x: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity_blocks: Option<u64>,
}

impl TryFrom<StakingLevel> for StakingLevelInfo {
    type Error = CapabilityError;

    fn try_from(level: StakingLevel) -> Result<Self, Self::Error> {
        Ok(Self {
            id: level.id,
            name: level.name,
            vet_required: from_base_units(level.vet_required, NATIVE_DECIMALS)?,
            vet_required_base: to_hex_quantity(level.vet_required),
            is_x: level.is_x,
            maturity_blocks: level.maturity_blocks,
        })
    }
}

/// Read-side lookup of staking tiers used by the stake builder.
pub trait StakingLevelResolver<C>: Send + Sync
where
    C: BaseContext,
{
    /// The contract stake calls are sent to.
    fn stake_contract(&self, network: Network) -> Option<Address>;

    /// Resolves a tier and reports which path produced it.
    fn staking_level(
        &self,
        ctx: &C,
        network: Network,
        level_id: u8,
    ) -> impl Future<Output = Result<(StakingLevel, DataSource), CapabilityError>> + Send;
}

#[derive(Debug, Clone)]
struct StarGateNetwork {
    node: ThorNode,
    contract: Option<Address>,
    levels: Vec<StakingLevel>,
}

/// StarGate tier reader keyed by network.
#[derive(Debug, Clone, Default)]
pub struct StarGate {
    networks: BTreeMap<Network, StarGateNetwork>,
}

impl StarGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conf(conf: &Conf) -> Result<Self, BoxError> {
        let mut stargate = Self::new();
        for (network, cfg) in &conf.networks {
            let contract = cfg
                .stargate_contract
                .as_deref()
                .map(|addr| parse_address("stargate_contract", addr))
                .transpose()?;
            let levels = cfg
                .staking_levels
                .iter()
                .map(|l| {
                    Ok(StakingLevel::new(
                        l.id,
                        l.name.clone(),
                        to_base_units(&l.vet_required, NATIVE_DECIMALS)?,
                    ))
                })
                .collect::<Result<Vec<_>, CapabilityError>>()?;
            stargate = stargate.with_network(*network, cfg.node_url.clone(), contract, levels);
        }
        Ok(stargate)
    }

    pub fn with_network(
        mut self,
        network: Network,
        node_url: String,
        contract: Option<Address>,
        levels: Vec<StakingLevel>,
    ) -> Self {
        self.networks.insert(
            network,
            StarGateNetwork {
                node: ThorNode::new(&node_url),
                contract,
                levels,
            },
        );
        self
    }

    async fn read_level<C: BaseContext>(
        &self,
        ctx: &C,
        node: &ThorNode,
        contract: Address,
        level_id: u8,
    ) -> Result<Option<StakingLevel>, CapabilityError> {
        let endpoint = node.endpoint();
        let data = IStargateNFT::getLevelCall { levelId: level_id }.abi_encode();
        let output = node
            .call(ctx, &[(contract, data)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::upstream(&endpoint, "empty call response"))?
            .into_data(&endpoint)?;
        let level = <Level as SolType>::abi_decode(&output).map_err(|err| {
            CapabilityError::upstream(&endpoint, format!("failed to decode level: {err}"))
        })?;

        // Unknown ids decode as an empty tier.
        if level.name.is_empty() || level.vetAmountRequiredToStake.is_zero() {
            return Ok(None);
        }
        Ok(Some(StakingLevel {
            id: level_id,
            name: level.name,
            vet_required: level.vetAmountRequiredToStake,
            is_x: Some(level.isX),
            maturity_blocks: Some(level.maturityBlocks),
        }))
    }
}

impl<C> StakingLevelResolver<C> for StarGate
where
    C: BaseContext,
{
    fn stake_contract(&self, network: Network) -> Option<Address> {
        self.networks.get(&network).and_then(|n| n.contract)
    }

    async fn staking_level(
        &self,
        ctx: &C,
        network: Network,
        level_id: u8,
    ) -> Result<(StakingLevel, DataSource), CapabilityError> {
        let net = self.networks.get(&network).ok_or_else(|| {
            CapabilityError::field("network", format!("network {network} is not configured"))
        })?;
        let unknown_level = || {
            CapabilityError::field("level_id", format!("unknown StarGate level {level_id}"))
        };

        let read_err = match net.contract {
            Some(contract) => match self.read_level(ctx, &net.node, contract, level_id).await {
                Ok(Some(level)) => return Ok((level, DataSource::Contract)),
                Ok(None) => return Err(unknown_level()),
                Err(err) => Some(err),
            },
            None => None,
        };

        match net.levels.iter().find(|l| l.id == level_id) {
            Some(level) => {
                log::warn!(
                    network = network.as_str(),
                    level_id = level_id,
                    error = read_err.as_ref().map(|e| e.to_string()).unwrap_or_default();
                    "StarGate contract unavailable, using static level data"
                );
                Ok((level.clone(), DataSource::Fallback))
            }
            None => Err(read_err.unwrap_or_else(unknown_level)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::descriptor::format_address;
    use serde_json::{Value, json};
    use vechain_core::ErrorKind;
    use vechain_engine::context::mock::MockCtx;

    pub(crate) fn contract() -> Address {
        Address::repeat_byte(0x1e)
    }

    pub(crate) fn vet(amount: &str) -> U256 {
        to_base_units(amount, NATIVE_DECIMALS).unwrap()
    }

    /// A test-network StarGate whose contract and static table both know tier 1.
    pub(crate) fn stargate() -> StarGate {
        StarGate::new().with_network(
            Network::Test,
            "http://thor.test/".to_string(),
            Some(contract()),
            vec![StakingLevel::new(1, "VeThorX", vet("600000"))],
        )
    }

    fn level_response(name: &str, vet_required: U256) -> Value {
        let level = Level {
            name: name.to_string(),
            isX: true,
            id: 1,
            maturityBlocks: 43_200,
            scaledRewardFactor: 150,
            vetAmountRequiredToStake: vet_required,
        };
        json!([{
            "data": format!("0x{}", hex::encode(<Level as SolType>::abi_encode(&level))),
            "reverted": false,
            "vmError": ""
        }])
    }

    #[tokio::test]
    async fn test_level_from_contract() {
        let ctx = MockCtx::new(|_| Ok(level_response("VeThorX", vet("600000"))));
        let (level, source) = stargate()
            .staking_level(&ctx, Network::Test, 1)
            .await
            .unwrap();
        assert_eq!(source, DataSource::Contract);
        assert_eq!(level.vet_required, vet("600000"));
        assert_eq!(level.is_x, Some(true));

        let req = &ctx.requests()[0];
        assert_eq!(req.endpoint(), "http://thor.test/accounts/*");
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["clauses"][0]["to"], format_address(&contract()));
        assert!(body["clauses"][0]["data"].as_str().unwrap().ends_with("01"));
    }

    #[tokio::test]
    async fn test_level_fallback() {
        let ctx = MockCtx::offline();
        let (level, source) = stargate()
            .staking_level(&ctx, Network::Test, 1)
            .await
            .unwrap();
        assert_eq!(source, DataSource::Fallback);
        assert_eq!(level.name, "VeThorX");

        let ctx = MockCtx::new(|_| Ok(json!([{"data": "0x", "reverted": true, "vmError": "execution reverted"}])));
        let (_, source) = stargate()
            .staking_level(&ctx, Network::Test, 1)
            .await
            .unwrap();
        assert_eq!(source, DataSource::Fallback);

        // Not in the static table either: the read error surfaces.
        let err = stargate()
            .staking_level(&MockCtx::offline(), Network::Test, 9)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn test_unknown_level_and_network() {
        let ctx = MockCtx::new(|_| Ok(level_response("", U256::ZERO)));
        let err = stargate()
            .staking_level(&ctx, Network::Test, 42)
            .await
            .unwrap_err();
        assert_eq!(err.fields()[0].field, "level_id");

        let err = stargate()
            .staking_level(&ctx, Network::Main, 1)
            .await
            .unwrap_err();
        assert_eq!(err.fields()[0].field, "network");
    }

    #[test]
    fn test_from_conf() {
        let conf = Conf::from_toml(
            r#"
            [networks.test]
            node_url = "http://thor.test"
            stargate_contract = "0x1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e"

            [[networks.test.staking_levels]]
            id = 1
            name = "VeThorX"
            vet_required = "600000"
            "#,
        )
        .unwrap();
        let stargate = StarGate::from_conf(&conf).unwrap();
        assert_eq!(
            StakingLevelResolver::<MockCtx>::stake_contract(&stargate, Network::Test),
            Some(contract())
        );
        assert_eq!(
            StakingLevelResolver::<MockCtx>::stake_contract(&stargate, Network::Main),
            None
        );

        let info = StakingLevelInfo::try_from(StakingLevel::new(1, "VeThorX", vet("600000"))).unwrap();
        assert_eq!(info.vet_required, "600000");
        assert_eq!(info.vet_required_base, "0x7f0e10af47c1c7000000");
    }
}
