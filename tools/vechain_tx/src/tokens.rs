//! VIP-180 token metadata read from the token contract itself.
//!
//! `decimals()`, `symbol()` and `name()` go out as three clauses of one Thor call.
//! Decimals decide how amounts are encoded, so a contract that cannot answer
//! `decimals()` is reported as `UnsupportedTokenError`. Symbol and name are cosmetic
//! and fall back to the address.

use alloy::{
    primitives::Address,
    sol_types::{SolCall, SolType, sol_data},
};
use std::collections::BTreeMap;
use vechain_core::{
    BaseContext, CapabilityError, Network, TokenMetadata, TokenMetadataResolver, TokenStandard,
};
use vechain_engine::config::Conf;

use crate::{
    abi::IVIP180,
    descriptor::{format_address, parse_address},
    thor::{CallOutput, ThorNode},
};

/// On-chain token metadata keyed by network.
#[derive(Debug, Clone, Default)]
pub struct ThorTokens {
    nodes: BTreeMap<Network, ThorNode>,
}

impl ThorTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conf(conf: &Conf) -> Self {
        conf.networks
            .iter()
            .fold(Self::new(), |tokens, (network, cfg)| {
                tokens.with_node(*network, &cfg.node_url)
            })
    }

    pub fn with_node(mut self, network: Network, node_url: &str) -> Self {
        self.nodes.insert(network, ThorNode::new(node_url));
        self
    }
}

fn decode_string(output: Option<CallOutput>) -> Option<String> {
    let output = output?;
    if output.reverted.is_some() {
        return None;
    }
    <sol_data::String as SolType>::abi_decode(&output.data)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl<C> TokenMetadataResolver<C> for ThorTokens
where
    C: BaseContext,
{
    async fn resolve_token(
        &self,
        ctx: &C,
        network: Network,
        token: &str,
    ) -> Result<TokenMetadata, CapabilityError> {
        let node = self.nodes.get(&network).ok_or_else(|| {
            CapabilityError::field("network", format!("no Thor node configured for {network}"))
        })?;
        let address: Address = parse_address("token", token)?;
        let calls = [
            (address, IVIP180::decimalsCall {}.abi_encode()),
            (address, IVIP180::symbolCall {}.abi_encode()),
            (address, IVIP180::nameCall {}.abi_encode()),
        ];
        let mut outputs = node.call(ctx, &calls).await?.into_iter();

        let unsupported = |reason: String| CapabilityError::UnsupportedToken {
            token: format_address(&address),
            reason,
        };
        let decimals = match outputs.next() {
            Some(CallOutput {
                reverted: Some(reason),
                ..
            }) => return Err(unsupported(format!("decimals() reverted: {reason}"))),
            Some(CallOutput { data, .. }) if data.is_empty() => {
                return Err(unsupported(
                    "decimals() returned nothing, the address is not a token contract".to_string(),
                ));
            }
            Some(CallOutput { data, .. }) => {
                let value = <sol_data::Uint<256> as SolType>::abi_decode(&data)
                    .map_err(|err| unsupported(format!("invalid decimals(): {err}")))?;
                u8::try_from(value)
                    .map_err(|_| unsupported(format!("decimals() returned {value}")))?
            }
            None => {
                return Err(CapabilityError::upstream(
                    node.endpoint(),
                    "empty call response",
                ));
            }
        };
        let symbol = decode_string(outputs.next()).unwrap_or_else(|| format_address(&address));
        let name = decode_string(outputs.next()).unwrap_or_else(|| symbol.clone());

        Ok(TokenMetadata {
            symbol,
            name,
            decimal_places: decimals,
            contract_address: Some(format_address(&address)),
            standard: TokenStandard::Vip180,
        })
    }
}
