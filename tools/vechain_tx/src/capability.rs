//! Transaction-build capabilities, plus the StarGate tier lookup they rely on.
//!
//! | name | kind |
//! |---|---|
//! | `vet_transfer` | transaction-build |
//! | `token_transfer` | transaction-build |
//! | `colend_supply` | transaction-build |
//! | `stargate_stake` | transaction-build |
//! | `stargate_level_info` | read |

use alloy::primitives::Address;
use std::{collections::BTreeMap, sync::Arc};
use vechain_core::{
    BaseContext, BoxError, CapabilityError, CapabilitySet, Network, TokenMetadataResolver,
};
use vechain_engine::config::Conf;

use crate::{
    builder::IntentBuilder,
    descriptor::{format_address, parse_address},
    stargate::StakingLevelResolver,
};

mod stake;
mod supply;
mod transfer;

pub use stake::*;
pub use supply::*;
pub use transfer::*;

/// Component name reported in `meta.source` by builder capabilities.
pub static BUILDER_SOURCE: &str = "intent_builder";

/// Every capability in the table above, sharing one builder and address book.
pub fn capabilities<C, R, S>(
    builder: Arc<IntentBuilder>,
    book: Arc<AddressBook>,
    resolver: Arc<R>,
    stargate: Arc<S>,
) -> Result<CapabilitySet<C>, CapabilityError>
where
    C: BaseContext,
    R: TokenMetadataResolver<C> + 'static,
    S: StakingLevelResolver<C> + 'static,
{
    let mut set = CapabilitySet::new();
    set.register(NativeTransferTool::new(builder.clone()))?;
    set.register(TokenTransferTool::new(
        builder.clone(),
        book.clone(),
        resolver.clone(),
    ))?;
    set.register(ColendSupplyTool::new(builder.clone(), book, resolver))?;
    set.register(StakeTool::new(builder, stargate.clone()))?;
    set.register(StakingLevelTool::new(stargate))?;
    Ok(set)
}

#[derive(Debug, Clone, Default)]
struct NetworkBook {
    /// Uppercase symbol to contract address
    tokens: BTreeMap<String, Address>,
    colend_pool: Option<Address>,
}

/// Per-network token table and protocol contracts.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    networks: BTreeMap<Network, NetworkBook>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conf(conf: &Conf) -> Result<Self, BoxError> {
        let mut book = Self::new();
        for (network, cfg) in &conf.networks {
            for (symbol, addr) in &cfg.tokens {
                book = book.with_token(*network, symbol, parse_address(symbol, addr)?);
            }
            if let Some(pool) = &cfg.colend_pool {
                book = book.with_colend_pool(*network, parse_address("colend_pool", pool)?);
            }
        }
        Ok(book)
    }

    pub fn with_token(mut self, network: Network, symbol: &str, address: Address) -> Self {
        self.networks
            .entry(network)
            .or_default()
            .tokens
            .insert(symbol.to_ascii_uppercase(), address);
        self
    }

    pub fn with_colend_pool(mut self, network: Network, pool: Address) -> Self {
        self.networks.entry(network).or_default().colend_pool = Some(pool);
        self
    }

    pub fn colend_pool(&self, network: Network) -> Option<Address> {
        self.networks.get(&network).and_then(|n| n.colend_pool)
    }

    /// Resolves `token`, a 0x address or a symbol from the network's token table, to a
    /// contract address string. Addresses pass through unchanged.
    pub fn token_address(&self, network: Network, token: &str) -> Result<String, CapabilityError> {
        let token = token.trim();
        if token.starts_with("0x") || token.starts_with("0X") {
            return Ok(token.to_string());
        }
        if token.eq_ignore_ascii_case("VET") {
            return Err(CapabilityError::UnsupportedToken {
                token: token.to_string(),
                reason: "VET is the native token, use vet_transfer".to_string(),
            });
        }
        self.networks
            .get(&network)
            .and_then(|n| n.tokens.get(&token.to_ascii_uppercase()))
            .map(format_address)
            .ok_or_else(|| {
                CapabilityError::field(
                    "token",
                    format!("unknown token symbol {token:?} on {network}"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::tests::FixedResolver, stargate::tests::stargate};
    use vechain_core::{CapabilityKind, ErrorKind};
    use vechain_engine::{config::VTHO_CONTRACT, context::mock::MockCtx};

    #[test]
    fn test_capabilities() {
        let set: CapabilitySet<MockCtx> = capabilities(
            Arc::new(IntentBuilder::new()),
            Arc::new(AddressBook::new()),
            Arc::new(FixedResolver::decimals(18)),
            Arc::new(stargate()),
        )
        .unwrap();
        assert_eq!(
            set.names(),
            vec![
                "colend_supply",
                "stargate_level_info",
                "stargate_stake",
                "token_transfer",
                "vet_transfer"
            ]
        );
        for def in set.definitions(None) {
            let expected = if def.name == "stargate_level_info" {
                CapabilityKind::Read
            } else {
                CapabilityKind::TransactionBuild
            };
            assert_eq!(def.kind, expected, "{}", def.name);
        }
    }

    #[test]
    fn test_address_book() {
        let book = AddressBook::from_conf(&Conf::default()).unwrap();
        assert_eq!(
            book.token_address(Network::Main, "vtho").unwrap(),
            VTHO_CONTRACT.to_ascii_lowercase()
        );
        assert_eq!(
            book.token_address(Network::Test, "0xABC").unwrap(),
            "0xABC"
        );
        assert_eq!(
            book.token_address(Network::Test, "VET").unwrap_err().kind(),
            ErrorKind::UnsupportedToken
        );
        let err = book.token_address(Network::Test, "DOGE").unwrap_err();
        assert_eq!(err.fields()[0].field, "token");
        assert!(book.colend_pool(Network::Main).is_none());
    }
}
