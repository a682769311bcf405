use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, str::FromStr, sync::Arc};

use crate::{BaseContext, CapabilityError, ErrorKind};

/// Decimal places of VET and VTHO.
pub const NATIVE_DECIMALS: u8 = 18;

/// Chain environment a request or descriptor targets.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Main,
    Test,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            _ => Err(CapabilityError::field(
                "network",
                format!("unknown network {s:?}, expected \"main\" or \"test\""),
            )),
        }
    }
}

/// Token interface family as reported by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    /// VET itself; moved with the clause value, not with a contract call
    Native,
    /// VeChain fungible token standard, call-compatible with ERC20
    Vip180,
    Erc20,
    /// Anything else, including NFTs and tokens with custom transfer semantics
    Other(String),
}

impl TokenStandard {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "native" | "vet" => TokenStandard::Native,
            "vip180" | "token" | "fungible" => TokenStandard::Vip180,
            "erc20" => TokenStandard::Erc20,
            other => TokenStandard::Other(other.to_string()),
        }
    }

    /// Whether `transfer(address,uint256)` and `approve(address,uint256)` apply.
    pub fn is_fungible_contract(&self) -> bool {
        matches!(self, TokenStandard::Vip180 | TokenStandard::Erc20)
    }
}

/// Token metadata, resolved per builder invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimal_places: u8,
    /// Contract address, `None` for the native token
    pub contract_address: Option<String>,
    pub standard: TokenStandard,
}

impl TokenMetadata {
    pub fn is_native(&self) -> bool {
        self.contract_address.is_none() || self.standard == TokenStandard::Native
    }
}

/// Read-side lookup of token metadata used by the transaction intent builder.
pub trait TokenMetadataResolver<C>: Send + Sync
where
    C: BaseContext,
{
    /// Resolves the metadata of the token at `token` (a contract address) on `network`.
    fn resolve_token(
        &self,
        ctx: &C,
        network: Network,
        token: &str,
    ) -> impl Future<Output = Result<TokenMetadata, CapabilityError>> + Send;
}

/// Asks `primary` first and `secondary` when the primary cannot answer.
///
/// An `UnsupportedTokenError` from the primary is final; any other failure moves on.
#[derive(Debug)]
pub struct ResolverChain<P, S> {
    primary: Arc<P>,
    secondary: Arc<S>,
}

impl<P, S> ResolverChain<P, S> {
    pub fn new(primary: Arc<P>, secondary: Arc<S>) -> Self {
        Self { primary, secondary }
    }
}

impl<C, P, S> TokenMetadataResolver<C> for ResolverChain<P, S>
where
    C: BaseContext,
    P: TokenMetadataResolver<C>,
    S: TokenMetadataResolver<C>,
{
    async fn resolve_token(
        &self,
        ctx: &C,
        network: Network,
        token: &str,
    ) -> Result<TokenMetadata, CapabilityError> {
        match self.primary.resolve_token(ctx, network, token).await {
            Err(err) if err.kind() != ErrorKind::UnsupportedToken => {
                log::debug!(
                    token = token,
                    network = network.as_str(),
                    error = err.to_string();
                    "token metadata lookup failed, trying the next source"
                );
                self.secondary.resolve_token(ctx, network, token).await
            }
            res => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("TestNet".parse::<Network>().unwrap(), Network::Test);
        let err = "solana".parse::<Network>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(serde_json::to_value(Network::Test).unwrap(), "test");
        assert_eq!(
            crate::gen_schema_for::<Network>()["enum"],
            serde_json::json!(["main", "test"])
        );
    }

    struct Fixed(Result<TokenMetadata, CapabilityError>, std::sync::atomic::AtomicUsize);

    impl Fixed {
        fn new(res: Result<TokenMetadata, CapabilityError>) -> Arc<Self> {
            Arc::new(Self(res, Default::default()))
        }

        fn calls(&self) -> usize {
            self.1.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl<C: BaseContext> TokenMetadataResolver<C> for Fixed {
        async fn resolve_token(
            &self,
            _ctx: &C,
            _network: Network,
            _token: &str,
        ) -> Result<TokenMetadata, CapabilityError> {
            self.1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.0.clone()
        }
    }

    fn vtho() -> TokenMetadata {
        TokenMetadata {
            symbol: "VTHO".to_string(),
            name: "VeThor".to_string(),
            decimal_places: 18,
            contract_address: Some("0x0000000000000000000000000000456e65726779".to_string()),
            standard: TokenStandard::Vip180,
        }
    }

    #[tokio::test]
    async fn test_resolver_chain() {
        let ctx = crate::tool::tests::TestCtx;
        let token = "0x0000000000000000000000000000456e65726779";

        let primary = Fixed::new(Err(CapabilityError::field(
            "network",
            "no endpoint for test",
        )));
        let secondary = Fixed::new(Ok(vtho()));
        let chain = ResolverChain::new(primary.clone(), secondary.clone());
        let meta = chain.resolve_token(&ctx, Network::Test, token).await.unwrap();
        assert_eq!(meta, vtho());
        assert_eq!((primary.calls(), secondary.calls()), (1, 1));

        let primary = Fixed::new(Ok(vtho()));
        let chain = ResolverChain::new(primary.clone(), secondary.clone());
        assert!(chain.resolve_token(&ctx, Network::Main, token).await.is_ok());
        assert_eq!(secondary.calls(), 1);

        let primary = Fixed::new(Err(CapabilityError::UnsupportedToken {
            token: token.to_string(),
            reason: "token standard is VIP-181".to_string(),
        }));
        let chain = ResolverChain::new(primary, secondary.clone());
        let err = chain
            .resolve_token(&ctx, Network::Main, token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedToken);
        assert_eq!(secondary.calls(), 1);

        // both fail: the secondary's error is reported
        let primary = Fixed::new(Err(CapabilityError::upstream("stats", "down")));
        let secondary = Fixed::new(Err(CapabilityError::upstream("thor", "down")));
        let err = ResolverChain::new(primary, secondary)
            .resolve_token(&ctx, Network::Main, token)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "thor: down");
    }

    #[test]
    fn test_token_standard_parse() {
        assert_eq!(TokenStandard::parse("VIP-180"), TokenStandard::Vip180);
        assert_eq!(TokenStandard::parse("erc20"), TokenStandard::Erc20);
        assert!(!TokenStandard::parse("vip181").is_fungible_contract());
    }
}
