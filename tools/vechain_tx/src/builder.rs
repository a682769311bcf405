//! Transaction Intent Builder
//!
//! Turns a semantic intent ("transfer 100.5 of token X to Y") into an unsigned
//! [`TransactionDescriptor`]. Callers always supply human-readable decimal strings; the
//! builder owns every conversion to base units and every call encoding.
//!
//! Validation happens before any clause is built: a failed build returns an error and
//! no descriptor at all.

use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use vechain_core::{
    BaseContext, BoxError, CapabilityError, DataSource, ErrorKind, NATIVE_DECIMALS, Network,
    TokenMetadataResolver,
};
use vechain_engine::config::PolicyConf;

use crate::{
    abi::{IStargateNFT, IVIP180},
    descriptor::{Clause, TransactionDescriptor, format_address, parse_addresses},
    stargate::{StakingLevel, StakingLevelResolver},
    units::{DecimalAmount, from_base_units},
};

/// A built descriptor plus the path its token or tier data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub descriptor: TransactionDescriptor,
    pub data_source: DataSource,
}

/// Arguments of a fungible token transfer.
#[derive(Debug, Clone)]
pub struct TokenTransfer<'a> {
    pub sender: &'a str,
    /// Token contract address
    pub token: &'a str,
    pub recipient: &'a str,
    pub amount: &'a str,
    pub network: Network,
    /// Overrides the builder's fallback decimals for this call
    pub fallback_decimals: Option<u8>,
}

/// Arguments of an approval followed by a clause that spends it.
#[derive(Debug, Clone)]
pub struct ApproveThenAct<'a> {
    pub sender: &'a str,
    pub token: &'a str,
    /// Contract allowed to pull the tokens
    pub spender: &'a str,
    pub amount: &'a str,
    pub network: Network,
    pub fallback_decimals: Option<u8>,
}

/// What the action clause factory of [`IntentBuilder::build_approve_then_act`] sees.
#[derive(Debug, Clone)]
pub struct Approval {
    pub sender: Address,
    pub token: Address,
    pub spender: Address,
    /// Approved amount in base units
    pub amount: U256,
    pub symbol: String,
    pub decimals: u8,
}

/// Token data used for one build, never kept beyond it.
struct ResolvedToken {
    symbol: String,
    decimals: u8,
    data_source: DataSource,
    warning: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntentBuilder {
    transfer_ceiling: Option<DecimalAmount>,
    stake_ceiling: Option<DecimalAmount>,
    fallback_decimals: Option<u8>,
}

impl IntentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_policy(policy: &PolicyConf) -> Result<Self, BoxError> {
        let mut builder = Self::new();
        if let Some(ceiling) = &policy.transfer_ceiling {
            builder.transfer_ceiling = Some(DecimalAmount::parse(ceiling)?);
        }
        if let Some(ceiling) = &policy.stake_ceiling {
            builder.stake_ceiling = Some(DecimalAmount::parse(ceiling)?);
        }
        builder.fallback_decimals = policy.fallback_decimals;
        Ok(builder)
    }

    /// Transfers and supplies of `ceiling` units or more are rejected.
    pub fn with_transfer_ceiling(mut self, ceiling: DecimalAmount) -> Self {
        self.transfer_ceiling = Some(ceiling);
        self
    }

    /// Stakes whose tier requires `ceiling` VET or more are rejected.
    pub fn with_stake_ceiling(mut self, ceiling: DecimalAmount) -> Self {
        self.stake_ceiling = Some(ceiling);
        self
    }

    pub fn with_fallback_decimals(mut self, decimals: u8) -> Self {
        self.fallback_decimals = Some(decimals);
        self
    }

    fn check_transfer_ceiling(&self, amount: &DecimalAmount) -> Result<(), CapabilityError> {
        match &self.transfer_ceiling {
            Some(ceiling) if amount >= ceiling => Err(CapabilityError::invalid_amount(
                amount.to_string(),
                format!("amount must be below the transfer ceiling of {ceiling}"),
            )),
            _ => Ok(()),
        }
    }

    fn check_stake_ceiling(&self, level: &StakingLevel) -> Result<(), CapabilityError> {
        let Some(ceiling) = &self.stake_ceiling else {
            return Ok(());
        };
        if level.vet_required >= ceiling.to_base_units(NATIVE_DECIMALS)? {
            return Err(CapabilityError::invalid_amount(
                from_base_units(level.vet_required, NATIVE_DECIMALS)?,
                format!("level {} requires a stake at or above the ceiling of {ceiling} VET", level.name),
            ));
        }
        Ok(())
    }

    /// Builds a single-clause VET transfer. The amount is converted with 18 decimals.
    pub fn build_native_transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: &str,
        network: Network,
    ) -> Result<TransactionDescriptor, CapabilityError> {
        let [sender, recipient] = parse_addresses([("sender", sender), ("recipient", recipient)])?;
        let amount = DecimalAmount::parse(amount)?;
        self.check_transfer_ceiling(&amount)?;
        let value = amount.to_base_units(NATIVE_DECIMALS)?;

        let clause = Clause::new(
            recipient,
            value,
            &[],
            Some(format!("Transfer {amount} VET")),
        );
        TransactionDescriptor::new(
            sender,
            vec![clause],
            network,
            format!(
                "Transfer {amount} VET from {} to {} on {network}",
                format_address(&sender),
                format_address(&recipient)
            ),
        )
    }

    /// Builds a single-clause `transfer(recipient, amount)` call on the token contract.
    pub async fn build_token_transfer<C, R>(
        &self,
        ctx: &C,
        resolver: &R,
        req: TokenTransfer<'_>,
    ) -> Result<Intent, CapabilityError>
    where
        C: BaseContext,
        R: TokenMetadataResolver<C>,
    {
        let [sender, token, recipient] = parse_addresses([
            ("sender", req.sender),
            ("token", req.token),
            ("recipient", req.recipient),
        ])?;
        let amount = DecimalAmount::parse(req.amount)?;
        self.check_transfer_ceiling(&amount)?;

        let resolved = self
            .resolve_token(ctx, resolver, req.network, token, req.fallback_decimals)
            .await?;
        let value = amount.to_base_units(resolved.decimals)?;
        let data = IVIP180::transferCall {
            to: recipient,
            amount: value,
        }
        .abi_encode();

        let symbol = &resolved.symbol;
        let clause = Clause::new(
            token,
            U256::ZERO,
            &data,
            Some(format!("Transfer {amount} {symbol}")),
        );
        let mut descriptor = TransactionDescriptor::new(
            sender,
            vec![clause],
            req.network,
            format!(
                "Transfer {amount} {symbol} from {} to {} on {}",
                format_address(&sender),
                format_address(&recipient),
                req.network
            ),
        )?;
        if let Some(warning) = resolved.warning {
            descriptor = descriptor.with_warning(warning);
        }
        Ok(Intent {
            descriptor,
            data_source: resolved.data_source,
        })
    }

    /// Builds `approve(spender, amount)` followed by the clause `action` returns.
    ///
    /// The approval is always clause 0. If `action` fails, nothing is built.
    pub async fn build_approve_then_act<C, R, F>(
        &self,
        ctx: &C,
        resolver: &R,
        req: ApproveThenAct<'_>,
        action: F,
    ) -> Result<Intent, CapabilityError>
    where
        C: BaseContext,
        R: TokenMetadataResolver<C>,
        F: FnOnce(&Approval) -> Result<Clause, CapabilityError>,
    {
        let [sender, token, spender] = parse_addresses([
            ("sender", req.sender),
            ("token", req.token),
            ("spender", req.spender),
        ])?;
        let amount = DecimalAmount::parse(req.amount)?;
        if amount.is_zero() {
            return Err(CapabilityError::invalid_amount(
                amount.to_string(),
                "amount must be positive",
            ));
        }
        self.check_transfer_ceiling(&amount)?;

        let resolved = self
            .resolve_token(ctx, resolver, req.network, token, req.fallback_decimals)
            .await?;
        let approval = Approval {
            sender,
            token,
            spender,
            amount: amount.to_base_units(resolved.decimals)?,
            symbol: resolved.symbol,
            decimals: resolved.decimals,
        };
        let action_clause = action(&approval)?;

        let approve = IVIP180::approveCall {
            spender,
            amount: approval.amount,
        }
        .abi_encode();
        let approve_clause = Clause::new(
            token,
            U256::ZERO,
            &approve,
            Some(format!(
                "Approve {} to spend {amount} {}",
                format_address(&spender),
                approval.symbol
            )),
        );
        let summary = match &action_clause.comment {
            Some(action) => format!(
                "Approve {amount} {} for {}, then {action} on {}",
                approval.symbol,
                format_address(&spender),
                req.network
            ),
            None => format!(
                "Approve {amount} {} for {} and call it on {}",
                approval.symbol,
                format_address(&spender),
                req.network
            ),
        };

        let mut descriptor = TransactionDescriptor::new(
            sender,
            vec![approve_clause, action_clause],
            req.network,
            summary,
        )?;
        if let Some(warning) = resolved.warning {
            descriptor = descriptor.with_warning(warning);
        }
        Ok(Intent {
            descriptor,
            data_source: resolved.data_source,
        })
    }

    /// Builds a payable `stake(levelId)` call whose value is the tier's required VET.
    pub async fn build_stake<C, S>(
        &self,
        ctx: &C,
        levels: &S,
        sender: &str,
        level_id: u8,
        network: Network,
    ) -> Result<Intent, CapabilityError>
    where
        C: BaseContext,
        S: StakingLevelResolver<C>,
    {
        let [sender] = parse_addresses([("sender", sender)])?;
        let contract = levels.stake_contract(network).ok_or_else(|| {
            CapabilityError::field(
                "network",
                format!(
                    "no StarGate contract configured for {network} (set networks.{network}.stargate_contract)"
                ),
            )
        })?;
        let (level, data_source) = levels.staking_level(ctx, network, level_id).await?;
        self.check_stake_ceiling(&level)?;

        let vet = from_base_units(level.vet_required, NATIVE_DECIMALS)?;
        let data = IStargateNFT::stakeCall { levelId: level_id }.abi_encode();
        let clause = Clause::new(
            contract,
            level.vet_required,
            &data,
            Some(format!("Stake {vet} VET for StarGate level {}", level.name)),
        );
        let mut descriptor = TransactionDescriptor::new(
            sender,
            vec![clause],
            network,
            format!(
                "Stake {vet} VET from {} for StarGate level {} ({}) on {network}",
                format_address(&sender),
                level.name,
                level.id
            ),
        )?;
        if data_source == DataSource::Fallback {
            descriptor = descriptor.with_warning(format!(
                "StarGate contract was unreachable; the {vet} VET requirement of level {} comes from static data",
                level.name
            ));
        }
        Ok(Intent {
            descriptor,
            data_source,
        })
    }

    async fn resolve_token<C, R>(
        &self,
        ctx: &C,
        resolver: &R,
        network: Network,
        token: Address,
        fallback_decimals: Option<u8>,
    ) -> Result<ResolvedToken, CapabilityError>
    where
        C: BaseContext,
        R: TokenMetadataResolver<C>,
    {
        let token_addr = format_address(&token);
        match resolver.resolve_token(ctx, network, &token_addr).await {
            Ok(meta) => {
                if meta.is_native() {
                    return Err(CapabilityError::UnsupportedToken {
                        token: token_addr,
                        reason: "native VET is transferred with the clause value".to_string(),
                    });
                }
                if !meta.standard.is_fungible_contract() {
                    return Err(CapabilityError::UnsupportedToken {
                        token: token_addr,
                        reason: format!("token standard {:?} is not VIP-180", meta.standard),
                    });
                }
                Ok(ResolvedToken {
                    symbol: meta.symbol,
                    decimals: meta.decimal_places,
                    data_source: DataSource::Upstream,
                    warning: None,
                })
            }
            Err(err) if err.kind() == ErrorKind::UnsupportedToken => Err(err),
            Err(err) => match fallback_decimals.or(self.fallback_decimals) {
                Some(decimals) => {
                    log::warn!(
                        token = token_addr.as_str(),
                        network = network.as_str(),
                        decimals = decimals,
                        error = err.to_string();
                        "token metadata unavailable, using fallback decimals"
                    );
                    Ok(ResolvedToken {
                        warning: Some(format!(
                            "token metadata was unavailable ({err}); amount encoded assuming {decimals} decimals"
                        )),
                        symbol: format!("tokens of {token_addr}"),
                        decimals,
                        data_source: DataSource::Fallback,
                    })
                }
                None => Err(CapabilityError::MetadataUnavailable {
                    token: token_addr,
                    reason: err.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stargate::tests::{stargate, vet};
    use vechain_core::{TokenMetadata, TokenStandard};
    use vechain_engine::context::mock::MockCtx;

    pub(crate) const SENDER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    pub(crate) const TOKEN: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    pub(crate) const RECIPIENT: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
    pub(crate) const POOL: &str = "0xdddddddddddddddddddddddddddddddddddddddd";

    /// Answers every lookup with the same metadata or error.
    pub(crate) struct FixedResolver(pub Result<TokenMetadata, CapabilityError>);

    impl FixedResolver {
        pub(crate) fn decimals(decimals: u8) -> Self {
            Self(Ok(TokenMetadata {
                symbol: "B3TR".to_string(),
                name: "B3TR".to_string(),
                decimal_places: decimals,
                contract_address: Some(TOKEN.to_string()),
                standard: TokenStandard::Vip180,
            }))
        }

        pub(crate) fn failing() -> Self {
            Self(Err(CapabilityError::upstream(
                "https://api.vechainstats.com/v2/token/info",
                "status 503",
            )))
        }
    }

    impl<C: BaseContext> TokenMetadataResolver<C> for FixedResolver {
        async fn resolve_token(
            &self,
            _ctx: &C,
            _network: Network,
            _token: &str,
        ) -> Result<TokenMetadata, CapabilityError> {
            self.0.clone()
        }
    }

    fn word(hex_value: &str) -> String {
        format!("{hex_value:0>64}")
    }

    fn transfer(amount: &str) -> TokenTransfer<'_> {
        TokenTransfer {
            sender: SENDER,
            token: TOKEN,
            recipient: RECIPIENT,
            amount,
            network: Network::Test,
            fallback_decimals: None,
        }
    }

    #[test]
    fn test_native_transfer() {
        let desc = IntentBuilder::new()
            .build_native_transfer(SENDER, RECIPIENT, "100.5", Network::Test)
            .unwrap();
        assert_eq!(desc.sender, SENDER);
        assert_eq!(desc.clauses.len(), 1);
        assert_eq!(desc.clauses[0].to, RECIPIENT);
        assert_eq!(desc.clauses[0].value, "0x572b7b98736c20000");
        assert_eq!(desc.clauses[0].data, "0x");
        assert!(desc.human_summary.contains("100.5 VET"));
    }

    #[test]
    fn test_native_transfer_fails_fast() {
        let builder = IntentBuilder::new();
        for amount in ["-5", "not-a-number"] {
            let err = builder
                .build_native_transfer(SENDER, RECIPIENT, amount, Network::Test)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "{amount}");
        }

        let err = builder
            .build_native_transfer("0x1", "bad", "1", Network::Main)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.fields().len(), 2);

        let err = builder
            .build_native_transfer(SENDER, RECIPIENT, "1.0000000000000000001", Network::Main)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_transfer_ceiling() {
        let builder = IntentBuilder::from_policy(&PolicyConf {
            transfer_ceiling: Some("1000".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(
            builder
                .build_native_transfer(SENDER, RECIPIENT, "999.999", Network::Main)
                .is_ok()
        );
        for amount in ["1000", "1000.0", "5000"] {
            let err = builder
                .build_native_transfer(SENDER, RECIPIENT, amount, Network::Main)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "{amount}");
        }

        assert!(
            IntentBuilder::from_policy(&PolicyConf {
                transfer_ceiling: Some("lots".to_string()),
                ..Default::default()
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_token_transfer() {
        let ctx = MockCtx::offline();
        let intent = IntentBuilder::new()
            .build_token_transfer(&ctx, &FixedResolver::decimals(18), transfer("100.5"))
            .await
            .unwrap();
        let desc = intent.descriptor;
        assert_eq!(intent.data_source, DataSource::Upstream);
        assert_eq!(desc.network, Network::Test);
        assert_eq!(desc.clauses.len(), 1);
        assert_eq!(desc.clauses[0].to, TOKEN);
        assert_eq!(desc.clauses[0].value, "0x0");
        assert_eq!(
            desc.clauses[0].data,
            format!(
                "0xa9059cbb{}{}",
                word(&RECIPIENT[2..]),
                word("572b7b98736c20000")
            )
        );
        assert!(desc.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_token_transfer_uses_token_decimals() {
        let ctx = MockCtx::offline();
        let intent = IntentBuilder::new()
            .build_token_transfer(&ctx, &FixedResolver::decimals(6), transfer("100"))
            .await
            .unwrap();
        assert!(intent.descriptor.clauses[0].data.ends_with(&word("5f5e100")));

        let err = IntentBuilder::new()
            .build_token_transfer(&ctx, &FixedResolver::decimals(6), transfer("0.0000001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[tokio::test]
    async fn test_token_transfer_metadata_fallback() {
        let ctx = MockCtx::offline();
        let err = IntentBuilder::new()
            .build_token_transfer(&ctx, &FixedResolver::failing(), transfer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataUnavailable);

        let intent = IntentBuilder::new()
            .with_fallback_decimals(18)
            .build_token_transfer(&ctx, &FixedResolver::failing(), transfer("1"))
            .await
            .unwrap();
        assert_eq!(intent.data_source, DataSource::Fallback);
        assert_eq!(intent.descriptor.warnings.len(), 1);
        assert!(intent.descriptor.warnings[0].contains("18 decimals"));

        // a per-call fallback wins over the configured one
        let mut req = transfer("1");
        req.fallback_decimals = Some(6);
        let intent = IntentBuilder::new()
            .with_fallback_decimals(18)
            .build_token_transfer(&ctx, &FixedResolver::failing(), req)
            .await
            .unwrap();
        assert!(intent.descriptor.clauses[0].data.ends_with(&word("f4240")));
    }

    #[tokio::test]
    async fn test_token_transfer_unsupported_token() {
        let ctx = MockCtx::offline();
        let nft = FixedResolver(Ok(TokenMetadata {
            symbol: "VNFT".to_string(),
            name: "Some NFT".to_string(),
            decimal_places: 0,
            contract_address: Some(TOKEN.to_string()),
            standard: TokenStandard::parse("vip181"),
        }));
        let err = IntentBuilder::new()
            .with_fallback_decimals(18)
            .build_token_transfer(&ctx, &nft, transfer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedToken);

        let native = FixedResolver(Ok(TokenMetadata {
            symbol: "VET".to_string(),
            name: "VeChain".to_string(),
            decimal_places: 18,
            contract_address: None,
            standard: TokenStandard::Native,
        }));
        let err = IntentBuilder::new()
            .build_token_transfer(&ctx, &native, transfer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedToken);
    }

    fn supply_clause(approval: &Approval) -> Result<Clause, CapabilityError> {
        Ok(Clause::new(
            approval.spender,
            U256::ZERO,
            &[0xde, 0xad],
            Some("supply".to_string()),
        ))
    }

    #[tokio::test]
    async fn test_approve_then_act_order() {
        let ctx = MockCtx::offline();
        let req = ApproveThenAct {
            sender: SENDER,
            token: TOKEN,
            spender: POOL,
            amount: "100",
            network: Network::Main,
            fallback_decimals: None,
        };
        let intent = IntentBuilder::new()
            .build_approve_then_act(&ctx, &FixedResolver::decimals(6), req, supply_clause)
            .await
            .unwrap();
        let clauses = &intent.descriptor.clauses;
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].to, TOKEN);
        assert_eq!(
            clauses[0].data,
            format!("0x095ea7b3{}{}", word(&POOL[2..]), word("5f5e100"))
        );
        assert_eq!(clauses[1].to, POOL);
        assert_eq!(clauses[1].data, "0xdead");
        assert!(intent.descriptor.human_summary.contains("then supply"));
    }

    #[tokio::test]
    async fn test_approve_then_act_fails_without_partial_descriptor() {
        let ctx = MockCtx::offline();
        let req = ApproveThenAct {
            sender: SENDER,
            token: TOKEN,
            spender: POOL,
            amount: "1",
            network: Network::Main,
            fallback_decimals: None,
        };
        let err = IntentBuilder::new()
            .build_approve_then_act(&ctx, &FixedResolver::decimals(18), req.clone(), |_| {
                Err(CapabilityError::Execution("pool unavailable".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        let err = IntentBuilder::new()
            .build_approve_then_act(
                &ctx,
                &FixedResolver::decimals(18),
                ApproveThenAct { amount: "0", ..req },
                supply_clause,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[tokio::test]
    async fn test_stake_uses_tier_amount() {
        let ctx = MockCtx::offline();
        let intent = IntentBuilder::new()
            .build_stake(&ctx, &stargate(), SENDER, 1, Network::Test)
            .await
            .unwrap();
        assert_eq!(intent.data_source, DataSource::Fallback);
        let desc = intent.descriptor;
        assert_eq!(desc.clauses.len(), 1);
        assert_eq!(desc.clauses[0].value, "0x7f0e10af47c1c7000000");
        assert_eq!(desc.clauses[0].to, format!("0x{}", "1e".repeat(20)));
        assert!(desc.clauses[0].data.ends_with(&word("1")));
        assert_eq!(desc.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_stake_ceiling_and_missing_contract() {
        let ctx = MockCtx::offline();
        let builder = IntentBuilder::new().with_stake_ceiling(DecimalAmount::parse("600000").unwrap());
        let err = builder
            .build_stake(&ctx, &stargate(), SENDER, 1, Network::Test)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err = IntentBuilder::new()
            .build_stake(&ctx, &stargate(), SENDER, 1, Network::Main)
            .await
            .unwrap_err();
        assert_eq!(err.fields()[0].field, "network");
        assert_eq!(
            err.fields()[0].message,
            "no StarGate contract configured for main (set networks.main.stargate_contract)"
        );
        assert_eq!(vet("1"), U256::from(10u64).pow(U256::from(18)));
    }
}
