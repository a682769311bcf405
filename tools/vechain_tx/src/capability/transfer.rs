//! VET and VIP-180 token transfers.

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
    builder::{IntentBuilder, TokenTransfer},
    descriptor::TransactionDescriptor,
};

/// Arguments for building a VET transfer
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct VetTransferArgs {
    /// Address that will sign the transaction, e.g. "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed"
    pub sender: String,
    /// Address receiving the VET
    pub recipient: String,
    /// Decimal amount of VET, e.g. "100.5"
    pub amount: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
}

/// Builds an unsigned single-clause VET transfer.
#[derive(Debug, Clone)]
pub struct NativeTransferTool {
    builder: Arc<IntentBuilder>,
    schema: Value,
}

impl NativeTransferTool {
    pub const NAME: &'static str = "vet_transfer";

    pub fn new(builder: Arc<IntentBuilder>) -> Self {
        Self {
            builder,
            schema: gen_schema_for::<VetTransferArgs>(),
        }
    }
}

impl<C> Capability<C> for NativeTransferTool
where
    C: BaseContext,
{
    type Args = VetTransferArgs;
    type Output = TransactionDescriptor;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::TransactionBuild
    }

    fn description(&self) -> String {
        "Build an unsigned VET transfer for the user's wallet to sign. Nothing is submitted."
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

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let descriptor = self.builder.build_native_transfer(
            &args.sender,
            &args.recipient,
            &args.amount,
            args.network,
        )?;
        Ok(ToolOutput::new(
            descriptor,
            Meta::new(BUILDER_SOURCE, ctx.unix_ms()),
        ))
    }
}

/// Arguments for building a VIP-180 token transfer
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TokenTransferArgs {
    /// Address that will sign the transaction
    pub sender: String,
    /// Token contract address, or a known symbol such as "VTHO"
    pub token: String,
    /// Address receiving the tokens
    pub recipient: String,
    /// Decimal token amount, e.g. "100.5"
    pub amount: String,
    /// Target network, "main" by default
    #[serde(default)]
    pub network: Network,
    /// Decimals to assume if token metadata cannot be fetched
    pub fallback_decimals: Option<u8>,
}

/// Builds an unsigned `transfer(recipient, amount)` call, resolving token decimals first.
pub struct TokenTransferTool<R> {
    builder: Arc<IntentBuilder>,
    book: Arc<AddressBook>,
    resolver: Arc<R>,
    schema: Value,
}

impl<R> TokenTransferTool<R> {
    pub const NAME: &'static str = "token_transfer";

    pub fn new(builder: Arc<IntentBuilder>, book: Arc<AddressBook>, resolver: Arc<R>) -> Self {
        Self {
            builder,
            book,
            resolver,
            schema: gen_schema_for::<TokenTransferArgs>(),
        }
    }
}

/// Highest decimals a fungible token may declare and still encode amounts of 1.
const MAX_DECIMALS: u8 = 77;

pub(crate) fn validate_fallback_decimals(decimals: Option<u8>) -> Vec<FieldError> {
    match decimals {
        Some(d) if d > MAX_DECIMALS => vec![FieldError::new(
            "fallback_decimals",
            format!("must be at most {MAX_DECIMALS}"),
        )],
        _ => Vec::new(),
    }
}

impl<C, R> Capability<C> for TokenTransferTool<R>
where
    C: BaseContext,
    R: TokenMetadataResolver<C> + 'static,
{
    type Args = TokenTransferArgs;
    type Output = TransactionDescriptor;

    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::TransactionBuild
    }

    fn description(&self) -> String {
        "Build an unsigned VIP-180 token transfer for the user's wallet to sign. Token decimals are looked up before encoding."
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
        validate_fallback_decimals(args.fallback_decimals)
    }

    async fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> Result<ToolOutput<Self::Output>, CapabilityError> {
        let token = self.book.token_address(args.network, &args.token)?;
        let intent = self
            .builder
            .build_token_transfer(
                &ctx,
                self.resolver.as_ref(),
                TokenTransfer {
                    sender: &args.sender,
                    token: &token,
                    recipient: &args.recipient,
                    amount: &args.amount,
                    network: args.network,
                    fallback_decimals: args.fallback_decimals,
                },
            )
            .await?;
        Ok(ToolOutput::new(
            intent.descriptor,
            Meta::new(BUILDER_SOURCE, ctx.unix_ms()).with_data_source(intent.data_source),
        ))
    }
}
