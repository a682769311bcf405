//! Capability registry for AI agent orchestrators
//!
//! This module defines the core traits and structures for exposing typed capabilities
//! to an orchestrating agent. It provides:
//! - The [`Capability`] trait for defining capabilities with typed arguments and outputs
//! - Dynamic dispatch through the [`CapabilityDyn`] trait
//! - A [`CapabilitySet`] registry: register at startup, then resolve, invoke and list
//!
//! # Invocation contract
//! [`CapabilitySet::invoke`] never fails and never panics across its boundary:
//! 1. unknown names yield `NotFoundError`;
//! 2. raw arguments are checked against the capability's JSON schema, then by
//!    [`Capability::validate`], reporting every failing field as `ValidationError`;
//! 3. errors returned by [`Capability::execute`] keep their kind, panics become
//!    `ExecutionError`.
//!
//! # Reference Implementations
//! 1. `TokenTransferTool` in `vechain_tx` - builds an unsigned VIP-180 transfer
//! 2. `TokenInfoTool` in `vechain_data` - reads token metadata from VeChainStats

use futures::FutureExt;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    any::Any, collections::BTreeMap, future::Future, marker::PhantomData, panic::AssertUnwindSafe,
    sync::Arc,
};

use crate::{
    BaseContext, BoxPinFut, CapabilityDefinition, CapabilityError, CapabilityKind,
    CapabilityResult, FieldError, ToolOutput, optional_properties, validate_against_schema,
};

/// Core trait for implementing capabilities that an orchestrator can invoke
///
/// # Type Parameters
/// - `C`: The context type that implements `BaseContext`
pub trait Capability<C>: Send + Sync
where
    C: BaseContext,
{
    /// The arguments type of the capability.
    type Args: DeserializeOwned + Send;
    /// The output type of the capability.
    type Output: Serialize;

    /// Returns the capability's name
    /// This name should be unique within the registry.
    ///
    /// # Rules
    /// - Must not be empty
    /// - Length must be ≤ 64 characters
    /// - Can only contain: lowercase letters (a-z), digits (0-9), and underscores (_)
    fn name(&self) -> String;

    fn kind(&self) -> CapabilityKind;

    /// Returns the capability's description in a short string
    fn description(&self) -> String;

    /// Provides the capability's definition including its parameters schema.
    fn definition(&self) -> CapabilityDefinition;

    /// Semantic checks that the JSON schema cannot express (address format, known
    /// networks, configured contracts). Returns every failing field.
    fn validate(&self, _args: &Self::Args) -> Vec<FieldError> {
        Vec::new()
    }

    /// Executes the capability with validated arguments.
    ///
    /// Read capabilities must be idempotent; transaction-build capabilities must not
    /// submit anything.
    fn execute(
        &self,
        ctx: C,
        args: Self::Args,
    ) -> impl Future<Output = Result<ToolOutput<Self::Output>, CapabilityError>> + Send;

    /// Validates raw JSON arguments, executes, and folds the outcome into a
    /// [`CapabilityResult`].
    fn invoke_raw(&self, ctx: C, args: Value) -> impl Future<Output = CapabilityResult> + Send {
        async move {
            let definition = self.definition();
            let errors = validate_against_schema(&definition.parameters, &args);
            if !errors.is_empty() {
                return CapabilityError::Validation(errors).into();
            }

            let args: Self::Args = match serde_json::from_value(args) {
                Ok(args) => args,
                Err(err) => {
                    return CapabilityError::field("args", err.to_string()).into();
                }
            };

            let errors = self.validate(&args);
            if !errors.is_empty() {
                return CapabilityError::Validation(errors).into();
            }

            match self.execute(ctx, args).await {
                Ok(output) => match serde_json::to_value(&output.data) {
                    Ok(data) => CapabilityResult::Ok {
                        data,
                        meta: output.meta,
                    },
                    Err(err) => CapabilityError::Execution(format!(
                        "capability {}, failed to serialize output: {}",
                        definition.name, err
                    ))
                    .into(),
                },
                Err(err) => err.into(),
            }
        }
    }
}

/// Dynamic dispatch version of the Capability trait
pub trait CapabilityDyn<C>: Send + Sync
where
    C: BaseContext,
{
    fn name(&self) -> String;

    fn kind(&self) -> CapabilityKind;

    fn definition(&self) -> CapabilityDefinition;

    fn invoke(&self, ctx: C, args: Value) -> BoxPinFut<CapabilityResult>;
}

/// Wrapper to convert static Capability implementation to dynamic dispatch
struct CapabilityWrapper<T, C>(Arc<T>, PhantomData<C>)
where
    T: Capability<C> + 'static,
    C: BaseContext;

impl<T, C> CapabilityDyn<C> for CapabilityWrapper<T, C>
where
    T: Capability<C> + 'static,
    C: BaseContext,
{
    fn name(&self) -> String {
        self.0.name()
    }

    fn kind(&self) -> CapabilityKind {
        self.0.kind()
    }

    fn definition(&self) -> CapabilityDefinition {
        self.0.definition()
    }

    fn invoke(&self, ctx: C, args: Value) -> BoxPinFut<CapabilityResult> {
        let capability = self.0.clone();
        Box::pin(async move {
            match AssertUnwindSafe(capability.invoke_raw(ctx, args))
                .catch_unwind()
                .await
            {
                Ok(res) => res,
                Err(panic) => {
                    let name = capability.name();
                    let reason = panic_message(panic.as_ref());
                    log::error!(name = name.as_str(), reason = reason.as_str(); "capability panicked");
                    CapabilityError::Execution(format!(
                        "capability {name} failed unexpectedly: {reason}"
                    ))
                    .into()
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Validates a capability name: non-empty, at most 64 characters, `[a-z0-9_]` only.
pub fn validate_name(name: &str) -> Result<(), CapabilityError> {
    if name.is_empty() {
        return Err(CapabilityError::field("name", "must not be empty"));
    }
    if name.len() > 64 {
        return Err(CapabilityError::field(
            "name",
            "must be at most 64 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CapabilityError::field(
            "name",
            format!("{name:?} may only contain a-z, 0-9 and _"),
        ));
    }
    Ok(())
}

/// Registry of capabilities an orchestrator can invoke
///
/// Filled once at startup; read-only afterwards and safe to share between concurrent
/// invocations.
///
/// # Type Parameters
/// - `C`: The context type that implements `BaseContext`
pub struct CapabilitySet<C: BaseContext> {
    set: BTreeMap<String, Box<dyn CapabilityDyn<C>>>,
}

impl<C> Default for CapabilitySet<C>
where
    C: BaseContext,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CapabilitySet<C>
where
    C: BaseContext,
{
    /// Creates a new empty CapabilitySet
    pub fn new() -> Self {
        Self {
            set: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Checks if a capability with the given name exists in the set
    pub fn contains(&self, name: &str) -> bool {
        self.set.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.set.keys().cloned().collect()
    }

    /// Adds a new capability to the set
    ///
    /// # Errors
    /// - `ValidationError` if the name breaks the naming rules
    /// - `DuplicateNameError` if the name is already registered
    /// - `ValidationError` if a strict definition leaves arguments optional
    pub fn register<T>(&mut self, capability: T) -> Result<(), CapabilityError>
    where
        T: Capability<C> + 'static,
    {
        let name = capability.name();
        validate_name(&name)?;
        let definition = capability.definition();
        if definition.strict == Some(true) {
            let optional = optional_properties(&definition.parameters);
            if !optional.is_empty() {
                return Err(CapabilityError::field(
                    "strict",
                    format!("{name} is strict but leaves {optional:?} optional"),
                ));
            }
        }
        if self.set.contains_key(&name) {
            return Err(CapabilityError::DuplicateName(name));
        }

        let wrapper = CapabilityWrapper(Arc::new(capability), PhantomData);
        self.set.insert(name, Box::new(wrapper));
        Ok(())
    }

    /// Moves every capability of `other` into this set.
    pub fn merge(&mut self, other: CapabilitySet<C>) -> Result<(), CapabilityError> {
        for (name, capability) in other.set {
            if self.set.contains_key(&name) {
                return Err(CapabilityError::DuplicateName(name));
            }
            self.set.insert(name, capability);
        }
        Ok(())
    }

    /// Looks up a capability by name
    pub fn resolve(&self, name: &str) -> Result<&dyn CapabilityDyn<C>, CapabilityError> {
        self.set
            .get(name)
            .map(|c| c.as_ref())
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))
    }

    /// Gets the definition of a specific capability by name
    pub fn definition(&self, name: &str) -> Option<CapabilityDefinition> {
        self.set.get(name).map(|c| c.definition())
    }

    /// Gets definitions for multiple capabilities, optionally filtered by names
    ///
    /// # Arguments
    /// - `names`: Optional slice of names to filter by. If None, returns all definitions
    pub fn definitions(&self, names: Option<&[&str]>) -> Vec<CapabilityDefinition> {
        self.set
            .iter()
            .filter_map(|(name, capability)| match names {
                Some(names) => {
                    if names.contains(&name.as_str()) {
                        Some(capability.definition())
                    } else {
                        None
                    }
                }
                None => Some(capability.definition()),
            })
            .collect()
    }

    /// Invokes a capability by name with raw JSON arguments
    ///
    /// # Returns
    /// A future resolving to the uniform result; unknown names resolve to
    /// `NotFoundError`.
    pub fn invoke(&self, name: &str, ctx: C, args: Value) -> BoxPinFut<CapabilityResult> {
        match self.resolve(name) {
            Ok(capability) => capability.invoke(ctx, args),
            Err(err) => Box::pin(futures::future::ready(err.into())),
        }
    }
}
