use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;

use crate::{CapabilityError, ErrorKind};

/// Whether a capability reads external data or builds an unsigned transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    /// Calls an external service and returns data; idempotent.
    Read,
    /// Returns an unsigned transaction descriptor; never submits anything.
    TransactionBuild,
}

/// Describes a callable capability with its metadata and argument schema
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilityDefinition {
    /// Name of the capability, unique within a registry
    pub name: String,

    /// Description of what the capability does
    pub description: String,

    pub kind: CapabilityKind,

    /// JSON schema defining the capability's arguments
    pub parameters: Value,

    /// Whether the orchestrator should follow the schema exactly when generating arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Which of several sourcing paths produced the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// A third-party API answered
    Upstream,
    /// An on-chain contract read answered
    Contract,
    /// Static or caller-supplied data was substituted after the primary path failed
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Provenance of a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Endpoint or component that produced the data
    pub source: String,
    /// Unix timestamp in milliseconds, the only time-dependent field of a result
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
}

impl Meta {
    pub fn new(source: impl Into<String>, timestamp: u64) -> Self {
        Self {
            source: source.into(),
            timestamp,
            pagination: None,
            data_source: None,
        }
    }

    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = Some(data_source);
        self
    }
}

/// Typed output of a capability before it is folded into a [`CapabilityResult`].
#[derive(Debug, Clone)]
pub struct ToolOutput<T> {
    pub data: T,
    pub meta: Meta,
}

impl<T> ToolOutput<T> {
    pub fn new(data: T, meta: Meta) -> Self {
        Self { data, meta }
    }
}

/// The uniform result of an invocation.
///
/// Serializes as `{"success": true, "data": .., "meta": ..}` or
/// `{"success": false, "error": {"kind": .., "message": ..}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResult {
    Ok { data: Value, meta: Meta },
    Err { kind: ErrorKind, message: String },
}

impl CapabilityResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CapabilityResult::Ok { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            CapabilityResult::Ok { data, .. } => Some(data),
            CapabilityResult::Err { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            CapabilityResult::Ok { meta, .. } => Some(meta),
            CapabilityResult::Err { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CapabilityResult::Ok { .. } => None,
            CapabilityResult::Err { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CapabilityResult::Ok { .. } => None,
            CapabilityResult::Err { message, .. } => Some(message),
        }
    }
}

impl From<CapabilityError> for CapabilityResult {
    fn from(err: CapabilityError) -> Self {
        CapabilityResult::Err {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: ErrorKind,
    message: &'a str,
}

impl Serialize for CapabilityResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CapabilityResult::Ok { data, meta } => {
                let mut s = serializer.serialize_struct("CapabilityResult", 3)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
                s.serialize_field("meta", meta)?;
                s.end()
            }
            CapabilityResult::Err { kind, message } => {
                let mut s = serializer.serialize_struct("CapabilityResult", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field(
                    "error",
                    &ErrorBody {
                        kind: *kind,
                        message,
                    },
                )?;
                s.end()
            }
        }
    }
}
