//! Read-only contract calls through a Thor node.
//!
//! A single `POST {node}/accounts/*` carries one clause per call and answers with one
//! output per clause, in order. Nothing is signed or broadcast.

use alloy::primitives::Address;
use serde_json::{Value, json};
use vechain_core::{BaseContext, CapabilityError, UpstreamRequest};

use crate::descriptor::format_address;

/// Result of one clause of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    /// Return data, empty when the clause reverted
    pub data: Vec<u8>,
    /// VM error of a reverted clause
    pub reverted: Option<String>,
}

impl CallOutput {
    /// Return data of a clause that did not revert.
    pub fn into_data(self, endpoint: &str) -> Result<Vec<u8>, CapabilityError> {
        match self.reverted {
            Some(reason) => Err(CapabilityError::upstream(
                endpoint,
                format!("call reverted: {reason}"),
            )),
            None => Ok(self.data),
        }
    }

    fn from_value(endpoint: &str, v: &Value) -> Result<Self, CapabilityError> {
        if v["reverted"].as_bool().unwrap_or(false) {
            let reason = match v["vmError"].as_str() {
                Some(e) if !e.is_empty() => e.to_string(),
                _ => "reverted".to_string(),
            };
            return Ok(Self {
                data: Vec::new(),
                reverted: Some(reason),
            });
        }
        let data = v["data"]
            .as_str()
            .ok_or_else(|| CapabilityError::upstream(endpoint, "call response has no data"))?;
        let data = hex::decode(data.trim_start_matches("0x")).map_err(|err| {
            CapabilityError::upstream(endpoint, format!("invalid call data: {err}"))
        })?;
        Ok(Self {
            data,
            reverted: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThorNode {
    url: String,
}

impl ThorNode {
    pub fn new(node_url: &str) -> Self {
        Self {
            url: node_url.trim_end_matches('/').to_string(),
        }
    }

    /// The call endpoint, as reported in errors and result metadata.
    pub fn endpoint(&self) -> String {
        format!("{}/accounts/*", self.url)
    }

    /// Runs `calls` as clauses of one read-only call.
    ///
    /// A reverted clause is reported in its [`CallOutput`]; transport failures and
    /// malformed responses fail the whole call.
    pub async fn call<C: BaseContext>(
        &self,
        ctx: &C,
        calls: &[(Address, Vec<u8>)],
    ) -> Result<Vec<CallOutput>, CapabilityError> {
        let endpoint = self.endpoint();
        let clauses: Vec<Value> = calls
            .iter()
            .map(|(to, data)| {
                json!({
                    "to": format_address(to),
                    "value": "0x0",
                    "data": format!("0x{}", hex::encode(data)),
                })
            })
            .collect();
        let res = ctx
            .fetch_json(UpstreamRequest::post_json(
                endpoint.clone(),
                json!({ "clauses": clauses }),
            ))
            .await?;

        let outputs = res
            .as_array()
            .ok_or_else(|| CapabilityError::upstream(&endpoint, "call response is not a list"))?;
        if outputs.len() != calls.len() {
            return Err(CapabilityError::upstream(
                &endpoint,
                format!(
                    "expected {} call outputs, got {}",
                    calls.len(),
                    outputs.len()
                ),
            ));
        }
        outputs
            .iter()
            .map(|v| CallOutput::from_value(&endpoint, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vechain_core::ErrorKind;
    use vechain_engine::context::mock::MockCtx;

    #[tokio::test]
    async fn test_call() {
        let ctx = MockCtx::new(|_| {
            Ok(json!([
                {"data": "0x0012", "reverted": false, "vmError": ""},
                {"data": "0x", "reverted": true, "vmError": "execution reverted"}
            ]))
        });
        let node = ThorNode::new("http://thor.test/");
        let token = Address::repeat_byte(0xaa);
        let outputs = node
            .call(&ctx, &[(token, vec![0x31, 0x3c]), (token, vec![0x95])])
            .await
            .unwrap();
        assert_eq!(outputs[0].data, vec![0x00, 0x12]);
        assert_eq!(outputs[1].reverted.as_deref(), Some("execution reverted"));

        let err = outputs[1].clone().into_data(&node.endpoint()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "http://thor.test/accounts/*: call reverted: execution reverted"
        );

        let req = &ctx.requests()[0];
        assert_eq!(req.endpoint(), "http://thor.test/accounts/*");
        let clauses = req.body.as_ref().unwrap()["clauses"].as_array().unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0]["to"], format_address(&token));
        assert_eq!(clauses[0]["value"], "0x0");
        assert_eq!(clauses[0]["data"], "0x313c");
    }

    #[tokio::test]
    async fn test_call_malformed() {
        let node = ThorNode::new("http://thor.test");
        let token = Address::repeat_byte(0xaa);

        let ctx = MockCtx::new(|_| Ok(json!([])));
        let err = node.call(&ctx, &[(token, vec![])]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.to_string().contains("expected 1 call outputs, got 0"));

        let ctx = MockCtx::new(|_| Ok(json!([{"data": "0xzz", "reverted": false}])));
        let err = node.call(&ctx, &[(token, vec![])]).await.unwrap_err();
        assert!(err.to_string().contains("invalid call data"));

        let ctx = MockCtx::new(|_| Ok(json!({"error": "busy"})));
        let err = node.call(&ctx, &[(token, vec![])]).await.unwrap_err();
        assert!(err.to_string().contains("not a list"));
    }
}
