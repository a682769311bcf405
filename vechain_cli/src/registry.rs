use std::sync::Arc;
use vechain_core::{BaseContext, BoxError, CapabilitySet, ResolverChain};
use vechain_data::{Colend, Molten, VeChainStats, WanBridge};
use vechain_engine::{config::Conf, engine::Engine};
use vechain_tx::{AddressBook, IntentBuilder, StarGate, ThorTokens};

/// Transaction building capabilities. Token metadata comes from VeChainStats, then
/// from the token contract through the network's Thor node.
pub fn intent_capabilities<C: BaseContext>(
    cfg: &Conf,
    stats: Arc<VeChainStats>,
) -> Result<CapabilitySet<C>, BoxError> {
    let builder = Arc::new(IntentBuilder::from_policy(&cfg.policy)?);
    let book = Arc::new(AddressBook::from_conf(cfg)?);
    let stargate = Arc::new(StarGate::from_conf(cfg)?);
    let resolver = Arc::new(ResolverChain::new(
        stats,
        Arc::new(ThorTokens::from_conf(cfg)),
    ));
    Ok(vechain_tx::capabilities(builder, book, resolver, stargate)?)
}

/// Builds an engine carrying every capability, wired from `cfg`.
pub fn build_engine(cfg: &Conf) -> Result<Engine, BoxError> {
    let stats = Arc::new(VeChainStats::from_conf(&cfg.vechainstats));
    let wanbridge = Arc::new(WanBridge::from_conf(&cfg.wanbridge));
    let colend = Arc::new(Colend::from_conf(&cfg.colend));
    let molten = Arc::new(Molten::from_conf(&cfg.molten));

    if cfg.vechainstats.api_key.is_empty() {
        log::warn!("vechainstats api_key is not set, requests may be rate limited");
    }
    for (network, conf) in &cfg.networks {
        for key in conf.missing_contracts() {
            log::warn!(
                network = network.as_str(),
                key = key;
                "networks.{network}.{key} is not set, intents using it will be rejected"
            );
        }
    }

    let engine = Engine::builder()
        .with_timeout(cfg.http.timeout())
        .register_capabilities(VeChainStats::capabilities(stats.clone())?)?
        .register_capabilities(WanBridge::capabilities(wanbridge)?)?
        .register_capabilities(Colend::capabilities(colend)?)?
        .register_capabilities(Molten::capabilities(molten)?)?
        .register_capabilities(intent_capabilities(cfg, stats)?)?
        .build()?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vechain_core::{DataSource, ErrorKind};
    use vechain_engine::context::mock::MockCtx;

    #[test]
    fn test_build_engine() {
        let engine = build_engine(&Conf::default()).unwrap();
        let names: Vec<String> = engine
            .list_capabilities()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names.len(), 13);
        for name in [
            "vechainstats_token_info",
            "wanbridge_quota_and_fee",
            "colend_reserves",
            "molten_pools",
            "vet_transfer",
            "stargate_stake",
        ] {
            assert!(names.iter().any(|n| n == name), "{name}");
        }
    }

    #[test]
    fn test_build_engine_invalid_policy() {
        let cfg = Conf::from_toml(
            r#"
            [policy]
            transfer_ceiling = "lots"
            "#,
        )
        .unwrap();
        assert!(build_engine(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_invoke_offline() {
        let engine = build_engine(&Conf::default()).unwrap();
        let res = engine
            .invoke(
                "vet_transfer",
                json!({
                    "sender": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    "recipient": "0xcccccccccccccccccccccccccccccccccccccccc",
                    "amount": "1.5"
                }),
            )
            .await;
        assert!(res.is_ok());
        assert_eq!(res.data().unwrap()["clauses"][0]["value"], "0x14d1120d7b160000");

        let res = engine.invoke("no_such_tool", json!({})).await;
        assert_eq!(res.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_token_transfer_reads_contract_metadata() {
        let cfg = Conf::default();
        let stats = Arc::new(VeChainStats::from_conf(&cfg.vechainstats));
        let set = intent_capabilities::<MockCtx>(&cfg, stats).unwrap();

        fn word(hex: &str) -> String {
            format!("{hex:0>64}")
        }
        fn string(hex: &str) -> String {
            let len = format!("{:x}", hex.len() / 2);
            format!("0x{}{}{hex:0<64}", word("20"), word(&len))
        }

        // decimals() = 6, symbol() = "VTHO", name() = "VeThor"
        let ctx = MockCtx::new(|req| {
            assert_eq!(req.endpoint(), "https://testnet.vechain.org/accounts/*");
            Ok(json!([
                {"data": format!("0x{}", word("6")), "reverted": false},
                {"data": string("5654484f"), "reverted": false},
                {"data": string("566554686f72"), "reverted": false}
            ]))
        });
        let res = set
            .invoke(
                "token_transfer",
                ctx.clone(),
                json!({
                    "sender": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    "token": "VTHO",
                    "recipient": "0xcccccccccccccccccccccccccccccccccccccccc",
                    "amount": "1.5",
                    "network": "test"
                }),
            )
            .await;
        assert!(res.is_ok(), "{:?}", res.error_message());
        let data = res.data().unwrap();
        // 1.5 with 6 decimals
        assert!(
            data["clauses"][0]["data"]
                .as_str()
                .unwrap()
                .ends_with(&word("16e360"))
        );
        assert!(data["humanSummary"].as_str().unwrap().contains("1.5 VTHO"));
        assert_eq!(res.meta().unwrap().data_source, Some(DataSource::Upstream));
        // VeChainStats has no test endpoint, so only the node was asked
        assert_eq!(ctx.requests().len(), 1);
    }
}
