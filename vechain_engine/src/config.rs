//! Runtime configuration, keyed by network.
//!
//! Contract addresses and token tables live here rather than in code so that tests
//! and deployments can inject their own.
//!
//! ```toml
//! [http]
//! timeout_secs = 15
//!
//! [vechainstats]
//! api_key = "..."
//!
//! [policy]
//! transfer_ceiling = "1000"
//!
//! [networks.test]
//! node_url = "https://testnet.vechain.org"
//! stargate_contract = "0x..."
//!
//! [networks.test.tokens]
//! VTHO = "0x0000000000000000000000000000456E65726779"
//!
//! [[networks.test.staking_levels]]
//! id = 1
//! name = "Strength"
//! vet_required = "1000000"
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use vechain_core::{BoxError, Network};

/// VTHO energy token, the same built-in contract on every VeChain network.
pub static VTHO_CONTRACT: &str = "0x0000000000000000000000000000456E65726779";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Conf {
    #[serde(default)]
    pub http: HttpConf,
    #[serde(default)]
    pub vechainstats: VeChainStatsConf,
    #[serde(default = "ApiConf::wanbridge")]
    pub wanbridge: ApiConf,
    #[serde(default = "ApiConf::colend")]
    pub colend: ApiConf,
    #[serde(default = "ApiConf::molten")]
    pub molten: ApiConf,
    #[serde(default)]
    pub policy: PolicyConf,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<Network, NetworkConf>,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            http: HttpConf::default(),
            vechainstats: VeChainStatsConf::default(),
            wanbridge: ApiConf::wanbridge(),
            colend: ApiConf::colend(),
            molten: ApiConf::molten(),
            policy: PolicyConf::default(),
            networks: default_networks(),
        }
    }
}

impl Conf {
    /// Loads a TOML file, then applies `VECHAIN_*` environment overrides,
    /// e.g. `VECHAIN_VECHAINSTATS__API_KEY`.
    pub fn from_file(file_name: &str) -> Result<Self, BoxError> {
        let builder = Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("VECHAIN")
                    .prefix_separator("_")
                    .separator("__"),
            );
        let cfg = builder.build()?.try_deserialize::<Conf>()?;
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self, BoxError> {
        let cfg: Self = toml::from_str(content)?;
        Ok(cfg)
    }

    pub fn network(&self, network: Network) -> Option<&NetworkConf> {
        self.networks.get(&network)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConf {
    /// Upper bound for every upstream call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VeChainStatsConf {
    #[serde(default)]
    pub api_key: String,
    /// API base URL per network. Networks without an entry have no VeChainStats data.
    #[serde(default = "VeChainStatsConf::default_endpoints")]
    pub endpoints: BTreeMap<Network, String>,
}

impl Default for VeChainStatsConf {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoints: Self::default_endpoints(),
        }
    }
}

impl VeChainStatsConf {
    fn default_endpoints() -> BTreeMap<Network, String> {
        BTreeMap::from([(
            Network::Main,
            "https://api.vechainstats.com/v2".to_string(),
        )])
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConf {
    pub api_url: String,
}

impl ApiConf {
    fn wanbridge() -> Self {
        Self {
            api_url: "https://bridge-api.wanchain.org/api".to_string(),
        }
    }

    fn colend() -> Self {
        Self {
            api_url: "https://api.colend.xyz".to_string(),
        }
    }

    fn molten() -> Self {
        Self {
            api_url: "https://api.molten.finance".to_string(),
        }
    }
}

/// Builder-level constraints on transaction amounts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyConf {
    /// Transfers and supplies of this many units or more are rejected, e.g. "1000"
    pub transfer_ceiling: Option<String>,
    /// Stakes whose tier requires this many VET or more are rejected
    pub stake_ceiling: Option<String>,
    /// Decimals assumed when token metadata cannot be resolved; unset fails the build
    pub fallback_decimals: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NetworkConf {
    /// Thor REST endpoint used for contract reads
    pub node_url: String,
    #[serde(default)]
    pub stargate_contract: Option<String>,
    #[serde(default)]
    pub colend_pool: Option<String>,
    /// Token symbol to contract address
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// Used when the StarGate contract cannot be read
    #[serde(default)]
    pub staking_levels: Vec<StakingLevelConf>,
}

impl NetworkConf {
    /// Contract keys left unset. Intents needing them fail until configured.
    pub fn missing_contracts(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.stargate_contract.is_none() {
            missing.push("stargate_contract");
        }
        if self.colend_pool.is_none() {
            missing.push("colend_pool");
        }
        missing
    }

    /// Looks up a token contract by symbol, case-insensitively.
    pub fn token_address(&self, symbol: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(symbol))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StakingLevelConf {
    pub id: u8,
    pub name: String,
    /// VET required to stake at this level, as a decimal string
    pub vet_required: String,
}

fn default_networks() -> BTreeMap<Network, NetworkConf> {
    let vtho = BTreeMap::from([("VTHO".to_string(), VTHO_CONTRACT.to_string())]);
    BTreeMap::from([
        (
            Network::Main,
            NetworkConf {
                node_url: "https://mainnet.vechain.org".to_string(),
                tokens: vtho.clone(),
                staking_levels: default_staking_levels(),
                ..Default::default()
            },
        ),
        (
            Network::Test,
            NetworkConf {
                node_url: "https://testnet.vechain.org".to_string(),
                tokens: vtho,
                staking_levels: default_staking_levels(),
                ..Default::default()
            },
        ),
    ])
}

/// Published StarGate tiers: (id, name, VET required).
fn default_staking_levels() -> Vec<StakingLevelConf> {
    [
        (1, "Strength", "1000000"),
        (2, "Thunder", "5000000"),
        (3, "Mjolnir", "15000000"),
        (4, "VeThorX", "600000"),
        (5, "StrengthX", "1600000"),
        (6, "ThunderX", "5600000"),
        (7, "MjolnirX", "15600000"),
        (8, "Dawn", "10000"),
        (9, "Lightning", "50000"),
        (10, "Flash", "200000"),
    ]
    .into_iter()
    .map(|(id, name, vet_required)| StakingLevelConf {
        id,
        name: name.to_string(),
        vet_required: vet_required.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Conf::from_toml("").unwrap();
        assert_eq!(cfg.http.timeout(), Duration::from_secs(15));
        assert_eq!(
            cfg.network(Network::Test).unwrap().token_address("vtho"),
            Some(VTHO_CONTRACT)
        );
        assert!(cfg.vechainstats.endpoints.contains_key(&Network::Main));
        assert!(cfg.policy.transfer_ceiling.is_none());
        let main = cfg.network(Network::Main).unwrap();
        assert_eq!(main.staking_levels.len(), 10);
        assert!(main.stargate_contract.is_none());
        assert_eq!(main.missing_contracts(), vec!["stargate_contract", "colend_pool"]);
    }

    #[test]
    fn test_from_toml() {
        let cfg = Conf::from_toml(
            r#"
            [http]
            timeout_secs = 5

            [vechainstats]
            api_key = "key"

            [policy]
            transfer_ceiling = "1000"
            fallback_decimals = 18

            [networks.test]
            node_url = "http://127.0.0.1:8669"
            stargate_contract = "0x1ec1d168574603ec35b9d229843b7c2b44bcb770"

            [networks.test.tokens]
            B3TR = "0xbf64cf86894ee0877c4e7d03936e35ee8d8b864f"

            [[networks.test.staking_levels]]
            id = 1
            name = "Strength"
            vet_required = "600000"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.timeout_secs, 5);
        assert_eq!(cfg.vechainstats.api_key, "key");
        assert_eq!(cfg.policy.transfer_ceiling.as_deref(), Some("1000"));
        assert_eq!(cfg.policy.fallback_decimals, Some(18));
        // An explicit networks table replaces the defaults.
        assert!(cfg.network(Network::Main).is_none());
        let test = cfg.network(Network::Test).unwrap();
        assert_eq!(
            test.token_address("b3tr"),
            Some("0xbf64cf86894ee0877c4e7d03936e35ee8d8b864f")
        );
        assert_eq!(test.staking_levels[0].vet_required, "600000");
        assert_eq!(test.missing_contracts(), vec!["colend_pool"]);
    }
}
