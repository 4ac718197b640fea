use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bitcoin network the staking parameters refer to.
///
/// Mirrors `bitcoin::Network` with a JSON representation suitable for
/// contract messages.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Testnet,
    Signet,
    #[default]
    Regtest,
}

impl From<Network> for bitcoin::Network {
    fn from(net: Network) -> Self {
        match net {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}
