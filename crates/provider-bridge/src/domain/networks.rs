//! Static table of well-known networks.
//!
//! Custom RPC networks (`"rpc"`) have no entry; their chain id is the
//! `network` value.

/// Network type key for a user-configured RPC endpoint
pub const CUSTOM_RPC: &str = "rpc";

/// Known network metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Network type key
    pub name: &'static str,
    /// Display name
    pub display_name: &'static str,
    /// EIP-155 chain id
    pub chain_id: u64,
    /// `net_version` network id
    pub network_id: u64,
}

/// All known networks
pub const NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "mainnet",
        display_name: "Ethereum Main Network",
        chain_id: 1,
        network_id: 1,
    },
    NetworkInfo {
        name: "ropsten",
        display_name: "Ropsten Test Network",
        chain_id: 3,
        network_id: 3,
    },
    NetworkInfo {
        name: "kovan",
        display_name: "Kovan Test Network",
        chain_id: 42,
        network_id: 42,
    },
    NetworkInfo {
        name: "rinkeby",
        display_name: "Rinkeby Test Network",
        chain_id: 4,
        network_id: 4,
    },
    NetworkInfo {
        name: "goerli",
        display_name: "Goerli Test Network",
        chain_id: 5,
        network_id: 5,
    },
];

/// Look up a network by type key
pub fn network_info(network_type: &str) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.name == network_type)
}

/// `0x`-hex chain id for the network type, `None` for unknown or custom networks
pub fn chain_id_hex(network_type: &str) -> Option<String> {
    network_info(network_type).map(|n| format!("0x{:x}", n.chain_id))
}

/// The chain id a typed-data signature must target.
///
/// For custom RPC networks this is the `network` value itself; otherwise the
/// table's network id. Unknown network types fall back to `network`.
pub fn active_chain_id(network: &str, network_type: &str) -> String {
    if network_type == CUSTOM_RPC {
        return network.to_string();
    }
    network_info(network_type)
        .map(|n| n.network_id.to_string())
        .unwrap_or_else(|| network.to_string())
}
