//! Supported networks, block explorers and configured contract addresses.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    pub explorer_tx_prefix: &'static str,
}

pub const MAINNET: u64 = 1;
pub const SEPOLIA: u64 = 11_155_111;
pub const POLYGON: u64 = 137;
pub const ARBITRUM: u64 = 42_161;
pub const OPTIMISM: u64 = 10;
pub const BASE: u64 = 8_453;

pub const SUPPORTED_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        id: MAINNET,
        name: "Ethereum",
        native_symbol: "ETH",
        explorer_tx_prefix: "https://etherscan.io/tx/",
    },
    ChainInfo {
        id: SEPOLIA,
        name: "Sepolia",
        native_symbol: "ETH",
        explorer_tx_prefix: "https://sepolia.etherscan.io/tx/",
    },
    ChainInfo {
        id: POLYGON,
        name: "Polygon",
        native_symbol: "POL",
        explorer_tx_prefix: "https://polygonscan.com/tx/",
    },
    ChainInfo {
        id: ARBITRUM,
        name: "Arbitrum One",
        native_symbol: "ETH",
        explorer_tx_prefix: "https://arbiscan.io/tx/",
    },
    ChainInfo {
        id: OPTIMISM,
        name: "OP Mainnet",
        native_symbol: "ETH",
        explorer_tx_prefix: "https://optimistic.etherscan.io/tx/",
    },
    ChainInfo {
        id: BASE,
        name: "Base",
        native_symbol: "ETH",
        explorer_tx_prefix: "https://basescan.org/tx/",
    },
];

pub fn chain_info(chain_id: u64) -> Option<&'static ChainInfo> {
    SUPPORTED_CHAINS.iter().find(|c| c.id == chain_id)
}

/// Explorer link for a transaction, `None` on chains without a known explorer.
pub fn explorer_tx_url(chain_id: u64, hash: &str) -> Option<String> {
    chain_info(chain_id).map(|c| format!("{}{}", c.explorer_tx_prefix, hash))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contract {
    /// Key-value logging contract emitting `DataUpdated(user, oldValue, newValue)`.
    DataLogger,
    /// USDT (USDC on Base).
    Usdt,
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contract::DataLogger => f.write_str("DataLogger"),
            Contract::Usdt => f.write_str("USDT"),
        }
    }
}

const DATA_LOGGER_ADDRESSES: &[(u64, &str)] =
    &[(SEPOLIA, "0x4Dd524d4F8fc441eC8844C4F8652AEBa6dD4d972")];

const USDT_ADDRESSES: &[(u64, &str)] = &[
    (MAINNET, "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
    (SEPOLIA, "0x7169D38820dfd117C3FA1f22a697dBA58d90BA06"),
    (POLYGON, "0xc2132D05D31c914a87C6611C10748AEb04B58e8F"),
    (ARBITRUM, "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"),
    (OPTIMISM, "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58"),
    (BASE, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
];

/// Result of looking up a contract on a network.
///
/// `Unsupported` is a display state ("switch network"), not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractLookup {
    Configured(&'static str),
    Unsupported { contract: Contract, chain_id: u64 },
}

impl ContractLookup {
    pub fn address(&self) -> Option<&'static str> {
        match self {
            ContractLookup::Configured(addr) => Some(*addr),
            ContractLookup::Unsupported { .. } => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ContractLookup::Configured(_))
    }
}

impl fmt::Display for ContractLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractLookup::Configured(addr) => f.write_str(addr),
            ContractLookup::Unsupported { contract, chain_id } => {
                let network = chain_info(*chain_id)
                    .map(|c| c.name.to_string())
                    .unwrap_or_else(|| format!("chain {chain_id}"));
                write!(f, "{contract} is not available on {network}; switch to a supported network")
            }
        }
    }
}

pub fn contract_address(contract: Contract, chain_id: u64) -> ContractLookup {
    let table = match contract {
        Contract::DataLogger => DATA_LOGGER_ADDRESSES,
        Contract::Usdt => USDT_ADDRESSES,
    };
    table
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, addr)| ContractLookup::Configured(*addr))
        .unwrap_or(ContractLookup::Unsupported { contract, chain_id })
}
