use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::TokenAmount;

/// Direction of a treasury transfer relative to the DAO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Deposit,
    Withdraw,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::Deposit => write!(f, "deposit"),
            TransferDirection::Withdraw => write!(f, "withdraw"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A treasury transfer as listed by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub tx_id: String,
    pub direction: TransferDirection,
    pub token: TokenInfo,
    pub amount: TokenAmount,
    pub sender: String,
    pub recipient: String,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn is_deposit_for(&self, tx_id: &str) -> bool {
        self.direction == TransferDirection::Deposit && self.tx_id.eq_ignore_ascii_case(tx_id)
    }
}
