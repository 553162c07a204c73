// Core models
pub mod amount;
pub mod pending;
pub mod proposal;
pub mod transfer;

// Re-export commonly used types
pub use amount::*;
pub use pending::*;
pub use proposal::*;
pub use transfer::*;

/// Canonical form of a hex address used in map keys
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
