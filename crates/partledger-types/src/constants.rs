//! System-wide constants for the partledger ledger.

/// Raw bytes of the reserved default partition used in single-partition mode.
pub const DEFAULT_PARTITION_BYTES: [u8; 32] = {
    let mut bytes = [0u8; 32];
    bytes[31] = 1;
    bytes
};

/// Maximum number of scheduled adjustments waiting in the queue.
pub const DEFAULT_MAX_PENDING_ADJUSTMENTS: usize = 100;

/// Default token decimals before any adjustment shifts them.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Domain tag mixed into every protected-hold authorization digest.
pub const PROTECTED_HOLD_DOMAIN: &[u8] = b"partledger:protected_hold:v1:";

/// First id handed out by a lock or hold sequence.
pub const FIRST_SEQUENCE_ID: u64 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "partledger";
