//! Registered field devices.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// A field device registered with the relayer.
///
/// Referenced by the audit pipeline but never mutated by it: records
/// carry the device address and the resolver validates registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// On-chain address of the device (recovered from its custodied key).
    pub address: Address,
    /// Address of the auditor responsible for this device.
    pub auditor_address: Address,
}

impl Device {
    /// Creates a new device registration.
    #[must_use]
    pub const fn new(address: Address, auditor_address: Address) -> Self {
        Self {
            address,
            auditor_address,
        }
    }
}
