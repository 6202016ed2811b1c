//! Custodial keystore and EIP-712 permit signing.
//!
//! The relayer holds two kinds of key material: its own submission key
//! (funds and signs the batch transaction) and one permit-signing key per
//! registered device. A permit's `from` address must recover from its
//! signature, so each device's permit is signed with that device's key.
//!
//! Single-writer discipline: only the active audit cycle requests
//! signatures, serialized behind the cycle's single-flight guard.

use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::Eip712Domain;

use super::abi::CallPermit;
use crate::domain::PermitSignature;
use crate::error::RelayerError;

/// Holds the relayer submission key and the custodied device keys.
pub struct RelayerKeystore {
    relayer: PrivateKeySigner,
    device_keys: HashMap<Address, PrivateKeySigner>,
}

impl std::fmt::Debug for RelayerKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of Debug output.
        f.debug_struct("RelayerKeystore")
            .field("relayer", &self.relayer.address())
            .field("devices", &self.device_keys.len())
            .finish()
    }
}

impl RelayerKeystore {
    /// Builds a keystore from hex-encoded private keys. Device addresses
    /// are recovered from their keys.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Signing`] if any key fails to parse.
    pub fn from_keys(
        relayer_key: &str,
        device_keys: &[String],
    ) -> Result<Self, RelayerError> {
        let relayer = parse_key(relayer_key)?;
        let mut devices = HashMap::with_capacity(device_keys.len());
        for key in device_keys {
            let signer = parse_key(key)?;
            devices.insert(signer.address(), signer);
        }
        Ok(Self {
            relayer,
            device_keys: devices,
        })
    }

    /// Address of the relayer submission key.
    #[must_use]
    pub fn relayer_address(&self) -> Address {
        self.relayer.address()
    }

    /// Returns the relayer submission signer (for wallet construction).
    #[must_use]
    pub fn relayer_signer(&self) -> PrivateKeySigner {
        self.relayer.clone()
    }

    /// Addresses of all devices with custodied keys.
    #[must_use]
    pub fn device_addresses(&self) -> Vec<Address> {
        self.device_keys.keys().copied().collect()
    }

    /// Signs a permit message with the key custodied for `device` and
    /// decomposes the signature into `(v, r, s)`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Signing`] if no key is custodied for the
    /// device or the signer fails.
    pub fn sign_permit(
        &self,
        device: Address,
        permit: &CallPermit,
        domain: &Eip712Domain,
    ) -> Result<PermitSignature, RelayerError> {
        let signer = self
            .device_keys
            .get(&device)
            .ok_or_else(|| RelayerError::Signing(format!("no key material for device {device}")))?;

        let signature = signer
            .sign_typed_data_sync(permit, domain)
            .map_err(|e| RelayerError::Signing(e.to_string()))?;

        Ok(PermitSignature {
            v: 27 + u8::from(signature.v()),
            r: B256::from(signature.r()),
            s: B256::from(signature.s()),
        })
    }
}

fn parse_key(hex_key: &str) -> Result<PrivateKeySigner, RelayerError> {
    hex_key
        .trim()
        .trim_start_matches("0x")
        .parse::<PrivateKeySigner>()
        .map_err(|e| RelayerError::Signing(format!("invalid private key: {e}")))
}
