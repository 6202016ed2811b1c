//! Contract and precompile ABIs, addresses, and protocol constants.
//!
//! The relayer talks to three on-chain surfaces: the audit ledger contract
//! (inner `storeRecord` call and registration entry points), the
//! call-permit precompile (gasless dispatch of a signed permit), and the
//! batch precompile (best-effort multi-call with per-sub-call terminal
//! events).

use alloy::primitives::{Address, address};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, eip712_domain};

sol! {
    /// Audit ledger contract surface used by the relayer.
    #[derive(Debug)]
    interface AuditLedger {
        /// Stores one audited sensor reading.
        function storeRecord(address deviceAddress, int64 value, uint64 timestamp);
        /// Registers an auditor account.
        function registerAuditor(address auditorAddress);
        /// Registers a device under an auditor.
        function registerDevice(address auditorAddress, address deviceAddress);
    }

    /// Call-permit precompile: executes a call authorized by an EIP-712
    /// permit signed by `from`, consuming one authorization nonce.
    #[derive(Debug)]
    interface CallPermitPrecompile {
        /// Dispatches `data` to `to` on behalf of `from`.
        function dispatch(
            address from,
            address to,
            uint256 value,
            bytes data,
            uint64 gaslimit,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) returns (bytes output);

        /// Current authorization nonce for `owner`.
        function nonces(address owner) returns (uint256 nonce);
    }

    /// Batch precompile: executes sub-calls independently; a sub-call's
    /// failure does not revert the whole transaction.
    #[derive(Debug)]
    interface BatchPrecompile {
        /// Attempts every sub-call regardless of earlier failures,
        /// emitting one terminal event per attempted sub-call.
        function batchSome(
            address[] to,
            uint256[] value,
            bytes[] callData,
            uint64[] gasLimit
        );

        /// Emitted when sub-call `index` succeeded.
        event SubcallSucceeded(uint256 index);
        /// Emitted when sub-call `index` failed.
        event SubcallFailed(uint256 index);
    }

    /// EIP-712 message authorizing one dispatch through the call-permit
    /// precompile. Field order is part of the type hash.
    #[derive(Debug)]
    struct CallPermit {
        address from;
        address to;
        uint256 value;
        bytes data;
        uint64 gaslimit;
        uint256 nonce;
        uint256 deadline;
    }
}

/// Address of the batch precompile.
pub const BATCH_PRECOMPILE_ADDRESS: Address =
    address!("0000000000000000000000000000000000000808");

/// Address of the call-permit precompile, also the EIP-712 verifying
/// contract for permit messages.
pub const CALL_PERMIT_PRECOMPILE_ADDRESS: Address =
    address!("000000000000000000000000000000000000080A");

/// Gas limit granted to each permitted sub-call.
pub const PERMIT_GAS_LIMIT: u64 = 100_000;

/// Fixed permit validity window: one day from the record's timestamp.
pub const PERMIT_VALIDITY_WINDOW_SECS: u64 = 86_400;

/// Settlement grace window after a successful sub-call before an audit is
/// treated as final, guarding against chain reorganizations.
pub const AUDIT_SAFETY_OFFSET_SECS: u64 = 120;

/// EIP-712 domain for permit messages on the given chain.
#[must_use]
pub fn call_permit_domain(chain_id: u64) -> Eip712Domain {
    eip712_domain! {
        name: "CallPermit",
        version: "1",
        chain_id: chain_id,
        verifying_contract: CALL_PERMIT_PRECOMPILE_ADDRESS,
    }
}
