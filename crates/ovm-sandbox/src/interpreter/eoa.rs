//! Externally-owned account support: signer recovery and the proxy program installed at
//! recovered addresses.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use super::opcode::{
    CALLDATACOPY, CALLDATASIZE, DELEGATECALL, GAS, JUMPDEST, JUMPI, PUSH0, PUSH1, PUSH20,
    RETURN, RETURNDATACOPY, RETURNDATASIZE, REVERT,
};

/// Offset of the success branch in the proxy program.
const PROXY_SUCCESS_DEST: u8 = 0x29;

/// Recovers the address that signed `message_hash`.
///
/// `v` is the y-parity of the signature point, either raw (0 or 1) or offset by 27. Returns
/// `None` for any signature that does not recover to a public key.
pub fn recover_signer(message_hash: B256, v: u8, r: B256, s: B256) -> Option<Address> {
    let parity = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return None,
    };
    let recovery_id = RecoveryId::try_from(parity).ok()?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r.as_slice());
    sig_bytes[32..].copy_from_slice(s.as_slice());
    let signature = Signature::from_slice(&sig_bytes).ok()?;

    let recovered_key =
        VerifyingKey::recover_from_prehash(&message_hash[..], &signature, recovery_id).ok()?;

    // 0x04 || x || y; the address is the last 20 bytes of keccak256(x || y)
    let pubkey_point = recovered_key.to_encoded_point(false);
    let pubkey_hash = keccak256(&pubkey_point.as_bytes()[1..]);
    Some(Address::from_slice(&pubkey_hash[12..]))
}

/// Returns the proxy program installed for externally-owned accounts.
///
/// It forwards its call data to `implementation` with a delegate call and returns or reverts
/// with whatever the implementation returned.
pub fn proxy_code(implementation: Address) -> Bytes {
    let mut code = Vec::with_capacity(45);
    code.extend_from_slice(&[CALLDATASIZE, PUSH0, PUSH0, CALLDATACOPY]);
    code.extend_from_slice(&[PUSH0, PUSH0, CALLDATASIZE, PUSH0, PUSH20]);
    code.extend_from_slice(implementation.as_slice());
    code.extend_from_slice(&[GAS, DELEGATECALL]);
    code.extend_from_slice(&[RETURNDATASIZE, PUSH0, PUSH0, RETURNDATACOPY]);
    code.extend_from_slice(&[PUSH1, PROXY_SUCCESS_DEST, JUMPI]);
    code.extend_from_slice(&[RETURNDATASIZE, PUSH0, REVERT]);
    debug_assert_eq!(code.len(), PROXY_SUCCESS_DEST as usize);
    code.extend_from_slice(&[JUMPDEST, RETURNDATASIZE, PUSH0, RETURN]);
    code.into()
}
