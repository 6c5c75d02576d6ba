//! Witness verification of first-loaded state.

use alloy_primitives::{keccak256, map::HashMap, Address, B256};
use auto_impl::auto_impl;

use super::Account;

/// The witness-verification driver.
///
/// Supplies the pre-state root of the transaction being replayed and checks every account and
/// slot value the store loads for the first time. A `false` answer makes the key unusable for the
/// rest of the transaction.
#[auto_impl(&, Box, Arc)]
pub trait StateWitness {
    /// The state root the witnesses are checked against.
    fn pre_state_root(&self) -> B256;

    /// Returns whether `account` is the pre-state record of `address`.
    fn verify_account(&self, address: Address, account: &Account) -> bool;

    /// Returns whether `value` is the pre-state value of slot `key` of `address`.
    fn verify_storage(&self, address: Address, key: B256, value: B256) -> bool;
}

/// A witness that accepts every value the backing database returns.
///
/// Used when the backing database is itself the ledger of record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustedWitness;

impl StateWitness for TrustedWitness {
    fn pre_state_root(&self) -> B256 {
        B256::ZERO
    }

    fn verify_account(&self, _address: Address, _account: &Account) -> bool {
        true
    }

    fn verify_storage(&self, _address: Address, _key: B256, _value: B256) -> bool {
        true
    }
}

/// A witness backed by per-key leaf commitments handed over by the driver.
///
/// Each committed key maps to the keccak hash of its leaf:
///
/// * account: `keccak(address ++ nonce (8 bytes, big endian) ++ balance ++ storage_root ++ code_hash)`
/// * slot: `keccak(address ++ key ++ value)`
///
/// A key without a commitment never verifies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitmentWitness {
    pre_state_root: B256,
    accounts: HashMap<Address, B256>,
    storage: HashMap<(Address, B256), B256>,
}

impl CommitmentWitness {
    /// Creates an empty witness for the given pre-state root.
    pub fn new(pre_state_root: B256) -> Self {
        Self { pre_state_root, ..Default::default() }
    }

    /// Commits to `account` as the pre-state record of `address`.
    pub fn commit_account(&mut self, address: Address, account: &Account) -> &mut Self {
        self.accounts.insert(address, Self::account_leaf(address, account));
        self
    }

    /// Commits to `value` as the pre-state value of slot `key` of `address`.
    pub fn commit_storage(&mut self, address: Address, key: B256, value: B256) -> &mut Self {
        self.storage.insert((address, key), Self::storage_leaf(address, key, value));
        self
    }

    /// Returns the leaf commitment of an account record.
    pub fn account_leaf(address: Address, account: &Account) -> B256 {
        let mut preimage = Vec::with_capacity(20 + 8 + 32 * 3);
        preimage.extend_from_slice(address.as_slice());
        preimage.extend_from_slice(&account.nonce.to_be_bytes());
        preimage.extend_from_slice(&account.balance.to_be_bytes::<32>());
        preimage.extend_from_slice(account.storage_root.as_slice());
        preimage.extend_from_slice(account.code_hash.as_slice());
        keccak256(preimage)
    }

    /// Returns the leaf commitment of a storage slot.
    pub fn storage_leaf(address: Address, key: B256, value: B256) -> B256 {
        let mut preimage = [0u8; 20 + 32 + 32];
        preimage[..20].copy_from_slice(address.as_slice());
        preimage[20..52].copy_from_slice(key.as_slice());
        preimage[52..].copy_from_slice(value.as_slice());
        keccak256(preimage)
    }
}

impl StateWitness for CommitmentWitness {
    fn pre_state_root(&self) -> B256 {
        self.pre_state_root
    }

    fn verify_account(&self, address: Address, account: &Account) -> bool {
        self.accounts.get(&address) == Some(&Self::account_leaf(address, account))
    }

    fn verify_storage(&self, address: Address, key: B256, value: B256) -> bool {
        self.storage.get(&(address, key)) == Some(&Self::storage_leaf(address, key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");

    #[test]
    fn test_commitment_witness_accounts() {
        let account = Account { nonce: 1, balance: U256::from(10), ..Account::empty() };
        let mut witness = CommitmentWitness::new(B256::with_last_byte(0xaa));
        witness.commit_account(ALICE, &account);

        assert_eq!(witness.pre_state_root(), B256::with_last_byte(0xaa));
        assert!(witness.verify_account(ALICE, &account));
        assert!(!witness.verify_account(ALICE, &Account { nonce: 2, ..account }));
        assert!(!witness.verify_account(Address::ZERO, &account));
    }

    #[test]
    fn test_commitment_witness_storage() {
        let key = B256::with_last_byte(1);
        let mut witness = CommitmentWitness::default();
        witness.commit_storage(ALICE, key, B256::with_last_byte(7));

        assert!(witness.verify_storage(ALICE, key, B256::with_last_byte(7)));
        assert!(!witness.verify_storage(ALICE, key, B256::ZERO));
        assert!(!witness.verify_storage(ALICE, B256::ZERO, B256::ZERO));
    }

    #[test]
    fn test_trusted_witness_accepts_everything() {
        assert!(TrustedWitness.verify_account(ALICE, &Account::empty()));
        assert!(TrustedWitness.verify_storage(ALICE, B256::ZERO, B256::ZERO));
    }
}
