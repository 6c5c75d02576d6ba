use alloy_primitives::{Address, B256, U256};
use bitflags::bitflags;
use revm::{primitives::KECCAK_EMPTY, state::AccountInfo};

use crate::constants::system::EMPTY_STORAGE_ROOT;

/// An account record, keyed by its virtual address.
///
/// The code itself is not part of the record. It lives in the store's code table under
/// [`code_location`](Self::code_location), a physical location derived from the code hash, so
/// accounts running identical code share one copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Account {
    /// The account nonce.
    pub nonce: u64,
    /// The account balance.
    pub balance: U256,
    /// The storage root as supplied by the ledger of record. The sandbox does not recompute it.
    pub storage_root: B256,
    /// The hash of the account's code.
    pub code_hash: B256,
    /// Where the account's code is physically stored.
    pub code_location: Address,
}

impl Default for Account {
    fn default() -> Self {
        Self::empty()
    }
}

impl Account {
    /// The canonical non-existent account: no code, zero nonce, zero balance.
    pub fn empty() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: EMPTY_STORAGE_ROOT,
            code_hash: KECCAK_EMPTY,
            code_location: code_location(KECCAK_EMPTY),
        }
    }

    /// Whether the account is indistinguishable from a non-existent one.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && !self.has_code()
    }

    /// Whether the account has code.
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }

    /// Returns the record with the given code hash and the matching code location.
    pub fn with_code_hash(mut self, code_hash: B256) -> Self {
        self.code_hash = code_hash;
        self.code_location = code_location(code_hash);
        self
    }
}

impl From<&AccountInfo> for Account {
    fn from(info: &AccountInfo) -> Self {
        // some databases report the zero hash for accounts without code
        let code_hash = if info.code_hash.is_zero() { KECCAK_EMPTY } else { info.code_hash };
        Self { nonce: info.nonce, balance: info.balance, ..Self::empty() }.with_code_hash(code_hash)
    }
}

/// Returns the physical location of code with the given hash.
pub fn code_location(code_hash: B256) -> Address {
    Address::from_word(code_hash)
}

bitflags! {
    /// Transaction-scoped bookkeeping of which keys have been loaded and changed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TouchFlags: u8 {
        /// The key passed its load gate.
        const LOADED = 1 << 0;
        /// The key passed its change gate.
        const CHANGED = 1 << 1;
    }
}

impl Default for TouchFlags {
    fn default() -> Self {
        Self::empty()
    }
}
