use core::convert::Infallible;

use alloy_primitives::{Address, Bytes, B256, U256};
use delegate::delegate;
use revm::{
    database::{AccountState, CacheDB, DbAccount, EmptyDB},
    database_interface::DBErrorMarker,
    primitives::{StorageKey, StorageValue},
    state::{AccountInfo, Bytecode},
    Database,
};

/// An in-memory pre-state for tests.
///
/// Accounts that were never set have no record, so loading them fails with
/// [`RevertFlag::InvalidStateAccess`](crate::RevertFlag::InvalidStateAccess). Use
/// [`set_empty_account`](Self::set_empty_account) to give an address a proven-empty record.
#[derive(Debug, Default, Clone, derive_more::Deref, derive_more::DerefMut)]
pub struct MemoryDatabase {
    #[deref]
    #[deref_mut]
    db: CacheDB<EmptyDB>,
}

impl MemoryDatabase {
    /// Gives `address` an empty account record.
    pub fn set_empty_account(&mut self, address: Address) {
        self.record(address);
    }

    /// Sets the code of `address`, creating its record.
    pub fn set_account_code(&mut self, address: Address, code: Bytes) {
        let bytecode = Bytecode::new_legacy(code);
        let account = self.record(address);
        account.info.code_hash = bytecode.hash_slow();
        account.info.code = Some(bytecode);
    }

    /// Sets the balance of `address`, creating its record.
    pub fn set_account_balance(&mut self, address: Address, balance: U256) {
        self.record(address).info.balance = balance;
    }

    /// Sets the nonce of `address`, creating its record.
    pub fn set_account_nonce(&mut self, address: Address, nonce: u64) {
        self.record(address).info.nonce = nonce;
    }

    /// Sets a storage slot of `address`, creating its record.
    pub fn set_account_storage(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.record(address).storage.insert(key, value);
    }

    /// The record of `address`, marked as existing in the pre-state.
    fn record(&mut self, address: Address) -> &mut DbAccount {
        let account = match self.db.load_account(address) {
            Ok(account) => account,
            Err(never) => match never {},
        };
        account.account_state = AccountState::None;
        account
    }
}

impl Database for MemoryDatabase {
    type Error = Infallible;

    delegate! {
        to self.db {
            fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error>;
            fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error>;
            fn storage(&mut self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error>;
            fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error>;
        }
    }
}

/// The error of an [`UnavailableStorageDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("storage of {0} is unavailable")]
pub struct StorageUnavailable(pub Address);

impl DBErrorMarker for StorageUnavailable {}

/// A [`MemoryDatabase`] whose storage reads for one account fail, standing in for a backend
/// that drops out mid-transaction.
#[derive(Debug, Clone, derive_more::Deref, derive_more::DerefMut)]
pub struct UnavailableStorageDatabase {
    #[deref]
    #[deref_mut]
    db: MemoryDatabase,
    unavailable: Address,
}

impl UnavailableStorageDatabase {
    /// Wraps `db`, failing every storage read of `unavailable`.
    pub const fn new(db: MemoryDatabase, unavailable: Address) -> Self {
        Self { db, unavailable }
    }
}

impl Database for UnavailableStorageDatabase {
    type Error = StorageUnavailable;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.db.basic(address).map_err(|never| match never {})
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.db.code_by_hash(code_hash).map_err(|never| match never {})
    }

    fn storage(&mut self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        if address == self.unavailable {
            return Err(StorageUnavailable(address));
        }
        self.db.storage(address, index).map_err(|never| match never {})
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.db.block_hash(number).map_err(|never| match never {})
    }
}
