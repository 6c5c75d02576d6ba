use std::collections::BTreeMap;

use alloy_primitives::{
    keccak256,
    map::{HashMap, HashSet},
    Address, Bytes, B256, U256,
};
use revm::{primitives::KECCAK_EMPTY, Database};
use tracing::{trace, warn};

use super::{
    journal::{Journal, JournalEntry},
    Account, Checkpoint, StateWitness, TouchFlags, TrustedWitness,
};
use crate::{constants::limits::MAX_MEMORY_OFFSET, RevertFlag, StateError};

/// The accounts and slots changed by the current transaction, in address and key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// Changed account records.
    pub accounts: BTreeMap<Address, Account>,
    /// Changed storage slots.
    pub storage: BTreeMap<(Address, B256), B256>,
}

impl StateDiff {
    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.storage.is_empty()
    }
}

/// The state store.
///
/// Accounts and slots are pulled from the backing database when they are first loaded and cached
/// from then on; the cache survives across transactions. Every read and write is gated: a key
/// must pass [`test_and_set_account_loaded`](Self::test_and_set_account_loaded) (or its storage
/// counterpart) before it can be read, and the matching `changed` gate before it can be written.
/// The gates report whether the key had already passed them in the current transaction, which is
/// what the interpreter meters nuisance gas on.
///
/// Storage of an account that was empty when it was loaded reads as zero and is not checked
/// against the witness.
#[derive(Debug)]
pub struct StateStore<DB, W = TrustedWitness> {
    db: DB,
    witness: W,
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, B256), B256>,
    /// Code keyed by [`Account::code_location`].
    code: HashMap<Address, Bytes>,
    account_flags: HashMap<Address, TouchFlags>,
    storage_flags: HashMap<(Address, B256), TouchFlags>,
    rejected_accounts: HashSet<Address>,
    rejected_storage: HashSet<(Address, B256)>,
    empty_at_load: HashSet<Address>,
    original_accounts: HashMap<Address, Account>,
    original_storage: HashMap<(Address, B256), B256>,
    journal: Journal,
}

impl<DB: Database> StateStore<DB> {
    /// Creates a store that trusts the backing database.
    pub fn new(db: DB) -> Self {
        Self::with_witness(db, TrustedWitness)
    }
}

impl<DB: Database, W: StateWitness> StateStore<DB, W> {
    /// Creates a store whose first loads are checked against `witness`.
    pub fn with_witness(db: DB, witness: W) -> Self {
        Self {
            db,
            witness,
            accounts: HashMap::default(),
            storage: HashMap::default(),
            code: HashMap::default(),
            account_flags: HashMap::default(),
            storage_flags: HashMap::default(),
            rejected_accounts: HashSet::default(),
            rejected_storage: HashSet::default(),
            empty_at_load: HashSet::default(),
            original_accounts: HashMap::default(),
            original_storage: HashMap::default(),
            journal: Journal::default(),
        }
    }

    /// Returns the backing database.
    pub const fn db(&self) -> &DB {
        &self.db
    }

    /// Returns the witness.
    pub const fn witness(&self) -> &W {
        &self.witness
    }

    /// Installs the witness of the next transaction, returning the previous one.
    pub fn replace_witness(&mut self, witness: W) -> W {
        core::mem::replace(&mut self.witness, witness)
    }

    /// Starts a new transaction: forgets every load and change flag, every rejected witness and
    /// the undo journal. Cached state is kept.
    pub fn begin_transaction(&mut self) {
        self.account_flags.clear();
        self.storage_flags.clear();
        self.rejected_accounts.clear();
        self.rejected_storage.clear();
        self.empty_at_load.clear();
        self.original_accounts.clear();
        self.original_storage.clear();
        self.journal.clear();
    }

    /// Returns whether `address` has an account record. Neither gated nor metered.
    pub fn has_account(&mut self, address: Address) -> Result<bool, DB::Error> {
        Ok(self.fetch_account(address)?.is_some())
    }

    /// Passes `address` through the account load gate.
    ///
    /// Returns whether the account had already been loaded in this transaction. The first load
    /// fails with [`RevertFlag::InvalidStateAccess`] if the account has no record or its witness
    /// does not verify; a witness failure is remembered until the transaction ends.
    pub fn test_and_set_account_loaded(
        &mut self,
        address: Address,
    ) -> Result<bool, StateError<DB::Error>> {
        if self.account_flags(address).contains(TouchFlags::LOADED) {
            return Ok(true);
        }
        if self.rejected_accounts.contains(&address) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        let Some(account) = self.fetch_account(address).map_err(StateError::Database)? else {
            trace!(address = %address, "Account has no record");
            return Err(RevertFlag::InvalidStateAccess.into());
        };
        if !self.witness.verify_account(address, &account) {
            warn!(address = %address, "Account witness rejected");
            self.rejected_accounts.insert(address);
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        if account.is_empty() {
            self.empty_at_load.insert(address);
        }
        self.account_flags.entry(address).or_default().insert(TouchFlags::LOADED);
        trace!(address = %address, "Account loaded");
        Ok(false)
    }

    /// Passes `address` through the account change gate.
    ///
    /// Returns whether the account had already been changed in this transaction. Fails with
    /// [`RevertFlag::InvalidStateAccess`] if the account has not been loaded.
    pub fn test_and_set_account_changed(
        &mut self,
        address: Address,
    ) -> Result<bool, StateError<DB::Error>> {
        let flags = self.account_flags(address);
        if !flags.contains(TouchFlags::LOADED) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        if flags.contains(TouchFlags::CHANGED) {
            return Ok(true);
        }
        let current = self.loaded_account(address)?;
        self.original_accounts.entry(address).or_insert(current);
        self.account_flags.entry(address).or_default().insert(TouchFlags::CHANGED);
        Ok(false)
    }

    /// Returns the record of a loaded account.
    pub fn get_account(&self, address: Address) -> Result<Account, StateError<DB::Error>> {
        if !self.account_flags(address).contains(TouchFlags::LOADED) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        self.loaded_account(address)
    }

    /// Overwrites the record of a changed account.
    ///
    /// Fails with [`RevertFlag::InvalidStateAccess`] if the account has not been loaded and with
    /// [`RevertFlag::ExceedsNuisanceGas`] if it has not passed the change gate.
    pub fn put_account(
        &mut self,
        address: Address,
        account: Account,
    ) -> Result<(), StateError<DB::Error>> {
        let flags = self.account_flags(address);
        if !flags.contains(TouchFlags::LOADED) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        if !flags.contains(TouchFlags::CHANGED) {
            return Err(RevertFlag::ExceedsNuisanceGas.into());
        }
        let previous = self.loaded_account(address)?;
        self.journal.record(JournalEntry::Account { address, previous });
        self.accounts.insert(address, account);
        Ok(())
    }

    /// Installs `code` as the code of a changed account, returning the code hash.
    ///
    /// The bytes are stored once per distinct hash, however many accounts run them.
    pub fn install_code(
        &mut self,
        address: Address,
        code: Bytes,
    ) -> Result<B256, StateError<DB::Error>> {
        let account = self.get_account(address)?;
        let code_hash = if code.is_empty() { KECCAK_EMPTY } else { keccak256(&code) };
        let installed = account.with_code_hash(code_hash);
        self.put_account(address, installed)?;
        if !code.is_empty() {
            self.code.entry(installed.code_location).or_insert(code);
        }
        Ok(code_hash)
    }

    /// Passes slot `key` of `address` through the storage load gate.
    ///
    /// Returns whether the slot had already been loaded in this transaction. The first load
    /// fails with [`RevertFlag::InvalidStateAccess`] if the account has not been loaded or the
    /// slot's witness does not verify.
    pub fn test_and_set_contract_storage_loaded(
        &mut self,
        address: Address,
        key: B256,
    ) -> Result<bool, StateError<DB::Error>> {
        let slot = (address, key);
        if self.storage_flags(slot).contains(TouchFlags::LOADED) {
            return Ok(true);
        }
        if self.rejected_storage.contains(&slot) ||
            !self.account_flags(address).contains(TouchFlags::LOADED)
        {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        let empty_at_load = self.empty_at_load.contains(&address);
        let value = match self.storage.get(&slot) {
            Some(value) => *value,
            None if empty_at_load => B256::ZERO,
            None => {
                let value = self
                    .db
                    .storage(address, U256::from_be_bytes(key.0))
                    .map_err(StateError::Database)?;
                B256::from(value)
            }
        };
        if !empty_at_load && !self.witness.verify_storage(address, key, value) {
            warn!(address = %address, key = %key, "Storage witness rejected");
            self.rejected_storage.insert(slot);
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        self.storage.insert(slot, value);
        self.storage_flags.entry(slot).or_default().insert(TouchFlags::LOADED);
        trace!(address = %address, key = %key, "Storage loaded");
        Ok(false)
    }

    /// Passes slot `key` of `address` through the storage change gate.
    ///
    /// Returns whether the slot had already been changed in this transaction. Fails with
    /// [`RevertFlag::InvalidStateAccess`] if the slot has not been loaded.
    pub fn test_and_set_contract_storage_changed(
        &mut self,
        address: Address,
        key: B256,
    ) -> Result<bool, StateError<DB::Error>> {
        let slot = (address, key);
        let flags = self.storage_flags(slot);
        if !flags.contains(TouchFlags::LOADED) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        if flags.contains(TouchFlags::CHANGED) {
            return Ok(true);
        }
        let current = self.storage.get(&slot).copied().unwrap_or_default();
        self.original_storage.entry(slot).or_insert(current);
        self.storage_flags.entry(slot).or_default().insert(TouchFlags::CHANGED);
        Ok(false)
    }

    /// Returns the value of a loaded slot.
    pub fn get_contract_storage(
        &self,
        address: Address,
        key: B256,
    ) -> Result<B256, StateError<DB::Error>> {
        let slot = (address, key);
        if !self.storage_flags(slot).contains(TouchFlags::LOADED) {
            return Err(RevertFlag::InvalidStateAccess.into());
        }
        Ok(self.storage.get(&slot).copied().unwrap_or_default())
    }

    /// Overwrites the value of a changed slot.
    ///
    /// Fails with [`RevertFlag::ExceedsNuisanceGas`] if the slot has not passed the change gate.
    pub fn put_contract_storage(
        &mut self,
        address: Address,
        key: B256,
        value: B256,
    ) -> Result<(), StateError<DB::Error>> {
        let slot = (address, key);
        if !self.storage_flags(slot).contains(TouchFlags::CHANGED) {
            return Err(RevertFlag::ExceedsNuisanceGas.into());
        }
        let previous = self.storage.get(&slot).copied().unwrap_or_default();
        self.journal.record(JournalEntry::Storage { address, key, previous });
        self.storage.insert(slot, value);
        Ok(())
    }

    /// Returns `length` bytes of a loaded account's code starting at `offset`.
    ///
    /// Bytes past the end of the code read as zero. A zero-length read returns empty bytes
    /// without consulting any gate.
    ///
    /// The result is always `length` bytes long, so `length` must be a size the caller is
    /// prepared to hold, such as guest memory that has already been paid for. Reads covering
    /// more than [`MAX_MEMORY_OFFSET`] bytes fail with [`RevertFlag::UnknownFault`]
    /// without allocating.
    pub fn get_code(
        &self,
        address: Address,
        offset: usize,
        length: usize,
    ) -> Result<Bytes, StateError<DB::Error>> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let code = self.code(address)?;
        if length > MAX_MEMORY_OFFSET {
            return Err(RevertFlag::UnknownFault.into());
        }
        let mut out = vec![0u8; length];
        if offset < code.len() {
            let end = offset.saturating_add(length).min(code.len());
            out[..end - offset].copy_from_slice(&code[offset..end]);
        }
        Ok(out.into())
    }

    /// Returns the full code of a loaded account.
    pub fn code(&self, address: Address) -> Result<Bytes, StateError<DB::Error>> {
        let account = self.get_account(address)?;
        if !account.has_code() {
            return Ok(Bytes::new());
        }
        Ok(self.code.get(&account.code_location).cloned().unwrap_or_default())
    }

    /// Returns the code size of a loaded account.
    pub fn get_code_size(&self, address: Address) -> Result<usize, StateError<DB::Error>> {
        Ok(self.code(address)?.len())
    }

    /// Returns the code hash of a loaded account.
    pub fn get_code_hash(&self, address: Address) -> Result<B256, StateError<DB::Error>> {
        Ok(self.get_account(address)?.code_hash)
    }

    /// Opens a frame scope.
    pub fn checkpoint(&self) -> Checkpoint {
        self.journal.checkpoint()
    }

    /// Undoes every account and slot write made since `checkpoint`.
    ///
    /// Load and change flags stay set: nuisance gas spent inside a reverted frame stays spent.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        for entry in self.journal.unwind(checkpoint) {
            match entry {
                JournalEntry::Account { address, previous } => {
                    self.accounts.insert(address, previous);
                }
                JournalEntry::Storage { address, key, previous } => {
                    self.storage.insert((address, key), previous);
                }
            }
        }
    }

    /// Returns the number of writes that a [`revert_to`](Self::revert_to) could still undo.
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Returns the number of accounts that passed the change gate in this transaction.
    pub fn uncommitted_accounts(&self) -> usize {
        self.account_flags.values().filter(|flags| flags.contains(TouchFlags::CHANGED)).count()
    }

    /// Returns the number of slots that passed the change gate in this transaction.
    pub fn uncommitted_storage(&self) -> usize {
        self.storage_flags.values().filter(|flags| flags.contains(TouchFlags::CHANGED)).count()
    }

    /// Returns the keys whose value differs from the value they had when the transaction began.
    pub fn state_diff(&self) -> StateDiff {
        let accounts = self
            .original_accounts
            .iter()
            .filter_map(|(address, original)| {
                let current = self.accounts.get(address)?;
                (current != original).then_some((*address, *current))
            })
            .collect();
        let storage = self
            .original_storage
            .iter()
            .filter_map(|(slot, original)| {
                let current = self.storage.get(slot)?;
                (current != original).then_some((*slot, *current))
            })
            .collect();
        StateDiff { accounts, storage }
    }

    fn account_flags(&self, address: Address) -> TouchFlags {
        self.account_flags.get(&address).copied().unwrap_or_default()
    }

    fn storage_flags(&self, slot: (Address, B256)) -> TouchFlags {
        self.storage_flags.get(&slot).copied().unwrap_or_default()
    }

    fn loaded_account(&self, address: Address) -> Result<Account, StateError<DB::Error>> {
        self.accounts.get(&address).copied().ok_or(StateError::Signal(RevertFlag::InvalidStateAccess))
    }

    /// Returns the cached record of `address`, pulling it and its code from the database on a
    /// cache miss.
    fn fetch_account(&mut self, address: Address) -> Result<Option<Account>, DB::Error> {
        if let Some(account) = self.accounts.get(&address) {
            return Ok(Some(*account));
        }
        let Some(info) = self.db.basic(address)? else {
            return Ok(None);
        };
        let account = Account::from(&info);
        if account.has_code() && !self.code.contains_key(&account.code_location) {
            let bytes = match info.code.filter(|code| !code.is_empty()) {
                Some(code) => code.original_bytes(),
                None => self.db.code_by_hash(account.code_hash)?.original_bytes(),
            };
            self.code.insert(account.code_location, bytes);
        }
        self.accounts.insert(address, account);
        Ok(Some(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::MemoryDatabase, CommitmentWitness};
    use alloy_primitives::{address, bytes};

    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn store() -> StateStore<MemoryDatabase> {
        let mut db = MemoryDatabase::default();
        db.set_account_code(ALICE, bytes!("60016000"));
        db.set_account_storage(ALICE, U256::from(1), U256::from(42));
        StateStore::new(db)
    }

    #[test]
    fn test_has_account_is_not_gated() {
        let mut store = store();
        assert!(store.has_account(ALICE).unwrap());
        assert!(!store.has_account(BOB).unwrap());
        assert!(matches!(
            store.get_account(ALICE),
            Err(StateError::Signal(RevertFlag::InvalidStateAccess))
        ));
    }

    #[test]
    fn test_load_gate_is_idempotent() {
        let mut store = store();
        assert!(!store.test_and_set_account_loaded(ALICE).unwrap());
        assert!(store.test_and_set_account_loaded(ALICE).unwrap());
        assert_eq!(store.get_code_size(ALICE).unwrap(), 4);
    }

    #[test]
    fn test_unknown_account_is_invalid_state_access() {
        let mut store = store();
        let err = store.test_and_set_account_loaded(BOB).unwrap_err();
        assert_eq!(err.flag(), Some(RevertFlag::InvalidStateAccess));
    }

    #[test]
    fn test_put_requires_change_gate() {
        let mut store = store();
        store.test_and_set_account_loaded(ALICE).unwrap();
        let account = Account { nonce: 5, ..store.get_account(ALICE).unwrap() };
        assert_eq!(
            store.put_account(ALICE, account).unwrap_err().flag(),
            Some(RevertFlag::ExceedsNuisanceGas)
        );
        assert!(!store.test_and_set_account_changed(ALICE).unwrap());
        store.put_account(ALICE, account).unwrap();
        assert_eq!(store.get_account(ALICE).unwrap().nonce, 5);
    }

    #[test]
    fn test_change_gate_requires_load() {
        let mut store = store();
        assert_eq!(
            store.test_and_set_account_changed(ALICE).unwrap_err().flag(),
            Some(RevertFlag::InvalidStateAccess)
        );
        assert_eq!(
            store.test_and_set_contract_storage_changed(ALICE, B256::ZERO).unwrap_err().flag(),
            Some(RevertFlag::InvalidStateAccess)
        );
    }

    #[test]
    fn test_storage_gates() {
        let mut store = store();
        let key = B256::with_last_byte(1);
        // the account itself must be loaded first
        assert_eq!(
            store.test_and_set_contract_storage_loaded(ALICE, key).unwrap_err().flag(),
            Some(RevertFlag::InvalidStateAccess)
        );
        store.test_and_set_account_loaded(ALICE).unwrap();
        assert!(!store.test_and_set_contract_storage_loaded(ALICE, key).unwrap());
        assert!(store.test_and_set_contract_storage_loaded(ALICE, key).unwrap());
        assert_eq!(store.get_contract_storage(ALICE, key).unwrap(), B256::with_last_byte(42));

        assert_eq!(
            store.put_contract_storage(ALICE, key, B256::ZERO).unwrap_err().flag(),
            Some(RevertFlag::ExceedsNuisanceGas)
        );
        assert_eq!(store.uncommitted_storage(), 0);
        assert!(!store.test_and_set_contract_storage_changed(ALICE, key).unwrap());
        assert_eq!(store.uncommitted_storage(), 1);
        store.put_contract_storage(ALICE, key, B256::ZERO).unwrap();
        assert_eq!(store.get_contract_storage(ALICE, key).unwrap(), B256::ZERO);

        store.begin_transaction();
        assert_eq!(store.uncommitted_storage(), 0);
    }

    #[test]
    fn test_code_reads_zero_pad() {
        let mut store = store();
        assert_eq!(store.get_code(BOB, 0, 0).unwrap(), Bytes::new());
        store.test_and_set_account_loaded(ALICE).unwrap();
        assert_eq!(store.get_code(ALICE, 2, 4).unwrap(), bytes!("60000000"));
        assert_eq!(store.get_code(ALICE, 100, 2).unwrap(), bytes!("0000"));
        assert_eq!(store.get_code(ALICE, usize::MAX, 1).unwrap(), bytes!("00"));
        assert_eq!(
            store.get_code(ALICE, 0, usize::MAX).unwrap_err().flag(),
            Some(RevertFlag::UnknownFault)
        );
        assert_eq!(store.get_code_hash(ALICE).unwrap(), keccak256(bytes!("60016000")));
    }

    #[test]
    fn test_revert_to_checkpoint() {
        let mut store = store();
        let key = B256::with_last_byte(1);
        store.test_and_set_account_loaded(ALICE).unwrap();
        store.test_and_set_contract_storage_loaded(ALICE, key).unwrap();
        store.test_and_set_contract_storage_changed(ALICE, key).unwrap();

        store.put_contract_storage(ALICE, key, B256::with_last_byte(1)).unwrap();
        let checkpoint = store.checkpoint();
        store.put_contract_storage(ALICE, key, B256::with_last_byte(2)).unwrap();
        store.put_contract_storage(ALICE, key, B256::with_last_byte(3)).unwrap();
        store.revert_to(checkpoint);

        assert_eq!(store.get_contract_storage(ALICE, key).unwrap(), B256::with_last_byte(1));
        assert_eq!(store.journal_len(), 1);
        // flags survive the revert
        assert!(store.test_and_set_contract_storage_changed(ALICE, key).unwrap());
    }

    #[test]
    fn test_begin_transaction_resets_flags_and_keeps_state() {
        let mut store = store();
        store.test_and_set_account_loaded(ALICE).unwrap();
        store.test_and_set_account_changed(ALICE).unwrap();
        let account = Account { nonce: 9, ..store.get_account(ALICE).unwrap() };
        store.put_account(ALICE, account).unwrap();
        assert_eq!(store.uncommitted_accounts(), 1);

        store.begin_transaction();
        assert_eq!(store.uncommitted_accounts(), 0);
        assert!(!store.test_and_set_account_loaded(ALICE).unwrap());
        assert_eq!(store.get_account(ALICE).unwrap().nonce, 9);
    }

    #[test]
    fn test_state_diff_skips_unchanged_values() {
        let mut store = store();
        let key = B256::with_last_byte(1);
        store.test_and_set_account_loaded(ALICE).unwrap();
        store.test_and_set_contract_storage_loaded(ALICE, key).unwrap();
        store.test_and_set_contract_storage_changed(ALICE, key).unwrap();
        store.put_contract_storage(ALICE, key, B256::with_last_byte(42)).unwrap();
        assert!(store.state_diff().is_empty());

        store.put_contract_storage(ALICE, key, B256::with_last_byte(7)).unwrap();
        let diff = store.state_diff();
        assert_eq!(diff.storage.get(&(ALICE, key)), Some(&B256::with_last_byte(7)));
        assert!(diff.accounts.is_empty());
    }

    #[test]
    fn test_install_code_shares_location() {
        let mut db = MemoryDatabase::default();
        db.set_empty_account(ALICE);
        db.set_empty_account(BOB);
        let mut store = StateStore::new(db);
        for address in [ALICE, BOB] {
            store.test_and_set_account_loaded(address).unwrap();
            store.test_and_set_account_changed(address).unwrap();
            store.install_code(address, bytes!("00")).unwrap();
        }
        let alice = store.get_account(ALICE).unwrap();
        let bob = store.get_account(BOB).unwrap();
        assert_eq!(alice.code_location, bob.code_location);
        assert_eq!(store.code(BOB).unwrap(), bytes!("00"));
    }

    #[test]
    fn test_empty_account_storage_skips_witness() {
        let mut db = MemoryDatabase::default();
        db.set_empty_account(BOB);
        let mut witness = CommitmentWitness::default();
        witness.commit_account(BOB, &Account::empty());
        let mut store = StateStore::with_witness(db, witness);

        store.test_and_set_account_loaded(BOB).unwrap();
        assert!(!store.test_and_set_contract_storage_loaded(BOB, B256::ZERO).unwrap());
        assert_eq!(store.get_contract_storage(BOB, B256::ZERO).unwrap(), B256::ZERO);
    }

    #[test]
    fn test_witness_failure_is_permanent() {
        let mut db = MemoryDatabase::default();
        db.set_account_balance(ALICE, U256::from(1));
        let mut witness = CommitmentWitness::default();
        witness.commit_account(ALICE, &Account { balance: U256::from(2), ..Account::empty() });
        let mut store = StateStore::with_witness(db, witness);

        for _ in 0..2 {
            assert_eq!(
                store.test_and_set_account_loaded(ALICE).unwrap_err().flag(),
                Some(RevertFlag::InvalidStateAccess)
            );
        }
        // even once a matching witness is supplied
        let mut fixed = CommitmentWitness::default();
        fixed.commit_account(ALICE, &Account { balance: U256::from(1), ..Account::empty() });
        store.replace_witness(fixed);
        assert!(store.test_and_set_account_loaded(ALICE).is_err());

        store.begin_transaction();
        assert!(!store.test_and_set_account_loaded(ALICE).unwrap());
    }
}
