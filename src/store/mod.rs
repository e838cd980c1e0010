use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::Account,
    ledger::{EntryId, EntryStatus, LedgerEntry, OperationKind},
};

pub mod in_memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found: {account_number}")]
    AccountNotFound { account_number: String },
    #[error("account already exists: {account_number}")]
    DuplicateAccount { account_number: String },
    #[error("timed out waiting for lock on account {account_number}")]
    Busy { account_number: String },
    #[error("ledger entry not found: {id}")]
    EntryNotFound { id: EntryId },
    #[error("ledger entry {id} already reached a terminal status")]
    EntryFinalized { id: EntryId },
}

/// Durable keyed storage of accounts. Sole owner of account records, the
/// engine never caches balances across calls.
pub trait AccountStore {
    fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Point-in-time snapshot of one account.
    fn read(&self, account_number: &str) -> Result<Account, StoreError>;

    /// Snapshots of every account, ordered by account number. Subject to the
    /// same bounded lock waits as single-account reads.
    fn read_all(&self) -> Result<Vec<Account>, StoreError>;

    /// Atomic read-modify-write of one account. No other operation observes
    /// the account between the read and the write.
    fn with_account<R>(
        &self,
        account_number: &str,
        op: impl FnOnce(&mut Account) -> R,
    ) -> Result<R, StoreError>;

    /// Atomic read-modify-write spanning two distinct accounts. The closure
    /// receives (source, destination) in caller order; mutations to both
    /// become visible to other operations together or not at all.
    ///
    /// Implementations must acquire the underlying locks in a fixed global
    /// order so that opposite-direction pairs cannot deadlock.
    fn with_pair<R>(
        &self,
        source: &str,
        destination: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> R,
    ) -> Result<R, StoreError>;
}

/// Append-oriented storage of ledger entries. Entries are appended `Pending`,
/// finalized exactly once, and never deleted.
pub trait LedgerStore {
    /// Assigns the next monotonic id and persists the entry in `Pending`
    /// state.
    fn append(
        &self,
        source_account: &str,
        destination_account: &str,
        amount: Decimal,
        kind: OperationKind,
    ) -> Result<LedgerEntry, StoreError>;

    /// Transitions a `Pending` entry to a terminal status. Fails with
    /// [`StoreError::EntryFinalized`] if the entry is already terminal.
    fn finalize(
        &self,
        id: EntryId,
        status: EntryStatus,
        description: &str,
    ) -> Result<LedgerEntry, StoreError>;

    /// Entries whose source or destination matches, newest first.
    fn history_for(&self, account_number: &str) -> Vec<LedgerEntry>;

    /// Entries that never reached a terminal status, e.g. because the
    /// process died mid-operation. Restart/recovery hook.
    fn pending(&self) -> Vec<LedgerEntry>;
}

impl<T: AccountStore> AccountStore for &T {
    fn insert(&self, account: Account) -> Result<(), StoreError> {
        (**self).insert(account)
    }

    fn read(&self, account_number: &str) -> Result<Account, StoreError> {
        (**self).read(account_number)
    }

    fn read_all(&self) -> Result<Vec<Account>, StoreError> {
        (**self).read_all()
    }

    fn with_account<R>(
        &self,
        account_number: &str,
        op: impl FnOnce(&mut Account) -> R,
    ) -> Result<R, StoreError> {
        (**self).with_account(account_number, op)
    }

    fn with_pair<R>(
        &self,
        source: &str,
        destination: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> R,
    ) -> Result<R, StoreError> {
        (**self).with_pair(source, destination, op)
    }
}

impl<T: LedgerStore> LedgerStore for &T {
    fn append(
        &self,
        source_account: &str,
        destination_account: &str,
        amount: Decimal,
        kind: OperationKind,
    ) -> Result<LedgerEntry, StoreError> {
        (**self).append(source_account, destination_account, amount, kind)
    }

    fn finalize(
        &self,
        id: EntryId,
        status: EntryStatus,
        description: &str,
    ) -> Result<LedgerEntry, StoreError> {
        (**self).finalize(id, status, description)
    }

    fn history_for(&self, account_number: &str) -> Vec<LedgerEntry> {
        (**self).history_for(account_number)
    }

    fn pending(&self) -> Vec<LedgerEntry> {
        (**self).pending()
    }
}
