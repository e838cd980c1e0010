use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;

use crate::{
    account::Account,
    ledger::{EntryId, EntryStatus, LedgerEntry, OperationKind},
};

use super::{AccountStore, LedgerStore, StoreError};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// In-memory [`AccountStore`] with one mutex per account.
///
/// Lock waits are bounded, a caller that cannot acquire an account lock
/// within the timeout gets [`StoreError::Busy`] instead of blocking forever.
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Arc<Mutex<Account>>>>,
    lock_timeout: Duration,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryAccountStore {
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    fn handle(&self, account_number: &str) -> Result<Arc<Mutex<Account>>, StoreError> {
        self.accounts
            .read()
            .get(account_number)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound {
                account_number: account_number.to_owned(),
            })
    }

    fn lock<'a>(
        &self,
        handle: &'a Mutex<Account>,
        account_number: &str,
    ) -> Result<MutexGuard<'a, Account>, StoreError> {
        handle
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| StoreError::Busy {
                account_number: account_number.to_owned(),
            })
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        match accounts.entry(account.account_number().to_owned()) {
            Entry::Occupied(entry) => Err(StoreError::DuplicateAccount {
                account_number: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    fn read(&self, account_number: &str) -> Result<Account, StoreError> {
        let handle = self.handle(account_number)?;
        let guard = self.lock(&handle, account_number)?;
        Ok(guard.clone())
    }

    fn read_all(&self) -> Result<Vec<Account>, StoreError> {
        // take snapshots outside the registry lock, with the same bounded
        // wait as any other account access
        let handles: Vec<(String, Arc<Mutex<Account>>)> = self
            .accounts
            .read()
            .iter()
            .map(|(number, handle)| (number.clone(), handle.clone()))
            .collect();
        let mut accounts = Vec::with_capacity(handles.len());
        for (number, handle) in &handles {
            accounts.push(self.lock(handle, number)?.clone());
        }
        accounts.sort_by(|a, b| a.account_number().cmp(b.account_number()));
        Ok(accounts)
    }

    fn with_account<R>(
        &self,
        account_number: &str,
        op: impl FnOnce(&mut Account) -> R,
    ) -> Result<R, StoreError> {
        let handle = self.handle(account_number)?;
        let mut guard = self.lock(&handle, account_number)?;
        Ok(op(&mut guard))
    }

    fn with_pair<R>(
        &self,
        source: &str,
        destination: &str,
        op: impl FnOnce(&mut Account, &mut Account) -> R,
    ) -> Result<R, StoreError> {
        // existence is checked source first so the caller can tell which
        // side of a transfer is missing
        let src_handle = self.handle(source)?;
        let dst_handle = self.handle(destination)?;

        // always lock in ascending account-number order, opposite-direction
        // transfers over the same pair then queue instead of deadlocking
        if source <= destination {
            let mut src = self.lock(&src_handle, source)?;
            let mut dst = self.lock(&dst_handle, destination)?;
            Ok(op(&mut src, &mut dst))
        } else {
            let mut dst = self.lock(&dst_handle, destination)?;
            let mut src = self.lock(&src_handle, source)?;
            Ok(op(&mut src, &mut dst))
        }
    }
}

/// In-memory append-only [`LedgerStore`]. Ids are dense and 1-based, assigned
/// under the same lock that appends, so they are strictly monotonic.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(
        &self,
        source_account: &str,
        destination_account: &str,
        amount: Decimal,
        kind: OperationKind,
    ) -> Result<LedgerEntry, StoreError> {
        let mut entries = self.entries.lock();
        let id = entries.len() as EntryId + 1;
        let entry = LedgerEntry::pending(id, source_account, destination_account, amount, kind);
        entries.push(entry.clone());
        Ok(entry)
    }

    fn finalize(
        &self,
        id: EntryId,
        status: EntryStatus,
        description: &str,
    ) -> Result<LedgerEntry, StoreError> {
        let mut entries = self.entries.lock();
        let entry = id
            .checked_sub(1)
            .and_then(|idx| entries.get_mut(idx as usize))
            .ok_or(StoreError::EntryNotFound { id })?;
        if entry.status().is_terminal() {
            return Err(StoreError::EntryFinalized { id });
        }
        entry.mark(status, description);
        Ok(entry.clone())
    }

    fn history_for(&self, account_number: &str) -> Vec<LedgerEntry> {
        let entries = self.entries.lock();
        let mut matched: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| e.involves(account_number))
            .cloned()
            .collect();
        // id breaks timestamp ties, append order is the ground truth
        matched.sort_by(|a, b| (b.timestamp(), b.id()).cmp(&(a.timestamp(), a.id())));
        matched
    }

    fn pending(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| !e.status().is_terminal())
            .cloned()
            .collect()
    }
}
