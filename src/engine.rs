use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    account::{Account, AccountError, AccountKind},
    ledger::{EntryStatus, LedgerEntry, OperationKind},
    store::{AccountStore, LedgerStore, StoreError},
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("account not found: {account_number}")]
    AccountNotFound { account_number: String },
    #[error("account already exists: {account_number}")]
    DuplicateAccount { account_number: String },
    #[error("source and destination accounts must differ")]
    SameAccount,
    #[error("operation timed out waiting for account {account_number}")]
    Busy { account_number: String },
    #[error(transparent)]
    Account(#[from] AccountError),
    /// Fault in the stores themselves. Not retried here, a silent retry of a
    /// ledger write could double-record a transaction.
    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound { account_number } => {
                Self::AccountNotFound { account_number }
            }
            StoreError::DuplicateAccount { account_number } => {
                Self::DuplicateAccount { account_number }
            }
            StoreError::Busy { account_number } => Self::Busy { account_number },
            other => Self::Storage(other),
        }
    }
}

/// Orchestrates deposits, withdrawals and transfers over an [`AccountStore`]
/// and a [`LedgerStore`].
///
/// Every operation follows the same discipline: append a `Pending` ledger
/// entry before touching any balance, finalize it to `Success` or `Failed`
/// before returning. The engine itself is stateless, all methods take
/// `&self` and are safe under concurrent callers.
pub struct TransferEngine<A, L> {
    accounts: A,
    ledger: L,
}

impl<A, L> TransferEngine<A, L>
where
    A: AccountStore,
    L: LedgerStore,
{
    pub fn new(accounts: A, ledger: L) -> Self {
        Self { accounts, ledger }
    }

    /// Opens an account. The initial balance is not floor-checked, the floor
    /// is enforced on debit only.
    pub fn create_account(
        &self,
        kind: AccountKind,
        account_number: impl Into<String>,
        holder_name: impl Into<String>,
        initial_balance: Decimal,
        owner_identity: Option<String>,
    ) -> Result<Account, EngineError> {
        let account = Account::new(
            kind,
            account_number,
            holder_name,
            initial_balance,
            owner_identity,
        )?;
        self.accounts.insert(account.clone())?;
        debug!(
            account = account.account_number(),
            kind = account.kind().name(),
            "account created"
        );
        Ok(account)
    }

    pub fn account(&self, account_number: &str) -> Result<Account, EngineError> {
        Ok(self.accounts.read(account_number)?)
    }

    pub fn balance(&self, account_number: &str) -> Result<Decimal, EngineError> {
        Ok(self.accounts.read(account_number)?.balance())
    }

    /// Snapshots of every account, ordered by account number.
    pub fn accounts(&self) -> Result<Vec<Account>, EngineError> {
        Ok(self.accounts.read_all()?)
    }

    /// Every ledger entry touching the account, newest first.
    pub fn history(&self, account_number: &str) -> Vec<LedgerEntry> {
        self.ledger.history_for(account_number)
    }

    pub fn deposit(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        let entry = self
            .ledger
            .append(account_number, account_number, amount, OperationKind::Deposit)?;
        let outcome = self.apply_single(account_number, |acc| acc.deposit(amount));
        self.finish(entry, outcome)
    }

    pub fn withdraw(
        &self,
        account_number: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        let entry = self.ledger.append(
            account_number,
            account_number,
            amount,
            OperationKind::Withdrawal,
        )?;
        let outcome = self.apply_single(account_number, |acc| acc.withdraw(amount));
        self.finish(entry, outcome)
    }

    /// Debits `source` and credits `destination` as one unit. The two
    /// balances change under both account locks, no reader ever observes the
    /// debit without the credit.
    pub fn transfer(
        &self,
        source: &str,
        destination: &str,
        amount: Decimal,
    ) -> Result<LedgerEntry, EngineError> {
        let entry = self
            .ledger
            .append(source, destination, amount, OperationKind::Transfer)?;
        let outcome = self.apply_transfer(source, destination, amount);
        self.finish(entry, outcome)
    }

    fn apply_single(
        &self,
        account_number: &str,
        op: impl FnOnce(&mut Account) -> Result<(), AccountError>,
    ) -> Result<(), EngineError> {
        self.accounts.with_account(account_number, op)??;
        Ok(())
    }

    fn apply_transfer(
        &self,
        source: &str,
        destination: &str,
        amount: Decimal,
    ) -> Result<(), EngineError> {
        if source == destination {
            return Err(EngineError::SameAccount);
        }
        self.accounts.with_pair(source, destination, |src, dst| {
            src.withdraw(amount)?;
            match dst.deposit(amount) {
                Ok(()) => Ok(()),
                Err(err) => {
                    // deposit only rejects non-positive amounts, which the
                    // withdrawal above has already ruled out; if it ever
                    // fails, put the debit back instead of stranding it
                    let _ = src.deposit(amount);
                    Err(err)
                }
            }
        })??;
        Ok(())
    }

    /// Guaranteed-run tail of every operation: the entry reaches a terminal
    /// status and is persisted before the outcome is handed back, success or
    /// not.
    fn finish(
        &self,
        entry: LedgerEntry,
        outcome: Result<(), EngineError>,
    ) -> Result<LedgerEntry, EngineError> {
        let label = match entry.kind() {
            OperationKind::Transfer => "Fund transfer",
            OperationKind::Deposit => "Deposit",
            OperationKind::Withdrawal => "Withdrawal",
        };
        match outcome {
            Ok(()) => {
                let entry = self.ledger.finalize(
                    entry.id(),
                    EntryStatus::Success,
                    &format!("{label} successful"),
                )?;
                debug!(id = entry.id(), "{label} committed");
                Ok(entry)
            }
            Err(err) => {
                warn!(id = entry.id(), error = %err, "{label} failed");
                self.ledger.finalize(
                    entry.id(),
                    EntryStatus::Failed,
                    &format!("{label} failed: {err}"),
                )?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use rust_decimal::prelude::FromPrimitive;

    use crate::store::in_memory::{InMemoryAccountStore, InMemoryLedgerStore};

    use super::*;

    fn engine() -> TransferEngine<InMemoryAccountStore, InMemoryLedgerStore> {
        TransferEngine::new(InMemoryAccountStore::default(), InMemoryLedgerStore::default())
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from_i64(n).unwrap()
    }

    fn savings_with_floor(
        engine: &TransferEngine<InMemoryAccountStore, InMemoryLedgerStore>,
        number: &str,
        balance: i64,
        floor: i64,
    ) {
        let kind = AccountKind::Savings {
            minimum_balance: dec(floor),
            interest_rate: Decimal::new(35, 1),
        };
        engine
            .create_account(kind, number, "Holder", dec(balance), None)
            .unwrap();
    }

    #[test]
    fn duplicate_account_rejected() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(0), None)
            .unwrap();
        let err = engine
            .create_account(AccountKind::savings(), "A1", "Bob", dec(0), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateAccount { .. }));
    }

    #[test]
    fn deposit_success_writes_terminal_entry() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();
        let entry = engine.deposit("A1", dec(50)).unwrap();
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.kind(), OperationKind::Deposit);
        assert_eq!(entry.source_account(), "A1");
        assert_eq!(entry.destination_account(), "A1");
        assert_eq!(entry.description(), "Deposit successful");
        assert_eq!(engine.balance("A1").unwrap(), dec(150));
    }

    #[test]
    fn deposit_of_zero_fails_and_is_ledgered() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();
        let err = engine.deposit("A1", dec(0)).unwrap_err();
        assert!(matches!(err, EngineError::Account(AccountError::InvalidAmount)));
        assert_eq!(engine.balance("A1").unwrap(), dec(100));

        let history = engine.history("A1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), EntryStatus::Failed);
        assert_eq!(
            history[0].description(),
            "Deposit failed: amount must be greater than zero"
        );
    }

    #[test]
    fn deposit_to_missing_account_fails_and_is_ledgered() {
        let engine = engine();
        let err = engine.deposit("NOPE", dec(10)).unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound { .. }));
        let history = engine.history("NOPE");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), EntryStatus::Failed);
    }

    #[test]
    fn savings_withdrawal_breach_is_rejected() {
        let engine = engine();
        savings_with_floor(&engine, "SAV", 1500, 1000);
        let err = engine.withdraw("SAV", dec(600)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Account(AccountError::InsufficientFunds { .. })
        ));
        assert_eq!(engine.balance("SAV").unwrap(), dec(1500));
        let history = engine.history("SAV");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), EntryStatus::Failed);
        assert_eq!(history[0].kind(), OperationKind::Withdrawal);
    }

    #[test]
    fn current_withdrawal_into_overdraft_succeeds() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "CHK", "Alice", dec(0), None)
            .unwrap();
        let entry = engine.withdraw("CHK", dec(8_000)).unwrap();
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(engine.balance("CHK").unwrap(), dec(-8_000));
    }

    #[test]
    fn transfer_moves_exactly_the_amount() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(500), None)
            .unwrap();
        engine
            .create_account(AccountKind::current(), "A2", "Bob", dec(200), None)
            .unwrap();

        let entry = engine.transfer("A1", "A2", dec(150)).unwrap();
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.description(), "Fund transfer successful");

        // conservation: the pair's total is unchanged
        assert_eq!(engine.balance("A1").unwrap(), dec(350));
        assert_eq!(engine.balance("A2").unwrap(), dec(350));
        assert_eq!(
            engine.balance("A1").unwrap() + engine.balance("A2").unwrap(),
            dec(700)
        );
    }

    #[test]
    fn transfer_to_missing_destination_leaves_source_untouched() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(500), None)
            .unwrap();
        let err = engine.transfer("A1", "A2", dec(100)).unwrap_err();
        match err {
            EngineError::AccountNotFound { account_number } => assert_eq!(account_number, "A2"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.balance("A1").unwrap(), dec(500));

        let history = engine.history("A1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), EntryStatus::Failed);
        assert_eq!(history[0].source_account(), "A1");
        assert_eq!(history[0].destination_account(), "A2");
    }

    #[test]
    fn transfer_from_missing_source_reports_the_source() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A2", "Bob", dec(0), None)
            .unwrap();
        let err = engine.transfer("A1", "A2", dec(100)).unwrap_err();
        match err {
            EngineError::AccountNotFound { account_number } => assert_eq!(account_number, "A1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transfer_with_insufficient_funds_never_touches_destination() {
        let engine = engine();
        savings_with_floor(&engine, "SAV", 1200, 1000);
        engine
            .create_account(AccountKind::current(), "CHK", "Bob", dec(50), None)
            .unwrap();
        let err = engine.transfer("SAV", "CHK", dec(600)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Account(AccountError::InsufficientFunds { .. })
        ));
        assert_eq!(engine.balance("SAV").unwrap(), dec(1200));
        assert_eq!(engine.balance("CHK").unwrap(), dec(50));
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(500), None)
            .unwrap();
        let err = engine.transfer("A1", "A1", dec(100)).unwrap_err();
        assert!(matches!(err, EngineError::SameAccount));
        assert_eq!(engine.balance("A1").unwrap(), dec(500));
        assert_eq!(engine.history("A1")[0].status(), EntryStatus::Failed);
    }

    #[test]
    fn every_invocation_ends_terminal() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();
        let _ = engine.deposit("A1", dec(10));
        let _ = engine.deposit("A1", dec(0));
        let _ = engine.withdraw("A1", dec(5));
        let _ = engine.transfer("A1", "MISSING", dec(1));

        let history = engine.history("A1");
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|e| e.status().is_terminal()));
    }

    #[test]
    fn history_is_newest_first() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();
        engine.deposit("A1", dec(1)).unwrap();
        engine.deposit("A1", dec(2)).unwrap();
        engine.deposit("A1", dec(3)).unwrap();

        let amounts: Vec<Decimal> = engine.history("A1").iter().map(|e| e.amount()).collect();
        assert_eq!(amounts, vec![dec(3), dec(2), dec(1)]);
    }

    #[test]
    fn reads_do_not_mutate() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();
        engine.deposit("A1", dec(10)).unwrap();
        let before = engine.history("A1").len();
        let _ = engine.balance("A1").unwrap();
        let _ = engine.account("A1").unwrap();
        let _ = engine.history("A1");
        assert_eq!(engine.balance("A1").unwrap(), dec(110));
        assert_eq!(engine.history("A1").len(), before);
    }

    #[test]
    fn concurrent_withdrawals_cannot_both_commit() {
        let engine = engine();
        savings_with_floor(&engine, "SAV", 1000, 500);

        let results: Vec<Result<LedgerEntry, EngineError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(|| engine.withdraw("SAV", dec(600))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(EngineError::Account(AccountError::InsufficientFunds { .. }))
        )));
        assert_eq!(engine.balance("SAV").unwrap(), dec(400));

        let history = engine.history("SAV");
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.iter().filter(|e| e.status() == EntryStatus::Success).count(),
            1
        );
        assert_eq!(
            history.iter().filter(|e| e.status() == EntryStatus::Failed).count(),
            1
        );
    }

    #[test]
    fn lock_timeout_surfaces_as_busy_and_is_ledgered() {
        let accounts = InMemoryAccountStore::with_lock_timeout(Duration::from_millis(20));
        let ledger = InMemoryLedgerStore::default();
        let engine = TransferEngine::new(&accounts, &ledger);
        engine
            .create_account(AccountKind::current(), "A1", "Alice", dec(100), None)
            .unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        std::thread::scope(|s| {
            let accounts = &accounts;
            s.spawn(move || {
                accounts
                    .with_account("A1", |_| {
                        entered_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                    })
                    .unwrap();
            });
            entered_rx.recv().unwrap();
            let err = engine.withdraw("A1", dec(10)).unwrap_err();
            assert!(matches!(err, EngineError::Busy { .. }));
            release_tx.send(()).unwrap();
        });

        // ledgered like any other business failure, balance untouched
        let history = engine.history("A1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), EntryStatus::Failed);
        assert_eq!(
            history[0].description(),
            "Withdrawal failed: operation timed out waiting for account A1"
        );
        assert_eq!(engine.balance("A1").unwrap(), dec(100));
    }

    #[test]
    fn concurrent_transfers_conserve_the_total() {
        let engine = engine();
        engine
            .create_account(AccountKind::current(), "A", "Alice", dec(1_000), None)
            .unwrap();
        engine
            .create_account(AccountKind::current(), "B", "Bob", dec(1_000), None)
            .unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        engine.transfer("A", "B", dec(3)).unwrap();
                        engine.transfer("B", "A", dec(3)).unwrap();
                    }
                });
            }
        });

        assert_eq!(
            engine.balance("A").unwrap() + engine.balance("B").unwrap(),
            dec(2_000)
        );
    }
}
