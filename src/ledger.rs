use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type EntryId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Transfer,
    Deposit,
    Withdrawal,
}

/// `Pending -> {Success, Failed}`, both terminal. An entry never re-enters
/// `Pending` and is never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Success,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Audit record of one attempted money movement.
///
/// Created `Pending` before any balance is touched and finalized to exactly
/// one terminal status before the operation returns, whether it succeeded or
/// not. For a pure deposit or withdrawal, source and destination hold the
/// same account number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    id: EntryId,
    source_account: String,
    destination_account: String,
    amount: Decimal,
    kind: OperationKind,
    timestamp: DateTime<Utc>,
    status: EntryStatus,
    description: String,
}

impl LedgerEntry {
    pub(crate) fn pending(
        id: EntryId,
        source_account: impl Into<String>,
        destination_account: impl Into<String>,
        amount: Decimal,
        kind: OperationKind,
    ) -> Self {
        Self {
            id,
            source_account: source_account.into(),
            destination_account: destination_account.into(),
            amount,
            kind,
            timestamp: Utc::now(),
            status: EntryStatus::Pending,
            description: String::new(),
        }
    }

    /// Transition to a terminal status. Callers must check
    /// [`LedgerEntry::status`] first, a terminal entry never changes again.
    pub(crate) fn mark(&mut self, status: EntryStatus, description: impl Into<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.description = description.into();
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn source_account(&self) -> &str {
        &self.source_account
    }

    pub fn destination_account(&self) -> &str {
        &self.destination_account
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when this entry touches the given account on either side.
    pub fn involves(&self, account_number: &str) -> bool {
        self.source_account == account_number || self.destination_account == account_number
    }
}
