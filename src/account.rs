use rust_decimal::Decimal;
use thiserror::Error;

/// Kind-specific balance policy, fixed when the account is opened.
///
/// The two kinds share identity and balance handling and differ only in the
/// lowest balance a withdrawal may leave behind, see [`Account::floor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Current {
        overdraft_limit: Decimal,
    },
    Savings {
        minimum_balance: Decimal,
        /// Informational only, interest accrual is out of scope.
        interest_rate: Decimal,
    },
}

impl AccountKind {
    /// Current account with the default overdraft limit of 10000.
    pub fn current() -> Self {
        Self::Current {
            overdraft_limit: Decimal::from(10_000),
        }
    }

    /// Savings account with the default minimum balance of 1000
    /// and interest rate of 3.5.
    pub fn savings() -> Self {
        Self::Savings {
            minimum_balance: Decimal::from(1_000),
            interest_rate: Decimal::new(35, 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Current { .. } => "current",
            Self::Savings { .. } => "savings",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("insufficient funds, balance may not drop below {floor}")]
    InsufficientFunds { floor: Decimal },
    #[error("account holder name must be between 1 and 100 characters")]
    InvalidHolderName,
}

/// A single bank account. Balance is mutated only through [`Account::deposit`]
/// and [`Account::withdraw`], which keep the kind-specific floor invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    account_number: String,
    holder_name: String,
    balance: Decimal,
    owner_identity: Option<String>,
    kind: AccountKind,
}

impl Account {
    /// The initial balance is not checked against the floor, enforcement
    /// happens on debit only.
    pub fn new(
        kind: AccountKind,
        account_number: impl Into<String>,
        holder_name: impl Into<String>,
        initial_balance: Decimal,
        owner_identity: Option<String>,
    ) -> Result<Self, AccountError> {
        let holder_name = holder_name.into();
        let len = holder_name.chars().count();
        if len == 0 || len > 100 {
            return Err(AccountError::InvalidHolderName);
        }
        Ok(Self {
            account_number: account_number.into(),
            holder_name,
            balance: initial_balance,
            owner_identity,
            kind,
        })
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn owner_identity(&self) -> Option<&str> {
        self.owner_identity.as_deref()
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Lowest balance a withdrawal may leave: `-overdraft_limit` for current
    /// accounts, `minimum_balance` for savings accounts.
    pub fn floor(&self) -> Decimal {
        match self.kind {
            AccountKind::Current { overdraft_limit } => -overdraft_limit,
            AccountKind::Savings {
                minimum_balance, ..
            } => minimum_balance,
        }
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        self.balance += amount;
        Ok(())
    }

    /// The balance is left untouched on every failing path, so a rejected
    /// withdrawal never needs to be rolled back.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        let projected = self.balance - amount;
        let floor = self.floor();
        if projected < floor {
            return Err(AccountError::InsufficientFunds { floor });
        }
        self.balance = projected;
        Ok(())
    }
}
