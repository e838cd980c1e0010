//! This module could be a separate crate on its own, to bootstrap [`bank_core`] within a binary
//! but for simplicity purposes, I include this module directly in the library.

use std::io::{Read, Write};

use anyhow::Result;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::AccountKind,
    engine::{EngineError, TransferEngine},
    store::{
        AccountStore, LedgerStore,
        in_memory::{InMemoryAccountStore, InMemoryLedgerStore},
    },
};
use csv_parser::{CsvOperationParser, KindColumn, Operation, OperationRow};
use csv_printer::{BalanceRow, print_balances};

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("column `{0}` is required for this operation")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub error_printer: Box<dyn FnMut(u64, ServiceError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);

        let engine = TransferEngine::new(
            InMemoryAccountStore::default(),
            InMemoryLedgerStore::default(),
        );

        for (line, row) in parser {
            if let Err(err) = apply_row(&engine, row) {
                (self.error_printer)(line, err);
            }
        }

        let accounts = engine.accounts()?;
        print_balances(
            self.output,
            accounts.into_iter().map(|acc| BalanceRow {
                account: acc.account_number().to_owned(),
                holder: acc.holder_name().to_owned(),
                kind: acc.kind().name(),
                balance: acc.balance(),
            }),
        )
    }
}

fn apply_row<A, L>(engine: &TransferEngine<A, L>, row: OperationRow) -> Result<(), ServiceError>
where
    A: AccountStore,
    L: LedgerStore,
{
    match row.op {
        Operation::Open => {
            let kind = match row.kind.ok_or(ServiceError::MissingColumn("kind"))? {
                KindColumn::Current => AccountKind::current(),
                KindColumn::Savings => AccountKind::savings(),
            };
            let holder = row.holder.ok_or(ServiceError::MissingColumn("holder"))?;
            let balance = row.amount.unwrap_or(Decimal::ZERO);
            engine.create_account(kind, row.account, holder, balance, None)?;
        }
        Operation::Deposit => {
            let amount = row.amount.ok_or(ServiceError::MissingColumn("amount"))?;
            engine.deposit(&row.account, amount)?;
        }
        Operation::Withdraw => {
            let amount = row.amount.ok_or(ServiceError::MissingColumn("amount"))?;
            engine.withdraw(&row.account, amount)?;
        }
        Operation::Transfer => {
            let to = row.to.ok_or(ServiceError::MissingColumn("to"))?;
            let amount = row.amount.ok_or(ServiceError::MissingColumn("amount"))?;
            engine.transfer(&row.account, &to, amount)?;
        }
    }
    Ok(())
}
