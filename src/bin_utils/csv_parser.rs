use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Open,
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KindColumn {
    Current,
    Savings,
}

/// One row of the operations file. Which columns are required depends on the
/// operation: `open` needs `kind` and `holder`, `transfer` needs `to`, and
/// everything except `open` needs `amount`.
#[derive(Debug, Deserialize)]
pub struct OperationRow {
    pub op: Operation,
    pub account: String,
    pub to: Option<String>,
    pub kind: Option<KindColumn>,
    pub holder: Option<String>,
    pub amount: Option<Decimal>,
}

/// Parses the operations list in CSV format
///
/// # Panics
///
/// If a row cannot be parsed
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, OperationRow>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, OperationRow);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row.unwrap()))
    }
}
