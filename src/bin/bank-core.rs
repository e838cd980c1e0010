use std::fs::File;

use anyhow::{Context, Result};
use bank_core::bin_utils::{Service, ServiceError};

fn main() -> Result<()> {
    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|line, err| {
            match err {
                ServiceError::MissingColumn(_) => eprintln!("Error at line {line}: {err}"),
                ServiceError::Engine(_) => {
                    // business failures already end up in the ledger as
                    // Failed entries, no need to print them
                }
            }
        }),
    };
    service.run()
}
