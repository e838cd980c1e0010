/// Bank account entity and the kind-specific balance policies
/// (current/overdraft vs savings/minimum-balance).
pub mod account;

/// Immutable audit records of every attempted money movement.
pub mod ledger;

/// Storage traits for accounts and ledger entries, plus "in memory"
/// implementations. This is the integration point to replace with a durable
/// store without touching the engine.
pub mod store;

/// The transfer engine: deposits, withdrawals and transfers over the two
/// stores, with a ledger entry written for every attempt.
pub mod engine;

/// Ideally, this module should exist in its own crate, as a way to
/// bootstrap the engine within a binary. However, I want to use it for
/// integration tests so I put it here.
pub mod bin_utils;
