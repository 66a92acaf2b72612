//! Test Utilities Crate
//!
//! Provides shared test infrastructure for the payment stage engine test
//! suites.
//!
//! # Modules
//!
//! - `fixtures`: Chart of accounts, journals, stage catalogs and contexts
//! - `builders`: Builders for payments and fully wired scenarios
//! - `assertions`: Assertion helpers for money and ledger entries
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
