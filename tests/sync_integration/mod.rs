//! Inventory synchronization integration tests.

mod failures;
mod helpers;
mod invariant;
