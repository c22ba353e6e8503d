//! Business logic services.
//!
//! Services contain the ledger's core logic, separated from HTTP handlers
//! and from storage adapters.

pub mod balance;
pub mod compensation;
pub mod invoice;
pub mod notifier;
pub mod pricing;
pub mod reconciler;
pub mod retry;
pub mod signature;
pub mod workflow;
