//! Data models representing ledger entities and API payloads.

/// Account history query
pub mod account;
/// Balance aggregates
pub mod balance;
/// Gateway invoices awaiting confirmation
pub mod intent;
/// Outbound user notifications
pub mod notification;
/// `payment.process` / `payment.refund` requests and outcomes
pub mod payment;
/// Ledger rows
pub mod transaction;
/// Gateway callback
pub mod webhook;
