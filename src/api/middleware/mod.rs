//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth: bearer token to account, rejects inactive accounts
//! 2. Authorize: per-route operation check against the account's role
//! 3. Audit logger: records method, path, status and the account

pub mod audit;
pub mod auth;
pub mod authorize;
