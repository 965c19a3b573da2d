//! Cooperative shutdown for the agent loops.
//!
//! Loops check [`CancellationToken::is_cancelled`] between units of work and
//! await [`CancellationToken::cancelled`] inside `select!` while idle. Clones
//! share one cancellation state, so the signal handler and the agent hold the
//! same token.

pub use tokio_util::sync::CancellationToken;
