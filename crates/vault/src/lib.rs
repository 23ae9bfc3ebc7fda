//! Round-based custodial options vault.
//!
//! Pools depositor capital, locks it per round, and delegates trade
//! decisions to a delta/vol/expiry-gated strategy engine trading against an
//! injected options venue. Every public operation is atomic: it either
//! commits in full or leaves all balances, shares and positions unchanged.

pub mod accounting;
pub mod rounds;
pub mod service;

pub use rounds::{RoundClose, Vault};
pub use service::VaultService;
