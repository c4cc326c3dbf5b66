//! # riftcache-checkout
//!
//! The checkout engine (§4.8, C8) and change detector (§4.9, C9):
//! everything that decides whether a working-tree path still matches
//! a recorded hash, and that materializes the object store back into
//! the working tree when it doesn't.

mod change;
mod checkout;
mod error;

pub use change::{changed, current_hash};
pub use checkout::{
    AlwaysConfirm, CheckoutCtx, CheckoutReport, ConfirmRemove, NeverConfirm, Output, Status,
    checkout_outputs,
};
pub use error::{CheckoutError, Result};
