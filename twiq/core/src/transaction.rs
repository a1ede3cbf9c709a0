//! Transactions: ordered groups of transfers with one completion callback

use crate::{Transfer, TwiResult};
use core::fmt;

/// Capability invoked once when a transaction finishes.
///
/// Implemented for every `Fn(TwiResult<()>) + Sync`, so a closure capturing
/// whatever context the caller needs is the usual way to provide one. It may be
/// called from interrupt context.
pub trait Completion: Sync {
    /// Called with `Ok(())` when every transfer succeeded, or with the error
    /// that ended the transaction
    fn complete(&self, result: TwiResult<()>);
}

impl<F> Completion for F
where
    F: Fn(TwiResult<()>) + Sync,
{
    fn complete(&self, result: TwiResult<()>) {
        self(result)
    }
}

/// An ordered, non-empty group of transfers executed back-to-back as a unit.
///
/// The scheduler only borrows a transaction. It must stay alive, unchanged,
/// from `schedule` until its completion has been called, which the `'a`
/// lifetime of the scheduler enforces.
#[derive(Clone, Copy)]
pub struct Transaction<'a> {
    transfers: &'a [Transfer<'a>],
    completion: Option<&'a dyn Completion>,
}

impl<'a> Transaction<'a> {
    /// Create a transaction without a completion callback
    pub const fn new(transfers: &'a [Transfer<'a>]) -> Self {
        Self {
            transfers,
            completion: None,
        }
    }

    /// Attach the callback invoked when the transaction finishes
    pub const fn with_completion(mut self, completion: &'a dyn Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    pub const fn transfers(&self) -> &'a [Transfer<'a>] {
        self.transfers
    }

    pub const fn completion(&self) -> Option<&'a dyn Completion> {
        self.completion
    }

    /// Number of transfers in this transaction
    pub const fn len(&self) -> usize {
        self.transfers.len()
    }

    /// A transaction without transfers cannot be scheduled
    pub const fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("transfers", &self.transfers)
            .field("completion", &self.completion.is_some())
            .finish()
    }
}
