//! Completion notification

use crate::twi::{Entry, Twi};
use twiq_core::{BusDriver, TwiResult};

impl<'a, D: BusDriver, const SLOTS: usize> Twi<'a, D, SLOTS> {
    /// Report the final `result` of `entry`.
    ///
    /// Called exactly once per transaction, while it is still the current one,
    /// and never inside a critical section, so the callback may schedule more
    /// transactions.
    pub(crate) fn finish(&self, entry: Entry<'a>, result: TwiResult<()>) {
        match entry {
            Entry::External(transaction) => {
                if let Some(completion) = transaction.completion() {
                    completion.complete(result);
                }
            }
            Entry::Internal(_) => self.record_sync_result(result),
        }
    }
}
