//! Chain reconciliation
//!
//! Decides what a node does with ledger data reported by a peer:
//!
//! 1. Reported tip not ahead of the local tip: nothing to do.
//! 2. A single entry that links onto the local tip and validates: append it
//!    (fast path, no full transfer).
//! 3. A single entry that does not link onto the local tip: the peer's full
//!    ledger is needed to decide.
//! 4. A full ledger: adopt it only if it is valid and strictly longer.
//!
//! Equal-length alternatives are never adopted, so the first ledger a node
//! sees at a given length wins. The function is pure; applying the returned
//! [`Action`] is up to the caller.

use crate::error::Error;
use crate::ledger::Ledger;
use crate::types::Entry;
use crate::validation::validate_successor;
use std::borrow::Cow;

/// Why reconciliation left the local ledger alone.
#[derive(Debug)]
pub enum NoOpReason {
    /// The peer reported no entries
    Empty,
    /// The local ledger is already at or past the reported tip
    NotAhead { local_tip: u64, reported_tip: u64 },
    /// The reported data failed validation
    Invalid(Error),
    /// The reported ledger is valid but not longer than ours
    NotLonger { local_len: usize, reported_len: usize },
}

/// Outcome of reconciling local state with a peer report.
#[derive(Debug)]
pub enum Action {
    /// Keep the local ledger as is
    NoOp(NoOpReason),
    /// The reported tip validly follows the local tip; append it
    Extended(Entry),
    /// Ask the reporting peer for its complete ledger
    NeedFullLedger,
    /// The reported ledger replaces the local one
    Replaced(Ledger),
}

impl Action {
    /// True for any [`Action::NoOp`].
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp(_))
    }
}

/// Reconcile `local` with entries reported by a peer.
///
/// `reported` is either a single tip announcement or a peer's full ledger;
/// the two are told apart by length alone. Entries may arrive in any order.
pub fn reconcile(local: &Ledger, reported: &[Entry]) -> Action {
    let received = sorted_by_index(reported);

    let Some(reported_tip) = received.last() else {
        return Action::NoOp(NoOpReason::Empty);
    };

    let local_tip = local.tip();
    if reported_tip.index <= local_tip.index {
        return Action::NoOp(NoOpReason::NotAhead {
            local_tip: local_tip.index,
            reported_tip: reported_tip.index,
        });
    }

    if received.len() == 1 {
        if reported_tip.previous_hash != local_tip.hash {
            return Action::NeedFullLedger;
        }
        return match validate_successor(reported_tip, local_tip) {
            Ok(()) => Action::Extended(reported_tip.clone()),
            Err(err) => Action::NoOp(NoOpReason::Invalid(err)),
        };
    }

    match Ledger::from_entries(received.into_owned()) {
        Err(err) => Action::NoOp(NoOpReason::Invalid(err)),
        Ok(candidate) if candidate.len() > local.len() => Action::Replaced(candidate),
        Ok(candidate) => Action::NoOp(NoOpReason::NotLonger {
            local_len: local.len(),
            reported_len: candidate.len(),
        }),
    }
}

fn sorted_by_index(entries: &[Entry]) -> Cow<'_, [Entry]> {
    if entries.windows(2).all(|pair| pair[0].index <= pair[1].index) {
        return Cow::Borrowed(entries);
    }
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|entry| entry.index);
    Cow::Owned(sorted)
}
