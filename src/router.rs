use crate::{
    dedup::DedupIndex,
    types::{AccountId, EventIdentity, ResourceCategory, StreamEvent},
};

/// What the router decided a surviving event warrants.
///
/// Overview updates are rare and low-volume with no natural burst pattern,
/// so they bypass the debounce path; everything else is coalesced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshIntent {
    Immediate(ResourceCategory),
    Debounced(ResourceCategory),
}

impl RefreshIntent {
    pub fn category(&self) -> ResourceCategory {
        match self {
            RefreshIntent::Immediate(category) | RefreshIntent::Debounced(category) => *category,
        }
    }
}

/// Classifies each new event by resource category and account scope, and
/// decides whether it warrants a refresh. Dedup marking is synchronous with
/// the check: the router runs in a single task, so no two deliveries of the
/// same identity can both pass `seen`.
pub struct EventRouter {
    account: AccountId,
    dedup: DedupIndex,
}

impl EventRouter {
    pub fn new(account: AccountId, dedup_cap: usize) -> Self {
        Self {
            account,
            dedup: DedupIndex::new(dedup_cap),
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn dedup_len(&self) -> usize {
        self.dedup.len()
    }

    /// Route one event, in arrival order. Returns `None` for re-deliveries,
    /// events scoped to other accounts and unknown categories.
    pub fn route(&mut self, event: &StreamEvent) -> Option<RefreshIntent> {
        let identity = EventIdentity::of(event);
        if self.dedup.seen(&identity) {
            tracing::debug!(category = %event.category, "dropping re-delivered event");
            return None;
        }
        self.dedup.mark_seen(identity);

        if event.account_id != self.account {
            return None;
        }

        let category = classify(&event.category)?;
        Some(match category {
            ResourceCategory::Overview => RefreshIntent::Immediate(category),
            other => RefreshIntent::Debounced(other),
        })
    }

    /// Reset for a new account context. The dedup window starts empty so
    /// events for the new account are never mistaken for re-deliveries.
    pub fn switch_account(&mut self, account: AccountId) {
        self.account = account;
        self.dedup.clear();
    }
}

fn classify(kind: &str) -> Option<ResourceCategory> {
    match kind {
        "position" => Some(ResourceCategory::Positions),
        "order" | "order_action" => Some(ResourceCategory::Orders),
        "trade" => Some(ResourceCategory::Trades),
        "account_info" | "buying_power" => Some(ResourceCategory::Overview),
        _ => None,
    }
}
