//! Write-once decision slot.

use std::sync::OnceLock;

use tokio::sync::Notify;

use super::Decision;

/// Holds the single terminal decision of a pending confirmation.
///
/// The first call to [`try_resolve`](Self::try_resolve) wins. Every later
/// call returns `false` and changes nothing, so two listeners that fire at
/// the same instant can never both act.
#[derive(Debug, Default)]
pub struct DecisionSlot {
    decision: OnceLock<Decision>,
    notify: Notify,
}

impl DecisionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `decision` if the slot is empty. Returns whether this call won.
    pub fn try_resolve(&self, decision: Decision) -> bool {
        let won = self.decision.set(decision).is_ok();
        if won {
            self.notify.notify_waiters();
        }
        won
    }

    /// Store `decision` if empty, then return whichever decision is final.
    pub fn settle(&self, decision: Decision) -> Decision {
        self.try_resolve(decision);
        self.get().unwrap_or(decision)
    }

    pub fn get(&self) -> Option<Decision> {
        self.decision.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.decision.get().is_some()
    }

    /// Wait until the slot holds a decision.
    pub async fn wait(&self) -> Decision {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a resolve between the check and
            // the await is not lost.
            notified.as_mut().enable();
            if let Some(decision) = self.get() {
                return decision;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::confirm::{DecisionSource, Verdict};

    #[test]
    fn first_writer_wins() {
        let slot = DecisionSlot::new();
        assert!(slot.try_resolve(Decision::by(Verdict::Confirmed, DecisionSource::Reaction, 7)));
        assert!(!slot.try_resolve(Decision::by(Verdict::Denied, DecisionSource::Reply, 7)));
        assert!(!slot.try_resolve(Decision::timed_out()));

        let decision = slot.get().unwrap();
        assert_eq!(decision.verdict, Verdict::Confirmed);
        assert_eq!(decision.source, DecisionSource::Reaction);
    }

    #[test]
    fn settle_returns_existing_decision() {
        let slot = DecisionSlot::new();
        slot.try_resolve(Decision::superseded());
        assert_eq!(slot.settle(Decision::timed_out()), Decision::superseded());
    }

    #[tokio::test]
    async fn wait_wakes_on_resolve() {
        let slot = Arc::new(DecisionSlot::new());
        let waiter = tokio::spawn({
            let slot = Arc::clone(&slot);
            async move { slot.wait().await }
        });
        tokio::task::yield_now().await;
        slot.try_resolve(Decision::by(Verdict::Denied, DecisionSource::Reply, 1));
        assert_eq!(waiter.await.unwrap().verdict, Verdict::Denied);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_resolved() {
        let slot = DecisionSlot::new();
        slot.try_resolve(Decision::timed_out());
        assert_eq!(slot.wait().await.verdict, Verdict::TimedOut);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolvers_produce_one_winner() {
        for _ in 0..50 {
            let slot = Arc::new(DecisionSlot::new());
            let mut handles = Vec::new();
            for i in 0..8u64 {
                let slot = Arc::clone(&slot);
                handles.push(tokio::spawn(async move {
                    let verdict = if i % 2 == 0 { Verdict::Confirmed } else { Verdict::Denied };
                    slot.try_resolve(Decision::by(verdict, DecisionSource::Reaction, i))
                }));
            }
            let mut winners = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    winners += 1;
                }
            }
            assert_eq!(winners, 1);
            assert!(slot.is_resolved());
        }
    }
}
