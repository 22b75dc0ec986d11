//! Optimistic vote protocol: apply locally, send the mutation, then
//! reconcile with the server's answer or roll back.
//!
//! Every optimistic press is tagged with a monotonic sequence number.
//! A response settles its press and every older one; a failure withdraws
//! only its own press. Neither can overwrite a newer press, because the
//! display is recomputed from the confirmed state plus the presses still
//! outstanding.

use std::future::Future;

use parking_lot::Mutex;

use crate::error::Error;
use crate::types::{EntityId, EntityKind};
use crate::vote::{self, VoteAction, VoteState};

/// Vote mutation sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub action: VoteAction,
}

/// Sends vote mutations and returns the server's authoritative state.
pub trait VoteTransport: Send + Sync {
    /// `token` is the bearer credential from the session, if any.
    fn vote(
        &self,
        token: Option<&str>,
        request: &VoteRequest,
    ) -> impl Future<Output = Result<VoteState, Error>> + Send;
}

/// Handle for one optimistic press, returned by [`VoteSlot::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct VoteTicket {
    seq: u64,
    pub request: VoteRequest,
    /// Score change shown when the press was applied.
    pub delta: i64,
}

impl VoteTicket {
    /// Sequence number of the press within its slot.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Vote state of one rendered entity, split into what the server last
/// confirmed and what is currently displayed.
///
/// The displayed state is always the confirmed state with every
/// outstanding press replayed on top, in press order.
#[derive(Debug, Clone)]
pub struct VoteSlot {
    kind: EntityKind,
    confirmed: VoteState,
    confirmed_seq: u64,
    pending: Vec<(u64, VoteAction)>,
    current: VoteState,
    seq: u64,
}

impl VoteSlot {
    /// Seeds a slot from server data when the entity is first rendered.
    #[must_use]
    pub fn new(kind: EntityKind, seed: VoteState) -> Self {
        Self {
            kind,
            confirmed: seed.clone(),
            confirmed_seq: 0,
            pending: Vec::new(),
            current: seed,
            seq: 0,
        }
    }

    /// Kind of entity this slot votes on.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// State to render.
    #[must_use]
    pub fn current(&self) -> &VoteState {
        &self.current
    }

    /// Last state confirmed by the server.
    #[must_use]
    pub fn confirmed(&self) -> &VoteState {
        &self.confirmed
    }

    /// Sum of optimistic deltas not yet confirmed.
    #[must_use]
    pub fn pending_delta(&self) -> i64 {
        self.current.score - self.confirmed.score
    }

    /// Whether any press is still waiting for its response.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Applies `action` optimistically and returns the ticket for the mutation.
    pub fn begin(&mut self, action: VoteAction) -> VoteTicket {
        let transition = vote::apply(&self.current, action);
        self.seq += 1;
        self.pending.push((self.seq, action));
        self.current = transition.state;

        VoteTicket {
            seq: self.seq,
            request: VoteRequest {
                entity_id: self.current.entity_id.clone(),
                kind: self.kind,
                action,
            },
            delta: transition.delta,
        }
    }

    /// Records the server's answer for `ticket`.
    ///
    /// The answer becomes the confirmed baseline unless a newer response
    /// already landed, and it settles every press up to `ticket`. Newer
    /// presses stay replayed on top. Returns whether the display changed.
    pub fn reconcile(&mut self, ticket: &VoteTicket, authoritative: VoteState) -> bool {
        if ticket.seq <= self.confirmed_seq {
            return false;
        }
        self.confirmed = authoritative;
        self.confirmed_seq = ticket.seq;
        self.pending.retain(|(seq, _)| *seq > ticket.seq);
        self.replay()
    }

    /// Withdraws a failed press. Only that press's contribution is undone;
    /// older and newer presses still in flight keep theirs. Returns false
    /// if `ticket` was already settled or superseded by a refresh.
    pub fn rollback(&mut self, ticket: &VoteTicket) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(seq, _)| *seq != ticket.seq);
        if self.pending.len() == before {
            return false;
        }
        self.replay();
        true
    }

    /// Replaces both states with fresh server data (e.g. after a refetch).
    /// Outstanding tickets become stale.
    pub fn refresh(&mut self, authoritative: VoteState) {
        self.seq += 1;
        self.confirmed_seq = self.seq;
        self.pending.clear();
        self.confirmed = authoritative.clone();
        self.current = authoritative;
    }

    fn replay(&mut self) -> bool {
        let next = self
            .pending
            .iter()
            .fold(self.confirmed.clone(), |state, (_, action)| state.after(*action));
        let changed = next != self.current;
        self.current = next;
        changed
    }
}

/// Runs the whole optimistic protocol for one button press.
///
/// The lock is never held across the network call, so further presses on
/// the same slot can proceed while a mutation is in flight. On failure the
/// slot is rolled back and the error is returned; there is no retry.
///
/// # Errors
///
/// Returns whatever error the transport produced.
pub async fn cast_vote<T: VoteTransport>(
    slot: &Mutex<VoteSlot>,
    transport: &T,
    token: Option<&str>,
    action: VoteAction,
) -> Result<VoteState, Error> {
    let ticket = slot.lock().begin(action);

    match transport.vote(token, &ticket.request).await {
        Ok(authoritative) => {
            let mut slot = slot.lock();
            if !slot.reconcile(&ticket, authoritative) {
                tracing::debug!(
                    entity_id = %ticket.request.entity_id,
                    seq = ticket.seq,
                    "Vote response left the display unchanged"
                );
            }
            Ok(slot.current().clone())
        }
        Err(e) => {
            let reverted = slot.lock().rollback(&ticket);
            tracing::warn!(
                error = %e,
                entity_id = %ticket.request.entity_id,
                kind = %ticket.request.kind,
                reverted,
                "Vote mutation failed"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::UserVote;

    fn slot(score: i64, user_vote: UserVote) -> VoteSlot {
        VoteSlot::new(EntityKind::Post, VoteState::new("p1", score, user_vote))
    }

    struct EchoTransport {
        server_score: i64,
    }

    impl VoteTransport for EchoTransport {
        async fn vote(
            &self,
            token: Option<&str>,
            request: &VoteRequest,
        ) -> Result<VoteState, Error> {
            assert_eq!(token, Some("abc"));
            Ok(VoteState::new(
                request.entity_id.clone(),
                self.server_score,
                request.action.direction(),
            ))
        }
    }

    struct FailingTransport;

    impl VoteTransport for FailingTransport {
        async fn vote(&self, _: Option<&str>, _: &VoteRequest) -> Result<VoteState, Error> {
            Err(Error::GraphQl {
                operation: "vote",
                detail: "boom".into(),
            })
        }
    }

    #[test]
    fn begin_applies_optimistically() {
        let mut s = slot(10, UserVote::None);
        let ticket = s.begin(VoteAction::Upvote);

        assert_eq!(ticket.delta, 1);
        assert_eq!(ticket.request.kind, EntityKind::Post);
        assert_eq!(s.current().score, 11);
        assert_eq!(s.confirmed().score, 10);
        assert_eq!(s.pending_delta(), 1);
        assert!(s.in_flight());
    }

    #[test]
    fn reconcile_collapses_to_server_value() {
        let mut s = slot(10, UserVote::None);
        let ticket = s.begin(VoteAction::Upvote);

        assert!(s.reconcile(&ticket, VoteState::new("p1", 15, UserVote::Up)));
        assert_eq!(s.current(), &VoteState::new("p1", 15, UserVote::Up));
        assert_eq!(s.pending_delta(), 0);
        assert!(!s.in_flight());
    }

    #[test]
    fn rollback_restores_pre_optimistic_state() {
        let mut s = slot(10, UserVote::Up);
        let ticket = s.begin(VoteAction::Downvote);
        assert_eq!(s.current().score, 8);

        assert!(s.rollback(&ticket));
        assert_eq!(s.current(), &VoteState::new("p1", 10, UserVote::Up));
    }

    #[test]
    fn newest_failure_keeps_older_press_in_flight() {
        let mut s = slot(10, UserVote::None);
        let up = s.begin(VoteAction::Upvote);
        let down = s.begin(VoteAction::Downvote);
        assert_eq!(s.current(), &VoteState::new("p1", 9, UserVote::Down));

        assert!(s.rollback(&down));
        assert_eq!(s.current(), &VoteState::new("p1", 11, UserVote::Up));
        assert_eq!(s.pending_delta(), 1);
        assert!(s.in_flight());

        s.reconcile(&up, VoteState::new("p1", 11, UserVote::Up));
        assert_eq!(s.current(), &VoteState::new("p1", 11, UserVote::Up));
        assert_eq!(s.confirmed(), &VoteState::new("p1", 11, UserVote::Up));
        assert!(!s.in_flight());
    }

    #[test]
    fn older_failure_replays_newer_press() {
        let mut s = slot(10, UserVote::None);
        let first = s.begin(VoteAction::Upvote);
        let second = s.begin(VoteAction::Upvote);
        assert_eq!(s.current().score, 10);

        // Without the first press the second one casts rather than cancels.
        assert!(s.rollback(&first));
        assert_eq!(s.current(), &VoteState::new("p1", 11, UserVote::Up));
        assert!(!s.rollback(&first));

        assert!(!s.reconcile(&second, VoteState::new("p1", 11, UserVote::Up)));
        assert!(!s.in_flight());
    }

    #[test]
    fn older_response_keeps_newer_press_on_top() {
        let mut s = slot(10, UserVote::None);
        let first = s.begin(VoteAction::Upvote);
        let _second = s.begin(VoteAction::Downvote);
        assert_eq!(s.current(), &VoteState::new("p1", 9, UserVote::Down));

        assert!(!s.reconcile(&first, VoteState::new("p1", 11, UserVote::Up)));
        assert_eq!(s.confirmed().score, 11);
        assert_eq!(s.current(), &VoteState::new("p1", 9, UserVote::Down));
        assert_eq!(s.pending_delta(), -2);
        assert!(s.in_flight());
    }

    #[test]
    fn other_voters_show_up_under_pending_presses() {
        let mut s = slot(10, UserVote::None);
        let first = s.begin(VoteAction::Upvote);
        let _second = s.begin(VoteAction::Upvote);

        assert!(s.reconcile(&first, VoteState::new("p1", 15, UserVote::Up)));
        assert_eq!(s.current(), &VoteState::new("p1", 14, UserVote::None));
    }

    #[test]
    fn out_of_order_responses_keep_newest_baseline() {
        let mut s = slot(10, UserVote::None);
        let first = s.begin(VoteAction::Upvote);
        let second = s.begin(VoteAction::Upvote);

        s.reconcile(&second, VoteState::new("p1", 10, UserVote::None));
        assert!(!s.reconcile(&first, VoteState::new("p1", 11, UserVote::Up)));
        assert_eq!(s.confirmed(), &VoteState::new("p1", 10, UserVote::None));
        assert_eq!(s.current(), &VoteState::new("p1", 10, UserVote::None));
        assert!(!s.in_flight());
    }

    #[test]
    fn refresh_invalidates_outstanding_tickets() {
        let mut s = slot(10, UserVote::None);
        let ticket = s.begin(VoteAction::Upvote);
        s.refresh(VoteState::new("p1", 20, UserVote::Down));

        assert!(!s.rollback(&ticket));
        assert!(!s.reconcile(&ticket, VoteState::new("p1", 11, UserVote::Up)));
        assert_eq!(s.current(), &VoteState::new("p1", 20, UserVote::Down));
    }

    #[tokio::test]
    async fn cast_vote_reconciles_on_success() {
        let s = Mutex::new(slot(10, UserVote::None));
        let result = cast_vote(&s, &EchoTransport { server_score: 12 }, Some("abc"), VoteAction::Upvote)
            .await
            .unwrap();

        assert_eq!(result, VoteState::new("p1", 12, UserVote::Up));
        assert_eq!(s.lock().current(), &result);
    }

    #[tokio::test]
    async fn cast_vote_rolls_back_on_failure() {
        let s = Mutex::new(slot(10, UserVote::Up));
        let err = cast_vote(&s, &FailingTransport, None, VoteAction::Downvote)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::GraphQl { operation: "vote", .. }));
        assert_eq!(s.lock().current(), &VoteState::new("p1", 10, UserVote::Up));
    }
}
