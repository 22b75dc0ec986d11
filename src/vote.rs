//! Vote state engine.
//!
//! A single pure transition function governs every votable entity:
//! pressing the same direction again cancels the vote, pressing the
//! opposite direction flips it.
//!
//! | current | action   | next | delta |
//! |---------|----------|------|-------|
//! | None    | Upvote   | Up   | +1    |
//! | Up      | Upvote   | None | -1    |
//! | Down    | Upvote   | Up   | +2    |
//! | None    | Downvote | Down | -1    |
//! | Down    | Downvote | None | +1    |
//! | Up      | Downvote | Down | -2    |

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::EntityId;

/// The current user's own vote on an entity.
///
/// On the wire this is `"up"`, `"down"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum UserVote {
    Up,
    Down,
    #[default]
    None,
}

impl UserVote {
    /// Contribution of this vote to the aggregate score.
    #[must_use]
    pub fn weight(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::None => 0,
        }
    }

    /// Wire form: `"up"`, `"down"`, or `None` for no vote.
    #[must_use]
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::Up => Some("up"),
            Self::Down => Some("down"),
            Self::None => None,
        }
    }
}

impl TryFrom<Option<String>> for UserVote {
    type Error = Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value.as_deref() {
            None | Some("") => Ok(Self::None),
            Some("up") => Ok(Self::Up),
            Some("down") => Ok(Self::Down),
            Some(other) => Err(Error::InvalidUserVote(other.to_owned())),
        }
    }
}

impl From<UserVote> for Option<String> {
    fn from(v: UserVote) -> Self {
        v.as_wire().map(str::to_owned)
    }
}

/// A vote button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteAction {
    #[serde(rename = "up")]
    Upvote,
    #[serde(rename = "down")]
    Downvote,
}

impl VoteAction {
    /// The vote this action casts when it is not cancelling.
    #[must_use]
    pub fn direction(self) -> UserVote {
        match self {
            Self::Upvote => UserVote::Up,
            Self::Downvote => UserVote::Down,
        }
    }

    /// Mutation `voteType` value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "up",
            Self::Downvote => "down",
        }
    }
}

/// Displayed vote state of one rendered entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteState {
    pub entity_id: EntityId,
    pub score: i64,
    pub user_vote: UserVote,
}

impl VoteState {
    /// Snapshot of an entity's score and the viewer's vote.
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>, score: i64, user_vote: UserVote) -> Self {
        Self {
            entity_id: entity_id.into(),
            score,
            user_vote,
        }
    }

    /// Shorthand for [`apply`] that keeps only the next state.
    #[must_use]
    pub fn after(&self, action: VoteAction) -> Self {
        apply(self, action).state
    }
}

/// Result of applying a vote action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTransition {
    pub state: VoteState,
    /// Score change, always one of -2, -1, +1, +2.
    pub delta: i64,
}

/// Computes the next vote state for `action`. Pure and total.
#[must_use]
pub fn apply(current: &VoteState, action: VoteAction) -> VoteTransition {
    let cast = action.direction();
    let next = if current.user_vote == cast {
        UserVote::None
    } else {
        cast
    };
    let delta = next.weight() - current.user_vote.weight();

    VoteTransition {
        state: VoteState {
            entity_id: current.entity_id.clone(),
            score: current.score + delta,
            user_vote: next,
        },
        delta,
    }
}

/// Compact score for vote counters: `999`, `1.2k`, `3.4m`.
///
/// Truncates rather than rounds so `999_999` never displays as `1000.0k`.
#[must_use]
pub fn format_score(score: i64) -> String {
    let sign = if score < 0 { "-" } else { "" };
    let abs = score.unsigned_abs();

    let (tenths, suffix) = match abs {
        0..=999 => return score.to_string(),
        1_000..=999_999 => (abs / 100, "k"),
        _ => (abs / 100_000, "m"),
    };

    let (whole, frac) = (tenths / 10, tenths % 10);
    if frac == 0 {
        format!("{sign}{whole}{suffix}")
    } else {
        format!("{sign}{whole}.{frac}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(score: i64, user_vote: UserVote) -> VoteState {
        VoteState::new("p1", score, user_vote)
    }

    #[test]
    fn full_transition_table() {
        let cases = [
            (UserVote::None, VoteAction::Upvote, UserVote::Up, 1),
            (UserVote::Up, VoteAction::Upvote, UserVote::None, -1),
            (UserVote::Down, VoteAction::Upvote, UserVote::Up, 2),
            (UserVote::None, VoteAction::Downvote, UserVote::Down, -1),
            (UserVote::Down, VoteAction::Downvote, UserVote::None, 1),
            (UserVote::Up, VoteAction::Downvote, UserVote::Down, -2),
        ];

        for (from, action, to, delta) in cases {
            let t = apply(&state(10, from), action);
            assert_eq!(t.state.user_vote, to, "{from:?} + {action:?}");
            assert_eq!(t.delta, delta, "{from:?} + {action:?}");
            assert_eq!(t.state.score, 10 + delta);
            assert_ne!(t.delta, 0);
        }
    }

    #[test]
    fn first_upvote() {
        let t = apply(&state(10, UserVote::None), VoteAction::Upvote);
        assert_eq!(t.state, state(11, UserVote::Up));
    }

    #[test]
    fn repeated_upvote_cancels() {
        let t = apply(&state(11, UserVote::Up), VoteAction::Upvote);
        assert_eq!(t.state, state(10, UserVote::None));
    }

    #[test]
    fn flip_up_to_down() {
        let t = apply(&state(10, UserVote::Up), VoteAction::Downvote);
        assert_eq!(t.state, state(8, UserVote::Down));
        assert_eq!(t.delta, -2);
    }

    #[test]
    fn toggle_twice_nets_zero() {
        for action in [VoteAction::Upvote, VoteAction::Downvote] {
            let start = state(5, UserVote::None);
            let once = apply(&start, action);
            let twice = apply(&once.state, action);
            assert_eq!(twice.state, start);
            assert_eq!(once.delta + twice.delta, 0);
        }
    }

    #[test]
    fn apply_is_pure() {
        let s = state(3, UserVote::Down);
        assert_eq!(apply(&s, VoteAction::Upvote), apply(&s, VoteAction::Upvote));
        assert_eq!(s, state(3, UserVote::Down));
    }

    #[test]
    fn user_vote_wire_format() {
        let up: UserVote = serde_json::from_str("\"up\"").unwrap();
        let none: UserVote = serde_json::from_str("null").unwrap();
        assert_eq!(up, UserVote::Up);
        assert_eq!(none, UserVote::None);
        assert_eq!(serde_json::to_string(&UserVote::Down).unwrap(), "\"down\"");
        assert_eq!(serde_json::to_string(&UserVote::None).unwrap(), "null");
        assert!(serde_json::from_str::<UserVote>("\"sideways\"").is_err());
    }

    #[test]
    fn score_formatting() {
        assert_eq!(format_score(0), "0");
        assert_eq!(format_score(999), "999");
        assert_eq!(format_score(-42), "-42");
        assert_eq!(format_score(1_000), "1k");
        assert_eq!(format_score(1_234), "1.2k");
        assert_eq!(format_score(999_999), "999.9k");
        assert_eq!(format_score(3_400_000), "3.4m");
        assert_eq!(format_score(-2_500), "-2.5k");
    }
}
