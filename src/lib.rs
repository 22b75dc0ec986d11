#![doc = include_str!("../README.md")]

pub mod error;
#[cfg(feature = "graphql")]
pub mod graphql;
pub mod optimistic;
pub mod session;
pub mod types;
pub mod vote;

// Re-exports for convenient access
pub use error::Error;
#[cfg(feature = "graphql")]
pub use graphql::{AuthPayload, ClientConfig, GraphqlClient, RefreshPayload};
pub use optimistic::{VoteRequest, VoteSlot, VoteTicket, VoteTransport, cast_vote};
pub use session::{
    GuardConfig, NavigationGuard, PlatformStore, Route, Router, Session, SessionManager,
    SessionStatus, TokenStore,
};
pub use types::{EntityId, EntityKind, User, UserId};
pub use vote::{UserVote, VoteAction, VoteState, VoteTransition, apply, format_score};
