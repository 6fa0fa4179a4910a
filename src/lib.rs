//! Optimistic mutation reconciliation for remote table data providers.
//!
//! Issues a mutation against a remote collection, immediately computes a
//! locally-predicted next state to show before the network call resolves,
//! reconciles the prediction against the real server response (or rolls it
//! back on failure), and delivers a uniform result/error envelope for every
//! mutation shape.

pub mod backend;
pub mod cache;
pub mod error;
pub mod events;
pub mod mutation;
pub mod optimistic;
pub mod provider;
pub mod query;
pub mod types;

pub use error::{Error, Result};
pub use provider::{Provider, ProviderOptions};
pub use types::{
    MutateResult, MutateStatus, MutationKind, MutationPayload, MutationRequest, ProviderError,
    ResultEnvelope, Row, Rows,
};
