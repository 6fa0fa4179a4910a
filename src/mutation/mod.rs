//! Mutation issuing: the executor that talks to the backend, the pre-flight
//! validation layer, and the per-operation wording table.

pub mod executor;
pub mod phrases;
pub mod validate;

pub use executor::{ExecutorOptions, MutationExecutor};
pub use phrases::{mutation_phrases, MutationPhrases};
pub use validate::validate_mutation_request;
