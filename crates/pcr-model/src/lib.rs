//! Plain value types shared by the passive-check runner crates.
//!
//! Nothing in here executes or delivers anything; the types only describe
//! what to run ([`CheckSpec`]) and how an execution ended
//! ([`StatusCode`], [`CheckState`]).

mod domain;
pub use domain::*;

mod kind;
pub use kind::ResultType;
