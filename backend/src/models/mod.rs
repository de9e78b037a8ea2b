//! Data models for the DevConnect platform.
//!
//! Field names serialize as camelCase; the relational columns stay snake_case.

mod chat;
mod profile;
mod project;
mod session;
mod social;

pub use chat::*;
pub use profile::*;
pub use project::*;
pub use session::*;
pub use social::*;
