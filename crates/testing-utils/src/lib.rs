//! # Outreach Testing Utils
//!
//! Shared testing utilities for the lead outreach workspace: in-memory
//! implementations of the repository and gateway traits plus builders for
//! test entities. Add as a dev-dependency and pull in what you need:
//!
//! ```toml
//! [dev-dependencies]
//! outreach-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
