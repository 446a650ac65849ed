//! Command-line front end
//!
//! Parsing lives in [`parser`]; each subcommand that does more than print
//! has its own module.

pub mod cleanup;
pub mod parser;
pub mod run;

pub use parser::*;
