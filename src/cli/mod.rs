//! CLI command handling

pub mod bootstrap;
pub mod check;
pub mod output;
pub mod poll;
pub mod run;

pub use bootstrap::*;
pub use check::*;
pub use output::*;
pub use poll::*;
pub use run::*;
