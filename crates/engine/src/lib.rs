pub mod actions;
pub mod context;
pub mod plan;
pub mod transcript;
pub mod visual;

pub use actions::{ActionError, ActionKind, EditAction};
pub use context::*;
pub use plan::*;
