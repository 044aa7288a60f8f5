pub mod change_handler;

pub use change_handler::{ChangeHandler, HandleOutcome, PanelLayout};
