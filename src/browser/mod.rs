pub mod connection;
pub mod observer;
pub mod patch;
pub mod toast;

pub use connection::connect_to_browser_and_page;
pub use observer::{ChangeDetector, PageState, PropertyChangeObserver};
pub use patch::{BoxPatch, PageBaseline, PatchOp};
pub use toast::show_error_toast;
