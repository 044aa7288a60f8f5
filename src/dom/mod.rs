pub mod document;
pub mod mutation;
pub mod snapshot;

pub use document::{Document, DomError, NodeId};
pub use mutation::{MutationKind, MutationRecord};
pub use snapshot::NodeSnapshot;
