pub mod builder;
pub mod parse_batch;
pub mod registry;

pub use builder::{ParagraphBatcher, ParagraphParser};
pub use parse_batch::{AbortHandle, Applied, Paragraph, ParseBatch, Settlement};
pub use registry::{BatchRegistry, RegisterError};
