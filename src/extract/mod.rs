pub mod fragment;

pub use fragment::{ExtractError, Fragment, FragmentExtractor};
