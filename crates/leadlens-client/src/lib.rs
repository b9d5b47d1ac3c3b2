pub mod parse;
pub mod profile;
pub mod source;

pub use profile::{MatchFallback, RequestProfile};
pub use source::HttpSource;
