pub mod error;
pub mod link;
pub mod merge;
pub mod pipeline;
pub mod source;
