mod mention;
pub mod pipeline;
pub mod sanitize;
pub mod types;
pub mod wire;

pub use types::{Request, RequestAuthor, Response};
