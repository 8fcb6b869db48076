pub mod classify;
pub mod discover;
pub mod logs;
pub mod oracle;
pub mod parse;
pub mod pipeline;
pub mod process;

pub use oracle::{OscalCliValidator, Validator};
pub use pipeline::ValidationPipeline;
