pub mod model;
pub mod processor;
pub mod validate;

pub use model::{Cir, CirBundle, CirKind};
