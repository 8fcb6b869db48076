pub mod bundle;
pub mod manifest;

pub use bundle::{create_bundle, verify_bundle};
pub use manifest::{generate_manifest, verify_manifest};
