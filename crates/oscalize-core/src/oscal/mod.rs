pub mod artifact;
pub mod model;
pub mod props;

pub use artifact::ArtifactKind;
