pub mod cir;
pub mod compliance;
pub mod config;
pub mod convert;
pub mod corpus;
pub mod error;
pub mod io;
pub mod mapper;
pub mod oscal;
pub mod packaging;
pub mod report;
pub mod validation;

pub const TOOL_NAME: &str = "oscalize";

/// OSCAL model version stamped into every artifact's metadata.
pub const OSCAL_VERSION: &str = "1.1.3";

