pub mod checker;

pub use checker::{ComplianceReport, check_directory};
