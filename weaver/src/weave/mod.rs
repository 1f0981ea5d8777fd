//! Weave model: what each weave file asks for, and how files map to targets.

pub mod ordered;
pub mod package;
pub mod set;

pub use ordered::DeclMap;
pub use package::{normalize_file_name, PackageWeave};
pub use set::{WeaveSet, UNKNOWN_NAME};
