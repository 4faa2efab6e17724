//! Collaborators used alongside the console.
//!
//! - **ini**: typed INI file values with caller-supplied defaults
//! - **process**: process lookup by executable name
//! - **probe**: HTTPS reachability check

pub mod ini;
pub mod probe;
pub mod process;

pub use ini::{IniError, IniStore};
pub use probe::{HttpsProbe, Method, ProbeError};
pub use process::{Pick, ProcessError, ProcessTable, SystemProcessTable};
