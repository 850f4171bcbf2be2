//! Host-side provisioning of the shared data directory.
//!
//! A run resolves the process identity once, resolves the target path inside
//! the project root, then executes named steps in order:
//!
//! ```text
//! [stop-dependents → prune-resources →] create → set-permissions → set-ownership → verify
//! ```
//!
//! The bracketed cleanup steps only run in [`ProvisionMode::ResetAndProvision`].

pub mod descriptor;
pub mod identity;
pub mod listing;
pub mod provision;

pub use descriptor::DataDirDescriptor;
pub use identity::{Identity, IdentityError};
pub use listing::{DirEntryInfo, DirListing};
pub use provision::{
    ProvisionError, ProvisionMode, ProvisionReport, Provisioner, StepError, StepName, StepOutcome,
    StepRecord,
};
