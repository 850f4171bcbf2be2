pub mod client;
pub mod docker;
pub mod executor;

pub use client::{AssembleReport, BuildError, CheckResult, DockerClient, DoctorReport};
pub use docker::DockerError;
pub use executor::{DockerExecutor, RealExecutor};
