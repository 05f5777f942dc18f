//! Host-side pieces of the `dotmatrix` binary: the config file and PNG output.

pub mod config;
pub mod screenshot;
