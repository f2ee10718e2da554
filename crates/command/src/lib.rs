//! External command execution for warptray.
//!
//! Everything warptray learns about the VPN comes from running other
//! programs (`warp-cli`, `systemctl`, `ip`). This crate keeps that shell
//! integration in one place:
//! - [`CommandRunner::run`] is awaited inline by the caller and is used for
//!   short, read-only probes.
//! - [`CommandRunner::spawn`] dispatches a state-changing command onto a
//!   worker of capacity 1 and hands back a [`CommandHandle`].
//!
//! Process spawning sits behind the [`Execute`] trait so tests can swap in a
//! scripted executor.

pub mod executor;
pub mod result;
pub mod runner;

pub use executor::{Execute, ProcessExecutor};
pub use result::{CommandResult, Invocation};
pub use runner::{CommandHandle, CommandRunner};
