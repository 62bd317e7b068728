//! Disperse Git - git backend for the release engine
//!
//! Reading history and tags goes through libgit2; pushing shells out to
//! the `git` command so the operator's credential helpers and SSH agent
//! are used.

mod commits;
mod remote;
mod repository;
mod status;
mod tags;
mod vcs;

pub use repository::{Checkout, GitRepo, Result};
