//! CLI commands

mod completions;
mod discover;
mod info;
mod init;
mod release;
mod validate;
mod verify;

pub use completions::CompletionsCommand;
pub use discover::DiscoverCommand;
pub use info::InfoCommand;
pub use init::InitCommand;
pub use release::ReleaseCommand;
pub use validate::ValidateCommand;
pub use verify::VerifyCommand;
