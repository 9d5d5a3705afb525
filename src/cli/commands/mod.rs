//! One module per subcommand.

pub mod audit_cmd;
pub mod completions;
pub mod edit;
pub mod init;
pub mod launch;
pub mod list;
pub mod remove;
