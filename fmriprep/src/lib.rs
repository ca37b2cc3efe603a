mod subcmd_impls;

pub use subcmd_impls::args::Cli;
pub use subcmd_impls::error::CliError;
