//! makensis-runner library
//!
//! Builds makensis command lines from options, runs makensis synchronously or
//! in the background, and interprets its version, license, help and header
//! info output.

pub mod args_mapper;
pub mod cli_args;
pub mod commands;
pub mod debug;
pub mod options;
pub mod output_parser;
pub mod runner;

// Re-export commonly used items
pub use args_mapper::{
    compiler_flags, is_informational, map_arguments, InvocationPlan, Launcher, Platform,
    SpawnOptions, CMDHELP_FLAG, DEFAULT_EXECUTABLE, HDRINFO_FLAG, LICENSE_FLAG, VERSION_FLAG,
    WINE_EXECUTABLE,
};
pub use cli_args::{find_config_path, parse_args, CliCommand, ParsedArgs, VALID_COMMANDS};
pub use commands::{extract_nsis_dir, Makensis, NsisDirTask, NSISDIR_SYMBOL};
pub use debug::{is_debug, log_debug};
pub use options::{normalize_aliases, split_commands, CompilerOptions, ShellSetting, OPTION_ALIASES};
pub use output_parser::{
    count_warnings, interpret, objectify, parse_header_info, parse_version, HeaderInfo, OutputKey,
    StructuredOutput, SymbolValue,
};
pub use runner::{spawn_makensis, spawn_makensis_sync, ExecResult, MakensisTask, Stdout};
