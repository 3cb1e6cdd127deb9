//! Argument Parser for the makensis-run CLI
//!
//! Usage: makensis-run [options] <command> [argument]
//!
//! Commands:
//! version                   Print the makensis version
//! license                   Print the makensis license
//! hdrinfo                   Print header info (sizes and defined symbols)
//! cmdhelp [command]         Print usage for a script command, or all commands
//! nsisdir                   Print the NSIS installation directory
//! compile [script]          Compile a script (or only the -X lines)
//!
//! Options:
//! --json                    Print structured JSON output
//! --wine                    Run makensis through wine
//! --makensis <path>         Path to the makensis executable
//! --cwd <dir>               Working directory for makensis
//! --config <file>           Load options from a JSON file
//! --detached                Detach makensis from this process
//! -D <KEY=VALUE>            Define a symbol (also -DKEY=VALUE)
//! -X <line>                 Execute a script line before the script (also -X<line>)
//! --post-x <line>           Execute a script line after the script
//! --nocd, --noconfig, --pause, --strict, --ppo, --safe-ppo
//! --input-charset <cs>, --output-charset <cs>
//! -V <0-4>                  Verbosity (also -V<n>)
//! -P <0-5>                  Process priority (also -P<n>)

use std::path::PathBuf;

use crate::args_mapper::{MAX_PRIORITY, MAX_VERBOSITY};
use crate::options::CompilerOptions;

/// Valid CLI commands
pub const VALID_COMMANDS: [&str; 6] = [
    "version", "license", "hdrinfo", "cmdhelp", "nsisdir", "compile",
];

/// Command selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Version,
    License,
    HdrInfo,
    CmdHelp(Option<String>),
    NsisDir,
    Compile(Option<String>),
}

/// Result of parsing arguments
#[derive(Debug)]
pub struct ParsedArgs {
    /// Selected command, `None` with --help or --version
    pub command: Option<CliCommand>,
    /// Options for the makensis call
    pub options: CompilerOptions,
    /// Show usage
    pub show_help: bool,
    /// Show the CLI version
    pub show_version: bool,
}

/// Find the value of `--config`, which has to be loaded before other flags apply
pub fn find_config_path(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            return iter.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Parse command line arguments on top of `base` options
pub fn parse_args(args: &[String], base: CompilerOptions) -> Result<ParsedArgs, String> {
    let mut parsed = ParsedArgs {
        command: None,
        options: base,
        show_help: false,
        show_version: false,
    };
    let mut positionals: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];

        if arg == "--help" || arg == "-h" {
            parsed.show_help = true;
            i += 1;
            continue;
        }

        if arg == "--version" || arg == "-v" {
            parsed.show_version = true;
            i += 1;
            continue;
        }

        if arg.starts_with('-') && arg.len() > 1 {
            match parse_option(args, i, &mut parsed.options)? {
                0 => return Err(format!("Unknown option: {}", arg)),
                consumed => i += consumed,
            }
        } else {
            positionals.push(arg.clone());
            i += 1;
        }
    }

    if parsed.show_help || parsed.show_version {
        return Ok(parsed);
    }

    parsed.command = Some(parse_command(&positionals)?);
    validate_options(&parsed.options)?;

    Ok(parsed)
}

fn parse_command(positionals: &[String]) -> Result<CliCommand, String> {
    let Some(name) = positionals.first() else {
        return Err(format!(
            "No command provided. Valid commands are: {}",
            VALID_COMMANDS.join(", ")
        ));
    };
    let argument = positionals.get(1).cloned();

    let takes_argument = name == "cmdhelp" || name == "compile";
    if positionals.len() > 2 || (!takes_argument && argument.is_some()) {
        return Err(format!("Too many arguments for command \"{}\"", name));
    }

    match name.as_str() {
        "version" => Ok(CliCommand::Version),
        "license" => Ok(CliCommand::License),
        "hdrinfo" => Ok(CliCommand::HdrInfo),
        "cmdhelp" => Ok(CliCommand::CmdHelp(argument)),
        "nsisdir" => Ok(CliCommand::NsisDir),
        "compile" => Ok(CliCommand::Compile(argument)),
        other => Err(format!(
            "Invalid command: \"{}\". Valid commands are: {}",
            other,
            VALID_COMMANDS.join(", ")
        )),
    }
}

/// Parse a single option from args array
/// Returns number of arguments consumed (0 if not recognized)
fn parse_option(
    args: &[String],
    index: usize,
    options: &mut CompilerOptions,
) -> Result<usize, String> {
    let arg = args[index].as_str();

    // Boolean switches
    let switch = match arg {
        "--json" => Some(&mut options.json),
        "--wine" => Some(&mut options.wine),
        "--detached" => Some(&mut options.detached),
        "--nocd" => Some(&mut options.no_cd),
        "--noconfig" => Some(&mut options.no_config),
        "--pause" => Some(&mut options.pause),
        "--strict" | "--wx" => Some(&mut options.strict),
        "--ppo" => Some(&mut options.ppo),
        "--safe-ppo" => Some(&mut options.safe_ppo),
        _ => None,
    };
    if let Some(flag) = switch {
        *flag = true;
        return Ok(1);
    }

    // --name <value> or --name=<value>
    if let Some((name, value, consumed)) = long_option_value(args, index)? {
        match name {
            "--makensis" => options.path_to_makensis = Some(value),
            "--cwd" => options.cwd = Some(PathBuf::from(value)),
            // Already loaded by the caller
            "--config" => {}
            "--post-x" => options.post_execute.push(value),
            "--input-charset" => options.input_charset = Some(value),
            "--output-charset" => options.output_charset = Some(value),
            _ => return Ok(0),
        }
        return Ok(consumed);
    }

    // Short options with attached or separate value: -DKEY=VALUE, -D KEY=VALUE
    for prefix in ["-D", "-X", "-V", "-P"] {
        let Some(attached) = arg.strip_prefix(prefix) else {
            continue;
        };
        let (value, consumed) = if attached.is_empty() {
            (required_value(args, index)?, 2)
        } else {
            (attached.to_string(), 1)
        };

        match prefix {
            "-D" => {
                let (key, value) = value.split_once('=').unwrap_or((value.as_str(), ""));
                if key.is_empty() {
                    return Err(format!("Option {} requires a symbol name", prefix));
                }
                options.define.push((key.to_string(), value.to_string()));
            }
            "-X" => options.pre_execute.push(value),
            "-V" => options.verbose = Some(parse_level(&value, "verbosity")?),
            _ => options.priority = Some(parse_level(&value, "priority")?),
        }
        return Ok(consumed);
    }

    // Not a recognized option
    Ok(0)
}

const VALUE_OPTIONS: [&str; 6] = [
    "--makensis",
    "--cwd",
    "--config",
    "--post-x",
    "--input-charset",
    "--output-charset",
];

/// Split `--name value` / `--name=value` for options that take a value
fn long_option_value(
    args: &[String],
    index: usize,
) -> Result<Option<(&'static str, String, usize)>, String> {
    let arg = args[index].as_str();

    for name in VALUE_OPTIONS {
        if arg == name {
            return Ok(Some((name, required_value(args, index)?, 2)));
        }
        if let Some(value) = arg
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Ok(Some((name, value.to_string(), 1)));
        }
    }

    Ok(None)
}

fn required_value(args: &[String], index: usize) -> Result<String, String> {
    args.get(index + 1)
        .cloned()
        .ok_or_else(|| format!("Option {} requires a value", args[index]))
}

fn parse_level(value: &str, name: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|_| format!("Invalid {} level: \"{}\"", name, value))
}

/// Validate parsed options
pub fn validate_options(options: &CompilerOptions) -> Result<(), String> {
    if let Some(level) = options.verbose {
        if !(0..=MAX_VERBOSITY).contains(&level) {
            return Err(format!(
                "Verbosity must be between 0 and {}, got {}",
                MAX_VERBOSITY, level
            ));
        }
    }

    if let Some(priority) = options.priority {
        if !(0..=MAX_PRIORITY).contains(&priority) {
            return Err(format!(
                "Priority must be between 0 and {}, got {}",
                MAX_PRIORITY, priority
            ));
        }
    }

    if options.ppo && options.safe_ppo {
        return Err("Cannot use both --ppo and --safe-ppo at the same time".to_string());
    }

    Ok(())
}
