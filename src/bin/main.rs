//! makensis-run CLI
//!
//! Runs makensis through the makensis-runner library:
//! - Informational commands (version, license, hdrinfo, cmdhelp, nsisdir)
//! - Compilation of scripts or inline `-X` lines
//! - Raw or structured JSON output

use std::env;
use std::path::PathBuf;
use std::process;

use makensis_runner::{
    cli_args::{find_config_path, parse_args, CliCommand},
    CompilerOptions, ExecResult, Makensis, Stdout,
};

/// Configuration from environment variables
struct Config {
    /// Default makensis path
    makensis_path: Option<String>,
    /// Run makensis through wine
    wine: bool,
    /// Verbose mode
    verbose: bool,
    /// Options file to load when --config is not given
    config_path: Option<PathBuf>,
}

impl Config {
    fn from_env() -> Self {
        // Default options file: <config dir>/makensis-run/options.json
        let default_config_path = dirs::config_dir()
            .map(|dir| dir.join("makensis-run").join("options.json"))
            .filter(|path| path.exists());

        Self {
            makensis_path: env::var("MAKENSIS_PATH").ok().filter(|p| !p.is_empty()),
            wine: env_bool("MAKENSIS_WINE"),
            verbose: env_bool("MAKENSIS_VERBOSE"),
            config_path: env::var("MAKENSIS_CONFIG")
                .ok()
                .map(PathBuf::from)
                .or(default_config_path),
        }
    }

    /// Load base options from the options file, then apply environment defaults
    fn base_options(&self, args: &[String]) -> Result<CompilerOptions, String> {
        let path = find_config_path(args).or_else(|| self.config_path.clone());

        let mut options = match path {
            Some(path) => {
                if self.verbose {
                    eprintln!("[Config] Loading options from {}", path.display());
                }
                CompilerOptions::from_file(&path)?
            }
            None => CompilerOptions::default(),
        };

        if options.path_to_makensis.is_none() {
            options.path_to_makensis = self.makensis_path.clone();
        }
        options.wine = options.wine || self.wine;

        Ok(options)
    }
}

fn env_bool(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1" || v == "true")
}

fn main() {
    let config = Config::from_env();
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_usage();
        process::exit(0);
    }

    let base = match config.base_options(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let parsed = match parse_args(&args, base) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(1);
        }
    };

    if parsed.show_help {
        print_usage();
        process::exit(0);
    }

    if parsed.show_version {
        println!("makensis-run version: {}", env!("CARGO_PKG_VERSION"));
        process::exit(0);
    }

    let Some(command) = parsed.command else {
        print_usage();
        process::exit(1);
    };

    let options = parsed.options;
    let makensis = Makensis::new();

    if config.verbose {
        eprintln!("[makensis-run] Command: {:?}", command);
        eprintln!("[makensis-run] Platform: {:?}", makensis.platform());
    }

    let result = match command {
        CliCommand::Version => makensis.version_sync(&options),
        CliCommand::License => makensis.license_sync(&options),
        CliCommand::HdrInfo => makensis.hdr_info_sync(&options),
        CliCommand::CmdHelp(name) => makensis.cmd_help_sync(name.as_deref(), &options),
        CliCommand::Compile(script) => {
            if config.verbose {
                let plan = makensis.compile_plan(script.as_deref(), &options);
                eprintln!("[makensis-run] {} {}", plan.program, plan.args.join(" "));
            }
            makensis
                .compile(script.as_deref(), &options)
                .wait()
                .unwrap_or_else(|result| result)
        }
        CliCommand::NsisDir => {
            match makensis.nsis_dir(&options).wait() {
                Ok(dir) => {
                    print_stdout(&dir, options.json);
                    process::exit(0);
                }
                Err(result) => {
                    eprintln!("Error: NSISDIR not found in makensis header info");
                    if !result.stderr.is_empty() {
                        eprintln!("{}", result.stderr);
                    }
                    process::exit(failure_exit_code(result.status));
                }
            }
        }
    };

    print_result(&result, options.json);
    process::exit(result.status.unwrap_or(1));
}

/// Exit code for a failed lookup, never 0 even when makensis itself succeeded
fn failure_exit_code(status: Option<i32>) -> i32 {
    status.filter(|s| *s != 0).unwrap_or(1)
}

/// Print a result: the whole result as JSON, or stdout/stderr as-is
fn print_result(result: &ExecResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(&result.to_json()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: failed to serialize result: {}", e),
        }
        return;
    }

    print_stdout(&result.stdout, false);
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
}

fn print_stdout(stdout: &Stdout, json: bool) {
    match stdout {
        Stdout::Raw(text) if !json => {
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        other => match serde_json::to_string_pretty(other) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: failed to serialize output: {}", e),
        },
    }
}

fn print_usage() {
    println!(
        r#"Usage: makensis-run [options] <command> [argument]

Commands:
  version                 Print the makensis version
  license                 Print the makensis license
  hdrinfo                 Print header info (table sizes and defined symbols)
  cmdhelp [command]       Print usage for a script command, or for all commands
  nsisdir                 Print the NSIS installation directory
  compile [script]        Compile a script (or only the -X lines)

Options:
  --json                  Print structured JSON output
  --wine                  Run makensis through wine (non-Windows hosts)
  --makensis <path>       Path to the makensis executable
  --cwd <dir>             Working directory for makensis
  --config <file>         Load options from a JSON file
  --detached              Detach makensis from this process
  -D <KEY=VALUE>          Define a symbol
  -X <line>               Execute a script line before the script
  --post-x <line>         Execute a script line after the script
  --nocd                  Don't change into the script's directory
  --noconfig              Don't load nsisconf.nsh
  --pause                 Pause after execution
  --strict, --wx          Treat warnings as errors
  --input-charset <cs>    Codepage of the input script
  --output-charset <cs>   Codepage of the output
  --ppo                   Preprocess only
  --safe-ppo              Preprocess only, without executing external commands
  -V <0-4>                Verbosity level
  -P <0-5>                Process priority
  --help, -h              Show this help
  --version, -v           Show version information

Environment:
  MAKENSIS_PATH           Default makensis executable
  MAKENSIS_WINE           Run through wine when set to 1/true
  MAKENSIS_CONFIG         Options file used when --config is not given
  MAKENSIS_VERBOSE        Print what makensis-run does
  MAKENSIS_DEBUG          Print runner diagnostics

Examples:
  makensis-run version --json
  makensis-run cmdhelp OutFile
  makensis-run --strict -D VERSION=1.0 compile installer.nsi
  makensis-run -X "OutFile out.exe" -X "Section" -X "SectionEnd" compile
  makensis-run --wine --makensis "C:\NSIS\makensis.exe" nsisdir"#
    );
}
