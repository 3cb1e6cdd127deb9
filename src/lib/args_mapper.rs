//! Argument Mapper for makensis invocations
//!
//! Turns base arguments plus [`CompilerOptions`] into an [`InvocationPlan`]:
//! the program to launch, its ordered arguments and the spawn options.
//!
//! Compile invocations get compiler flags appended in a fixed order:
//! -D<KEY>=<VALUE>      one per define, insertion order
//! -X<line>             one per pre-execute line
//! -NOCD -NOCONFIG -PAUSE -WX
//! -INPUTCHARSET <cs> -OUTPUTCHARSET <cs>
//! -PPO -SAFEPPO
//! -V<0-4> -P<0-5>
//!
//! Informational invocations (more than one base argument, or `-CMDHELP`)
//! never get compiler flags.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::options::{CompilerOptions, ShellSetting};

/// Default makensis executable name, resolved through PATH
pub const DEFAULT_EXECUTABLE: &str = "makensis";
/// Launcher used to run makensis on non-Windows hosts
pub const WINE_EXECUTABLE: &str = "wine";

pub const VERSION_FLAG: &str = "-VERSION";
pub const LICENSE_FLAG: &str = "-LICENSE";
pub const HDRINFO_FLAG: &str = "-HDRINFO";
pub const CMDHELP_FLAG: &str = "-CMDHELP";

/// Highest verbosity level makensis accepts
pub const MAX_VERBOSITY: i64 = 4;
/// Highest process priority makensis accepts
pub const MAX_PRIORITY: i64 = 5;

/// Host platform, injected so wine handling can be tested anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Other,
}

impl Platform {
    /// Platform of the running process
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }
}

/// How makensis gets launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// Run makensis directly
    Direct { makensis: String },
    /// Run makensis through wine
    Wine { makensis: String },
}

impl Launcher {
    /// Pick the launcher for the given options and host platform
    pub fn select(options: &CompilerOptions, platform: Platform) -> Self {
        let makensis = options
            .path_to_makensis
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_EXECUTABLE)
            .to_string();

        if options.wine && !platform.is_windows() {
            Launcher::Wine { makensis }
        } else {
            Launcher::Direct { makensis }
        }
    }

    /// Program to spawn
    pub fn program(&self) -> &str {
        match self {
            Launcher::Direct { makensis } => makensis,
            Launcher::Wine { .. } => WINE_EXECUTABLE,
        }
    }

    /// Arguments that precede the makensis arguments
    pub fn leading_args(&self) -> Vec<String> {
        match self {
            Launcher::Direct { .. } => Vec::new(),
            Launcher::Wine { makensis } => vec![makensis.clone()],
        }
    }

    pub fn is_wine(&self) -> bool {
        matches!(self, Launcher::Wine { .. })
    }
}

/// Options applied to the spawned process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Detach from the parent process
    pub detached: bool,
    /// Shell to launch through
    pub shell: Option<ShellSetting>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Interpret known output shapes
    pub json: bool,
}

impl SpawnOptions {
    /// Copy launch controls from compiler options, skipping empty values
    pub fn from_options(options: &CompilerOptions) -> Self {
        Self {
            cwd: options
                .cwd
                .clone()
                .filter(|cwd| !cwd.as_os_str().is_empty()),
            detached: options.detached,
            shell: options.shell.clone().filter(ShellSetting::is_active),
            env: options.env.clone(),
            json: options.json,
        }
    }
}

/// Everything needed to launch one makensis process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    /// Program to spawn (makensis or wine)
    pub program: String,
    /// Ordered arguments
    pub args: Vec<String>,
    /// Spawn options
    pub spawn_options: SpawnOptions,
    /// Whether makensis runs through wine
    pub uses_wine: bool,
}

/// Build the invocation plan for `base_args` and `options`
pub fn map_arguments(
    base_args: &[&str],
    options: &CompilerOptions,
    platform: Platform,
) -> InvocationPlan {
    let launcher = Launcher::select(options, platform);

    let mut args = launcher.leading_args();
    args.extend(base_args.iter().map(|arg| arg.to_string()));

    let mut plan = InvocationPlan {
        program: launcher.program().to_string(),
        args,
        spawn_options: SpawnOptions::from_options(options),
        uses_wine: launcher.is_wine(),
    };

    if is_informational(base_args) {
        return plan;
    }

    plan.args.extend(compiler_flags(options));
    plan
}

/// Whether `base_args` describe a query that takes no compiler flags
pub fn is_informational(base_args: &[&str]) -> bool {
    base_args.len() > 1 || base_args.first() == Some(&CMDHELP_FLAG)
}

/// Compiler flags for `options`, in makensis order
pub fn compiler_flags(options: &CompilerOptions) -> Vec<String> {
    let mut flags = Vec::new();

    for (key, value) in &options.define {
        flags.push(format!("-D{}={}", key, value));
    }

    for line in &options.pre_execute {
        flags.push(format!("-X{}", line));
    }

    if options.no_cd {
        flags.push("-NOCD".to_string());
    }

    if options.no_config {
        flags.push("-NOCONFIG".to_string());
    }

    if options.pause {
        flags.push("-PAUSE".to_string());
    }

    if options.strict {
        flags.push("-WX".to_string());
    }

    if let Some(charset) = non_empty(&options.input_charset) {
        flags.push("-INPUTCHARSET".to_string());
        flags.push(charset.to_string());
    }

    if let Some(charset) = non_empty(&options.output_charset) {
        flags.push("-OUTPUTCHARSET".to_string());
        flags.push(charset.to_string());
    }

    if options.ppo {
        flags.push("-PPO".to_string());
    }

    if options.safe_ppo {
        flags.push("-SAFEPPO".to_string());
    }

    if let Some(level) = options.verbose.filter(|v| (0..=MAX_VERBOSITY).contains(v)) {
        flags.push(format!("-V{}", level));
    }

    if let Some(priority) = options.priority.filter(|p| (0..=MAX_PRIORITY).contains(p)) {
        flags.push(format!("-P{}", priority));
    }

    flags
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
