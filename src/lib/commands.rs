//! Command Facade for makensis
//!
//! Named operations that assemble the right leading arguments, map the
//! options and hand the plan to the runner. Every operation comes as a pair:
//! the plain name returns a [`MakensisTask`], the `_sync` name blocks and
//! returns an [`ExecResult`].
//!
//! Informational commands force verbosity 0 on a copy of the caller's options
//! so progress chatter never ends up in the captured output.

use crate::args_mapper::{
    map_arguments, InvocationPlan, Platform, CMDHELP_FLAG, HDRINFO_FLAG, LICENSE_FLAG,
    VERSION_FLAG,
};
use crate::debug::log_debug;
use crate::options::CompilerOptions;
use crate::output_parser::{objectify, OutputKey};
use crate::runner::{ExecResult, MakensisTask, Stdout};

/// Defined symbol holding the NSIS installation directory
pub const NSISDIR_SYMBOL: &str = "NSISDIR";

/// Entry point for makensis operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Makensis {
    platform: Platform,
}

impl Default for Makensis {
    fn default() -> Self {
        Self::new()
    }
}

impl Makensis {
    /// Facade for the host platform
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    /// Facade for an explicit platform
    pub fn with_platform(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Plan for `-CMDHELP [command]`
    pub fn cmd_help_plan(
        &self,
        command: Option<&str>,
        options: &CompilerOptions,
    ) -> InvocationPlan {
        let mut plan = self.informational_plan(CMDHELP_FLAG, options);
        if let Some(command) = command.filter(|c| !c.is_empty()) {
            plan.args.push(command.to_string());
        }
        plan
    }

    /// Plan for `-HDRINFO`
    pub fn hdr_info_plan(&self, options: &CompilerOptions) -> InvocationPlan {
        self.informational_plan(HDRINFO_FLAG, options)
    }

    /// Plan for `-LICENSE`
    pub fn license_plan(&self, options: &CompilerOptions) -> InvocationPlan {
        self.informational_plan(LICENSE_FLAG, options)
    }

    /// Plan for `-VERSION`
    pub fn version_plan(&self, options: &CompilerOptions) -> InvocationPlan {
        self.informational_plan(VERSION_FLAG, options)
    }

    /// Plan for compiling `script`.
    ///
    /// The script path goes last, behind `--` under wine; post-execute lines
    /// follow it.
    pub fn compile_plan(&self, script: Option<&str>, options: &CompilerOptions) -> InvocationPlan {
        let mut plan = map_arguments(&[], options, self.platform);

        if let Some(script) = script.filter(|s| !s.is_empty()) {
            if plan.uses_wine {
                plan.args.push("--".to_string());
            }
            plan.args.push(script.to_string());
        }

        plan.args
            .extend(options.post_execute.iter().map(|line| format!("-X{}", line)));
        plan
    }

    fn informational_plan(&self, flag: &str, options: &CompilerOptions) -> InvocationPlan {
        map_arguments(&[flag], &options.with_verbose(0), self.platform)
    }

    /// Usage information for a command, or for all commands
    pub fn cmd_help(&self, command: Option<&str>, options: &CompilerOptions) -> MakensisTask {
        self.cmd_help_plan(command, options).spawn()
    }

    /// Usage information for a command, or for all commands
    pub fn cmd_help_sync(&self, command: Option<&str>, options: &CompilerOptions) -> ExecResult {
        self.cmd_help_plan(command, options).run_sync()
    }

    /// Options makensis was built with
    pub fn hdr_info(&self, options: &CompilerOptions) -> MakensisTask {
        self.hdr_info_plan(options).spawn()
    }

    /// Options makensis was built with
    pub fn hdr_info_sync(&self, options: &CompilerOptions) -> ExecResult {
        self.hdr_info_plan(options).run_sync()
    }

    /// makensis software license
    pub fn license(&self, options: &CompilerOptions) -> MakensisTask {
        self.license_plan(options).spawn()
    }

    /// makensis software license
    pub fn license_sync(&self, options: &CompilerOptions) -> ExecResult {
        self.license_plan(options).run_sync()
    }

    /// makensis version
    pub fn version(&self, options: &CompilerOptions) -> MakensisTask {
        self.version_plan(options).spawn()
    }

    /// makensis version
    pub fn version_sync(&self, options: &CompilerOptions) -> ExecResult {
        self.version_plan(options).run_sync()
    }

    /// Compile `script`, or only the `-X` lines when no script is given
    pub fn compile(&self, script: Option<&str>, options: &CompilerOptions) -> MakensisTask {
        self.compile_plan(script, options).spawn()
    }

    /// Compile `script`, or only the `-X` lines when no script is given
    pub fn compile_sync(&self, script: Option<&str>, options: &CompilerOptions) -> ExecResult {
        self.compile_plan(script, options).run_sync()
    }

    /// Directory NSIS is installed to, read from header info
    pub fn nsis_dir(&self, options: &CompilerOptions) -> NsisDirTask {
        NsisDirTask {
            inner: self.hdr_info(&options.with_json(true)),
            json: options.json,
        }
    }

    /// Directory NSIS is installed to, read from header info
    pub fn nsis_dir_sync(&self, options: &CompilerOptions) -> Result<Stdout, ExecResult> {
        let result = self.hdr_info_sync(&options.with_json(true));
        extract_nsis_dir(result, options.json)
    }
}

/// Pending [`Makensis::nsis_dir`] lookup
pub struct NsisDirTask {
    inner: MakensisTask,
    json: bool,
}

impl NsisDirTask {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the header info call and extract `NSISDIR`.
    ///
    /// makensis before 3.03 exits non-zero on `-HDRINFO` but still prints
    /// the symbols, so a failed call is searched too.
    pub fn wait(self) -> Result<Stdout, ExecResult> {
        let result = match self.inner.wait() {
            Ok(result) => result,
            Err(result) => {
                log_debug(
                    "Makensis",
                    &format!(
                        "-HDRINFO exited with status {:?}, reading NSISDIR from partial output",
                        result.status
                    ),
                );
                result
            }
        };
        extract_nsis_dir(result, self.json)
    }
}

/// Pull `NSISDIR` out of a header info result
pub fn extract_nsis_dir(result: ExecResult, json: bool) -> Result<Stdout, ExecResult> {
    let nsis_dir = result
        .stdout
        .structured()
        .and_then(|output| output.defined_symbol(NSISDIR_SYMBOL))
        .map(|value| value.to_string());

    match nsis_dir {
        Some(dir) if json => Ok(Stdout::Structured(objectify(&dir, OutputKey::NsisDir))),
        Some(dir) => Ok(Stdout::Raw(dir)),
        None => Err(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_parser::{parse_header_info, StructuredOutput};

    fn args_of(plan: &InvocationPlan) -> Vec<&str> {
        plan.args.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_version_forces_verbosity_zero() {
        let options = CompilerOptions {
            verbose: Some(3),
            ..Default::default()
        };
        let plan = Makensis::with_platform(Platform::Other).version_plan(&options);
        assert_eq!(args_of(&plan), vec!["-VERSION", "-V0"]);
        assert_eq!(options.verbose, Some(3));
    }

    #[test]
    fn test_license_and_hdrinfo_plans() {
        let makensis = Makensis::with_platform(Platform::Other);
        let options = CompilerOptions::default();
        assert_eq!(
            args_of(&makensis.license_plan(&options)),
            vec!["-LICENSE", "-V0"]
        );
        assert_eq!(
            args_of(&makensis.hdr_info_plan(&options)),
            vec!["-HDRINFO", "-V0"]
        );
    }

    #[test]
    fn test_cmd_help_plan() {
        let makensis = Makensis::with_platform(Platform::Other);
        let options = CompilerOptions {
            strict: true,
            ..Default::default()
        };
        assert_eq!(args_of(&makensis.cmd_help_plan(None, &options)), vec!["-CMDHELP"]);
        assert_eq!(args_of(&makensis.cmd_help_plan(Some(""), &options)), vec!["-CMDHELP"]);
        assert_eq!(
            args_of(&makensis.cmd_help_plan(Some("OutFile"), &options)),
            vec!["-CMDHELP", "OutFile"]
        );
    }

    #[test]
    fn test_compile_plan() {
        let makensis = Makensis::with_platform(Platform::Other);
        let options = CompilerOptions {
            pre_execute: vec!["Unicode true".to_string()],
            post_execute: vec!["!echo done".to_string()],
            strict: true,
            verbose: Some(2),
            ..Default::default()
        };
        let plan = makensis.compile_plan(Some("installer.nsi"), &options);
        assert_eq!(plan.program, "makensis");
        assert_eq!(
            args_of(&plan),
            vec!["-XUnicode true", "-WX", "-V2", "installer.nsi", "-X!echo done"]
        );
    }

    #[test]
    fn test_compile_plan_under_wine() {
        let makensis = Makensis::with_platform(Platform::Other);
        let options = CompilerOptions {
            wine: true,
            ..Default::default()
        };
        let plan = makensis.compile_plan(Some("installer.nsi"), &options);
        assert_eq!(plan.program, "wine");
        assert_eq!(args_of(&plan), vec!["makensis", "--", "installer.nsi"]);

        let plan = Makensis::with_platform(Platform::Windows)
            .compile_plan(Some("installer.nsi"), &options);
        assert_eq!(plan.program, "makensis");
        assert_eq!(args_of(&plan), vec!["installer.nsi"]);
    }

    #[test]
    fn test_compile_plan_without_script() {
        let makensis = Makensis::with_platform(Platform::Other);
        let options = CompilerOptions {
            pre_execute: vec!["OutFile out.exe".to_string()],
            ..Default::default()
        };
        assert_eq!(
            args_of(&makensis.compile_plan(None, &options)),
            vec!["-XOutFile out.exe"]
        );
    }

    fn hdrinfo_result(status: i32, stdout: &str) -> ExecResult {
        ExecResult {
            status: Some(status),
            stdout: Stdout::Structured(StructuredOutput::HeaderInfo(parse_header_info(stdout))),
            stderr: String::new(),
            warnings: None,
        }
    }

    #[test]
    fn test_extract_nsis_dir() {
        let result = hdrinfo_result(0, "Defined symbols: __GLOBAL__,NSISDIR=/usr/share/nsis");
        assert_eq!(
            extract_nsis_dir(result.clone(), false),
            Ok(Stdout::Raw("/usr/share/nsis".to_string()))
        );
        assert_eq!(
            extract_nsis_dir(result, true),
            Ok(Stdout::Structured(StructuredOutput::NsisDir {
                nsisdir: "/usr/share/nsis".to_string()
            }))
        );
    }

    #[test]
    fn test_extract_nsis_dir_from_failed_call() {
        let result = hdrinfo_result(1, "Defined symbols: NSISDIR=C:\\NSIS");
        assert_eq!(
            extract_nsis_dir(result, false),
            Ok(Stdout::Raw("C:\\NSIS".to_string()))
        );
    }

    #[test]
    fn test_extract_nsis_dir_missing() {
        let result = hdrinfo_result(0, "Size of first header is 28 bytes.");
        assert_eq!(extract_nsis_dir(result.clone(), false), Err(result));

        let spawn_failure = ExecResult {
            status: None,
            stderr: "Failed to spawn makensis".to_string(),
            ..Default::default()
        };
        assert_eq!(
            extract_nsis_dir(spawn_failure.clone(), true),
            Err(spawn_failure)
        );
    }
}
