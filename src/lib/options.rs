//! Compiler options for makensis invocations
//!
//! Options fall into three groups:
//! 1. Flags passed through to makensis (defines, `-X` lines, strict mode, charsets, ...)
//! 2. Process launch controls (cwd, detached, shell, executable override, wine)
//! 3. Library controls (structured JSON output)
//!
//! Options can be built as a struct literal or loaded from JSON. JSON keys use
//! the camelCase names (`noCD`, `inputCharset`, ...); the older lowercase
//! names (`nocd`, `inputcharset`, ...) are folded into them by
//! [`normalize_aliases`] before deserialization.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Legacy option names and the canonical key each one folds into
pub const OPTION_ALIASES: [(&str, &str); 8] = [
    ("execute", "preExecute"),
    ("nocd", "noCD"),
    ("noconfig", "noConfig"),
    ("wx", "strict"),
    ("inputcharset", "inputCharset"),
    ("outputcharset", "outputCharset"),
    ("PPO", "ppo"),
    ("safeppo", "safePPO"),
];

/// Keys that only take integer values
const INTEGER_KEYS: [&str; 2] = ["verbose", "priority"];

/// Shell used to launch makensis
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ShellSetting {
    /// `true` runs through the platform shell, `false` disables it
    Enabled(bool),
    /// Path or name of a specific shell program
    Program(String),
}

impl ShellSetting {
    /// Whether this setting actually routes the call through a shell
    pub fn is_active(&self) -> bool {
        match self {
            ShellSetting::Enabled(enabled) => *enabled,
            ShellSetting::Program(program) => !program.is_empty(),
        }
    }
}

/// Options for a single makensis call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Symbols passed as `-D<KEY>=<VALUE>`, in insertion order
    #[serde(deserialize_with = "deserialize_define")]
    pub define: Vec<(String, String)>,
    /// Script lines executed before the script (`-X<line>`)
    #[serde(deserialize_with = "deserialize_commands")]
    pub pre_execute: Vec<String>,
    /// Script lines executed after the script (`-X<line>` after the script path)
    #[serde(deserialize_with = "deserialize_commands")]
    pub post_execute: Vec<String>,
    /// Don't change into the script's directory (`-NOCD`)
    #[serde(rename = "noCD")]
    pub no_cd: bool,
    /// Don't load nsisconf.nsh (`-NOCONFIG`)
    pub no_config: bool,
    /// Pause after execution (`-PAUSE`)
    pub pause: bool,
    /// Treat warnings as errors (`-WX`)
    pub strict: bool,
    /// Codepage of the input script (`-INPUTCHARSET`)
    pub input_charset: Option<String>,
    /// Codepage of the compiler output (`-OUTPUTCHARSET`)
    pub output_charset: Option<String>,
    /// Preprocess only (`-PPO`)
    pub ppo: bool,
    /// Preprocess only, without `!execute` and friends (`-SAFEPPO`)
    #[serde(rename = "safePPO")]
    pub safe_ppo: bool,
    /// Verbosity level 0-4 (`-V<n>`)
    pub verbose: Option<i64>,
    /// Process priority 0-5 (`-P<n>`)
    pub priority: Option<i64>,

    /// Working directory of the child process
    pub cwd: Option<PathBuf>,
    /// Detach the child from this process
    pub detached: bool,
    /// Launch through a shell
    pub shell: Option<ShellSetting>,
    /// Extra environment variables for the child process
    pub env: BTreeMap<String, String>,
    /// Custom path to the makensis executable
    pub path_to_makensis: Option<String>,
    /// Run makensis through wine on non-Windows hosts
    pub wine: bool,

    /// Parse known output shapes into structured values
    pub json: bool,
}

impl CompilerOptions {
    /// Load options from a JSON value, folding legacy option names first
    pub fn from_json_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(mut map) => {
                normalize_aliases(&mut map);
                serde_json::from_value(Value::Object(map))
                    .map_err(|e| format!("Invalid makensis options: {}", e))
            }
            other => Err(format!(
                "Makensis options must be a JSON object, got: {}",
                other
            )),
        }
    }

    /// Load options from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse makensis options: {}", e))?;
        Self::from_json_value(value)
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json_str(&content)
    }

    /// Copy of these options with the verbosity level replaced
    pub fn with_verbose(&self, level: i64) -> Self {
        Self {
            verbose: Some(level),
            ..self.clone()
        }
    }

    /// Copy of these options with structured output turned on or off
    pub fn with_json(&self, json: bool) -> Self {
        Self {
            json,
            ..self.clone()
        }
    }

    /// Add a `-D` symbol
    pub fn define(mut self, key: &str, value: &str) -> Self {
        self.define.push((key.to_string(), value.to_string()));
        self
    }
}

/// Fold legacy option names into their canonical keys.
///
/// `null` values are dropped first, as if the key were absent. For boolean
/// options either key being `true` wins; for everything else the canonical
/// value is kept unless it is empty.
pub fn normalize_aliases(map: &mut Map<String, Value>) {
    map.retain(|_, value| !value.is_null());

    for (legacy, canonical) in OPTION_ALIASES {
        let Some(legacy_value) = map.remove(legacy) else {
            continue;
        };

        let merged = match map.remove(canonical) {
            None => legacy_value,
            Some(Value::Bool(current)) => match legacy_value {
                Value::Bool(legacy_flag) => Value::Bool(current || legacy_flag),
                _ => Value::Bool(current),
            },
            Some(current) if is_blank(&current) => legacy_value,
            Some(current) => current,
        };

        map.insert(canonical.to_string(), merged);
    }

    // Integer-only options silently ignore non-integer input
    for key in INTEGER_KEYS {
        if let Some(value) = map.remove(key) {
            if let Some(number) = as_integer(&value) {
                map.insert(key.to_string(), Value::from(number));
            }
        }
    }
}

/// Split a multi-line script into trimmed, non-empty lines
pub fn split_commands(script: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn deserialize_define<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Map::<String, Value>::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandList {
    Script(String),
    Lines(Vec<String>),
}

fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CommandList::deserialize(deserializer)? {
        CommandList::Script(script) => split_commands(&script),
        CommandList::Lines(lines) => lines,
    })
}
