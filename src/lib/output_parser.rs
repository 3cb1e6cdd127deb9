//! Output Interpreter for makensis
//!
//! Converts the text makensis prints for `-VERSION`, `-LICENSE`, `-CMDHELP`
//! and `-HDRINFO` into structured values. Parsing never fails: unknown lines
//! are skipped and missing sections come back empty, since older makensis
//! releases print less than current ones.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::args_mapper::{CMDHELP_FLAG, HDRINFO_FLAG, LICENSE_FLAG, VERSION_FLAG};

/// `Size of <name> is <value><unit>`
const SIZE_LINE_REGEX: &str = r"^Size of (.+?) is (.*)$";
/// Warning summary printed after compilation, e.g. `2 warnings:`
const WARNING_SUMMARY_REGEX: &str = r"(?m)^\s*(\d+) warnings?:";
/// Prefix of the defined symbols line
const DEFINED_SYMBOLS_PREFIX: &str = "Defined symbols:";

/// Value of a defined symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SymbolValue {
    /// Symbol defined without a value
    Flag(bool),
    /// Value made only of decimal digits
    Integer(i64),
    /// Any other value
    Text(String),
}

impl fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolValue::Flag(flag) => write!(f, "{}", flag),
            SymbolValue::Integer(number) => write!(f, "{}", number),
            SymbolValue::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Parsed `-HDRINFO` output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    /// Internal table sizes, keyed by name with spaces replaced by underscores
    pub sizes: BTreeMap<String, String>,
    /// Symbols makensis was built with; empty when the line is missing
    pub defined_symbols: BTreeMap<String, SymbolValue>,
}

/// Structured form of makensis output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StructuredOutput {
    Version { version: String },
    License { license: String },
    Help { help: String },
    NsisDir { nsisdir: String },
    HeaderInfo(HeaderInfo),
}

impl StructuredOutput {
    /// Look up a defined symbol in header info output
    pub fn defined_symbol(&self, key: &str) -> Option<&SymbolValue> {
        match self {
            StructuredOutput::HeaderInfo(info) => info.defined_symbols.get(key),
            _ => None,
        }
    }
}

/// Key used when wrapping plain text output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    Version,
    License,
    Help,
    NsisDir,
}

/// Wrap text output under `key`. Versions lose their leading `v`.
pub fn objectify(input: &str, key: OutputKey) -> StructuredOutput {
    match key {
        OutputKey::Version => parse_version(input),
        OutputKey::License => StructuredOutput::License {
            license: input.to_string(),
        },
        OutputKey::Help => StructuredOutput::Help {
            help: input.to_string(),
        },
        OutputKey::NsisDir => StructuredOutput::NsisDir {
            nsisdir: input.to_string(),
        },
    }
}

/// Parse `-VERSION` output
pub fn parse_version(input: &str) -> StructuredOutput {
    StructuredOutput::Version {
        version: input.strip_prefix('v').unwrap_or(input).to_string(),
    }
}

/// Parse `-HDRINFO` output
pub fn parse_header_info(input: &str) -> HeaderInfo {
    let size_re = Regex::new(SIZE_LINE_REGEX).ok();
    let mut info = HeaderInfo::default();

    for line in input.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(symbols) = line.strip_prefix(DEFINED_SYMBOLS_PREFIX) {
            parse_defined_symbols(symbols.trim_start(), &mut info.defined_symbols);
            continue;
        }

        if let Some(caps) = size_re.as_ref().and_then(|re| re.captures(line)) {
            let name = caps[1].replace(' ', "_");
            let mut value = caps[2].to_string();
            // drop the unit character (or full stop)
            value.pop();
            info.sizes.insert(name, value.trim().to_string());
        }
    }

    info
}

fn parse_defined_symbols(line: &str, symbols: &mut BTreeMap<String, SymbolValue>) {
    for entry in line.split(',').filter(|entry| !entry.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) if key != "undefined" => {
                symbols.insert(key.to_string(), parse_symbol_value(value));
            }
            Some((key, _)) => {
                symbols.insert(key.to_string(), SymbolValue::Flag(true));
            }
            None => {
                symbols.insert(entry.to_string(), SymbolValue::Flag(true));
            }
        }
    }
}

/// Values made only of ASCII digits become integers, anything else stays text
pub fn parse_symbol_value(value: &str) -> SymbolValue {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(number) = value.parse::<i64>() {
            return SymbolValue::Integer(number);
        }
    }
    SymbolValue::Text(value.to_string())
}

/// Number of warnings reported in compiler output
pub fn count_warnings(output: &str) -> u32 {
    Regex::new(WARNING_SUMMARY_REGEX)
        .ok()
        .and_then(|re| re.captures(output))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Interpret output of an informational command.
///
/// Returns `None` for anything that is not `-VERSION`, `-LICENSE`,
/// `-HDRINFO` or `-CMDHELP`.
pub fn interpret(command: &str, stdout: &str, stderr: &str) -> Option<StructuredOutput> {
    match command {
        VERSION_FLAG => Some(parse_version(stdout)),
        LICENSE_FLAG => Some(objectify(stdout, OutputKey::License)),
        HDRINFO_FLAG => Some(StructuredOutput::HeaderInfo(parse_header_info(stdout))),
        // Older makensis releases print command help on stderr
        CMDHELP_FLAG if stdout.is_empty() => Some(objectify(stderr, OutputKey::Help)),
        CMDHELP_FLAG => Some(objectify(stdout, OutputKey::Help)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("v3.06.1"),
            StructuredOutput::Version {
                version: "3.06.1".to_string()
            }
        );
        assert_eq!(
            parse_version("3.06.1"),
            StructuredOutput::Version {
                version: "3.06.1".to_string()
            }
        );
    }

    #[test]
    fn test_objectify_keys() {
        assert_eq!(
            serde_json::to_value(objectify("GPL", OutputKey::License)).unwrap(),
            json!({ "license": "GPL" })
        );
        assert_eq!(
            serde_json::to_value(objectify("OutFile file", OutputKey::Help)).unwrap(),
            json!({ "help": "OutFile file" })
        );
        assert_eq!(
            serde_json::to_value(objectify("/usr/share/nsis", OutputKey::NsisDir)).unwrap(),
            json!({ "nsisdir": "/usr/share/nsis" })
        );
    }

    #[test]
    fn test_parse_header_info_basic() {
        let input =
            "Size of Header is 1024B\nDefined symbols: __GLOBAL__,NSISDIR=C:\\Program Files\\NSIS";
        let info = parse_header_info(input);

        assert_eq!(info.sizes.get("Header").map(String::as_str), Some("1024"));
        assert_eq!(
            info.defined_symbols.get("__GLOBAL__"),
            Some(&SymbolValue::Flag(true))
        );
        assert_eq!(
            info.defined_symbols.get("NSISDIR"),
            Some(&SymbolValue::Text("C:\\Program Files\\NSIS".to_string()))
        );
        assert_eq!(
            serde_json::to_value(StructuredOutput::HeaderInfo(info)).unwrap(),
            json!({
                "sizes": { "Header": "1024" },
                "defined_symbols": {
                    "NSISDIR": "C:\\Program Files\\NSIS",
                    "__GLOBAL__": true
                }
            })
        );
    }

    #[test]
    fn test_parse_header_info_real_output() {
        let input = "Size of first header is 28 bytes.\r\n\
                     Size of main header is 276 bytes.\r\n\
                     \r\n\
                     Defined symbols: __GLOBAL__,NSIS_CONFIG_LOG,NSIS_MAX_STRLEN=1024,NSIS_COMPRESS_BZIP2_LEVEL=9,NSISDIR=/usr/share/nsis\r\n";
        let info = parse_header_info(input);

        assert_eq!(
            info.sizes.get("first_header").map(String::as_str),
            Some("28 bytes")
        );
        assert_eq!(
            info.sizes.get("main_header").map(String::as_str),
            Some("276 bytes")
        );
        assert_eq!(
            info.defined_symbols.get("NSIS_MAX_STRLEN"),
            Some(&SymbolValue::Integer(1024))
        );
        assert_eq!(
            info.defined_symbols.get("NSIS_COMPRESS_BZIP2_LEVEL"),
            Some(&SymbolValue::Integer(9))
        );
        assert_eq!(
            info.defined_symbols.get("NSISDIR"),
            Some(&SymbolValue::Text("/usr/share/nsis".to_string()))
        );
    }

    #[test]
    fn test_missing_symbols_line_gives_empty_map() {
        let info = parse_header_info("Size of each page is 64 bytes.\n");
        assert_eq!(info.sizes.len(), 1);
        assert!(info.defined_symbols.is_empty());

        let info = parse_header_info("");
        assert!(info.sizes.is_empty());
        assert!(info.defined_symbols.is_empty());
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        let info = parse_header_info("MakeNSIS v3.08 - Copyright\nSomething else: 12\n");
        assert_eq!(info, HeaderInfo::default());
    }

    #[test]
    fn test_undefined_key_is_a_flag() {
        let info = parse_header_info("Defined symbols: undefined=5,A=x=y,,B");
        assert_eq!(
            info.defined_symbols.get("undefined"),
            Some(&SymbolValue::Flag(true))
        );
        assert_eq!(
            info.defined_symbols.get("A"),
            Some(&SymbolValue::Text("x=y".to_string()))
        );
        assert_eq!(info.defined_symbols.get("B"), Some(&SymbolValue::Flag(true)));
        assert_eq!(info.defined_symbols.len(), 3);
    }

    #[test]
    fn test_parse_symbol_value() {
        assert_eq!(parse_symbol_value("1025"), SymbolValue::Integer(1025));
        assert_eq!(parse_symbol_value("0"), SymbolValue::Integer(0));
        assert_eq!(parse_symbol_value(""), SymbolValue::Text(String::new()));
        assert_eq!(parse_symbol_value("0x10"), SymbolValue::Text("0x10".to_string()));
        assert_eq!(parse_symbol_value("-3"), SymbolValue::Text("-3".to_string()));
        assert_eq!(
            parse_symbol_value("99999999999999999999"),
            SymbolValue::Text("99999999999999999999".to_string())
        );
    }

    #[test]
    fn test_symbol_value_display() {
        assert_eq!(SymbolValue::Integer(7).to_string(), "7");
        assert_eq!(SymbolValue::Flag(true).to_string(), "true");
        assert_eq!(SymbolValue::Text("C:\\NSIS".to_string()).to_string(), "C:\\NSIS");
    }

    #[test]
    fn test_count_warnings() {
        assert_eq!(count_warnings("Output: \"out.exe\"\n\n1 warning:\n  !warning: x"), 1);
        assert_eq!(count_warnings("3 warnings:\n  a\n  b\n  c"), 3);
        assert_eq!(count_warnings("Total size: 42 bytes"), 0);
    }

    #[test]
    fn test_interpret() {
        assert_eq!(
            interpret("-VERSION", "v3.08", ""),
            Some(StructuredOutput::Version {
                version: "3.08".to_string()
            })
        );
        assert_eq!(
            interpret("-CMDHELP", "", "OutFile [/NOUNLOAD] output"),
            Some(StructuredOutput::Help {
                help: "OutFile [/NOUNLOAD] output".to_string()
            })
        );
        assert_eq!(interpret("-DFOO=1", "out", ""), None);
    }

    #[test]
    fn test_defined_symbol_lookup() {
        let info = parse_header_info("Defined symbols: NSISDIR=/opt/nsis");
        let output = StructuredOutput::HeaderInfo(info);
        assert_eq!(
            output.defined_symbol("NSISDIR"),
            Some(&SymbolValue::Text("/opt/nsis".to_string()))
        );
        assert_eq!(parse_version("v1").defined_symbol("NSISDIR"), None);
    }
}
