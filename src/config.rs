//! Configuration management for packroot.
//!
//! Reads configuration from environment variables. `main` loads a `.env`
//! file first, so values there apply unless the environment overrides them.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

use crate::chroot::interpreter::{DependencyLister, Ldd, Readelf, DEFAULT_INTERPRETER};

/// How interpreter dependencies are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyTool {
    #[default]
    Ldd,
    Readelf,
}

impl DependencyTool {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ldd" => Some(Self::Ldd),
            "readelf" => Some(Self::Readelf),
            _ => None,
        }
    }
}

impl fmt::Display for DependencyTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ldd => write!(f, "ldd"),
            Self::Readelf => write!(f, "readelf"),
        }
    }
}

fn unicode_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut map = HashMap::new();
    for (key, value) in vars {
        match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => {
                map.insert(key, value);
            }
            (Ok(key), Err(_)) if key.starts_with("PACKROOT_") => {
                warn!("{} is not valid unicode, ignoring it", key);
            }
            _ => {}
        }
    }
    map
}

/// packroot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interpreter guaranteed inside the root and used by the replay script
    pub interpreter: PathBuf,
    pub dependency_tool: DependencyTool,
    /// Program run for `DependencyTool::Ldd` (default: ldd)
    pub ldd_program: String,
    /// Program run for `DependencyTool::Readelf` (default: readelf)
    pub readelf_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(&HashMap::new())
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Variables that aren't valid unicode are skipped; a skipped
    /// `PACKROOT_` variable is reported and its default applies.
    pub fn load() -> Self {
        Self::from_vars(&unicode_vars(std::env::vars_os()))
    }

    /// Build configuration from a variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let interpreter = get("PACKROOT_INTERPRETER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER));

        let dependency_tool = match get("PACKROOT_DEPENDENCY_TOOL") {
            None => DependencyTool::default(),
            Some(value) => DependencyTool::parse(value).unwrap_or_else(|| {
                warn!(
                    "unknown PACKROOT_DEPENDENCY_TOOL '{}', using {}",
                    value,
                    DependencyTool::default()
                );
                DependencyTool::default()
            }),
        };

        let ldd_program = get("PACKROOT_LDD").unwrap_or("ldd").to_string();
        let readelf_program = get("PACKROOT_READELF").unwrap_or("readelf").to_string();

        Self {
            interpreter,
            dependency_tool,
            ldd_program,
            readelf_program,
        }
    }

    /// Program name of the selected dependency tool.
    pub fn tool_program(&self) -> &str {
        match self.dependency_tool {
            DependencyTool::Ldd => &self.ldd_program,
            DependencyTool::Readelf => &self.readelf_program,
        }
    }

    /// Lister for the selected dependency tool.
    pub fn dependency_lister(&self) -> Box<dyn DependencyLister> {
        match self.dependency_tool {
            DependencyTool::Ldd => Box::new(Ldd::new(&self.ldd_program)),
            DependencyTool::Readelf => Box::new(Readelf::new(&self.readelf_program)),
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  PACKROOT_INTERPRETER: {}", self.interpreter.display());
        println!("  PACKROOT_DEPENDENCY_TOOL: {}", self.dependency_tool);
        println!("  PACKROOT_LDD: {}", self.ldd_program);
        println!("  PACKROOT_READELF: {}", self.readelf_program);
        match which::which(self.tool_program()) {
            Ok(path) => println!("  {}: FOUND ({})", self.dependency_tool, path.display()),
            Err(_) => println!("  {}: NOT FOUND in PATH", self.dependency_tool),
        }
        if self.interpreter.is_file() {
            println!("  Interpreter: FOUND");
        } else {
            println!("  Interpreter: NOT FOUND on this host");
        }
    }
}
