//! Checker configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CheckError, Context, ImportError, PackageId, TypeError, World};

/// Plain-data options; deserializable from a manifest or test fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Language version gate, e.g. `"go1.18"`; `None` accepts every feature
    pub go_version: Option<String>,
    /// Treat `import "C"` as a fake package instead of importing it
    pub fake_import_c: bool,
    pub go115_uses_cgo: bool,
    pub disable_unused_import_check: bool,
    /// Documentation link appended to the first line of each message;
    /// `{code}` is replaced by the numeric error code
    pub error_url: Option<String>,
}

/// Resolves import paths to packages already checked into the same world.
pub trait Importer {
    fn import(&mut self, world: &mut World, path: &str) -> Result<PackageId, ImportError>;
}

/// Checker configuration.
///
/// Without an `error` sink checking stops at the first error; with a sink,
/// every error is delivered to it and checking runs to completion.
#[derive(Default)]
pub struct Config {
    pub options: Options,
    pub error: Option<Box<dyn FnMut(&TypeError)>>,
    pub importer: Option<Box<dyn Importer>>,
    pub context: Option<Context>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("options", &self.options)
            .field("error", &self.error.is_some())
            .field("importer", &self.importer.is_some())
            .field("context", &self.context)
            .finish()
    }
}

impl Config {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_error_sink(mut self, sink: impl FnMut(&TypeError) + 'static) -> Self {
        self.error = Some(Box::new(sink));
        self
    }

    pub fn with_importer(mut self, importer: impl Importer + 'static) -> Self {
        self.importer = Some(Box::new(importer));
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn version(&self) -> Result<GoVersion, CheckError> {
        match &self.options.go_version {
            None => Ok(GoVersion::LATEST),
            Some(v) => v.parse(),
        }
    }
}

/// A `goMAJOR.MINOR` language version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoVersion {
    pub major: u32,
    pub minor: u32,
}

impl GoVersion {
    pub const GO1_9: GoVersion = GoVersion { major: 1, minor: 9 };
    pub const GO1_17: GoVersion = GoVersion { major: 1, minor: 17 };
    pub const GO1_18: GoVersion = GoVersion { major: 1, minor: 18 };
    pub const GO1_20: GoVersion = GoVersion { major: 1, minor: 20 };
    pub const LATEST: GoVersion = GoVersion { major: 1, minor: 22 };
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "go{}.{}", self.major, self.minor)
    }
}

impl FromStr for GoVersion {
    type Err = CheckError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let bad = || CheckError::BadVersion(input.to_string());
        let rest = input.trim().strip_prefix("go").ok_or_else(bad)?;
        let mut parts = rest.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| bad())?,
            None => 0,
        };
        // a patch release does not change the language
        if let Some(patch) = parts.next() {
            patch.parse::<u32>().map_err(|_| bad())?;
        }
        Ok(GoVersion { major, minor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("go1.18".parse::<GoVersion>().unwrap(), GoVersion::GO1_18);
        assert_eq!("go1.21.3".parse::<GoVersion>().unwrap(), GoVersion { major: 1, minor: 21 });
        assert!("1.18".parse::<GoVersion>().is_err());
        assert!("go1.x".parse::<GoVersion>().is_err());
        assert!(GoVersion::GO1_9 < GoVersion::GO1_18);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: Options = serde_json::from_str(r#"{"go_version": "go1.17", "fake_import_c": true}"#).unwrap();
        assert_eq!(options.go_version.as_deref(), Some("go1.17"));
        assert!(options.fake_import_c);
        assert!(!options.disable_unused_import_check);
        assert_eq!(options.error_url, None);
    }

    #[test]
    fn test_default_version_is_latest() {
        let config = Config::default();
        assert_eq!(config.version().unwrap(), GoVersion::LATEST);
    }
}
