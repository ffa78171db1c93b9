//! Parameter database surface
//!
//! A flat key-value store loaded from a properties-style file, with typed
//! getters that name the parameter path in every error. Command-line
//! arguments that are not recognized by an entry point are forwarded here
//! as `key=value` overrides.
//!
//! Only the surface the engine touches is implemented; defaults chaining
//! and accessed-parameter tracking are intentionally absent.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::SetupError;

/// Flat parameter database
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a properties-style file
    ///
    /// Lines are `key = value`; blank lines and lines starting with `#`
    /// are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SetupError::BadParameter {
            path: path.display().to_string(),
            message: format!("could not read parameter file: {e}"),
        })?;
        let mut params = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SetupError::BadParameter {
                    path: format!("{}:{}", path.display(), lineno + 1),
                    message: format!("expected key = value, found {line:?}"),
                });
            };
            params.set(key.trim(), value.trim());
        }
        Ok(params)
    }

    /// Set a parameter, replacing any previous value
    pub fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    /// Apply `key=value` overrides (forwarded command-line arguments)
    ///
    /// Arguments that do not look like `key=value` are ignored.
    pub fn apply_overrides<'a>(&mut self, args: impl IntoIterator<Item = &'a str>) {
        for arg in args {
            if let Some((key, value)) = arg.split_once('=') {
                self.set(key.trim(), value.trim());
            }
        }
    }

    /// True if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Raw string lookup
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Required string lookup
    pub fn require_string(&self, key: &str) -> Result<&str, SetupError> {
        self.get_string(key)
            .ok_or_else(|| SetupError::MissingParameter(key.to_string()))
    }

    fn parse<T: FromStr>(&self, key: &str, value: &str, kind: &str) -> Result<T, SetupError> {
        value.parse().map_err(|_| SetupError::BadParameter {
            path: key.to_string(),
            message: format!("expected {kind}, found {value:?}"),
        })
    }

    /// Integer lookup with a default for absent keys
    pub fn get_int(&self, key: &str, default: i64) -> Result<i64, SetupError> {
        match self.get_string(key) {
            None => Ok(default),
            Some(v) => self.parse(key, v, "an integer"),
        }
    }

    /// Required integer lookup
    pub fn require_int(&self, key: &str) -> Result<i64, SetupError> {
        let v = self.require_string(key)?;
        self.parse(key, v, "an integer")
    }

    /// Float lookup with a default for absent keys
    pub fn get_float(&self, key: &str, default: f64) -> Result<f64, SetupError> {
        match self.get_string(key) {
            None => Ok(default),
            Some(v) => self.parse(key, v, "a number"),
        }
    }

    /// Boolean lookup with a default for absent keys
    ///
    /// Accepts `true`/`false` in any case.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, SetupError> {
        match self.get_string(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(SetupError::BadParameter {
                    path: key.to_string(),
                    message: format!("expected true or false, found {v:?}"),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Parameters {
        let mut p = Parameters::new();
        p.set("eval.master.host", "127.0.0.1");
        p.set("eval.master.port", "9001");
        p.set("eval.compression", "true");
        p.set("es.mu.0", "2");
        p
    }

    #[test]
    fn test_get_string() {
        let p = sample();
        assert_eq!(p.get_string("eval.master.host"), Some("127.0.0.1"));
        assert_eq!(p.get_string("missing"), None);
    }

    #[test]
    fn test_require_string_missing() {
        let p = sample();
        let err = p.require_string("eval.slave-name").unwrap_err();
        assert_eq!(
            err,
            SetupError::MissingParameter("eval.slave-name".to_string())
        );
    }

    #[test]
    fn test_get_int() {
        let p = sample();
        assert_eq!(p.require_int("eval.master.port").unwrap(), 9001);
        assert_eq!(p.get_int("runtime", 0).unwrap(), 0);
    }

    #[test]
    fn test_get_int_bad_value() {
        let mut p = sample();
        p.set("runtime", "soon");
        let err = p.get_int("runtime", 0).unwrap_err();
        assert!(matches!(err, SetupError::BadParameter { path, .. } if path == "runtime"));
    }

    #[test]
    fn test_get_bool() {
        let p = sample();
        assert!(p.get_bool("eval.compression", false).unwrap());
        assert!(!p.get_bool("eval.return-inds", false).unwrap());
    }

    #[test]
    fn test_overrides() {
        let mut p = sample();
        p.apply_overrides(["eval.master.port=9002", "-file", "run-evolve=true"]);
        assert_eq!(p.require_int("eval.master.port").unwrap(), 9002);
        assert!(p.get_bool("run-evolve", false).unwrap());
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join("evolink-params-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("slave.params");
        std::fs::write(&file, "# comment\neval.master.host = localhost\n\nseed = time\n").unwrap();
        let p = Parameters::from_file(&file).unwrap();
        assert_eq!(p.get_string("eval.master.host"), Some("localhost"));
        assert_eq!(p.get_string("seed"), Some("time"));
    }
}
