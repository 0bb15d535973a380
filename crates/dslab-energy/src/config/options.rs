//! Parsing of parameterised config values such as `CostRankedPoolReuse[cost_model=Traditional]`.

use std::collections::BTreeMap;
use std::str::FromStr;

use itertools::Itertools;

use crate::error::ConfigError;

/// Name of a configurable component together with its options.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmParams {
    name: String,
    options: BTreeMap<String, String>,
}

impl AlgorithmParams {
    /// Parses `Name` or `Name[key=value,...]`.
    ///
    /// ```rust
    /// use dslab_energy::config::options::AlgorithmParams;
    ///
    /// let params = AlgorithmParams::parse("CostRankedPoolReuse[cost_model=Traditional]").unwrap();
    /// assert_eq!(params.name(), "CostRankedPoolReuse");
    /// assert_eq!(params.get::<String>("cost_model").unwrap(), "Traditional");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        let (name, options_str) = match s.split_once('[') {
            Some((name, rest)) => match rest.strip_suffix(']') {
                Some(options) => (name, options),
                None => return Err(ConfigError::InvalidOption(s.to_string())),
            },
            None => (s, ""),
        };
        if name.is_empty() {
            return Err(ConfigError::InvalidOption(s.to_string()));
        }
        let mut options = BTreeMap::new();
        for option in options_str.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match option.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    options.insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => return Err(ConfigError::InvalidOption(option.to_string())),
            }
        }
        Ok(Self {
            name: name.trim().to_string(),
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get<T: FromStr>(&self, key: &str) -> Option<T> {
        self.options.get(key).and_then(|s| s.parse().ok())
    }

    /// Returns the parsed option or the default if it is absent. Fails if the option can't be parsed.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.options.get(key) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidOption(format!("{}={}", key, value))),
            None => Ok(default),
        }
    }

    /// Fails on the first option not listed in `allowed`.
    pub fn check_keys(&self, allowed: &[&str]) -> Result<(), ConfigError> {
        match self.options.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(ConfigError::InvalidOption(format!("{} for {}", key, self.name))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for AlgorithmParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.options.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(
                f,
                "{}[{}]",
                self.name,
                self.options.iter().map(|(k, v)| format!("{k}={v}")).join(",")
            )
        }
    }
}
