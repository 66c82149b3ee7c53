use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const TPS_ENV_VAR: &str = "FROST_TPS";
pub const SEED_ENV_VAR: &str = "FROST_SEED";
pub const MAX_TICKS_ENV_VAR: &str = "FROST_MAX_TICKS";
pub const SCENARIO_ENV_VAR: &str = "FROST_SCENARIO";
pub const SNAPSHOT_OUT_ENV_VAR: &str = "FROST_SNAPSHOT_OUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },
    #[error("environment variable {var} is not valid unicode")]
    NonUnicodeEnv { var: &'static str },
    #[error("failed to read scenario '{path}': {source}")]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scenario parse error at {path}: {message}")]
    ScenarioParse { path: String, message: String },
    #[error("scenario validation failed at {path}: {message}")]
    ScenarioInvalid { path: String, message: String },
}

/// Values read from the process environment. Absent variables stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub target_tps: Option<u32>,
    pub seed: Option<u64>,
    pub max_ticks: Option<u64>,
    pub scenario_path: Option<PathBuf>,
    pub snapshot_out: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var))
    }

    /// Reads overrides through `lookup`, which behaves like `std::env::var`.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Result<String, env::VarError>,
    ) -> Result<Self, ConfigError> {
        let target_tps = parse_var(&lookup, TPS_ENV_VAR)?;
        if target_tps == Some(0) {
            return Err(ConfigError::InvalidEnv {
                var: TPS_ENV_VAR,
                value: "0".to_string(),
            });
        }
        Ok(Self {
            target_tps,
            seed: parse_var(&lookup, SEED_ENV_VAR)?,
            max_ticks: parse_var(&lookup, MAX_TICKS_ENV_VAR)?,
            scenario_path: read_var(&lookup, SCENARIO_ENV_VAR)?.map(PathBuf::from),
            snapshot_out: read_var(&lookup, SNAPSHOT_OUT_ENV_VAR)?.map(PathBuf::from),
        })
    }
}

fn read_var(
    lookup: &impl Fn(&'static str) -> Result<String, env::VarError>,
    var: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicodeEnv { var }),
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&'static str) -> Result<String, env::VarError>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = read_var(lookup, var)? else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(
        pairs: &[(&'static str, &str)],
    ) -> impl Fn(&'static str) -> Result<String, env::VarError> {
        let values: HashMap<&'static str, String> = pairs
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        move |var| values.get(var).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn absent_variables_leave_defaults() {
        let overrides = EnvOverrides::from_lookup(lookup_from(&[])).expect("overrides");
        assert_eq!(overrides, EnvOverrides::default());
    }

    #[test]
    fn present_variables_are_parsed() {
        let overrides = EnvOverrides::from_lookup(lookup_from(&[
            (TPS_ENV_VAR, "30"),
            (SEED_ENV_VAR, " 42 "),
            (MAX_TICKS_ENV_VAR, "600"),
            (SCENARIO_ENV_VAR, "scenarios/arena.json"),
        ]))
        .expect("overrides");

        assert_eq!(overrides.target_tps, Some(30));
        assert_eq!(overrides.seed, Some(42));
        assert_eq!(overrides.max_ticks, Some(600));
        assert_eq!(
            overrides.scenario_path,
            Some(PathBuf::from("scenarios/arena.json"))
        );
        assert_eq!(overrides.snapshot_out, None);
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let error = EnvOverrides::from_lookup(lookup_from(&[(SEED_ENV_VAR, "forty")]))
            .expect_err("bad seed");
        match error {
            ConfigError::InvalidEnv { var, value } => {
                assert_eq!(var, SEED_ENV_VAR);
                assert_eq!(value, "forty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        assert!(matches!(
            EnvOverrides::from_lookup(lookup_from(&[(TPS_ENV_VAR, "0")])),
            Err(ConfigError::InvalidEnv {
                var: TPS_ENV_VAR,
                ..
            })
        ));
    }
}
