use crate::errors::{IntakeError, IntakeResult};
use crate::intake::pipeline::IntakePolicy;
use crate::intake::policy::{DowngradeList, ValidationMode};
use crate::intake::taxonomy::ErrorCode;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub default_mode: ValidationMode,
    /// SEMANTIC codes lenient mode may downgrade to warnings. Empty unless
    /// an operator sets LENIENT_DOWNGRADE_CODES explicitly.
    pub lenient_downgrade_codes: Vec<ErrorCode>,
}

impl AppConfig {
    pub fn from_env() -> IntakeResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| IntakeError::Config(format!("SERVER_PORT: {e}")))?;

        let data_dir = PathBuf::from(env_var_or("DATA_DIR", "data"));

        let mode_str = env_var_or("VALIDATION_MODE", "strict");
        let default_mode = ValidationMode::parse(&mode_str)
            .ok_or_else(|| IntakeError::Config(format!("VALIDATION_MODE: unknown mode {mode_str:?}")))?;

        let lenient_downgrade_codes = parse_downgrade_codes(&env_var_or("LENIENT_DOWNGRADE_CODES", ""))?;

        Ok(Self {
            server_port,
            data_dir,
            default_mode,
            lenient_downgrade_codes,
        })
    }

    pub fn intake_policy(&self) -> IntakePolicy {
        IntakePolicy {
            default_mode: self.default_mode,
            downgrades: DowngradeList::new(self.lenient_downgrade_codes.clone()),
        }
    }
}

fn parse_downgrade_codes(raw: &str) -> IntakeResult<Vec<ErrorCode>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ErrorCode::parse(s)
                .ok_or_else(|| IntakeError::Config(format!("LENIENT_DOWNGRADE_CODES: unknown code {s:?}")))
        })
        .collect()
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_downgrade_codes_empty() {
        assert!(parse_downgrade_codes("").unwrap().is_empty());
        assert!(parse_downgrade_codes(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_downgrade_codes_list() {
        let codes = parse_downgrade_codes("OUT_OF_ORDER, ILLEGAL_SEQUENCE").unwrap();
        assert_eq!(codes, vec![ErrorCode::OutOfOrder, ErrorCode::IllegalSequence]);
    }

    #[test]
    fn test_parse_downgrade_codes_rejects_unknown() {
        assert!(parse_downgrade_codes("NOT_A_CODE").is_err());
    }
}
