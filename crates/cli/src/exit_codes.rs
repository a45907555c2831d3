//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Description                                          |
//! |------|------------------------------------------------------|
//! | 0    | Success (degraded rows are reported, not failures)   |
//! | 2    | CLI usage error (bad args, unknown subcommand)       |
//! | 3    | Invalid config (parse, validation, bad comparison)   |
//! | 4    | Runtime error (unreadable data, totals unavailable)  |

use microagg::AggregatesError;

/// Success - command completed; warnings may still have been printed.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
/// Matches the code clap uses for its own parse failures.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input data could not be read or totals were requested but unavailable.
pub const EXIT_RUNTIME: u8 = 4;

/// Map an engine error to its exit code.
pub fn error_exit_code(err: &AggregatesError) -> u8 {
    match err {
        AggregatesError::ConfigParse(_)
        | AggregatesError::ConfigValidation(_)
        | AggregatesError::InvalidRequest(_)
        | AggregatesError::Configuration { .. } => EXIT_INVALID_CONFIG,
        AggregatesError::DataUnavailable { .. }
        | AggregatesError::NumericDegradation { .. }
        | AggregatesError::Io(_) => EXIT_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_invalid_config() {
        let err = AggregatesError::ConfigValidation("x".into());
        assert_eq!(error_exit_code(&err), EXIT_INVALID_CONFIG);
        let err = AggregatesError::InvalidRequest("x".into());
        assert_eq!(error_exit_code(&err), EXIT_INVALID_CONFIG);
    }

    #[test]
    fn data_errors_are_runtime() {
        assert_eq!(error_exit_code(&AggregatesError::Io("x".into())), EXIT_RUNTIME);
        assert_eq!(error_exit_code(&AggregatesError::unavailable(2013, "x")), EXIT_RUNTIME);
    }
}
