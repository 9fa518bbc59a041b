//! Secret reference resolver.
//!
//! Credential values in `config.json` can point at secrets kept outside the
//! file:
//!
//! - `pass::path/in/store`: runs `pass show path/in/store`, returns the first line
//! - `env::VAR_NAME`: reads `$VAR_NAME` from the environment
//! - anything else is returned as-is

use thiserror::Error;

const PASS_PREFIX: &str = "pass::";
const ENV_PREFIX: &str = "env::";

/// A secret reference that could not be resolved.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable `{0}` is not set")]
    EnvNotSet(String),

    #[error("failed to run `pass show {path}`: {source}")]
    PassSpawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`pass show {path}` failed ({status}): {stderr}")]
    PassFailed {
        path: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`pass show {0}` produced no output")]
    PassEmpty(String),
}

/// Returns true if `value` uses one of the reference prefixes.
pub fn is_reference(value: &str) -> bool {
    value.starts_with(PASS_PREFIX) || value.starts_with(ENV_PREFIX)
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(path) = value.strip_prefix(PASS_PREFIX) {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix(ENV_PREFIX) {
        std::env::var(var).map_err(|_| SecretError::EnvNotSet(var.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn resolve_pass(path: &str) -> Result<String, SecretError> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|source| SecretError::PassSpawn {
            path: path.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_values_pass_through() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert_eq!(
            resolve("00000000-0000-0000-0000-000000000000").unwrap(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert!(!is_reference("pass:single-colon"));
    }

    #[test]
    fn env_reference_resolves() {
        unsafe {
            std::env::set_var("_D_MSGRAPH_TEST_SECRET", "s3cret");
        }
        assert!(is_reference("env::_D_MSGRAPH_TEST_SECRET"));
        assert_eq!(resolve("env::_D_MSGRAPH_TEST_SECRET").unwrap(), "s3cret");
        unsafe {
            std::env::remove_var("_D_MSGRAPH_TEST_SECRET");
        }
    }

    #[test]
    fn env_reference_missing_var() {
        let err = resolve("env::_D_MSGRAPH_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(matches!(err, SecretError::EnvNotSet(_)));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn pass_reference_to_missing_entry_fails() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::nonexistent/entry/that/should/not/exist/12345").is_err());
    }
}
