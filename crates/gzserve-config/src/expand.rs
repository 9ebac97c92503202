//! `${VAR}` references in configuration values.
//!
//! `${VAR}` must be set and `${VAR:-default}` falls back to `default`. Values
//! without `${` are returned untouched, so a literal `$` never needs
//! escaping. Path values also expand a leading `~` to the home directory.

use std::borrow::Cow;
use std::path::PathBuf;

use shellexpand::LookupError;

use crate::ConfigError;

/// A referenced variable is not set.
struct Unset;

fn lookup(var: &str) -> Result<Option<String>, Unset> {
    std::env::var(var).map(Some).map_err(|_| Unset)
}

fn home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// `shellexpand` needs the home directory as a `str`.
fn home_str() -> Option<String> {
    home().and_then(|path| path.into_os_string().into_string().ok())
}

fn unset(field: &str, err: &LookupError<Unset>) -> ConfigError {
    ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", err.var_name),
    }
}

/// Expand variables in a string field such as `server.host`.
pub(crate) fn expand_str(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }
    shellexpand::env_with_context(value, lookup)
        .map(Cow::into_owned)
        .map_err(|err| unset(field, &err))
}

/// Expand variables and a leading `~` in a path field such as `site.root`.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<PathBuf, ConfigError> {
    let expanded = if value.contains("${") {
        shellexpand::full_with_context(value, home_str, lookup).map_err(|err| unset(field, &err))?
    } else {
        shellexpand::tilde_with_context(value, home_str)
    };
    Ok(PathBuf::from(expanded.as_ref()))
}
