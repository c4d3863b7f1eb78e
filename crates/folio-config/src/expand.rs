//! Environment variable expansion for configuration strings.

use std::cell::RefCell;
use std::convert::Infallible;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a string.
///
/// A bare `$VAR` is left alone. Referencing an unset variable without a
/// default is an error naming both the variable and `field`.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    let unset = RefCell::new(Vec::new());
    let expanded = shellexpand::env_with_context(value, |var| -> Result<Option<String>, Infallible> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => {
                unset.borrow_mut().push(var.to_owned());
                Ok(None)
            }
        }
    })
    .map_or_else(|_| value.to_owned(), std::borrow::Cow::into_owned);

    // Unset variables are only acceptable where a default was given
    if let Some(var) = unset
        .into_inner()
        .into_iter()
        .find(|var| value.contains(&format!("${{{var}}}")))
    {
        return Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{var}}} not set"),
        });
    }
    Ok(expanded)
}
