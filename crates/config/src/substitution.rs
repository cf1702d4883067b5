use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// `${VAR}`, `${VAR:-fallback}` or `$VAR`
const PLACEHOLDER: &str = r"\$\{(\w+)(?::-([^}]*))?\}|\$(\w+)";

/// Substitute environment variables in the format `${VAR}`, `${VAR:-default}`
/// or `$VAR`.
///
/// Unset variables without a fallback keep their placeholder; the validator
/// reports them as warnings.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    substitute_with(content, |name| env::var(name).ok())
}

/// Substitution against an arbitrary lookup
pub fn substitute_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(PLACEHOLDER)?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
        let placeholder = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(name) = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str()) else {
            return placeholder.to_string();
        };

        match (lookup(name), caps.get(2)) {
            (Some(value), _) => {
                debug!(var = name, "Substituting environment variable");
                value
            }
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => {
                warn!("Environment variable '{}' not set", name);
                missing_vars.push(name.to_string());
                placeholder.to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(?missing_vars, "Unresolved placeholders left in configuration");
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(PLACEHOLDER)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "FEED_KEY" => Some("secret".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_substitutes_both_forms() {
        let out = substitute_with("a: ${FEED_KEY}\nb: $FEED_KEY", lookup).unwrap();
        assert_eq!(out, "a: secret\nb: secret");
    }

    #[test]
    fn test_fallback_and_missing() {
        let out = substitute_with("a: ${NOPE:-none}\nb: ${MISSING}", lookup).unwrap();
        assert_eq!(out, "a: none\nb: ${MISSING}");
        assert!(has_unresolved_env_vars(&out));
        assert!(!has_unresolved_env_vars("plain: value"));
    }
}
