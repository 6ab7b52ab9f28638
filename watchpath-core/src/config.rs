//! Observer Configuration
//!
//! Controls how lenient the registration API is about listeners it cannot
//! use. The defaults keep registration silent: a listener without a usable
//! handler is stored and never called, and removing an unknown listener does
//! nothing. Strict mode turns both cases into errors.

use serde::{Deserialize, Serialize};

use crate::error::ObserveError;

/// How a questionable registration request is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Accept the request and log it.
    #[default]
    Lenient,

    /// Reject the request with an error.
    Strict,
}

/// Configuration for an [`Observer`](crate::Observer).
///
/// # Example
///
/// ```rust
/// use watchpath_core::{ObserverConfig, Strictness};
///
/// let config = ObserverConfig::from_json(r#"{ "unresolved_handlers": "strict" }"#).unwrap();
/// assert_eq!(config.unresolved_handlers, Strictness::Strict);
/// assert_eq!(config.missing_listeners, Strictness::Lenient);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Listener objects that expose neither a named nor a generic handler.
    pub unresolved_handlers: Strictness,

    /// Removal of a listener that is not registered for the path.
    pub missing_listeners: Strictness,
}

impl ObserverConfig {
    /// A configuration that rejects both kinds of questionable request.
    pub fn strict() -> Self {
        Self {
            unresolved_handlers: Strictness::Strict,
            missing_listeners: Strictness::Strict,
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ObserveError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let config = ObserverConfig::default();
        assert_eq!(config.unresolved_handlers, Strictness::Lenient);
        assert_eq!(config.missing_listeners, Strictness::Lenient);
    }

    #[test]
    fn parses_partial_json() {
        let config = ObserverConfig::from_json(r#"{ "missing_listeners": "strict" }"#).unwrap();
        assert_eq!(config.unresolved_handlers, Strictness::Lenient);
        assert_eq!(config.missing_listeners, Strictness::Strict);

        let empty = ObserverConfig::from_json("{}").unwrap();
        assert_eq!(empty, ObserverConfig::default());
    }

    #[test]
    fn rejects_unknown_strictness() {
        let err = ObserverConfig::from_json(r#"{ "missing_listeners": "loud" }"#).unwrap_err();
        assert!(matches!(err, ObserveError::Json(_)));
    }

    #[test]
    fn strict_round_trips_through_json() {
        let json = serde_json::to_string(&ObserverConfig::strict()).unwrap();
        assert_eq!(ObserverConfig::from_json(&json).unwrap(), ObserverConfig::strict());
    }
}
