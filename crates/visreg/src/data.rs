//! Form data for scenarios.
//!
//! `test_data.json` maps a scenario key to field values:
//!
//! ```json
//! { "register": { "customer.firstName": "Jane" }, "login": { "username": "jane" } }
//! ```
//!
//! A missing or malformed file is not an error; the run falls back to the
//! built-in defaults.

use crate::result::{VisregError, VisregResult};
use crate::scenario::Scenario;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Default test data file name
pub const DEFAULT_TEST_DATA_PATH: &str = "test_data.json";

/// Field name to value
pub type FormData = BTreeMap<String, String>;

/// Per-scenario form data loaded from disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestData {
    entries: BTreeMap<String, FormData>,
}

impl TestData {
    /// Parse the JSON document
    pub fn parse(json: &str) -> VisregResult<Self> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(map) = root else {
            return Err(VisregError::InvalidInput {
                message: "test data must be a JSON object keyed by scenario".to_string(),
            });
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let Value::Object(fields) = value else {
                tracing::warn!(key, "test data entry is not an object, skipped");
                continue;
            };
            let form: FormData = fields
                .into_iter()
                .map(|(field, v)| {
                    let text = match v {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (field, text)
                })
                .collect();
            entries.insert(key, form);
        }
        Ok(Self { entries })
    }

    /// Load a file, returning empty data (with a warning) on any failure
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "test data file {} not readable", path.display());
                return Self::default();
            }
        };
        match Self::parse(&text) {
            Ok(data) => {
                tracing::debug!(entries = data.entries.len(), "test data loaded from {}", path.display());
                data
            }
            Err(e) => {
                tracing::warn!(error = %e, "invalid test data in {}", path.display());
                Self::default()
            }
        }
    }

    /// Entry for a scenario, empty when absent
    #[must_use]
    pub fn for_scenario(&self, scenario: Scenario) -> FormData {
        match self.entries.get(scenario.data_key()) {
            Some(form) => form.clone(),
            None => {
                tracing::warn!(scenario = %scenario, "no test data for scenario");
                FormData::new()
            }
        }
    }

    /// Check if nothing was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in values used when no data is supplied
#[must_use]
pub fn default_form_data(scenario: Scenario) -> FormData {
    let pairs: &[(&str, &str)] = match scenario {
        Scenario::Register => &[
            ("customer.firstName", "Jane"),
            ("customer.lastName", "Doe"),
            ("customer.address.street", "123 Main St"),
            ("customer.address.city", "Anytown"),
            ("customer.address.state", "Anystate"),
            ("customer.address.zipCode", "12345"),
            ("customer.phoneNumber", "555-1234"),
            ("customer.ssn", "123-45-6789"),
            ("customer.username", "visreg_user"),
            ("customer.password", "password"),
            ("repeatedPassword", "password"),
        ],
        Scenario::Login | Scenario::OpenAccount | Scenario::Overview | Scenario::ViewOverview => {
            &[("username", "visreg_user"), ("password", "password")]
        }
        Scenario::VisualTest => &[],
    };
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Defaults overlaid with the supplied values
#[must_use]
pub fn resolve_form_data(scenario: Scenario, supplied: &FormData) -> FormData {
    let mut form = default_form_data(scenario);
    for (k, v) in supplied {
        form.insert(k.clone(), v.clone());
    }
    form
}

/// Parse a `key=value` pair
pub fn parse_field(pair: &str) -> VisregResult<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(VisregError::InvalidInput {
            message: format!("expected key=value, got {pair:?}"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_entries() {
        let data = TestData::parse(
            r#"{"register": {"customer.firstName": "Jane", "customer.address.zipCode": 12345},
                "login": {"username": "jane", "password": null}}"#,
        )
        .unwrap();
        let register = data.for_scenario(Scenario::Register);
        assert_eq!(register["customer.firstName"], "Jane");
        assert_eq!(register["customer.address.zipCode"], "12345");
        let login = data.for_scenario(Scenario::OpenAccount);
        assert_eq!(login["username"], "jane");
        assert_eq!(login["password"], "");
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let data = TestData::parse(r#"{"register": 5, "login": {"username": "x"}}"#).unwrap();
        assert!(data.for_scenario(Scenario::Register).is_empty());
        assert_eq!(data.for_scenario(Scenario::Login).len(), 1);
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(TestData::parse("[1, 2]").is_err());
        assert!(TestData::parse("{").is_err());
    }

    #[test]
    fn test_load_tolerates_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        assert!(TestData::load(&dir.path().join("absent.json")).is_empty());

        let bad = dir.path().join("test_data.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(TestData::load(&bad).is_empty());

        std::fs::write(&bad, r#"{"login": {"username": "u"}}"#).unwrap();
        assert!(!TestData::load(&bad).is_empty());
    }

    #[test]
    fn test_defaults_cover_custom_fields() {
        for scenario in Scenario::ALL {
            let defaults = default_form_data(scenario);
            for field in scenario.custom_fields() {
                assert!(defaults.contains_key(*field), "{scenario}: {field}");
            }
        }
    }

    #[test]
    fn test_resolve_overlays() {
        let mut supplied = FormData::new();
        supplied.insert("username".to_string(), "bob".to_string());
        let form = resolve_form_data(Scenario::Login, &supplied);
        assert_eq!(form["username"], "bob");
        assert_eq!(form["password"], "password");
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("customer.ssn=111-22-3333").unwrap(),
            ("customer.ssn".to_string(), "111-22-3333".to_string())
        );
        assert_eq!(parse_field("a=b=c").unwrap().1, "b=c");
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }
}
