//! Engine configuration: recognized identifiers, resource limits and the structural policy.
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::invoice::StandardTag;
use crate::invoice::xml::LoadLimits;

const EN16931: &str = "urn:cen.eu:en16931:2017";

const DEFAULT_UBL_IDS: [&str; 4] = [
    EN16931,
    "urn:cen.eu:en16931:2017#compliant#urn:xeinkauf.de:kosit:xrechnung_3.0",
    "urn:cen.eu:en16931:2017#compliant#urn:xoev-de:kosit:standard:xrechnung_2.3",
    "urn:cen.eu:en16931:2017#compliant#urn:fdc:peppol.eu:2017:poacc:billing:3.0",
];

const DEFAULT_CII_IDS: [&str; 4] = [
    EN16931,
    "urn:cen.eu:en16931:2017#compliant#urn:factur-x.eu:1p0:basic",
    "urn:cen.eu:en16931:2017#conformant#urn:factur-x.eu:1p0:extended",
    "urn:cen.eu:en16931:2017#compliant#urn:xeinkauf.de:kosit:xrechnung_3.0",
];

const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_ELEMENT_DEPTH: usize = 64;

/// How many structural violations are gathered before the call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralPolicy {
    /// Stop at the first violated rule.
    #[default]
    FailFast,
    /// Evaluate every rule and report all violations in one error.
    CollectAll,
}

/// Error returned while building or loading a [`ValidationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown invoice standard: {input}")]
    UnknownStandard { input: String },
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("no customization identifiers allowed for {standard}")]
    EmptyAllowedSet { standard: StandardTag },
    #[error("the global validator is already configured")]
    AlreadyInitialized,
}

/// Read-only settings shared by every validation call.
///
/// Standards missing from `allowed_customization_ids` admit no identifier at all,
/// so every document of that standard fails with `UnsupportedCustomization`.
///
/// # Examples
/// ```rust
/// use einvoice_core::config::{StructuralPolicy, ValidationConfig};
/// use einvoice_core::StandardTag;
///
/// let config = ValidationConfig::default()
///     .allow_customization_id(StandardTag::Ubl, "urn:example:custom")
///     .with_structural_policy(StructuralPolicy::CollectAll);
/// assert!(config.is_allowed(StandardTag::Ubl, "urn:example:custom"));
/// assert!(config.is_allowed(StandardTag::Cii, "urn:cen.eu:en16931:2017"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig", into = "RawConfig")]
pub struct ValidationConfig {
    allowed_customization_ids: BTreeMap<StandardTag, BTreeSet<String>>,
    max_document_bytes: usize,
    max_element_depth: usize,
    structural_policy: StructuralPolicy,
}

impl ValidationConfig {
    /// Parse a TOML document; omitted settings keep their defaults.
    ///
    /// ```rust
    /// use einvoice_core::config::ValidationConfig;
    /// use einvoice_core::StandardTag;
    ///
    /// let config = ValidationConfig::from_toml_str(
    ///     r#"
    ///     max_element_depth = 32
    ///
    ///     [allowed_customization_ids]
    ///     cii = ["urn:factur-x.eu:1p0:minimum"]
    ///     "#,
    /// )?;
    /// assert_eq!(config.max_element_depth(), 32);
    /// assert!(config.is_allowed(StandardTag::Cii, "urn:factur-x.eu:1p0:minimum"));
    /// assert!(!config.is_allowed(StandardTag::Cii, "urn:cen.eu:en16931:2017"));
    /// # Ok::<(), einvoice_core::config::ConfigError>(())
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ValidationConfig = toml::from_str(input)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded validation config");
        Ok(config)
    }

    /// Reject zero limits and standards configured with an empty identifier set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_document_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_document_bytes",
            });
        }
        if self.max_element_depth == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_element_depth",
            });
        }
        if let Some((standard, _)) = self
            .allowed_customization_ids
            .iter()
            .find(|(_, ids)| ids.is_empty())
        {
            return Err(ConfigError::EmptyAllowedSet {
                standard: *standard,
            });
        }
        Ok(())
    }

    pub fn allowed_customization_ids(&self, standard: StandardTag) -> Option<&BTreeSet<String>> {
        self.allowed_customization_ids.get(&standard)
    }

    pub fn is_allowed(&self, standard: StandardTag, customization_id: &str) -> bool {
        self.allowed_customization_ids(standard)
            .is_some_and(|ids| ids.contains(customization_id))
    }

    pub fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }

    pub fn max_element_depth(&self) -> usize {
        self.max_element_depth
    }

    pub fn structural_policy(&self) -> StructuralPolicy {
        self.structural_policy
    }

    pub fn load_limits(&self) -> LoadLimits {
        LoadLimits {
            max_document_bytes: self.max_document_bytes,
            max_element_depth: self.max_element_depth,
        }
    }

    /// Replace the identifier set of one standard.
    pub fn with_allowed_customization_ids<I, S>(mut self, standard: StandardTag, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_customization_ids
            .insert(standard, ids.into_iter().map(Into::into).collect());
        self
    }

    /// Add one identifier to a standard's set.
    pub fn allow_customization_id(mut self, standard: StandardTag, id: impl Into<String>) -> Self {
        self.allowed_customization_ids
            .entry(standard)
            .or_default()
            .insert(id.into());
        self
    }

    pub fn with_max_document_bytes(mut self, max_document_bytes: usize) -> Self {
        self.max_document_bytes = max_document_bytes;
        self
    }

    pub fn with_max_element_depth(mut self, max_element_depth: usize) -> Self {
        self.max_element_depth = max_element_depth;
        self
    }

    pub fn with_structural_policy(mut self, structural_policy: StructuralPolicy) -> Self {
        self.structural_policy = structural_policy;
        self
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let ids = |defaults: [&str; 4]| defaults.into_iter().map(String::from).collect();
        ValidationConfig {
            allowed_customization_ids: BTreeMap::from([
                (StandardTag::Ubl, ids(DEFAULT_UBL_IDS)),
                (StandardTag::Cii, ids(DEFAULT_CII_IDS)),
            ]),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_element_depth: DEFAULT_MAX_ELEMENT_DEPTH,
            structural_policy: StructuralPolicy::default(),
        }
    }
}

/// On-disk shape: standards are keyed by name and every setting is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_document_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_element_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structural_policy: Option<StructuralPolicy>,
    allowed_customization_ids: BTreeMap<String, BTreeSet<String>>,
}

impl TryFrom<RawConfig> for ValidationConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = ValidationConfig::default();
        for (standard, ids) in raw.allowed_customization_ids {
            let standard: StandardTag = standard.parse()?;
            config.allowed_customization_ids.insert(standard, ids);
        }
        if let Some(max_document_bytes) = raw.max_document_bytes {
            config.max_document_bytes = max_document_bytes;
        }
        if let Some(max_element_depth) = raw.max_element_depth {
            config.max_element_depth = max_element_depth;
        }
        if let Some(structural_policy) = raw.structural_policy {
            config.structural_policy = structural_policy;
        }
        config.validate()?;
        Ok(config)
    }
}

impl From<ValidationConfig> for RawConfig {
    fn from(config: ValidationConfig) -> Self {
        RawConfig {
            max_document_bytes: Some(config.max_document_bytes),
            max_element_depth: Some(config.max_element_depth),
            structural_policy: Some(config.structural_policy),
            allowed_customization_ids: config
                .allowed_customization_ids
                .into_iter()
                .map(|(standard, ids)| (standard.as_str().to_string(), ids))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ValidationConfig::default();
        config.validate().expect("default config");
        assert_eq!(config.max_document_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.max_element_depth(), 64);
        assert_eq!(config.structural_policy(), StructuralPolicy::FailFast);
        assert!(config.is_allowed(StandardTag::Ubl, EN16931));
        assert!(config.is_allowed(
            StandardTag::Cii,
            "urn:cen.eu:en16931:2017#compliant#urn:factur-x.eu:1p0:basic"
        ));
        assert!(!config.is_allowed(StandardTag::Cii, "urn:factur-x.eu:1p0:minimum"));
    }

    #[test]
    fn toml_overrides_merge_per_standard() {
        let config = ValidationConfig::from_toml_str(
            r#"
            structural_policy = "collect_all"

            [allowed_customization_ids]
            UBL = ["urn:example:only"]
            "#,
        )
        .expect("config");
        assert_eq!(config.structural_policy(), StructuralPolicy::CollectAll);
        assert_eq!(
            config
                .allowed_customization_ids(StandardTag::Ubl)
                .map(|ids| ids.len()),
            Some(1)
        );
        assert!(config.is_allowed(StandardTag::Cii, EN16931));
        assert_eq!(config.max_element_depth(), 64);
    }

    #[test]
    fn toml_rejects_bad_settings() {
        let err = ValidationConfig::from_toml_str("max_element_depth = 0").unwrap_err();
        assert!(err.to_string().contains("max_element_depth"), "{err}");

        let err = ValidationConfig::from_toml_str("[allowed_customization_ids]\ncii = []")
            .unwrap_err();
        assert!(err.to_string().contains("CII"), "{err}");

        let err = ValidationConfig::from_toml_str("[allowed_customization_ids]\nedifact = [\"x\"]")
            .unwrap_err();
        assert!(err.to_string().contains("edifact"), "{err}");

        let err = ValidationConfig::from_toml_str("max_depth = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn builders_and_validate() {
        let config = ValidationConfig::default().with_max_document_bytes(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "max_document_bytes"
            })
        ));

        let config = ValidationConfig::default()
            .with_allowed_customization_ids(StandardTag::Cii, Vec::<String>::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyAllowedSet {
                standard: StandardTag::Cii
            })
        ));

        let config = ValidationConfig::default()
            .with_max_element_depth(12)
            .with_max_document_bytes(2048);
        assert_eq!(
            config.load_limits(),
            LoadLimits {
                max_document_bytes: 2048,
                max_element_depth: 12
            }
        );
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = ValidationConfig::default()
            .allow_customization_id(StandardTag::Cii, "urn:factur-x.eu:1p0:minimum");
        let text = toml::to_string(&config).expect("serialize");
        let parsed = ValidationConfig::from_toml_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = ValidationConfig::from_file("/nonexistent/einvoice.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
