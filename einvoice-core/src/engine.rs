//! Validation pipeline: load, classify, identify, check structure, build the result.
use std::sync::{Arc, OnceLock};

use crate::config::{ConfigError, ValidationConfig};
use crate::invoice::builder::build_result;
use crate::invoice::classify::classify;
use crate::invoice::identification::validate_identification;
use crate::invoice::validation::validate_structure;
use crate::invoice::xml::load;
use crate::invoice::{InvoiceStandard, ValidationError};

/// Stateless validator holding a read-only configuration.
///
/// Cloning is cheap and clones share the configuration, so one validator can be
/// handed to any number of threads.
///
/// # Examples
/// ```rust
/// use einvoice_core::{InvoiceValidator, ErrorKind};
///
/// let validator = InvoiceValidator::default();
/// let err = validator.validate("<Order xmlns=\"urn:example:order\"/>").unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::UnknownStandard);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvoiceValidator {
    config: Arc<ValidationConfig>,
}

impl InvoiceValidator {
    /// Build a validator after checking the configuration with
    /// [`ValidationConfig::validate`].
    pub fn try_new(config: ValidationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Build a validator without checking the configuration.
    ///
    /// A zero limit then rejects every document as malformed XML; prefer
    /// [`InvoiceValidator::try_new`] for configurations assembled in code.
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<ValidationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate an XML document given as text.
    pub fn validate(&self, xml: &str) -> Result<InvoiceStandard, ValidationError> {
        self.validate_bytes(xml.as_bytes())
    }

    /// Validate raw XML bytes.
    ///
    /// The encoding is taken from a byte-order mark or the XML declaration and
    /// defaults to UTF-8; undecodable input is reported as malformed XML.
    pub fn validate_bytes(&self, input: &[u8]) -> Result<InvoiceStandard, ValidationError> {
        let span = tracing::debug_span!("validate_invoice", bytes = input.len());
        let _guard = span.enter();

        match self.run(input) {
            Ok(standard) => {
                tracing::debug!(
                    standard = %standard.tag(),
                    customization_id = standard.customization_id(),
                    "document admitted"
                );
                Ok(standard)
            }
            Err(err) => {
                tracing::debug!(kind = ?err.kind(), error = %err, "document rejected");
                Err(err)
            }
        }
    }

    fn run(&self, input: &[u8]) -> Result<InvoiceStandard, ValidationError> {
        let document = load(input, self.config.load_limits())?;
        let hint = classify(&document)?;
        let identification = validate_identification(&document, &hint, &self.config)?;
        validate_structure(
            &document,
            &hint,
            &identification,
            self.config.structural_policy(),
        )?;
        Ok(build_result(&hint, document.root().name(), identification))
    }
}

static GLOBAL: OnceLock<InvoiceValidator> = OnceLock::new();

/// Install the process-wide configuration used by [`validate_invoice`].
///
/// Must be called before the first [`validate_invoice`] call; afterwards the
/// configuration is fixed and a second call fails.
pub fn configure_global(config: ValidationConfig) -> Result<(), ConfigError> {
    GLOBAL
        .set(InvoiceValidator::try_new(config)?)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Validate a document with the process-wide validator.
///
/// Uses [`ValidationConfig::default`] unless [`configure_global`] ran first.
pub fn validate_invoice(xml: &str) -> Result<InvoiceStandard, ValidationError> {
    GLOBAL.get_or_init(InvoiceValidator::default).validate(xml)
}
