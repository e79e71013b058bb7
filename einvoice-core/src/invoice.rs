//! Invoice standards, classification results and validation errors.
pub mod builder;
pub mod classify;
pub mod identification;
pub mod rules;
pub mod validation;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use xml::{Namespace, QualifiedName, TextPosition};

/// Invoice standards known to the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StandardTag {
    Ubl,
    Cii,
}

impl StandardTag {
    pub const ALL: [StandardTag; 2] = [StandardTag::Ubl, StandardTag::Cii];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardTag::Ubl => "ubl",
            StandardTag::Cii => "cii",
        }
    }
}

impl fmt::Display for StandardTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StandardTag::Ubl => f.write_str("UBL"),
            StandardTag::Cii => f.write_str("CII"),
        }
    }
}

impl FromStr for StandardTag {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "ubl" => Ok(StandardTag::Ubl),
            "cii" => Ok(StandardTag::Cii),
            _ => Err(ConfigError::UnknownStandard {
                input: input.to_string(),
            }),
        }
    }
}

/// Root document type of a UBL invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UblDocumentKind {
    #[default]
    Invoice,
    CreditNote,
}

/// Factur-X / ZUGFeRD / XRechnung profile announced by a CII guideline identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CiiProfile {
    Minimum,
    BasicWl,
    Basic,
    En16931,
    Extended,
    XRechnung,
    Other,
}

impl CiiProfile {
    pub fn from_guideline_id(id: &str) -> Self {
        let id = id.trim().to_ascii_lowercase();
        if id.contains(":minimum") {
            CiiProfile::Minimum
        } else if id.contains(":basicwl") {
            CiiProfile::BasicWl
        } else if id.contains(":basic") {
            CiiProfile::Basic
        } else if id.contains(":extended") {
            CiiProfile::Extended
        } else if id.contains("xrechnung") {
            CiiProfile::XRechnung
        } else if id == "urn:cen.eu:en16931:2017" {
            CiiProfile::En16931
        } else {
            CiiProfile::Other
        }
    }

    /// MINIMUM and BASIC WL documents carry header data only.
    pub fn has_line_items(&self) -> bool {
        !matches!(self, CiiProfile::Minimum | CiiProfile::BasicWl)
    }
}

/// Metadata of an admitted UBL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UblMetadata {
    kind: UblDocumentKind,
    customization_id: String,
    profile_id: Option<String>,
    ubl_version_id: Option<String>,
    root: QualifiedName,
}

impl UblMetadata {
    pub fn kind(&self) -> UblDocumentKind {
        self.kind
    }

    /// Value of `cbc:CustomizationID`.
    pub fn customization_id(&self) -> &str {
        &self.customization_id
    }

    /// Value of `cbc:ProfileID`, if present.
    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    pub fn ubl_version_id(&self) -> Option<&str> {
        self.ubl_version_id.as_deref()
    }

    pub fn root(&self) -> &QualifiedName {
        &self.root
    }
}

/// Metadata of an admitted CII document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiiMetadata {
    customization_id: String,
    business_process_id: Option<String>,
    profile: CiiProfile,
    root: QualifiedName,
}

impl CiiMetadata {
    /// Value of the guideline parameter (`ram:GuidelineSpecifiedDocumentContextParameter/ram:ID`).
    pub fn customization_id(&self) -> &str {
        &self.customization_id
    }

    pub fn business_process_id(&self) -> Option<&str> {
        self.business_process_id.as_deref()
    }

    pub fn profile(&self) -> CiiProfile {
        self.profile
    }

    pub fn root(&self) -> &QualifiedName {
        &self.root
    }
}

/// Successful classification of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "standard", rename_all = "lowercase")]
pub enum InvoiceStandard {
    Ubl(UblMetadata),
    Cii(CiiMetadata),
}

impl InvoiceStandard {
    pub fn tag(&self) -> StandardTag {
        match self {
            InvoiceStandard::Ubl(_) => StandardTag::Ubl,
            InvoiceStandard::Cii(_) => StandardTag::Cii,
        }
    }

    pub fn customization_id(&self) -> &str {
        match self {
            InvoiceStandard::Ubl(meta) => meta.customization_id(),
            InvoiceStandard::Cii(meta) => meta.customization_id(),
        }
    }

    pub fn root(&self) -> &QualifiedName {
        match self {
            InvoiceStandard::Ubl(meta) => meta.root(),
            InvoiceStandard::Cii(meta) => meta.root(),
        }
    }
}

/// Sequence of element names leading to a node, e.g. `/ubl:Invoice/cbc:CustomizationID`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ElementPath(Vec<String>);

impl ElementPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub(crate) fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl<S: Into<String>> FromIterator<S> for ElementPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// One failed structural rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub path: ElementPath,
    pub detail: String,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} at {}",
            self.rule_id, self.description, self.detail, self.path
        )
    }
}

/// Kind tag of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MalformedXml,
    UnknownStandard,
    MissingIdentification,
    UnsupportedCustomization,
    StructuralViolation,
}

/// Reason a document was not admitted. Exactly one is produced per failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed XML: {message}{}", describe_position(.position))]
    MalformedXml {
        message: String,
        position: Option<TextPosition>,
        /// Elements open when the error was found.
        path: Option<ElementPath>,
    },
    #[error("unknown invoice standard: root element `{local_name}` in namespace {namespace}")]
    UnknownStandard {
        namespace: Namespace,
        local_name: String,
    },
    #[error("missing {standard} identification: expected a non-empty element at {path}")]
    MissingIdentification {
        standard: StandardTag,
        path: ElementPath,
    },
    #[error(
        "unsupported {standard} customization `{value}` at {path}; recognized: [{}]",
        .recognized.join(", ")
    )]
    UnsupportedCustomization {
        standard: StandardTag,
        value: String,
        path: ElementPath,
        recognized: Vec<String>,
    },
    #[error("{standard} structural violation {violation}{}", describe_additional(.additional))]
    StructuralViolation {
        standard: StandardTag,
        violation: RuleViolation,
        /// Further violations, only filled in collect-all mode.
        additional: Vec<RuleViolation>,
    },
}

fn describe_position(position: &Option<TextPosition>) -> String {
    position
        .map(|position| format!(" at {position}"))
        .unwrap_or_default()
}

fn describe_additional(additional: &[RuleViolation]) -> String {
    match additional.len() {
        0 => String::new(),
        n => format!(" (and {n} more)"),
    }
}

impl ValidationError {
    pub(crate) fn malformed(
        message: impl Into<String>,
        position: Option<TextPosition>,
        path: Option<ElementPath>,
    ) -> Self {
        ValidationError::MalformedXml {
            message: message.into(),
            position,
            path,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MalformedXml { .. } => ErrorKind::MalformedXml,
            ValidationError::UnknownStandard { .. } => ErrorKind::UnknownStandard,
            ValidationError::MissingIdentification { .. } => ErrorKind::MissingIdentification,
            ValidationError::UnsupportedCustomization { .. } => {
                ErrorKind::UnsupportedCustomization
            }
            ValidationError::StructuralViolation { .. } => ErrorKind::StructuralViolation,
        }
    }

    /// Path to the offending node, when the failure has one.
    pub fn path(&self) -> Option<&ElementPath> {
        match self {
            ValidationError::MalformedXml { path, .. } => path.as_ref(),
            ValidationError::UnknownStandard { .. } => None,
            ValidationError::MissingIdentification { path, .. }
            | ValidationError::UnsupportedCustomization { path, .. } => Some(path),
            ValidationError::StructuralViolation { violation, .. } => Some(&violation.path),
        }
    }

    /// Human-readable diagnostic, identical to the `Display` output.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
