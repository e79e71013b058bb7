//! Mandatory identification fields (customization / guideline identifiers).
use serde::Serialize;

use crate::config::ValidationConfig;
use crate::invoice::classify::StandardHint;
use crate::invoice::rules::{
    CII_BUSINESS_PROCESS, CII_CONTEXT, CII_GUIDELINE, CII_ID, DocumentFormat, NameMatch, Step,
    UBL_CUSTOMIZATION_ID, UBL_PROFILE_ID, UBL_VERSION_ID,
};
use crate::invoice::xml::{Element, XmlDocument};
use crate::invoice::{CiiProfile, ElementPath, ValidationError};

const UBL_IDENTIFICATION: &[Step] = &[UBL_CUSTOMIZATION_ID];
const CII_IDENTIFICATION: &[Step] = &[CII_CONTEXT, CII_GUIDELINE, CII_ID];
const CII_PROCESS: &[Step] = &[CII_CONTEXT, CII_BUSINESS_PROCESS, CII_ID];

/// Identification values read from an admitted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IdentificationMetadata {
    Ubl {
        customization_id: String,
        profile_id: Option<String>,
        ubl_version_id: Option<String>,
    },
    Cii {
        customization_id: String,
        business_process_id: Option<String>,
        profile: CiiProfile,
    },
}

impl IdentificationMetadata {
    pub fn customization_id(&self) -> &str {
        match self {
            IdentificationMetadata::Ubl {
                customization_id, ..
            }
            | IdentificationMetadata::Cii {
                customization_id, ..
            } => customization_id,
        }
    }

    pub fn has_line_items(&self) -> bool {
        match self {
            IdentificationMetadata::Ubl { .. } => true,
            IdentificationMetadata::Cii { profile, .. } => profile.has_line_items(),
        }
    }
}

/// Check the standard's identification element and match it against the configured set.
pub fn validate_identification(
    document: &XmlDocument,
    hint: &StandardHint,
    config: &ValidationConfig,
) -> Result<IdentificationMetadata, ValidationError> {
    let root = document.root();
    let mode = hint.name_match();
    let format = hint.format();

    let path = match format {
        DocumentFormat::Ubl(_) => UBL_IDENTIFICATION,
        DocumentFormat::Cii => CII_IDENTIFICATION,
    };
    let customization_id = value_at(root, path, mode).ok_or_else(|| {
        ValidationError::MissingIdentification {
            standard: hint.standard(),
            path: expected_path(format, path),
        }
    })?;

    let recognized = config.allowed_customization_ids(hint.standard());
    if !recognized.is_some_and(|ids| ids.contains(customization_id)) {
        return Err(ValidationError::UnsupportedCustomization {
            standard: hint.standard(),
            value: customization_id.to_string(),
            path: expected_path(format, path),
            recognized: recognized.into_iter().flatten().cloned().collect(),
        });
    }

    let customization_id = customization_id.to_string();
    Ok(match format {
        DocumentFormat::Ubl(_) => IdentificationMetadata::Ubl {
            customization_id,
            profile_id: value_at(root, &[UBL_PROFILE_ID], mode).map(str::to_string),
            ubl_version_id: value_at(root, &[UBL_VERSION_ID], mode).map(str::to_string),
        },
        DocumentFormat::Cii => IdentificationMetadata::Cii {
            profile: CiiProfile::from_guideline_id(&customization_id),
            customization_id,
            business_process_id: value_at(root, CII_PROCESS, mode).map(str::to_string),
        },
    })
}

/// Trimmed text of the first element along `path`, if non-empty.
fn value_at<'a>(root: &'a Element, path: &[Step], mode: NameMatch) -> Option<&'a str> {
    let mut element = root;
    for step in path {
        element = step.select(element, mode).next()?;
    }
    Some(element.text()).filter(|text| !text.is_empty())
}

fn expected_path(format: DocumentFormat, path: &[Step]) -> ElementPath {
    std::iter::once(format.root().step)
        .chain(path.iter().copied())
        .map(|step| step.to_string())
        .collect()
}
