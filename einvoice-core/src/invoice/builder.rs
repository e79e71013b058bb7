use super::{CiiMetadata, InvoiceStandard, UblDocumentKind, UblMetadata};
use crate::invoice::classify::StandardHint;
use crate::invoice::identification::IdentificationMetadata;
use crate::invoice::rules::DocumentFormat;
use crate::invoice::xml::QualifiedName;

/// Assemble the typed result once every stage has passed.
pub fn build_result(
    hint: &StandardHint,
    root: &QualifiedName,
    identification: IdentificationMetadata,
) -> InvoiceStandard {
    let kind = match hint.format() {
        DocumentFormat::Ubl(kind) => kind,
        DocumentFormat::Cii => UblDocumentKind::default(),
    };
    match identification {
        IdentificationMetadata::Ubl {
            customization_id,
            profile_id,
            ubl_version_id,
        } => InvoiceStandard::Ubl(UblMetadata {
            kind,
            customization_id,
            profile_id,
            ubl_version_id,
            root: root.clone(),
        }),
        IdentificationMetadata::Cii {
            customization_id,
            business_process_id,
            profile,
        } => InvoiceStandard::Cii(CiiMetadata {
            customization_id,
            business_process_id,
            profile,
            root: root.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::classify::classify;
    use crate::invoice::xml::{LoadLimits, Namespace, load};
    use crate::invoice::{CiiProfile, StandardTag};

    fn hint_for(xml: &str) -> StandardHint {
        let limits = LoadLimits {
            max_document_bytes: 4096,
            max_element_depth: 8,
        };
        let document = load(xml.as_bytes(), limits).expect("load");
        classify(&document).expect("classify")
    }

    #[test]
    fn ubl_result_keeps_kind_and_root() {
        let hint = hint_for(
            r#"<CreditNote xmlns="urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2"/>"#,
        );
        let root = QualifiedName::new(
            Namespace::Uri("urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2".into()),
            "CreditNote",
        );
        let result = build_result(
            &hint,
            &root,
            IdentificationMetadata::Ubl {
                customization_id: "urn:cen.eu:en16931:2017".into(),
                profile_id: None,
                ubl_version_id: Some("2.1".into()),
            },
        );
        let InvoiceStandard::Ubl(meta) = &result else {
            panic!("expected ubl");
        };
        assert_eq!(meta.kind(), UblDocumentKind::CreditNote);
        assert_eq!(meta.ubl_version_id(), Some("2.1"));
        assert_eq!(result.root(), &root);
        assert_eq!(result.tag(), StandardTag::Ubl);
    }

    #[test]
    fn cii_result_carries_profile() {
        let hint = hint_for("<CrossIndustryInvoice><ExchangedDocument/></CrossIndustryInvoice>");
        let root = QualifiedName::new(Namespace::None, "CrossIndustryInvoice");
        let result = build_result(
            &hint,
            &root,
            IdentificationMetadata::Cii {
                customization_id: "urn:factur-x.eu:1p0:minimum".into(),
                business_process_id: None,
                profile: CiiProfile::Minimum,
            },
        );
        let InvoiceStandard::Cii(meta) = &result else {
            panic!("expected cii");
        };
        assert_eq!(meta.profile(), CiiProfile::Minimum);
        assert_eq!(result.customization_id(), "urn:factur-x.eu:1p0:minimum");
    }
}
