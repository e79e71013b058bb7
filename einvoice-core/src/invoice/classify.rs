//! Decide which invoice standard a loaded document claims to follow.
use crate::invoice::rules::{DocumentFormat, NameMatch};
use crate::invoice::xml::constants::{
    CII_MARKERS, CII_ROOT, CII_RSM_NS, UBL_CREDIT_NOTE_NS, UBL_CREDIT_NOTE_ROOT, UBL_INVOICE_NS,
    UBL_INVOICE_ROOT, UBL_MARKERS,
};
use crate::invoice::xml::{Element, Namespace, XmlDocument};
use crate::invoice::{StandardTag, UblDocumentKind, ValidationError};

/// Which tier of the classifier made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationBasis {
    /// The root namespace is one of the fixed invoice-root namespaces.
    Namespace,
    /// Root local name plus standard-specific children; namespaces are ignored afterwards.
    Heuristic,
}

/// Outcome of classification: which rules apply next and how to match names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardHint {
    format: DocumentFormat,
    basis: ClassificationBasis,
}

impl StandardHint {
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn standard(&self) -> StandardTag {
        self.format.standard()
    }

    pub fn basis(&self) -> ClassificationBasis {
        self.basis
    }

    pub fn name_match(&self) -> NameMatch {
        match self.basis {
            ClassificationBasis::Namespace => NameMatch::Qualified,
            ClassificationBasis::Heuristic => NameMatch::LocalOnly,
        }
    }
}

/// Classify a document by its root element.
///
/// A recognized root namespace always wins, even when the rest of the document
/// does not look like that standard; the structural rules report that later.
pub fn classify(document: &XmlDocument) -> Result<StandardHint, ValidationError> {
    let root = document.root();
    let hint = if let Some(format) = format_for_namespace(root.name().namespace()) {
        StandardHint {
            format,
            basis: ClassificationBasis::Namespace,
        }
    } else if let Some(format) = format_for_shape(root) {
        StandardHint {
            format,
            basis: ClassificationBasis::Heuristic,
        }
    } else {
        return Err(ValidationError::UnknownStandard {
            namespace: root.name().namespace().clone(),
            local_name: root.name().local_name().to_string(),
        });
    };

    tracing::debug!(
        standard = %hint.standard(),
        basis = ?hint.basis,
        root = %root.name(),
        "classified document"
    );
    Ok(hint)
}

fn format_for_namespace(namespace: &Namespace) -> Option<DocumentFormat> {
    match namespace.uri()? {
        UBL_INVOICE_NS => Some(DocumentFormat::Ubl(UblDocumentKind::Invoice)),
        UBL_CREDIT_NOTE_NS => Some(DocumentFormat::Ubl(UblDocumentKind::CreditNote)),
        CII_RSM_NS => Some(DocumentFormat::Cii),
        _ => None,
    }
}

fn format_for_shape(root: &Element) -> Option<DocumentFormat> {
    let has_marker = |markers: &[&str]| {
        root.children().iter().any(|child| {
            let local_name = child.name().local_name();
            markers.iter().any(|marker| *marker == local_name)
        })
    };
    match root.name().local_name() {
        UBL_INVOICE_ROOT if has_marker(UBL_MARKERS) => {
            Some(DocumentFormat::Ubl(UblDocumentKind::Invoice))
        }
        UBL_CREDIT_NOTE_ROOT if has_marker(UBL_MARKERS) => {
            Some(DocumentFormat::Ubl(UblDocumentKind::CreditNote))
        }
        CII_ROOT if has_marker(CII_MARKERS) => Some(DocumentFormat::Cii),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::ErrorKind;
    use crate::invoice::xml::{LoadLimits, load};

    fn classify_str(xml: &str) -> Result<StandardHint, ValidationError> {
        let limits = LoadLimits {
            max_document_bytes: 1 << 16,
            max_element_depth: 32,
        };
        classify(&load(xml.as_bytes(), limits)?)
    }

    #[test]
    fn namespace_decides_ubl_and_cii() {
        let hint = classify_str(
            r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"/>"#,
        )
        .expect("ubl");
        assert_eq!(hint.format(), DocumentFormat::Ubl(UblDocumentKind::Invoice));
        assert_eq!(hint.basis(), ClassificationBasis::Namespace);

        let hint = classify_str(
            r#"<x:CreditNote xmlns:x="urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2"/>"#,
        )
        .expect("credit note");
        assert_eq!(hint.format(), DocumentFormat::Ubl(UblDocumentKind::CreditNote));

        let hint = classify_str(
            r#"<rsm:CrossIndustryInvoice xmlns:rsm="urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100"/>"#,
        )
        .expect("cii");
        assert_eq!(hint.standard(), StandardTag::Cii);
        assert_eq!(hint.name_match(), NameMatch::Qualified);
    }

    #[test]
    fn namespace_wins_over_local_name() {
        let hint = classify_str(
            r#"<CrossIndustryInvoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"><ExchangedDocument/></CrossIndustryInvoice>"#,
        )
        .expect("ubl by namespace");
        assert_eq!(hint.standard(), StandardTag::Ubl);
    }

    #[test]
    fn falls_back_to_local_name_and_markers() {
        let hint = classify_str("<Invoice><CustomizationID>x</CustomizationID></Invoice>")
            .expect("ubl heuristic");
        assert_eq!(hint.standard(), StandardTag::Ubl);
        assert_eq!(hint.basis(), ClassificationBasis::Heuristic);
        assert_eq!(hint.name_match(), NameMatch::LocalOnly);

        let hint = classify_str(
            r#"<CrossIndustryInvoice xmlns="urn:wrong"><ExchangedDocumentContext/></CrossIndustryInvoice>"#,
        )
        .expect("cii heuristic");
        assert_eq!(hint.standard(), StandardTag::Cii);
    }

    #[test]
    fn rejects_documents_without_markers() {
        let err = classify_str("<Invoice><Foo/></Invoice>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownStandard);

        let err = classify_str(r#"<Order xmlns="urn:example:order"><CustomizationID/></Order>"#)
            .unwrap_err();
        let ValidationError::UnknownStandard {
            namespace,
            local_name,
        } = err
        else {
            panic!("expected unknown standard");
        };
        assert_eq!(namespace, Namespace::Uri("urn:example:order".into()));
        assert_eq!(local_name, "Order");
    }
}
