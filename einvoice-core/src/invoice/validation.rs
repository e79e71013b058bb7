//! Structural checks of a classified document against its standard's rule table.
use std::ops::ControlFlow;

use crate::config::StructuralPolicy;
use crate::invoice::classify::{ClassificationBasis, StandardHint};
use crate::invoice::identification::IdentificationMetadata;
use crate::invoice::rules::{NameMatch, Rule, RuleScope};
use crate::invoice::xml::{Element, XmlDocument};
use crate::invoice::{ElementPath, RuleViolation, ValidationError};

/// Evaluate the structural rules of the hinted standard.
///
/// Rules are evaluated in table order. With [`StructuralPolicy::FailFast`] the
/// first violation ends the call; with [`StructuralPolicy::CollectAll`] every
/// rule runs and the remaining violations are attached to the error.
pub fn validate_structure(
    document: &XmlDocument,
    hint: &StandardHint,
    identification: &IdentificationMetadata,
    policy: StructuralPolicy,
) -> Result<(), ValidationError> {
    let mut report = Report {
        policy,
        violations: Vec::new(),
    };
    if evaluate(document.root(), hint, identification, &mut report).is_break() {
        tracing::trace!(standard = %hint.standard(), "stopped at first structural violation");
    }

    let mut violations = report.violations.into_iter();
    match violations.next() {
        None => Ok(()),
        Some(violation) => Err(ValidationError::StructuralViolation {
            standard: hint.standard(),
            violation,
            additional: violations.collect(),
        }),
    }
}

struct Report {
    policy: StructuralPolicy,
    violations: Vec<RuleViolation>,
}

impl Report {
    fn push(
        &mut self,
        rule_id: &'static str,
        description: &'static str,
        path: ElementPath,
        detail: String,
    ) -> ControlFlow<()> {
        // A missing parent shared by several rules is reported once.
        if !self.violations.iter().any(|seen| seen.path == path) {
            self.violations.push(RuleViolation {
                rule_id,
                description,
                path,
                detail,
            });
        }
        match self.policy {
            StructuralPolicy::FailFast => ControlFlow::Break(()),
            StructuralPolicy::CollectAll => ControlFlow::Continue(()),
        }
    }
}

fn evaluate(
    root: &Element,
    hint: &StandardHint,
    identification: &IdentificationMetadata,
    report: &mut Report,
) -> ControlFlow<()> {
    let format = hint.format();
    let mode = hint.name_match();
    let root_rule = format.root();
    let root_path: ElementPath = std::iter::once(root_rule.step.to_string()).collect();

    // Heuristic classification already required the expected local name.
    if hint.basis() == ClassificationBasis::Namespace
        && !root_rule.step.matches(root.name(), NameMatch::Qualified)
    {
        report.push(
            root_rule.id,
            root_rule.description,
            root_path.clone(),
            format!("expected {}, found `{}`", root_rule.step, root.name()),
        )?;
    }

    for rule in format.rules() {
        if rule.scope == RuleScope::LineItems && !identification.has_line_items() {
            tracing::trace!(rule = rule.id, target = %rule.target, "skipping line item rule");
            continue;
        }
        tracing::trace!(rule = rule.id, target = %rule.target, "evaluating structural rule");
        check_rule(rule, root, &root_path, mode, report)?;
    }
    ControlFlow::Continue(())
}

fn check_rule(
    rule: &Rule,
    root: &Element,
    root_path: &ElementPath,
    mode: NameMatch,
    report: &mut Report,
) -> ControlFlow<()> {
    let mut frontier = vec![(root, root_path.clone())];
    for step in rule.parent {
        let mut next = Vec::new();
        for (element, path) in frontier {
            let found: Vec<&Element> = step.select(element, mode).collect();
            if found.is_empty() && rule.cardinality.requires_presence() {
                report.push(
                    rule.id,
                    rule.description,
                    path.child(step.to_string()),
                    format!("expected {step}, found none"),
                )?;
            }
            let repeated = found.len() > 1;
            for (index, child) in found.into_iter().enumerate() {
                let position = repeated.then_some(index + 1);
                next.push((child, path.child(step.segment(position))));
            }
        }
        frontier = next;
    }

    for (element, path) in frontier {
        let found: Vec<&Element> = rule.target.select(element, mode).collect();
        if !rule.cardinality.admits(found.len()) {
            report.push(
                rule.id,
                rule.description,
                path.child(rule.target.to_string()),
                format!(
                    "expected {} {}, found {}",
                    rule.cardinality.describe(),
                    rule.target,
                    found.len()
                ),
            )?;
            continue;
        }
        if !rule.requires_text {
            continue;
        }
        let repeated = found.len() > 1;
        for (index, target) in found.into_iter().enumerate() {
            if target.text().is_empty() {
                let position = repeated.then_some(index + 1);
                report.push(
                    rule.id,
                    rule.description,
                    path.child(rule.target.segment(position)),
                    "element is empty".to_string(),
                )?;
            }
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::invoice::classify::classify;
    use crate::invoice::StandardTag;
    use crate::invoice::identification::validate_identification;
    use crate::invoice::xml::load;

    const UBL_INVOICE: &str = include_str!("../../tests/fixtures/ubl/xrechnung-invoice.xml");
    const UBL_CREDIT_NOTE: &str = include_str!("../../tests/fixtures/ubl/peppol-credit-note.xml");
    const CII_INVOICE: &str = include_str!("../../tests/fixtures/cii/facturx-en16931.xml");

    fn check(xml: &str, policy: StructuralPolicy) -> Result<(), ValidationError> {
        let config = ValidationConfig::default()
            .allow_customization_id(StandardTag::Cii, "urn:factur-x.eu:1p0:minimum");
        let document = load(xml.as_bytes(), config.load_limits())?;
        let hint = classify(&document)?;
        let identification = validate_identification(&document, &hint, &config)?;
        validate_structure(&document, &hint, &identification, policy)
    }

    fn violations_of(result: Result<(), ValidationError>) -> (RuleViolation, Vec<RuleViolation>) {
        match result {
            Err(ValidationError::StructuralViolation {
                violation,
                additional,
                ..
            }) => (violation, additional),
            other => panic!("expected a structural violation, got {other:?}"),
        }
    }

    #[test]
    fn complete_documents_pass() {
        check(UBL_INVOICE, StructuralPolicy::FailFast).expect("ubl invoice");
        check(UBL_CREDIT_NOTE, StructuralPolicy::FailFast).expect("ubl credit note");
        check(CII_INVOICE, StructuralPolicy::CollectAll).expect("cii invoice");
    }

    #[test]
    fn missing_monetary_total_names_the_block() {
        let xml = UBL_INVOICE.replace("LegalMonetaryTotal>", "MonetaryTotal>");
        let (violation, additional) = violations_of(check(&xml, StructuralPolicy::FailFast));
        assert_eq!(violation.rule_id, "BR-12");
        assert_eq!(violation.path.to_string(), "/ubl:Invoice/cac:LegalMonetaryTotal");
        assert!(additional.is_empty());
    }

    #[test]
    fn repeated_lines_are_indexed() {
        let xml = UBL_INVOICE.replace("<cbc:Name>Muttern M8</cbc:Name>", "<cbc:Name> </cbc:Name>");
        let (violation, _) = violations_of(check(&xml, StructuralPolicy::FailFast));
        assert_eq!(violation.rule_id, "BR-25");
        assert_eq!(
            violation.path.to_string(),
            "/ubl:Invoice/cac:InvoiceLine[2]/cac:Item/cbc:Name"
        );
        assert_eq!(violation.detail, "element is empty");
    }

    #[test]
    fn duplicate_blocks_break_cardinality() {
        let xml = UBL_INVOICE.replace(
            "<cbc:DocumentCurrencyCode>EUR</cbc:DocumentCurrencyCode>",
            "<cbc:DocumentCurrencyCode>EUR</cbc:DocumentCurrencyCode><cbc:DocumentCurrencyCode>USD</cbc:DocumentCurrencyCode>",
        );
        let (violation, _) = violations_of(check(&xml, StructuralPolicy::FailFast));
        assert_eq!(violation.rule_id, "BR-05");
        assert_eq!(
            violation.detail,
            "expected exactly one cbc:DocumentCurrencyCode, found 2"
        );
    }

    #[test]
    fn collect_all_reports_every_violation_in_rule_order() {
        let xml = UBL_INVOICE
            .replace("<cbc:IssueDate>2024-03-15</cbc:IssueDate>", "")
            .replace("<cbc:PayableAmount currencyID=\"EUR\">238.00</cbc:PayableAmount>", "");
        let (violation, additional) = violations_of(check(&xml, StructuralPolicy::CollectAll));
        assert_eq!(violation.rule_id, "BR-03");
        let ids: Vec<_> = additional.iter().map(|v| v.rule_id).collect();
        assert_eq!(ids, ["BR-15"]);

        let (violation, additional) = violations_of(check(&xml, StructuralPolicy::FailFast));
        assert_eq!(violation.rule_id, "BR-03");
        assert!(additional.is_empty());
    }

    #[test]
    fn cii_without_line_items_fails() {
        let xml = include_str!("../../tests/fixtures/cii/missing-line-items.xml");
        let (violation, additional) = violations_of(check(xml, StructuralPolicy::CollectAll));
        assert_eq!(violation.rule_id, "BR-16");
        assert_eq!(
            violation.path.to_string(),
            "/rsm:CrossIndustryInvoice/rsm:SupplyChainTradeTransaction/ram:IncludedSupplyChainTradeLineItem"
        );
        assert!(additional.is_empty(), "{additional:?}");
    }

    #[test]
    fn header_only_profiles_skip_line_rules() {
        let xml = include_str!("../../tests/fixtures/cii/missing-line-items.xml")
            .replace("urn:cen.eu:en16931:2017", "urn:factur-x.eu:1p0:minimum");
        check(&xml, StructuralPolicy::FailFast).expect("minimum profile");
    }

    #[test]
    fn namespace_classified_root_must_match() {
        let xml = UBL_INVOICE.replace("ubl:Invoice", "ubl:Rechnung");
        let (violation, _) = violations_of(check(&xml, StructuralPolicy::FailFast));
        assert_eq!(violation.rule_id, "UBL-ROOT");
        assert_eq!(violation.path.to_string(), "/ubl:Invoice");
    }

    #[test]
    fn heuristic_documents_match_local_names() {
        let xml = UBL_INVOICE.replace(
            "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2",
            "urn:example:legacy-invoice",
        );
        check(&xml, StructuralPolicy::FailFast).expect("heuristic ubl");
    }
}
