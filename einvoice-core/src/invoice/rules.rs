//! Structural rule tables for each supported standard.
//!
//! Rule identifiers follow EN 16931 (`BR-xx`) where a business rule covers the
//! requirement; `UBL-ROOT` and `CII-ROOT` are syntax checks of the root element.
use std::fmt;

use crate::invoice::xml::constants::{
    CAC_NS, CBC_NS, CII_RAM_NS, CII_ROOT, CII_RSM_NS, CII_UDT_NS, UBL_CREDIT_NOTE_NS,
    UBL_CREDIT_NOTE_ROOT, UBL_INVOICE_NS, UBL_INVOICE_ROOT,
};
use crate::invoice::xml::{Element, QualifiedName};
use crate::invoice::{StandardTag, UblDocumentKind};

use Cardinality::{AtLeastOne, ExactlyOne};

/// How element names are compared against rule steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Namespace URI and local name must both match.
    Qualified,
    /// Only the local name is compared; used when the document namespaces are unreliable.
    LocalOnly,
}

/// One element name in a rule path, with the conventional prefix used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub prefix: &'static str,
    pub namespace: &'static str,
    pub local_name: &'static str,
}

impl Step {
    pub const fn new(
        prefix: &'static str,
        namespace: &'static str,
        local_name: &'static str,
    ) -> Self {
        Self {
            prefix,
            namespace,
            local_name,
        }
    }

    pub fn matches(&self, name: &QualifiedName, mode: NameMatch) -> bool {
        name.local_name() == self.local_name
            && match mode {
                NameMatch::Qualified => name.namespace().is(self.namespace),
                NameMatch::LocalOnly => true,
            }
    }

    /// Children of `parent` named by this step, in document order.
    pub fn select<'a>(
        self,
        parent: &'a Element,
        mode: NameMatch,
    ) -> impl Iterator<Item = &'a Element> {
        parent
            .children()
            .iter()
            .filter(move |child| self.matches(child.name(), mode))
    }

    /// Diagnostic segment, with a 1-based position when the element repeats.
    pub fn segment(&self, position: Option<usize>) -> String {
        match position {
            Some(position) => format!("{self}[{position}]"),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ExactlyOne,
    AtLeastOne,
    AtMostOne,
}

impl Cardinality {
    pub fn admits(&self, count: usize) -> bool {
        match self {
            Cardinality::ExactlyOne => count == 1,
            Cardinality::AtLeastOne => count >= 1,
            Cardinality::AtMostOne => count <= 1,
        }
    }

    pub fn requires_presence(&self) -> bool {
        !matches!(self, Cardinality::AtMostOne)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Cardinality::ExactlyOne => "exactly one",
            Cardinality::AtLeastOne => "at least one",
            Cardinality::AtMostOne => "at most one",
        }
    }
}

/// Which documents a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Always,
    /// Skipped for profiles that carry no line items.
    LineItems,
}

/// `target` must occur with `cardinality` below every element reached by `parent`
/// (a path relative to the root element).
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    pub parent: &'static [Step],
    pub target: Step,
    pub cardinality: Cardinality,
    /// Every matched target must have non-empty text content.
    pub requires_text: bool,
    pub scope: RuleScope,
}

/// Expected root element of a document format.
#[derive(Debug, Clone, Copy)]
pub struct RootRule {
    pub id: &'static str,
    pub description: &'static str,
    pub step: Step,
}

const fn rule(
    id: &'static str,
    description: &'static str,
    parent: &'static [Step],
    target: Step,
    cardinality: Cardinality,
) -> Rule {
    Rule {
        id,
        description,
        parent,
        target,
        cardinality,
        requires_text: false,
        scope: RuleScope::Always,
    }
}

const fn value(
    id: &'static str,
    description: &'static str,
    parent: &'static [Step],
    target: Step,
) -> Rule {
    Rule {
        requires_text: true,
        ..rule(id, description, parent, target, Cardinality::ExactlyOne)
    }
}

const fn line_rule(rule: Rule) -> Rule {
    Rule {
        scope: RuleScope::LineItems,
        ..rule
    }
}

// UBL
const fn cbc(local_name: &'static str) -> Step {
    Step::new("cbc", CBC_NS, local_name)
}

const fn cac(local_name: &'static str) -> Step {
    Step::new("cac", CAC_NS, local_name)
}

pub(crate) const UBL_INVOICE: Step = Step::new("ubl", UBL_INVOICE_NS, UBL_INVOICE_ROOT);
pub(crate) const UBL_CREDIT_NOTE: Step =
    Step::new("ubl", UBL_CREDIT_NOTE_NS, UBL_CREDIT_NOTE_ROOT);
pub(crate) const UBL_CUSTOMIZATION_ID: Step = cbc("CustomizationID");
pub(crate) const UBL_PROFILE_ID: Step = cbc("ProfileID");
pub(crate) const UBL_VERSION_ID: Step = cbc("UBLVersionID");

const SUPPLIER: Step = cac("AccountingSupplierParty");
const CUSTOMER: Step = cac("AccountingCustomerParty");
const PARTY: Step = cac("Party");
const LEGAL_ENTITY: Step = cac("PartyLegalEntity");
const POSTAL_ADDRESS: Step = cac("PostalAddress");
const COUNTRY: Step = cac("Country");
const MONETARY_TOTAL: Step = cac("LegalMonetaryTotal");
const INVOICE_LINE: Step = cac("InvoiceLine");
const CREDIT_NOTE_LINE: Step = cac("CreditNoteLine");
const ITEM: Step = cac("Item");
const PRICE: Step = cac("Price");

macro_rules! ubl_rules {
    ($type_code:expr, $line:expr, $quantity:expr) => {
        [
            rule("BR-01", "A document shall have a specification identifier", &[], UBL_CUSTOMIZATION_ID, ExactlyOne),
            value("BR-02", "A document shall have a document number", &[], cbc("ID")),
            value("BR-03", "A document shall have an issue date", &[], cbc("IssueDate")),
            value("BR-04", "A document shall have a type code", &[], $type_code),
            value("BR-05", "A document shall have a currency code", &[], cbc("DocumentCurrencyCode")),
            rule("BR-06", "A document shall contain the seller", &[], SUPPLIER, ExactlyOne),
            rule("BR-06", "A document shall contain the seller", &[SUPPLIER], PARTY, ExactlyOne),
            value("BR-06", "A document shall contain the seller name", &[SUPPLIER, PARTY, LEGAL_ENTITY], cbc("RegistrationName")),
            rule("BR-08", "A document shall contain the seller postal address", &[SUPPLIER, PARTY], POSTAL_ADDRESS, ExactlyOne),
            value("BR-09", "The seller postal address shall contain a country code", &[SUPPLIER, PARTY, POSTAL_ADDRESS, COUNTRY], cbc("IdentificationCode")),
            rule("BR-07", "A document shall contain the buyer", &[], CUSTOMER, ExactlyOne),
            rule("BR-07", "A document shall contain the buyer", &[CUSTOMER], PARTY, ExactlyOne),
            value("BR-07", "A document shall contain the buyer name", &[CUSTOMER, PARTY, LEGAL_ENTITY], cbc("RegistrationName")),
            rule("BR-10", "A document shall contain the buyer postal address", &[CUSTOMER, PARTY], POSTAL_ADDRESS, ExactlyOne),
            value("BR-11", "The buyer postal address shall contain a country code", &[CUSTOMER, PARTY, POSTAL_ADDRESS, COUNTRY], cbc("IdentificationCode")),
            rule("BR-12", "A document shall contain the document totals", &[], MONETARY_TOTAL, ExactlyOne),
            value("BR-12", "A document shall have the sum of line net amounts", &[MONETARY_TOTAL], cbc("LineExtensionAmount")),
            value("BR-13", "A document shall have the total amount without VAT", &[MONETARY_TOTAL], cbc("TaxExclusiveAmount")),
            value("BR-14", "A document shall have the total amount with VAT", &[MONETARY_TOTAL], cbc("TaxInclusiveAmount")),
            value("BR-15", "A document shall have the amount due for payment", &[MONETARY_TOTAL], cbc("PayableAmount")),
            rule("BR-16", "A document shall have at least one line", &[], $line, AtLeastOne),
            value("BR-21", "Each line shall have a line identifier", &[$line], cbc("ID")),
            value("BR-22", "Each line shall have an invoiced quantity", &[$line], $quantity),
            value("BR-24", "Each line shall have a line net amount", &[$line], cbc("LineExtensionAmount")),
            rule("BR-25", "Each line shall contain the item", &[$line], ITEM, ExactlyOne),
            value("BR-25", "Each line shall contain the item name", &[$line, ITEM], cbc("Name")),
            rule("BR-26", "Each line shall contain the item price", &[$line], PRICE, ExactlyOne),
            value("BR-26", "Each line shall contain the item net price", &[$line, PRICE], cbc("PriceAmount")),
        ]
    };
}

static UBL_INVOICE_RULES: [Rule; 28] =
    ubl_rules!(cbc("InvoiceTypeCode"), INVOICE_LINE, cbc("InvoicedQuantity"));
static UBL_CREDIT_NOTE_RULES: [Rule; 28] =
    ubl_rules!(cbc("CreditNoteTypeCode"), CREDIT_NOTE_LINE, cbc("CreditedQuantity"));

// CII
const fn rsm(local_name: &'static str) -> Step {
    Step::new("rsm", CII_RSM_NS, local_name)
}

const fn ram(local_name: &'static str) -> Step {
    Step::new("ram", CII_RAM_NS, local_name)
}

pub(crate) const CII_INVOICE: Step = rsm(CII_ROOT);
pub(crate) const CII_CONTEXT: Step = rsm("ExchangedDocumentContext");
pub(crate) const CII_GUIDELINE: Step = ram("GuidelineSpecifiedDocumentContextParameter");
pub(crate) const CII_BUSINESS_PROCESS: Step =
    ram("BusinessProcessSpecifiedDocumentContextParameter");
pub(crate) const CII_ID: Step = ram("ID");

const DOCUMENT: Step = rsm("ExchangedDocument");
const ISSUE_DATE_TIME: Step = ram("IssueDateTime");
const TRANSACTION: Step = rsm("SupplyChainTradeTransaction");
const LINE_ITEM: Step = ram("IncludedSupplyChainTradeLineItem");
const LINE_DOCUMENT: Step = ram("AssociatedDocumentLineDocument");
const PRODUCT: Step = ram("SpecifiedTradeProduct");
const LINE_AGREEMENT: Step = ram("SpecifiedLineTradeAgreement");
const NET_PRICE: Step = ram("NetPriceProductTradePrice");
const LINE_DELIVERY: Step = ram("SpecifiedLineTradeDelivery");
const LINE_SETTLEMENT: Step = ram("SpecifiedLineTradeSettlement");
const LINE_SUMMATION: Step = ram("SpecifiedTradeSettlementLineMonetarySummation");
const AGREEMENT: Step = ram("ApplicableHeaderTradeAgreement");
const SELLER: Step = ram("SellerTradeParty");
const BUYER: Step = ram("BuyerTradeParty");
const DELIVERY: Step = ram("ApplicableHeaderTradeDelivery");
const SETTLEMENT: Step = ram("ApplicableHeaderTradeSettlement");
const SUMMATION: Step = ram("SpecifiedTradeSettlementHeaderMonetarySummation");

#[rustfmt::skip]
static CII_RULES: [Rule; 26] = [
    rule("BR-01", "A document shall have a specification identifier", &[], CII_CONTEXT, ExactlyOne),
    rule("BR-01", "A document shall have a specification identifier", &[CII_CONTEXT], CII_GUIDELINE, ExactlyOne),
    rule("CII-DOC", "A document shall contain the document header", &[], DOCUMENT, ExactlyOne),
    value("BR-02", "A document shall have a document number", &[DOCUMENT], CII_ID),
    value("BR-04", "A document shall have a type code", &[DOCUMENT], ram("TypeCode")),
    rule("BR-03", "A document shall have an issue date", &[DOCUMENT], ISSUE_DATE_TIME, ExactlyOne),
    value("BR-03", "A document shall have an issue date", &[DOCUMENT, ISSUE_DATE_TIME], Step::new("udt", CII_UDT_NS, "DateTimeString")),
    rule("CII-TXN", "A document shall contain the trade transaction", &[], TRANSACTION, ExactlyOne),
    line_rule(rule("BR-16", "A document shall have at least one line", &[TRANSACTION], LINE_ITEM, AtLeastOne)),
    line_rule(value("BR-21", "Each line shall have a line identifier", &[TRANSACTION, LINE_ITEM, LINE_DOCUMENT], ram("LineID"))),
    line_rule(value("BR-25", "Each line shall contain the item name", &[TRANSACTION, LINE_ITEM, PRODUCT], ram("Name"))),
    line_rule(value("BR-26", "Each line shall contain the item net price", &[TRANSACTION, LINE_ITEM, LINE_AGREEMENT, NET_PRICE], ram("ChargeAmount"))),
    line_rule(value("BR-22", "Each line shall have an invoiced quantity", &[TRANSACTION, LINE_ITEM, LINE_DELIVERY], ram("BilledQuantity"))),
    line_rule(value("BR-24", "Each line shall have a line net amount", &[TRANSACTION, LINE_ITEM, LINE_SETTLEMENT, LINE_SUMMATION], ram("LineTotalAmount"))),
    rule("CII-AGR", "A document shall contain the trade agreement", &[TRANSACTION], AGREEMENT, ExactlyOne),
    rule("BR-06", "A document shall contain the seller", &[TRANSACTION, AGREEMENT], SELLER, ExactlyOne),
    value("BR-06", "A document shall contain the seller name", &[TRANSACTION, AGREEMENT, SELLER], ram("Name")),
    rule("BR-07", "A document shall contain the buyer", &[TRANSACTION, AGREEMENT], BUYER, ExactlyOne),
    value("BR-07", "A document shall contain the buyer name", &[TRANSACTION, AGREEMENT, BUYER], ram("Name")),
    rule("CII-DLV", "A document shall contain the trade delivery", &[TRANSACTION], DELIVERY, ExactlyOne),
    rule("CII-STL", "A document shall contain the trade settlement", &[TRANSACTION], SETTLEMENT, ExactlyOne),
    value("BR-05", "A document shall have a currency code", &[TRANSACTION, SETTLEMENT], ram("InvoiceCurrencyCode")),
    rule("BR-12", "A document shall contain the document totals", &[TRANSACTION, SETTLEMENT], SUMMATION, ExactlyOne),
    value("BR-13", "A document shall have the total amount without VAT", &[TRANSACTION, SETTLEMENT, SUMMATION], ram("TaxBasisTotalAmount")),
    value("BR-14", "A document shall have the total amount with VAT", &[TRANSACTION, SETTLEMENT, SUMMATION], ram("GrandTotalAmount")),
    value("BR-15", "A document shall have the amount due for payment", &[TRANSACTION, SETTLEMENT, SUMMATION], ram("DuePayableAmount")),
];

/// Document format decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Ubl(UblDocumentKind),
    Cii,
}

impl DocumentFormat {
    pub fn standard(&self) -> StandardTag {
        match self {
            DocumentFormat::Ubl(_) => StandardTag::Ubl,
            DocumentFormat::Cii => StandardTag::Cii,
        }
    }

    pub fn root(&self) -> RootRule {
        match self {
            DocumentFormat::Ubl(UblDocumentKind::Invoice) => RootRule {
                id: "UBL-ROOT",
                description: "The root element shall match the document namespace",
                step: UBL_INVOICE,
            },
            DocumentFormat::Ubl(UblDocumentKind::CreditNote) => RootRule {
                id: "UBL-ROOT",
                description: "The root element shall match the document namespace",
                step: UBL_CREDIT_NOTE,
            },
            DocumentFormat::Cii => RootRule {
                id: "CII-ROOT",
                description: "The root element shall match the document namespace",
                step: CII_INVOICE,
            },
        }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            DocumentFormat::Ubl(UblDocumentKind::Invoice) => &UBL_INVOICE_RULES,
            DocumentFormat::Ubl(UblDocumentKind::CreditNote) => {
                &UBL_CREDIT_NOTE_RULES
            }
            DocumentFormat::Cii => &CII_RULES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::xml::Namespace;

    #[test]
    fn steps_match_by_mode() {
        let qualified = QualifiedName::new(Namespace::Uri(CBC_NS.into()), "ID");
        let bare = QualifiedName::new(Namespace::None, "ID");
        let step = cbc("ID");
        assert!(step.matches(&qualified, NameMatch::Qualified));
        assert!(!step.matches(&bare, NameMatch::Qualified));
        assert!(step.matches(&bare, NameMatch::LocalOnly));
        assert!(!cac("ID").matches(&qualified, NameMatch::Qualified));
    }

    #[test]
    fn cardinalities() {
        assert!(ExactlyOne.admits(1));
        assert!(!ExactlyOne.admits(0));
        assert!(!ExactlyOne.admits(2));
        assert!(AtLeastOne.admits(3));
        assert!(Cardinality::AtMostOne.admits(0));
        assert!(!Cardinality::AtMostOne.requires_presence());
    }

    #[test]
    fn credit_notes_use_credit_note_elements() {
        let rules = DocumentFormat::Ubl(UblDocumentKind::CreditNote).rules();
        assert!(rules.iter().any(|r| r.target.local_name == "CreditNoteTypeCode"));
        assert!(rules.iter().any(|r| r.target.local_name == "CreditedQuantity"));
        assert!(rules.iter().all(|r| r.target.local_name != "InvoiceLine"));
    }

    #[test]
    fn line_rules_are_scoped_in_cii_only() {
        assert!(
            DocumentFormat::Cii
                .rules()
                .iter()
                .filter(|r| r.id == "BR-16")
                .all(|r| r.scope == RuleScope::LineItems)
        );
        assert!(
            DocumentFormat::Ubl(UblDocumentKind::Invoice)
                .rules()
                .iter()
                .all(|r| r.scope == RuleScope::Always)
        );
    }
}
