pub(crate) const UBL_INVOICE_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub(crate) const UBL_CREDIT_NOTE_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
pub(crate) const CBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub(crate) const CAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";

pub(crate) const CII_RSM_NS: &str =
    "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
pub(crate) const CII_RAM_NS: &str =
    "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
pub(crate) const CII_UDT_NS: &str =
    "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";

pub(crate) const UBL_INVOICE_ROOT: &str = "Invoice";
pub(crate) const UBL_CREDIT_NOTE_ROOT: &str = "CreditNote";
pub(crate) const CII_ROOT: &str = "CrossIndustryInvoice";

/// Root children that only appear in UBL documents.
pub(crate) const UBL_MARKERS: &[&str] = &[
    "UBLVersionID",
    "CustomizationID",
    "ProfileID",
    "AccountingSupplierParty",
    "LegalMonetaryTotal",
    "InvoiceLine",
    "CreditNoteLine",
];

/// Root children that only appear in CII documents.
pub(crate) const CII_MARKERS: &[&str] = &[
    "ExchangedDocumentContext",
    "ExchangedDocument",
    "SupplyChainTradeTransaction",
];
