//! Standard detection and validation for UBL and UN/CEFACT CII e-invoices.
//!
//! A document runs through a fixed pipeline: it is loaded into a
//! namespace-aware tree, classified by its root element, checked for the
//! standard's customization identifier and finally checked against the
//! standard's structural rules. The first failing stage decides the error.
//!
//! # Examples
//! ```rust
//! use einvoice_core::{ErrorKind, InvoiceValidator, StandardTag, ValidationConfig};
//!
//! let xml = r#"<rsm:CrossIndustryInvoice
//!     xmlns:rsm="urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100"
//!     xmlns:ram="urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100">
//!   <rsm:ExchangedDocumentContext>
//!     <ram:GuidelineSpecifiedDocumentContextParameter>
//!       <ram:ID>urn:factur-x.eu:1p0:minimum</ram:ID>
//!     </ram:GuidelineSpecifiedDocumentContextParameter>
//!   </rsm:ExchangedDocumentContext>
//! </rsm:CrossIndustryInvoice>"#;
//!
//! let validator = InvoiceValidator::new(ValidationConfig::default());
//! let err = validator.validate(xml).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::UnsupportedCustomization);
//!
//! let config = ValidationConfig::default()
//!     .allow_customization_id(StandardTag::Cii, "urn:factur-x.eu:1p0:minimum");
//! let err = InvoiceValidator::new(config).validate(xml).unwrap_err();
//! // Identification passed; the header blocks are still missing.
//! assert_eq!(err.kind(), ErrorKind::StructuralViolation);
//! ```
pub mod config;
pub mod engine;
pub mod invoice;

pub use config::{ConfigError, StructuralPolicy, ValidationConfig};
pub use engine::{InvoiceValidator, configure_global, validate_invoice};
pub use invoice::{
    CiiMetadata, CiiProfile, ElementPath, ErrorKind, InvoiceStandard, RuleViolation, StandardTag,
    UblDocumentKind, UblMetadata, ValidationError,
};
