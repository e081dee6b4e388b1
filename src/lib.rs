//! # notafiscal
//!
//! Engine for processing Brazilian fiscal-document archives: NF-e, NFC-e,
//! CT-e and NFSe XML plus SPED EFD ICMS/IPI text ledgers, bundled inside
//! arbitrarily nested compressed containers.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Malformed input is the normal case in this domain: individual documents
//! that cannot be parsed are absorbed as soft failures, never errors.
//!
//! ## Quick Start
//!
//! ```rust
//! use notafiscal::core::IdentitySet;
//! use notafiscal::extract::parse_fields;
//!
//! let xml = br#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
//!   <NFe><infNFe Id="NFe12345678901234567890123456789012345678901234">
//!     <ide><mod>55</mod><dhEmi>2024-06-15T10:00:00-03:00</dhEmi></ide>
//!     <emit><CNPJ>11222333000181</CNPJ></emit>
//!     <dest><CNPJ>99888777000166</CNPJ></dest>
//!   </infNFe></NFe></nfeProc>"#;
//!
//! let own = IdentitySet::new(["11.222.333/0001-81"]);
//! let fields = parse_fields(xml);
//! assert!(own.contains(fields.issuer.as_deref().unwrap_or("")));
//! assert_eq!(fields.key.as_deref().unwrap().len(), 44);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sevenz` (default) | `.7z` extraction via a pure Rust decoder |
//! | `rar` | `.rar` extraction via the native unrar library |
//!
//! Archive-format support is surfaced at runtime through
//! [`archive::ArchiveCapabilities::detect`]; extensions without a compiled-in
//! decoder degrade to "unrecognized file" handling instead of failing a run.

pub mod archive;
pub mod core;
pub mod extract;
pub mod nfse;
pub mod sped;
pub mod summary;
pub mod walker;

pub(crate) mod xmlquery;

// Re-export core types at crate root for convenience
pub use crate::core::*;
