//! NF-e (Nota Fiscal eletrônica) XML reading.
//!
//! Reads the supplier-issued document a purchase import starts from. Both the
//! authorized envelope (`nfeProc`, carrying `protNFe`) and a bare `NFe` root
//! are accepted; namespace prefixes are ignored.
//!
//! # Example
//!
//! ```no_run
//! use nfe_import::nfe;
//!
//! let xml = std::fs::read_to_string("35240312345678000190550010000001231000001230-nfe.xml").unwrap();
//! let invoice = nfe::from_nfe_xml(&xml).unwrap();
//! println!("{} lines from {}", invoice.lines.len(), invoice.header.counterparty.legal_name);
//! ```

mod parse;

pub use parse::from_nfe_xml;
