//! SPED EFD ICMS/IPI flat-file extraction.
//!
//! A single forward pass over the pipe-delimited register file. The parser is
//! a small finite-state machine: header-opening registers (C100, D100, C500,
//! D500) flush whatever document context is open and start a new one;
//! child registers feed the open context; end of input forces a final flush.

mod parser;

pub use parser::{SpedExtracao, extrair_sped};
