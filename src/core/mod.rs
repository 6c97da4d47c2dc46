//! Shared record types, status model, and fiscal-code tables.
//!
//! Everything downstream of the two parsers speaks these types; monetary
//! values are always [`rust_decimal::Decimal`], never floating point.

pub mod cfop;
mod cst;
mod error;
mod status;
mod types;

pub use cfop::{cfop_equivalente_entrada, conferir_cfop, conferir_cfop_item, juntar_cfops};
pub use cst::descricao_cst;
pub use error::*;
pub use status::*;
pub use types::*;
