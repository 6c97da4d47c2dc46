//! # conciliador
//!
//! Brazilian fiscal reconciliation: the SPED EFD ICMS/IPI bookkeeping file
//! against the source NF-e (merchandise) and CT-e (transport) XML documents,
//! producing per-document and per-line discrepancy classifications across
//! ICMS, ICMS-ST, IPI, FCP-ST, monophasic ICMS, PIS and COFINS, plus
//! CFOP/CST totalizers.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! The 44-character document key is the sole join key between the two
//! sources; amount comparisons use an inclusive absolute tolerance supplied
//! by the caller.
//!
//! ## Quick start
//!
//! ```no_run
//! use conciliador::pipeline::{ObservadorSilencioso, RunConfig, executar_analise};
//! use rust_decimal_macros::dec;
//!
//! let config = RunConfig {
//!     caminho_sped: "sped_efd.txt".into(),
//!     pasta_xmls: "xmls/".into(),
//!     caminho_regras: "acumuladores.csv".into(),
//!     caminho_regras_ncm: None,
//!     pasta_saida: "saida/".into(),
//!     tolerancia: dec!(0.02),
//!     cfop_sem_credito_icms: vec![],
//!     cfop_sem_credito_ipi: vec![],
//!     regras_cliente: Default::default(),
//! };
//! executar_analise(&config, &mut ObservadorSilencioso);
//! ```

pub mod core;
pub mod export;
pub mod pipeline;
pub mod recon;
pub mod rules;
pub mod sped;
pub mod xml;

// Re-export core types at crate root for convenience
pub use crate::core::*;
