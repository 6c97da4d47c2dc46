//! Reconciliation: document headers, line items, transport documents, and
//! the CFOP/CST totalizers.
//!
//! The document key is the sole join key throughout. Status priority is
//! fixed: DIVERGENTE > REVISAR > OK, with N/A for dimensions that cannot be
//! evaluated.

mod engine;
mod itens;
mod totalizador;
mod transporte;

pub use engine::{
    ALIQUOTA_COFINS, ALIQUOTA_PIS, ParametrosConciliacao, conciliar_documentos, contar_problemas,
};
pub use itens::conciliar_itens;
pub use totalizador::{base_difal_por_cfop, dividir_entradas_saidas, totalizar};
pub use transporte::conciliar_cte;
