//! Legal descriptions for ICMS tax-situation codes.
//!
//! Covers the CSOSN table (Simples Nacional) and the cross product of the
//! origin digit (0–8) with the standard-regime CST table.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Tabela B — standard regime, keyed by the two-digit CST.
const TRIBUTACAO_ICMS: [(&str, &str); 11] = [
    ("00", "00 - Tributada integralmente"),
    ("10", "10 - Tributada e com cobrança do ICMS por ST"),
    ("20", "20 - Com redução de base de cálculo"),
    ("30", "30 - Isenta/Não tributada e com cobrança do ICMS por ST"),
    ("40", "40 - Isenta"),
    ("41", "41 - Não tributada"),
    ("50", "50 - Suspensão"),
    ("51", "51 - Diferimento"),
    ("60", "60 - ICMS cobrado anteriormente por ST"),
    ("70", "70 - Com redução de BC e cobrança do ICMS por ST"),
    ("90", "90 - Outras"),
];

/// CSOSN — Simples Nacional.
const CSOSN: [(&str, &str); 10] = [
    ("101", "101 - Tributada pelo Simples Nacional com permissão de crédito"),
    ("102", "102 - Tributada pelo Simples Nacional sem permissão de crédito"),
    (
        "103",
        "103 - Isenção do ICMS no Simples Nacional (faixa de receita)",
    ),
    (
        "201",
        "201 - Tributada pelo Simples Nacional com permissão de crédito e com ST",
    ),
    (
        "202",
        "202 - Tributada pelo Simples Nacional sem permissão de crédito e com ST",
    ),
    (
        "203",
        "203 - Isenção do ICMS no Simples Nacional (faixa de receita) e com ST",
    ),
    ("300", "300 - Imune"),
    ("400", "400 - Não tributada pelo Simples Nacional"),
    (
        "500",
        "500 - ICMS cobrado anteriormente por ST (substituto) ou antecipação",
    ),
    ("900", "900 - Outros"),
];

static DESCRICOES: LazyLock<BTreeMap<String, &'static str>> = LazyLock::new(|| {
    let mut mapa = BTreeMap::new();
    for (codigo, descricao) in CSOSN {
        mapa.insert(codigo.to_string(), descricao);
    }
    // Origin digit 0–8 prefixed onto each standard-regime CST; CSOSN keys
    // already inserted take precedence.
    for origem in 0..9 {
        for (cst, descricao) in TRIBUTACAO_ICMS {
            mapa.entry(format!("{origem}{cst}")).or_insert(descricao);
        }
    }
    mapa
});

/// Legal description for a full tax-situation code; unknown codes echo back
/// unchanged.
pub fn descricao_cst(codigo: &str) -> String {
    let limpo = codigo.trim();
    DESCRICOES
        .get(limpo)
        .map(|d| d.to_string())
        .unwrap_or_else(|| limpo.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descricoes_conhecidas() {
        assert_eq!(descricao_cst("000"), "00 - Tributada integralmente");
        assert_eq!(descricao_cst("860"), "60 - ICMS cobrado anteriormente por ST");
        assert_eq!(
            descricao_cst("102"),
            "102 - Tributada pelo Simples Nacional sem permissão de crédito"
        );
    }

    #[test]
    fn codigo_desconhecido_ecoa() {
        assert_eq!(descricao_cst("999"), "999");
        assert_eq!(descricao_cst(" 040 "), "40 - Isenta");
    }
}
