use std::collections::{BTreeMap, HashSet};

use log::{info, warn};
use rust_decimal::Decimal;

use crate::core::{BaseDifalRow, SpedAnalitico, TotalizadorRow, descricao_cst};

#[derive(Default)]
struct Acumulado {
    chaves: HashSet<String>,
    vl_opr: Decimal,
    vl_bc_icms: Decimal,
    vl_icms: Decimal,
    vl_bc_icms_st: Decimal,
    vl_icms_st: Decimal,
    vl_ipi: Decimal,
}

/// Group the merged analytic dataset by (CFOP, CST, declared rate) and total
/// each tax column. The effective rate is recomputed from the merged sums —
/// never averaged from the input rows.
pub fn totalizar(analiticos: &[SpedAnalitico]) -> Vec<TotalizadorRow> {
    if analiticos.is_empty() {
        warn!("conjunto analítico vazio; totalizadores não calculados");
        return Vec::new();
    }

    let mut grupos: BTreeMap<(String, String, Decimal), Acumulado> = BTreeMap::new();
    for linha in analiticos {
        let chave_grupo = (
            linha.cfop.trim().to_string(),
            linha.cst_icms.trim().to_string(),
            linha.aliq_icms,
        );
        let acumulado = grupos.entry(chave_grupo).or_default();
        acumulado.chaves.insert(linha.chave.clone());
        acumulado.vl_opr += linha.vl_opr;
        acumulado.vl_bc_icms += linha.vl_bc_icms;
        acumulado.vl_icms += linha.vl_icms;
        acumulado.vl_bc_icms_st += linha.vl_bc_icms_st;
        acumulado.vl_icms_st += linha.vl_icms_st;
        acumulado.vl_ipi += linha.vl_ipi;
    }

    info!("{} grupos (CFOP, CST, alíquota) totalizados", grupos.len());

    grupos
        .into_iter()
        .map(|((cfop, cst, aliquota), acumulado)| {
            let denominador = acumulado.vl_opr - acumulado.vl_ipi - acumulado.vl_icms_st;
            let aliquota_efetiva = if denominador > Decimal::ZERO {
                (acumulado.vl_icms / denominador * Decimal::ONE_HUNDRED).round_dp(2)
            } else {
                Decimal::ZERO
            };

            TotalizadorRow {
                descricao_cst: descricao_cst(&cst),
                cfop,
                cst,
                aliquota,
                aliquota_efetiva,
                total_operacao: acumulado.vl_opr.round_dp(2),
                base_icms: acumulado.vl_bc_icms.round_dp(2),
                total_icms: acumulado.vl_icms.round_dp(2),
                base_icms_st: acumulado.vl_bc_icms_st.round_dp(2),
                total_icms_st: acumulado.vl_icms_st.round_dp(2),
                total_ipi: acumulado.vl_ipi.round_dp(2),
                qtd_documentos: acumulado.chaves.len(),
            }
        })
        .collect()
}

/// Split totalizer rows into inbound (CFOP 1/2/3) and outbound (5/6/7).
pub fn dividir_entradas_saidas(
    linhas: Vec<TotalizadorRow>,
) -> (Vec<TotalizadorRow>, Vec<TotalizadorRow>) {
    let mut entradas = Vec::new();
    let mut saidas = Vec::new();
    for linha in linhas {
        match linha.cfop.as_bytes().first() {
            Some(b'1') | Some(b'2') | Some(b'3') => entradas.push(linha),
            Some(b'5') | Some(b'6') | Some(b'7') => saidas.push(linha),
            _ => {}
        }
    }
    (entradas, saidas)
}

/// ICMS base per CFOP restricted to documents bearing the rate-differential
/// marker register; downstream worksheets abate this base.
pub fn base_difal_por_cfop(
    analiticos: &[SpedAnalitico],
    chaves_difal: &HashSet<String>,
) -> Vec<BaseDifalRow> {
    if chaves_difal.is_empty() {
        return Vec::new();
    }

    let mut bases: BTreeMap<String, Decimal> = BTreeMap::new();
    for linha in analiticos {
        if chaves_difal.contains(&linha.chave) {
            *bases.entry(linha.cfop.clone()).or_default() += linha.vl_bc_icms;
        }
    }

    bases
        .into_iter()
        .map(|(cfop, valor_base)| BaseDifalRow {
            cfop,
            valor_base: valor_base.round_dp(2),
        })
        .collect()
}
