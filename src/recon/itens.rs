use std::collections::HashMap;

use log::info;
use rust_decimal::Decimal;

use super::engine::{ALIQUOTA_COFINS, ALIQUOTA_PIS};
use crate::core::{
    CFOP_SEM_SPED, ItemConciliado, NfeItem, ReconRecord, Situacao, SpedItem, Status, StatusGeral,
    conferir_cfop_item,
};
use crate::rules::{RegrasNcm, regime_pis_cofins};

/// Join XML lines to SPED lines by (key, sequence), prorate the header-only
/// SPED amounts onto each line, and optionally enrich from the NCM reference
/// table.
pub fn conciliar_itens(
    itens_xml: &[NfeItem],
    itens_sped: &[SpedItem],
    conciliacao: &[ReconRecord],
    regras_ncm: Option<&RegrasNcm>,
) -> Vec<ItemConciliado> {
    info!(
        "cruzando {} itens XML com {} itens SPED (C170)",
        itens_xml.len(),
        itens_sped.len()
    );

    let sped_por_chave: HashMap<(&str, i64), &SpedItem> = itens_sped
        .iter()
        .map(|item| ((item.chave.as_str(), sequencia(&item.n_item)), item))
        .collect();
    let recon_por_chave: HashMap<&str, &ReconRecord> = conciliacao
        .iter()
        .map(|registro| (registro.chave.as_str(), registro))
        .collect();

    let mut saida = Vec::with_capacity(itens_xml.len());

    for item in itens_xml {
        let n_item = sequencia(&item.n_item);
        let sped = sped_por_chave
            .get(&(item.chave.as_str(), n_item))
            .copied();
        let recon = recon_por_chave.get(item.chave.as_str()).copied();

        let cfop_sped_item = sped
            .map(|s| s.cfop.clone())
            .filter(|cfop| !cfop.is_empty())
            .unwrap_or_else(|| CFOP_SEM_SPED.to_string());
        let status_cfop_item = conferir_cfop_item(&item.cfop, &cfop_sped_item);

        let (produto_regra, st_regra, regime, mva_original) = match regras_ncm {
            Some(regras) => match regras.consultar(&item.ncm) {
                Some(regra) => (
                    regra.produto.clone(),
                    regra.st.clone(),
                    regime_pis_cofins(&regra.cst_pis_cofins),
                    regra.mva_original,
                ),
                None => (
                    String::new(),
                    String::new(),
                    regime_pis_cofins(""),
                    Decimal::ZERO,
                ),
            },
            None => (
                String::new(),
                String::new(),
                regime_pis_cofins(""),
                Decimal::ZERO,
            ),
        };

        let vl_doc_xml = recon.map(|r| r.vl_doc_xml).unwrap_or_default();
        let vl_doc_sped = recon.map(|r| r.vl_doc_sped).unwrap_or_default();

        // Header-only amounts are split across the lines by each line's
        // share of the declared document value.
        let proporcao = if vl_doc_xml > Decimal::ZERO {
            item.vlr_prod / vl_doc_xml
        } else {
            Decimal::ZERO
        };
        let prorratear = |total: Decimal| (total * proporcao).round_dp(2);

        let pis_calc = (item.bc_pis_cofins * ALIQUOTA_PIS).round_dp(2);
        let cofins_calc = (item.bc_pis_cofins * ALIQUOTA_COFINS).round_dp(2);

        saida.push(ItemConciliado {
            status_geral: recon.map(|r| r.status_geral).unwrap_or(StatusGeral::Ok),
            situacao: recon.map(|r| r.situacao).unwrap_or(Situacao::Ok),
            tipo_nota: recon.and_then(|r| r.tipo_nota),
            chave: item.chave.clone(),
            num_nf: recon.map(|r| r.num_nf.clone()).unwrap_or_default(),
            cnpj_emitente: item.cnpj_emitente.clone(),
            acumulador: recon.map(|r| r.acumulador.clone()).unwrap_or_default(),
            n_item,
            tipo_destinatario: item.tipo_destinatario,
            cod_prod: item.cod_prod.clone(),
            desc_prod: item.desc_prod.clone(),
            ncm: item.ncm.clone(),
            cest: item.cest.clone(),
            status_cfop_item,
            cfop_xml: item.cfop.clone(),
            cfop_sped_item,
            cst_icms_sped_item: sped.map(|s| s.cst_icms.clone()).unwrap_or_default(),
            status_valor: recon.map(|r| r.status_valor).unwrap_or(Status::NaoAplicavel),
            vl_doc_xml,
            vl_doc_sped,
            dif_valor_total: (vl_doc_xml - vl_doc_sped).round_dp(2),
            c_benef: item.c_benef.clone(),
            qtd: item.qtd,
            unid: item.unid.clone(),
            vlr_unit: item.vlr_unit,
            vlr_prod: item.vlr_prod,
            despesa: item.despesa,
            vlr_icms_total_item: (item.vlr_icms + item.vlr_icms_sn + item.vlr_icms_mono)
                .round_dp(2),
            vlr_bc_icms_xml: item.vlr_bc_icms,
            p_icms_xml: item.p_icms,
            vlr_ipi: item.vlr_ipi,
            vlr_icms_mono: item.vlr_icms_mono,
            bc_pis_cofins: item.bc_pis_cofins,
            vl_opr_sped_item: sped.map(|s| s.vl_opr).unwrap_or_default(),
            vl_bc_icms_sped_item: sped.map(|s| s.vl_bc_icms).unwrap_or_default(),
            vl_icms_sped_item: sped.map(|s| s.vl_icms).unwrap_or_default(),
            vl_bc_icms_st_sped_item: sped.map(|s| s.vl_bc_icms_st).unwrap_or_default(),
            vl_icms_st_sped_item: sped.map(|s| s.vl_icms_st).unwrap_or_default(),
            status_icms: recon.map(|r| r.status_icms).unwrap_or(Status::NaoAplicavel),
            icms_sped: prorratear(recon.map(|r| r.icms_sped).unwrap_or_default()),
            status_icms_st: recon
                .map(|r| r.status_icms_st)
                .unwrap_or(Status::NaoAplicavel),
            icms_st_xml: prorratear(recon.map(|r| r.icms_st_xml).unwrap_or_default()),
            icms_st_sped: prorratear(recon.map(|r| r.icms_st_sped).unwrap_or_default()),
            status_fcp_st: recon
                .map(|r| r.status_fcp_st)
                .unwrap_or(Status::NaoAplicavel),
            fcp_st_xml: prorratear(recon.map(|r| r.fcp_st_xml).unwrap_or_default()),
            fcp_st_sped: prorratear(recon.map(|r| r.fcp_st_sped).unwrap_or_default()),
            status_ipi: recon.map(|r| r.status_ipi).unwrap_or(Status::NaoAplicavel),
            ipi_sped_item: sped.map(|s| s.vl_ipi).unwrap_or_default(),
            status_pis: recon.map(|r| r.status_pis).unwrap_or(Status::NaoAplicavel),
            pis_calc,
            pis_sped: prorratear(recon.map(|r| r.pis_sped).unwrap_or_default()),
            status_cofins: recon
                .map(|r| r.status_cofins)
                .unwrap_or(Status::NaoAplicavel),
            cofins_calc,
            cofins_sped: prorratear(recon.map(|r| r.cofins_sped).unwrap_or_default()),
            produto_regra,
            st_regra,
            regime_pis_cofins: regime.rotulo().to_string(),
            mva_original,
        });
    }

    saida
}

/// Line sequences are joined as integers; absent or unparseable sequences
/// coerce to zero.
fn sequencia(n_item: &str) -> i64 {
    let texto = n_item.trim();
    texto
        .parse::<i64>()
        .ok()
        .or_else(|| {
            texto
                .parse::<f64>()
                .ok()
                .map(|flutuante| flutuante as i64)
        })
        .unwrap_or(0)
}
