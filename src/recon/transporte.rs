use std::collections::{BTreeSet, HashMap};

use log::info;
use rust_decimal::Decimal;

use crate::core::{
    CteReconRecord, CteSpedAnalitico, CteTotais, Situacao, Status, dentro_da_tolerancia,
};

/// Aggregated SPED side of one transport document.
#[derive(Default)]
struct AgregadoSped {
    vl_opr: Decimal,
    vl_bc_icms: Decimal,
    vl_icms: Decimal,
    cfops: BTreeSet<String>,
}

/// Reconcile the SPED D190 rows against the CT-e XML totals, joined by
/// document key. The result keeps one row per original D190 register,
/// carrying the document-level statuses computed over the aggregated sums.
pub fn conciliar_cte(
    analiticos_cte: &[CteSpedAnalitico],
    cte_totais: &[CteTotais],
    tolerancia: Decimal,
) -> Vec<CteReconRecord> {
    info!(
        "conciliando {} registros D190 com {} CT-e XML",
        analiticos_cte.len(),
        cte_totais.len()
    );

    let mut agregados: HashMap<&str, AgregadoSped> = HashMap::new();
    for linha in analiticos_cte {
        let agregado = agregados.entry(linha.chave.as_str()).or_default();
        agregado.vl_opr += linha.vl_opr;
        agregado.vl_bc_icms += linha.vl_bc_icms;
        agregado.vl_icms += linha.vl_icms;
        if !linha.cfop.is_empty() {
            agregado.cfops.insert(linha.cfop.clone());
        }
    }

    let xml_por_chave: HashMap<&str, &CteTotais> =
        cte_totais.iter().map(|t| (t.chave.as_str(), t)).collect();

    // Document-level verdicts, computed once per key.
    let mut verdictos: HashMap<&str, (Situacao, Status, Status, Status, Status)> = HashMap::new();
    for (chave, agregado) in &agregados {
        let Some(xml) = xml_por_chave.get(*chave) else {
            verdictos.insert(
                *chave,
                (
                    Situacao::FaltaXml,
                    Status::NaoAplicavel,
                    Status::NaoAplicavel,
                    Status::NaoAplicavel,
                    Status::NaoAplicavel,
                ),
            );
            continue;
        };

        let status_valor = comparar(xml.vl_total, agregado.vl_opr, tolerancia);
        let status_bc = comparar(xml.vl_bc_icms, agregado.vl_bc_icms, tolerancia);
        let status_icms = comparar(xml.vl_icms, agregado.vl_icms, tolerancia);

        let cfop_agregado = agregado.cfops.iter().cloned().collect::<Vec<_>>().join("/");
        let status_cfop = if agregado.cfops.len() > 1 {
            Status::Revisar
        } else if xml.cfop == cfop_agregado {
            Status::Ok
        } else {
            Status::Divergente
        };

        verdictos.insert(
            *chave,
            (Situacao::Ok, status_valor, status_bc, status_icms, status_cfop),
        );
    }

    let mut saida = Vec::with_capacity(analiticos_cte.len());
    for linha in analiticos_cte {
        let (situacao, status_valor, status_bc_icms, status_icms, status_cfop) = verdictos
            .get(linha.chave.as_str())
            .copied()
            .unwrap_or((
                Situacao::FaltaXml,
                Status::NaoAplicavel,
                Status::NaoAplicavel,
                Status::NaoAplicavel,
                Status::NaoAplicavel,
            ));
        let xml = xml_por_chave.get(linha.chave.as_str()).copied();

        saida.push(CteReconRecord {
            chave: linha.chave.clone(),
            cst_sped: linha.cst_icms.clone(),
            cfop_sped: linha.cfop.clone(),
            aliq_sped: linha.aliq_icms,
            vl_opr_sped: linha.vl_opr,
            vl_bc_icms_sped: linha.vl_bc_icms,
            vl_icms_sped: linha.vl_icms,
            situacao,
            status_valor,
            status_bc_icms,
            status_icms,
            status_cfop,
            num_cte_xml: xml.map(|x| x.num_cte.clone()).unwrap_or_default(),
            cfop_xml: xml.map(|x| x.cfop.clone()).unwrap_or_default(),
            cst_xml: xml.map(|x| x.cst.clone()).unwrap_or_default(),
            vl_total_xml: xml.map(|x| x.vl_total).unwrap_or_default(),
            vl_bc_icms_xml: xml.map(|x| x.vl_bc_icms).unwrap_or_default(),
            vl_icms_xml: xml.map(|x| x.vl_icms).unwrap_or_default(),
            aliq_icms_xml: xml.map(|x| x.aliq_icms).unwrap_or_default(),
            cnpj_transportador: xml.map(|x| x.cnpj_transportador.clone()).unwrap_or_default(),
            ie_transportador: xml.map(|x| x.ie_transportador.clone()).unwrap_or_default(),
            uf_emitente: xml.map(|x| x.uf_emitente.clone()).unwrap_or_default(),
            remetente_nome: xml.map(|x| x.remetente_nome.clone()).unwrap_or_default(),
            destinatario_nome: xml.map(|x| x.destinatario_nome.clone()).unwrap_or_default(),
            tomador_cnpj: xml.map(|x| x.tomador_cnpj.clone()).unwrap_or_default(),
            tomador_nome: xml.map(|x| x.tomador_nome.clone()).unwrap_or_default(),
            mun_origem: xml.map(|x| x.mun_origem.clone()).unwrap_or_default(),
            mun_destino: xml.map(|x| x.mun_destino.clone()).unwrap_or_default(),
            item_predominante: xml.map(|x| x.item_predominante.clone()).unwrap_or_default(),
        });
    }

    saida
}

fn comparar(xml: Decimal, sped: Decimal, tolerancia: Decimal) -> Status {
    if dentro_da_tolerancia(xml, sped, tolerancia) {
        Status::Ok
    } else {
        Status::Divergente
    }
}
