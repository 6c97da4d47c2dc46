use std::collections::{HashMap, HashSet};

use log::info;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::{
    NfeItem, NfeTotais, ReconRecord, Situacao, SpedDocumento, Status, StatusGeral, conferir_cfop,
    consolidar_status, dentro_da_tolerancia,
};
use crate::rules::{ACUMULADOR_REVISAR, RegrasAcumuladores};

/// Fixed PIS rate applied to the recomputed taxable base.
pub const ALIQUOTA_PIS: Decimal = dec!(0.0165);
/// Fixed COFINS rate applied to the recomputed taxable base.
pub const ALIQUOTA_COFINS: Decimal = dec!(0.0760);

/// Caller-supplied knobs for the document-level reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ParametrosConciliacao {
    /// Inclusive absolute tolerance for every amount comparison.
    pub tolerancia: Decimal,
    /// CFOPs whose ICMS never generates credit; divergences there are
    /// expected and read as OK.
    pub cfop_sem_credito_icms: Vec<String>,
    /// Same carve-out for IPI.
    pub cfop_sem_credito_ipi: Vec<String>,
    /// Client booked under Simples Nacional: PIS/COFINS are not recomputed.
    pub nao_calcular_pis_cofins: bool,
    /// Client requires every reconciled document to resolve an accumulator.
    pub exigir_acumulador: bool,
}

/// Full outer join of the XML merchandise headers and the SPED headers by
/// document key, with one status per dimension and the overall rollup.
pub fn conciliar_documentos(
    nfe_totais: &[NfeTotais],
    sped_documentos: &[SpedDocumento],
    nfe_itens: &[NfeItem],
    regras: &RegrasAcumuladores,
    parametros: &ParametrosConciliacao,
) -> Vec<ReconRecord> {
    info!(
        "cruzando {} documentos XML com {} documentos SPED",
        nfe_totais.len(),
        sped_documentos.len()
    );

    let xml_por_chave: HashMap<&str, &NfeTotais> =
        nfe_totais.iter().map(|t| (t.chave.as_str(), t)).collect();
    let sped_por_chave: HashMap<&str, &SpedDocumento> = sped_documentos
        .iter()
        .map(|d| (d.chave.as_str(), d))
        .collect();

    // Σ of the line PIS/COFINS bases per key.
    let mut bases: HashMap<&str, Decimal> = HashMap::new();
    for item in nfe_itens {
        *bases.entry(item.chave.as_str()).or_default() += item.bc_pis_cofins;
    }

    // XML documents in arrival order, then SPED-only documents.
    let mut ordem: Vec<&str> = Vec::with_capacity(nfe_totais.len() + sped_documentos.len());
    let mut vistas: HashSet<&str> = HashSet::new();
    for totais in nfe_totais {
        if vistas.insert(totais.chave.as_str()) {
            ordem.push(totais.chave.as_str());
        }
    }
    for documento in sped_documentos {
        if vistas.insert(documento.chave.as_str()) {
            ordem.push(documento.chave.as_str());
        }
    }

    let tolerancia = parametros.tolerancia;
    let mut registros = Vec::with_capacity(ordem.len());

    for chave in ordem {
        let xml = xml_por_chave.get(chave).copied();
        let sped = sped_por_chave.get(chave).copied();

        let mut situacao = match (xml.is_some(), sped.is_some()) {
            (true, true) => Situacao::Ok,
            (true, false) => Situacao::FaltaNoSped,
            (false, true) => Situacao::FaltaXml,
            (false, false) => continue,
        };

        let cnpj_emitente = xml.map(|x| x.cnpj_emitente.clone()).unwrap_or_default();
        if situacao == Situacao::Ok && cnpj_emitente.is_empty() {
            situacao = Situacao::SemCnpjNoXml;
        }

        let cfop_xml = xml.map(|x| x.cfop.clone()).unwrap_or_default();
        let cfop_sped = sped.map(|s| s.cfop.clone()).unwrap_or_default();
        let tipo_sped = sped.and_then(|s| s.tipo_nota);
        let tipo_nota = xml.map(|x| x.tipo_nota).or(tipo_sped);

        let acumulador = regras.resolver(&cnpj_emitente, &cfop_sped, &cfop_xml);

        let vl_doc_xml = xml.map(|x| x.vl_doc).unwrap_or_default();
        let vl_doc_sped = sped.map(|s| s.vl_doc).unwrap_or_default();

        let icms_xml = xml.map(|x| x.icms).unwrap_or_default();
        let icms_sn_xml = xml.map(|x| x.icms_sn).unwrap_or_default();
        let icms_total_xml = (icms_xml + icms_sn_xml).round_dp(2);
        let icms_sped = sped.map(|s| s.icms).unwrap_or_default();

        let icms_st_xml = xml.map(|x| x.icms_st).unwrap_or_default();
        let icms_st_sped = sped.map(|s| s.icms_st).unwrap_or_default();
        let fcp_st_xml = xml.map(|x| x.fcp_st).unwrap_or_default();
        let fcp_st_sped = sped.map(|s| s.fcp_st).unwrap_or_default();
        let icms_mono_xml = xml.map(|x| x.icms_mono).unwrap_or_default();
        let icms_mono_sped = sped.map(|s| s.icms_mono).unwrap_or_default();

        let ipi_xml = xml.map(|x| x.ipi).unwrap_or_default();
        let ipi_devol_xml = xml.map(|x| x.ipi_devol).unwrap_or_default();
        let ipi_total_xml = (ipi_xml + ipi_devol_xml).round_dp(2);
        let mut ipi_sped = sped.map(|s| s.ipi).unwrap_or_default();
        // Devolution-only documents book their IPI in the devolution field;
        // compare against the combined total instead of flagging them.
        if ipi_xml.is_zero() && ipi_devol_xml > Decimal::ZERO && ipi_total_xml == ipi_devol_xml {
            ipi_sped = ipi_total_xml;
        }

        let mut status_cfop = conferir_cfop(&cfop_xml, &cfop_sped);
        let mut status_icms = status_imposto(
            icms_total_xml,
            icms_sped,
            tolerancia,
            intersecta(&cfop_sped, &parametros.cfop_sem_credito_icms),
        );
        let mut status_icms_st = status_imposto(icms_st_xml, icms_st_sped, tolerancia, false);
        let mut status_ipi = status_imposto(
            ipi_total_xml,
            ipi_sped,
            tolerancia,
            intersecta(&cfop_sped, &parametros.cfop_sem_credito_ipi),
        );
        let mut status_fcp_st = status_imposto(fcp_st_xml, fcp_st_sped, tolerancia, false);
        let mut status_icms_mono =
            status_imposto(icms_mono_xml, icms_mono_sped, tolerancia, false);

        let mut status_valor = if situacao == Situacao::Ok
            && !dentro_da_tolerancia(vl_doc_xml, vl_doc_sped, tolerancia)
        {
            Status::Divergente
        } else {
            Status::Ok
        };

        let bc_pis_cofins = bases
            .get(chave)
            .copied()
            .unwrap_or_default()
            .round_dp(2)
            .max(Decimal::ZERO);
        let pis_calc = (bc_pis_cofins * ALIQUOTA_PIS).round_dp(2);
        let cofins_calc = (bc_pis_cofins * ALIQUOTA_COFINS).round_dp(2);
        let pis_sped = sped.map(|s| s.pis).unwrap_or_default();
        let cofins_sped = sped.map(|s| s.cofins).unwrap_or_default();

        let mut status_pis = status_imposto(pis_calc, pis_sped, tolerancia, false);
        let mut status_cofins = status_imposto(cofins_calc, cofins_sped, tolerancia, false);

        if parametros.nao_calcular_pis_cofins
            || tipo_sped.is_some_and(|tipo| tipo.sem_itens_xml())
        {
            status_pis = Status::NaoAplicavel;
            status_cofins = Status::NaoAplicavel;
        }

        if situacao != Situacao::Ok {
            status_valor = Status::NaoAplicavel;
            status_cfop = Status::NaoAplicavel;
            status_icms = Status::NaoAplicavel;
            status_icms_st = Status::NaoAplicavel;
            status_ipi = Status::NaoAplicavel;
            status_fcp_st = Status::NaoAplicavel;
            status_icms_mono = Status::NaoAplicavel;
            status_pis = Status::NaoAplicavel;
            status_cofins = Status::NaoAplicavel;
        }

        let mut status_geral = consolidar_status(
            situacao,
            &[
                status_valor,
                status_cfop,
                status_icms,
                status_icms_st,
                status_ipi,
                status_fcp_st,
                status_icms_mono,
                status_pis,
                status_cofins,
            ],
        );

        if parametros.exigir_acumulador
            && situacao == Situacao::Ok
            && (acumulador.is_empty() || acumulador == ACUMULADOR_REVISAR)
        {
            status_geral = StatusGeral::Revisar;
        }

        registros.push(ReconRecord {
            status_geral,
            situacao,
            chave: chave.to_string(),
            num_nf: xml.map(|x| x.num_nf.clone()).unwrap_or_default(),
            cnpj_emitente,
            acumulador,
            tipo_nota,
            status_valor,
            vl_doc_xml,
            vl_doc_sped,
            status_cfop,
            cfop_xml,
            cfop_sped,
            cest_xml: xml.map(|x| x.cest.clone()).unwrap_or_default(),
            status_icms,
            icms_total_xml,
            icms_sped,
            status_icms_st,
            icms_st_xml,
            icms_st_sped,
            status_fcp_st,
            fcp_st_xml,
            fcp_st_sped,
            status_ipi,
            ipi_total_xml,
            ipi_sped,
            status_icms_mono,
            icms_mono_xml,
            icms_mono_sped,
            bc_pis_cofins,
            status_pis,
            pis_calc,
            pis_sped,
            status_cofins,
            cofins_calc,
            cofins_sped,
        });
    }

    registros
}

fn status_imposto(xml: Decimal, sped: Decimal, tolerancia: Decimal, sem_credito: bool) -> Status {
    if dentro_da_tolerancia(xml, sped, tolerancia) || sem_credito {
        Status::Ok
    } else {
        Status::Divergente
    }
}

/// Whether any CFOP of the "/"-joined SPED set appears in the no-credit list.
fn intersecta(cfop_sped: &str, lista: &[String]) -> bool {
    if lista.is_empty() || cfop_sped.is_empty() {
        return false;
    }
    cfop_sped
        .split('/')
        .filter(|c| !c.is_empty())
        .any(|cfop| lista.iter().any(|item| item == cfop))
}

/// Documents whose overall status demands attention.
pub fn contar_problemas(registros: &[ReconRecord]) -> usize {
    registros
        .iter()
        .filter(|r| r.status_geral != StatusGeral::Ok)
        .count()
}
