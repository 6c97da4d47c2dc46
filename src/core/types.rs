use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Situacao, Status, StatusGeral};

/// Sentinel CFOP shown on item rows whose document line has no SPED match.
pub const CFOP_SEM_SPED: &str = "N/A no SPED";

/// Document purpose/category label.
///
/// Merchandise documents take it from the XML purpose code (finNFe); utility
/// and telecom documents carry it from the SPED register that booked them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipoNota {
    Normal,
    Complementar,
    Ajuste,
    Devolucao,
    Desconhecido,
    EnergiaEletrica,
    Comunicacao,
}

impl TipoNota {
    /// Map the NF-e purpose code (finNFe). Unknown codes fall back to
    /// [`TipoNota::Desconhecido`].
    pub fn from_fin_nfe(codigo: &str) -> Self {
        match codigo {
            "1" => Self::Normal,
            "2" => Self::Complementar,
            "3" => Self::Ajuste,
            "4" => Self::Devolucao,
            _ => Self::Desconhecido,
        }
    }

    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Complementar => "Complementar",
            Self::Ajuste => "Ajuste",
            Self::Devolucao => "Devolução",
            Self::Desconhecido => "Desconhecido",
            Self::EnergiaEletrica => "Energia Elétrica (C500)",
            Self::Comunicacao => "Comunicação (D500)",
        }
    }

    /// Utility/telecom documents have no line-level XML data, so PIS/COFINS
    /// cannot be recomputed for them.
    pub fn sem_itens_xml(&self) -> bool {
        matches!(self, Self::EnergiaEletrica | Self::Comunicacao)
    }
}

impl std::fmt::Display for TipoNota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

impl Default for TipoNota {
    fn default() -> Self {
        Self::Desconhecido
    }
}

/// Recipient classification inferred from the identifier shape on the XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipoDestinatario {
    PessoaJuridica,
    PessoaFisica,
    Outro,
}

impl TipoDestinatario {
    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::PessoaJuridica => "PJ",
            Self::PessoaFisica => "PF",
            Self::Outro => "OUTRO",
        }
    }
}

impl std::fmt::Display for TipoDestinatario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

impl Default for TipoDestinatario {
    fn default() -> Self {
        Self::Outro
    }
}

/// One booked document header from the SPED file (C100/C500/D500).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpedDocumento {
    /// 44-char fiscal key, or a synthetic `Energia_*`/`Comunicação_*` key for
    /// registers booked without one.
    pub chave: String,
    pub vl_doc: Decimal,
    pub icms: Decimal,
    pub icms_st: Decimal,
    pub ipi: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub fcp_st: Decimal,
    pub ipi_devol: Decimal,
    pub icms_sn: Decimal,
    pub icms_mono: Decimal,
    /// Union of CFOPs seen on the document's lines, "/"-joined and sorted.
    pub cfop: String,
    pub tipo_nota: Option<TipoNota>,
}

/// One booked line (register C170).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpedItem {
    pub chave: String,
    /// Line sequence as written in the file; coerced to an integer at join
    /// time (absent/unparseable → 0).
    pub n_item: String,
    pub cod_prod: String,
    pub cfop: String,
    pub cst_icms: String,
    pub vl_opr: Decimal,
    pub vl_bc_icms: Decimal,
    pub vl_icms: Decimal,
    pub vl_bc_icms_st: Decimal,
    pub vl_icms_st: Decimal,
    pub vl_ipi: Decimal,
}

/// One analytic summary row (C190/D190/C590/D590, merged across categories).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpedAnalitico {
    pub chave: String,
    pub cst_icms: String,
    pub cfop: String,
    pub aliq_icms: Decimal,
    pub vl_opr: Decimal,
    pub vl_bc_icms: Decimal,
    pub vl_icms: Decimal,
    pub vl_bc_icms_st: Decimal,
    pub vl_icms_st: Decimal,
    pub vl_ipi: Decimal,
}

/// Transport-specific analytic row (D190 only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CteSpedAnalitico {
    pub chave: String,
    pub cst_icms: String,
    pub cfop: String,
    pub aliq_icms: Decimal,
    pub vl_opr: Decimal,
    pub vl_bc_icms: Decimal,
    pub vl_icms: Decimal,
}

/// Merchandise invoice header totals extracted from one NF-e XML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NfeTotais {
    pub chave: String,
    pub num_nf: String,
    pub cnpj_emitente: String,
    /// Union of line CFOPs, "/"-joined and sorted.
    pub cfop: String,
    /// Union of line CEST codes, "/"-joined and sorted.
    pub cest: String,
    pub tipo_nota: TipoNota,
    pub vl_doc: Decimal,
    pub icms: Decimal,
    pub icms_st: Decimal,
    pub ipi: Decimal,
    pub ipi_devol: Decimal,
    pub fcp_st: Decimal,
    /// Simples-Nacional ICMS credit, aggregated from the lines.
    pub icms_sn: Decimal,
    /// Monophasic ICMS, aggregated from the lines.
    pub icms_mono: Decimal,
}

/// One merchandise invoice line extracted from an NF-e XML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NfeItem {
    pub chave: String,
    pub cnpj_emitente: String,
    pub n_item: String,
    pub tipo_nota: TipoNota,
    pub tipo_destinatario: TipoDestinatario,
    pub cod_prod: String,
    pub desc_prod: String,
    pub ncm: String,
    pub cest: String,
    pub c_benef: String,
    pub cfop: String,
    pub qtd: Decimal,
    pub unid: String,
    pub vlr_unit: Decimal,
    /// Reconstructed accounted value: product + IPI + ICMS-ST + FCP-ST +
    /// freight + insurance − discount + other expenses.
    pub vlr_prod: Decimal,
    pub despesa: Decimal,
    pub vlr_icms: Decimal,
    pub vlr_icms_st: Decimal,
    pub vlr_fcp_st: Decimal,
    pub vlr_ipi: Decimal,
    pub vlr_pis: Decimal,
    pub vlr_cofins: Decimal,
    pub vlr_icms_sn: Decimal,
    pub vlr_icms_mono: Decimal,
    /// PIS/COFINS taxable base computed from the accounted value, floored at
    /// zero.
    pub bc_pis_cofins: Decimal,
    pub vl_total_nf: Decimal,
    pub cst_icms: String,
    pub vlr_bc_icms: Decimal,
    /// ICMS rate as a fraction (4 decimal places), zero when the source
    /// percentage is zero.
    pub p_icms: Decimal,
}

/// Transport invoice header extracted from one CT-e XML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CteTotais {
    pub chave: String,
    pub num_cte: String,
    pub cnpj_transportador: String,
    pub ie_transportador: String,
    pub uf_emitente: String,
    pub remetente_nome: String,
    pub destinatario_nome: String,
    pub tomador_cnpj: String,
    pub tomador_nome: String,
    pub mun_origem: String,
    pub mun_destino: String,
    pub vl_total: Decimal,
    pub vl_bc_icms: Decimal,
    pub vl_icms: Decimal,
    pub aliq_icms: Decimal,
    pub cfop: String,
    pub cst: String,
    pub item_predominante: String,
}

/// Per-document reconciliation output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconRecord {
    pub status_geral: StatusGeral,
    pub situacao: Situacao,
    pub chave: String,
    pub num_nf: String,
    pub cnpj_emitente: String,
    pub acumulador: String,
    pub tipo_nota: Option<TipoNota>,
    pub status_valor: Status,
    pub vl_doc_xml: Decimal,
    pub vl_doc_sped: Decimal,
    pub status_cfop: Status,
    pub cfop_xml: String,
    pub cfop_sped: String,
    pub cest_xml: String,
    pub status_icms: Status,
    /// XML ICMS plus the Simples-Nacional credit.
    pub icms_total_xml: Decimal,
    pub icms_sped: Decimal,
    pub status_icms_st: Status,
    pub icms_st_xml: Decimal,
    pub icms_st_sped: Decimal,
    pub status_fcp_st: Status,
    pub fcp_st_xml: Decimal,
    pub fcp_st_sped: Decimal,
    pub status_ipi: Status,
    /// XML IPI plus devolution IPI.
    pub ipi_total_xml: Decimal,
    pub ipi_sped: Decimal,
    pub status_icms_mono: Status,
    pub icms_mono_xml: Decimal,
    pub icms_mono_sped: Decimal,
    /// Σ of the line-level PIS/COFINS bases for this key.
    pub bc_pis_cofins: Decimal,
    pub status_pis: Status,
    pub pis_calc: Decimal,
    pub pis_sped: Decimal,
    pub status_cofins: Status,
    pub cofins_calc: Decimal,
    pub cofins_sped: Decimal,
}

/// Per-line reconciliation output row (NF-e item × SPED C170 item).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemConciliado {
    pub status_geral: StatusGeral,
    pub situacao: Situacao,
    pub tipo_nota: Option<TipoNota>,
    pub chave: String,
    pub num_nf: String,
    pub cnpj_emitente: String,
    pub acumulador: String,
    pub n_item: i64,
    pub tipo_destinatario: TipoDestinatario,
    pub cod_prod: String,
    pub desc_prod: String,
    pub ncm: String,
    pub cest: String,
    pub status_cfop_item: Status,
    pub cfop_xml: String,
    pub cfop_sped_item: String,
    pub cst_icms_sped_item: String,
    pub status_valor: Status,
    pub vl_doc_xml: Decimal,
    pub vl_doc_sped: Decimal,
    pub dif_valor_total: Decimal,
    pub c_benef: String,
    pub qtd: Decimal,
    pub unid: String,
    pub vlr_unit: Decimal,
    pub vlr_prod: Decimal,
    pub despesa: Decimal,
    /// Line ICMS + Simples-Nacional credit + monophasic ICMS.
    pub vlr_icms_total_item: Decimal,
    pub vlr_bc_icms_xml: Decimal,
    pub p_icms_xml: Decimal,
    pub vlr_ipi: Decimal,
    pub vlr_icms_mono: Decimal,
    pub bc_pis_cofins: Decimal,
    pub vl_opr_sped_item: Decimal,
    pub vl_bc_icms_sped_item: Decimal,
    pub vl_icms_sped_item: Decimal,
    pub vl_bc_icms_st_sped_item: Decimal,
    pub vl_icms_st_sped_item: Decimal,
    pub status_icms: Status,
    /// Header SPED ICMS prorated onto this line.
    pub icms_sped: Decimal,
    pub status_icms_st: Status,
    pub icms_st_xml: Decimal,
    pub icms_st_sped: Decimal,
    pub status_fcp_st: Status,
    pub fcp_st_xml: Decimal,
    pub fcp_st_sped: Decimal,
    pub status_ipi: Status,
    /// IPI booked on the C170 line itself (not prorated).
    pub ipi_sped_item: Decimal,
    pub status_pis: Status,
    pub pis_calc: Decimal,
    pub pis_sped: Decimal,
    pub status_cofins: Status,
    pub cofins_calc: Decimal,
    pub cofins_sped: Decimal,
    pub produto_regra: String,
    pub st_regra: String,
    pub regime_pis_cofins: String,
    pub mva_original: Decimal,
}

/// Transport reconciliation output, one row per SPED D190 register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CteReconRecord {
    pub chave: String,
    pub cst_sped: String,
    pub cfop_sped: String,
    pub aliq_sped: Decimal,
    pub vl_opr_sped: Decimal,
    pub vl_bc_icms_sped: Decimal,
    pub vl_icms_sped: Decimal,
    pub situacao: Situacao,
    pub status_valor: Status,
    pub status_bc_icms: Status,
    pub status_icms: Status,
    pub status_cfop: Status,
    pub num_cte_xml: String,
    pub cfop_xml: String,
    pub cst_xml: String,
    pub vl_total_xml: Decimal,
    pub vl_bc_icms_xml: Decimal,
    pub vl_icms_xml: Decimal,
    pub aliq_icms_xml: Decimal,
    pub cnpj_transportador: String,
    pub ie_transportador: String,
    pub uf_emitente: String,
    pub remetente_nome: String,
    pub destinatario_nome: String,
    pub tomador_cnpj: String,
    pub tomador_nome: String,
    pub mun_origem: String,
    pub mun_destino: String,
    pub item_predominante: String,
}

/// One totalizer row per (CFOP, CST, declared rate) group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalizadorRow {
    pub cfop: String,
    pub cst: String,
    pub descricao_cst: String,
    /// Declared ICMS rate (grouping key).
    pub aliquota: Decimal,
    /// Effective rate recomputed from the merged sums.
    pub aliquota_efetiva: Decimal,
    pub total_operacao: Decimal,
    pub base_icms: Decimal,
    pub total_icms: Decimal,
    pub base_icms_st: Decimal,
    pub total_icms_st: Decimal,
    pub total_ipi: Decimal,
    pub qtd_documentos: usize,
}

/// ICMS base to be abated per CFOP for documents bearing a DIFAL register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseDifalRow {
    pub cfop: String,
    pub valor_base: Decimal,
}
