//! Delimited-text rendering of the result tables.
//!
//! Semicolon separators, quoted text fields, comma decimal separator, CRLF —
//! the dialect Brazilian spreadsheet tools import without coaxing. Styling
//! and fixed-cell templates are the business of external collaborators; this
//! module only lays the tables down.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rust_decimal::Decimal;

use crate::core::{
    BaseDifalRow, ConciliacaoError, CteReconRecord, ItemConciliado, ReconRecord, TotalizadorRow,
};
use crate::pipeline::ResultadoConciliacao;

/// Write every result table into `pasta`, creating it if needed. Returns the
/// directory written to.
pub fn gravar_tabelas(
    pasta: &Path,
    resultado: &ResultadoConciliacao,
) -> Result<PathBuf, ConciliacaoError> {
    fs::create_dir_all(pasta).map_err(|source| ConciliacaoError::Saida {
        path: pasta.to_path_buf(),
        source,
    })?;

    escrever(
        &pasta.join("conciliacao.csv"),
        gerar_conciliacao_csv(&resultado.conciliacao),
    )?;
    escrever(
        &pasta.join("itens.csv"),
        gerar_itens_csv(&resultado.itens),
    )?;
    escrever(
        &pasta.join("totalizador_entradas.csv"),
        gerar_totalizador_csv(&resultado.totalizadores_entrada),
    )?;
    escrever(
        &pasta.join("totalizador_saidas.csv"),
        gerar_totalizador_csv(&resultado.totalizadores_saida),
    )?;
    escrever(
        &pasta.join("conciliacao_cte.csv"),
        gerar_cte_csv(&resultado.conciliacao_cte),
    )?;
    escrever(
        &pasta.join("base_difal.csv"),
        gerar_base_difal_csv(&resultado.base_difal),
    )?;

    info!("tabelas gravadas em {}", pasta.display());
    Ok(pasta.to_path_buf())
}

fn escrever(path: &Path, conteudo: String) -> Result<(), ConciliacaoError> {
    fs::write(path, conteudo).map_err(|source| ConciliacaoError::Saida {
        path: path.to_path_buf(),
        source,
    })
}

fn gerar_conciliacao_csv(registros: &[ReconRecord]) -> String {
    let mut out = String::new();
    cabecalho(
        &mut out,
        &[
            "STATUS_GERAL",
            "SITUACAO_NOTA",
            "CHV_NFE",
            "NUM_NF",
            "CNPJ_EMITENTE",
            "ACUMULADOR",
            "TIPO_NOTA",
            "STATUS_VALOR",
            "VL_DOC_XML",
            "VL_DOC_SPED",
            "STATUS_CFOP",
            "CFOP_XML",
            "CFOP_SPED",
            "CEST_XML",
            "STATUS_ICMS",
            "ICMS_TOTAL_XML",
            "ICMS_SPED",
            "STATUS_ICMS_ST",
            "ICMS_ST_XML",
            "ICMS_ST_SPED",
            "STATUS_FCP_ST",
            "FCP_ST_XML",
            "FCP_ST_SPED",
            "STATUS_IPI",
            "IPI_TOTAL_XML",
            "IPI_SPED",
            "STATUS_ICMS_MONO",
            "ICMS_MONO_XML",
            "ICMS_MONO_SPED",
            "BC_PIS_COFINS_CALC",
            "STATUS_PIS",
            "PIS_CALC",
            "PIS_SPED",
            "STATUS_COFINS",
            "COFINS_CALC",
            "COFINS_SPED",
        ],
    );
    for r in registros {
        campo_texto(&mut out, r.status_geral.rotulo());
        campo_texto(&mut out, r.situacao.rotulo());
        campo_texto(&mut out, &r.chave);
        campo_texto(&mut out, &r.num_nf);
        campo_texto(&mut out, &r.cnpj_emitente);
        campo_texto(&mut out, &r.acumulador);
        campo_texto(&mut out, r.tipo_nota.map(|t| t.rotulo()).unwrap_or(""));
        campo_texto(&mut out, r.status_valor.rotulo());
        campo_decimal(&mut out, r.vl_doc_xml);
        campo_decimal(&mut out, r.vl_doc_sped);
        campo_texto(&mut out, r.status_cfop.rotulo());
        campo_texto(&mut out, &r.cfop_xml);
        campo_texto(&mut out, &r.cfop_sped);
        campo_texto(&mut out, &r.cest_xml);
        campo_texto(&mut out, r.status_icms.rotulo());
        campo_decimal(&mut out, r.icms_total_xml);
        campo_decimal(&mut out, r.icms_sped);
        campo_texto(&mut out, r.status_icms_st.rotulo());
        campo_decimal(&mut out, r.icms_st_xml);
        campo_decimal(&mut out, r.icms_st_sped);
        campo_texto(&mut out, r.status_fcp_st.rotulo());
        campo_decimal(&mut out, r.fcp_st_xml);
        campo_decimal(&mut out, r.fcp_st_sped);
        campo_texto(&mut out, r.status_ipi.rotulo());
        campo_decimal(&mut out, r.ipi_total_xml);
        campo_decimal(&mut out, r.ipi_sped);
        campo_texto(&mut out, r.status_icms_mono.rotulo());
        campo_decimal(&mut out, r.icms_mono_xml);
        campo_decimal(&mut out, r.icms_mono_sped);
        campo_decimal(&mut out, r.bc_pis_cofins);
        campo_texto(&mut out, r.status_pis.rotulo());
        campo_decimal(&mut out, r.pis_calc);
        campo_decimal(&mut out, r.pis_sped);
        campo_texto(&mut out, r.status_cofins.rotulo());
        campo_decimal(&mut out, r.cofins_calc);
        campo_decimal(&mut out, r.cofins_sped);
        terminar_linha(&mut out);
    }
    out
}

fn gerar_itens_csv(itens: &[ItemConciliado]) -> String {
    let mut out = String::new();
    cabecalho(
        &mut out,
        &[
            "STATUS_GERAL",
            "SITUACAO_NOTA",
            "TIPO_NOTA",
            "CHV_NFE",
            "NUM_NF",
            "CNPJ_EMITENTE",
            "ACUMULADOR",
            "N_ITEM",
            "TIPO_DESTINATARIO",
            "COD_PROD",
            "DESC_PROD",
            "NCM",
            "CEST",
            "STATUS_CFOP_ITEM",
            "CFOP",
            "CFOP_SPED_ITEM",
            "CST_ICMS_SPED_ITEM",
            "STATUS_VALOR",
            "VL_DOC_XML",
            "VL_DOC_SPED",
            "DIF_VALOR_TOTAL",
            "cBenef",
            "QTD",
            "UNID",
            "VLR_UNIT",
            "VLR_PROD",
            "DESPESA_XML",
            "VLR_ICMS_TOTAL_ITEM",
            "VLR_BC_ICMS_XML",
            "pICMS_XML",
            "VLR_IPI",
            "VLR_ICMS_MONO",
            "BC_PIS_COFINS_CALC",
            "VL_OPR_SPED_ITEM",
            "VL_BC_ICMS_SPED_ITEM",
            "VL_ICMS_SPED_ITEM",
            "VL_BC_ICMS_ST_SPED_ITEM",
            "VL_ICMS_ST_SPED_ITEM",
            "STATUS_ICMS",
            "ICMS_SPED",
            "STATUS_ICMS_ST",
            "ICMS_ST_XML",
            "ICMS_ST_SPED",
            "STATUS_FCP_ST",
            "FCP_ST_XML",
            "FCP_ST_SPED",
            "STATUS_IPI",
            "IPI_SPED (Item C170)",
            "STATUS_PIS",
            "PIS_CALC",
            "PIS_SPED",
            "STATUS_COFINS",
            "COFINS_CALC",
            "COFINS_SPED",
            "PRODUTO",
            "ST",
            "REGIME_PIS_COFINS",
            "MVA ORIGINAL",
        ],
    );
    for i in itens {
        campo_texto(&mut out, i.status_geral.rotulo());
        campo_texto(&mut out, i.situacao.rotulo());
        campo_texto(&mut out, i.tipo_nota.map(|t| t.rotulo()).unwrap_or(""));
        campo_texto(&mut out, &i.chave);
        campo_texto(&mut out, &i.num_nf);
        campo_texto(&mut out, &i.cnpj_emitente);
        campo_texto(&mut out, &i.acumulador);
        campo_texto(&mut out, &i.n_item.to_string());
        campo_texto(&mut out, i.tipo_destinatario.rotulo());
        campo_texto(&mut out, &i.cod_prod);
        campo_texto(&mut out, &i.desc_prod);
        campo_texto(&mut out, &i.ncm);
        campo_texto(&mut out, &i.cest);
        campo_texto(&mut out, i.status_cfop_item.rotulo());
        campo_texto(&mut out, &i.cfop_xml);
        campo_texto(&mut out, &i.cfop_sped_item);
        campo_texto(&mut out, &i.cst_icms_sped_item);
        campo_texto(&mut out, i.status_valor.rotulo());
        campo_decimal(&mut out, i.vl_doc_xml);
        campo_decimal(&mut out, i.vl_doc_sped);
        campo_decimal(&mut out, i.dif_valor_total);
        campo_texto(&mut out, &i.c_benef);
        campo_decimal(&mut out, i.qtd);
        campo_texto(&mut out, &i.unid);
        campo_decimal(&mut out, i.vlr_unit);
        campo_decimal(&mut out, i.vlr_prod);
        campo_decimal(&mut out, i.despesa);
        campo_decimal(&mut out, i.vlr_icms_total_item);
        campo_decimal(&mut out, i.vlr_bc_icms_xml);
        campo_decimal_4(&mut out, i.p_icms_xml);
        campo_decimal(&mut out, i.vlr_ipi);
        campo_decimal(&mut out, i.vlr_icms_mono);
        campo_decimal(&mut out, i.bc_pis_cofins);
        campo_decimal(&mut out, i.vl_opr_sped_item);
        campo_decimal(&mut out, i.vl_bc_icms_sped_item);
        campo_decimal(&mut out, i.vl_icms_sped_item);
        campo_decimal(&mut out, i.vl_bc_icms_st_sped_item);
        campo_decimal(&mut out, i.vl_icms_st_sped_item);
        campo_texto(&mut out, i.status_icms.rotulo());
        campo_decimal(&mut out, i.icms_sped);
        campo_texto(&mut out, i.status_icms_st.rotulo());
        campo_decimal(&mut out, i.icms_st_xml);
        campo_decimal(&mut out, i.icms_st_sped);
        campo_texto(&mut out, i.status_fcp_st.rotulo());
        campo_decimal(&mut out, i.fcp_st_xml);
        campo_decimal(&mut out, i.fcp_st_sped);
        campo_texto(&mut out, i.status_ipi.rotulo());
        campo_decimal(&mut out, i.ipi_sped_item);
        campo_texto(&mut out, i.status_pis.rotulo());
        campo_decimal(&mut out, i.pis_calc);
        campo_decimal(&mut out, i.pis_sped);
        campo_texto(&mut out, i.status_cofins.rotulo());
        campo_decimal(&mut out, i.cofins_calc);
        campo_decimal(&mut out, i.cofins_sped);
        campo_texto(&mut out, &i.produto_regra);
        campo_texto(&mut out, &i.st_regra);
        campo_texto(&mut out, &i.regime_pis_cofins);
        campo_decimal(&mut out, i.mva_original);
        terminar_linha(&mut out);
    }
    out
}

fn gerar_totalizador_csv(linhas: &[TotalizadorRow]) -> String {
    let mut out = String::new();
    cabecalho(
        &mut out,
        &[
            "CFOP (SPED)",
            "CST (SPED)",
            "Descricao CST",
            "Alíquota (SPED)",
            "Alíquota ICMS",
            "Total Operação",
            "Base de Cálculo ICMS",
            "Total ICMS",
            "Base de Cálculo ICMS ST",
            "Total ICMS ST",
            "Total IPI",
            "QTD Documentos",
        ],
    );
    for linha in linhas {
        campo_texto(&mut out, &linha.cfop);
        campo_texto(&mut out, &linha.cst);
        campo_texto(&mut out, &linha.descricao_cst);
        campo_decimal(&mut out, linha.aliquota);
        campo_decimal(&mut out, linha.aliquota_efetiva);
        campo_decimal(&mut out, linha.total_operacao);
        campo_decimal(&mut out, linha.base_icms);
        campo_decimal(&mut out, linha.total_icms);
        campo_decimal(&mut out, linha.base_icms_st);
        campo_decimal(&mut out, linha.total_icms_st);
        campo_decimal(&mut out, linha.total_ipi);
        campo_texto(&mut out, &linha.qtd_documentos.to_string());
        terminar_linha(&mut out);
    }
    out
}

fn gerar_cte_csv(registros: &[CteReconRecord]) -> String {
    let mut out = String::new();
    cabecalho(
        &mut out,
        &[
            "CHV_CTE",
            "SITUACAO_CTE",
            "STATUS_VALOR",
            "STATUS_BC_ICMS",
            "STATUS_ICMS",
            "STATUS_CFOP",
            "CST_ICMS_SPED_D190",
            "CFOP_SPED_D190",
            "ALIQ_ICMS_SPED_D190",
            "VL_OPR_SPED_D190",
            "VL_BC_ICMS_SPED_D190",
            "VL_ICMS_SPED_D190",
            "NUM_CTE_XML",
            "CFOP_XML",
            "CST_XML",
            "VL_TOTAL_CTE_XML",
            "VL_BC_ICMS_XML",
            "VL_ICMS_XML",
            "ALIQ_ICMS_XML",
            "CNPJ_TRANSPORTADOR",
            "IE_TRANSPORTADOR",
            "UF_EMITENTE_CTE",
            "REMETENTE_NOME",
            "DESTINATARIO_NOME",
            "TOMADOR_CNPJ",
            "TOMADOR_NOME",
            "MUN_ORIGEM",
            "MUN_DESTINO",
            "ITEM_PREDOMINANTE",
        ],
    );
    for r in registros {
        campo_texto(&mut out, &r.chave);
        campo_texto(&mut out, r.situacao.rotulo());
        campo_texto(&mut out, r.status_valor.rotulo());
        campo_texto(&mut out, r.status_bc_icms.rotulo());
        campo_texto(&mut out, r.status_icms.rotulo());
        campo_texto(&mut out, r.status_cfop.rotulo());
        campo_texto(&mut out, &r.cst_sped);
        campo_texto(&mut out, &r.cfop_sped);
        campo_decimal(&mut out, r.aliq_sped);
        campo_decimal(&mut out, r.vl_opr_sped);
        campo_decimal(&mut out, r.vl_bc_icms_sped);
        campo_decimal(&mut out, r.vl_icms_sped);
        campo_texto(&mut out, &r.num_cte_xml);
        campo_texto(&mut out, &r.cfop_xml);
        campo_texto(&mut out, &r.cst_xml);
        campo_decimal(&mut out, r.vl_total_xml);
        campo_decimal(&mut out, r.vl_bc_icms_xml);
        campo_decimal(&mut out, r.vl_icms_xml);
        campo_decimal(&mut out, r.aliq_icms_xml);
        campo_texto(&mut out, &r.cnpj_transportador);
        campo_texto(&mut out, &r.ie_transportador);
        campo_texto(&mut out, &r.uf_emitente);
        campo_texto(&mut out, &r.remetente_nome);
        campo_texto(&mut out, &r.destinatario_nome);
        campo_texto(&mut out, &r.tomador_cnpj);
        campo_texto(&mut out, &r.tomador_nome);
        campo_texto(&mut out, &r.mun_origem);
        campo_texto(&mut out, &r.mun_destino);
        campo_texto(&mut out, &r.item_predominante);
        terminar_linha(&mut out);
    }
    out
}

fn gerar_base_difal_csv(linhas: &[BaseDifalRow]) -> String {
    let mut out = String::new();
    cabecalho(&mut out, &["CFOP", "VALOR_BASE_DIFAL"]);
    for linha in linhas {
        campo_texto(&mut out, &linha.cfop);
        campo_decimal(&mut out, linha.valor_base);
        terminar_linha(&mut out);
    }
    out
}

fn cabecalho(out: &mut String, colunas: &[&str]) {
    for coluna in colunas {
        campo_texto(out, coluna);
    }
    terminar_linha(out);
}

fn campo_texto(out: &mut String, valor: &str) {
    out.push('"');
    for ch in valor.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out.push(';');
}

fn campo_decimal(out: &mut String, d: Decimal) {
    let arredondado = d.round_dp(2);
    out.push_str(&format!("{arredondado:.2}").replace('.', ","));
    out.push(';');
}

fn campo_decimal_4(out: &mut String, d: Decimal) {
    let arredondado = d.round_dp(4);
    out.push_str(&format!("{arredondado:.4}").replace('.', ","));
    out.push(';');
}

/// Swap the trailing field separator for the row terminator.
fn terminar_linha(out: &mut String) {
    if out.ends_with(';') {
        out.pop();
    }
    out.push_str("\r\n");
}
