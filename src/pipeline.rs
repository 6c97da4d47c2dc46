//! The single "run" operation.
//!
//! One sequential pass on the caller's worker thread: SPED extraction, XML
//! extraction, rule loading, header reconciliation, item allocation,
//! totalizers, transport reconciliation, table export. Every stage output is
//! an explicit value threaded into the next stage. Any fatal failure is
//! caught here and surfaced as one human-readable message through the
//! observer; the host process never sees a panic from a core failure.

use std::path::{Path, PathBuf};

use log::{error, info};
use rust_decimal::Decimal;

use crate::core::{
    BaseDifalRow, ConciliacaoError, CteReconRecord, ItemConciliado, ReconRecord, TotalizadorRow,
};
use crate::export;
use crate::recon::{
    ParametrosConciliacao, base_difal_por_cfop, conciliar_cte, conciliar_documentos,
    conciliar_itens, contar_problemas, dividir_entradas_saidas, totalizar,
};
use crate::rules::{RegrasAcumuladores, RegrasNcm};
use crate::sped::extrair_sped;
use crate::xml::processar_pasta;

/// Client-registration flags that bend the reconciliation rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegrasCliente {
    /// Simples Nacional client: PIS/COFINS statuses are forced to N/A.
    pub nao_calcular_pis_cofins: bool,
    /// Documents without a resolved accumulator drop to REVISAR.
    pub exigir_acumulador: bool,
}

/// Inputs and knobs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The SPED EFD flat file.
    pub caminho_sped: PathBuf,
    /// Directory holding the NF-e/CT-e XML files (non-recursive).
    pub pasta_xmls: PathBuf,
    /// Accumulator rule table (delimited text).
    pub caminho_regras: PathBuf,
    /// Optional NCM classification reference table.
    pub caminho_regras_ncm: Option<PathBuf>,
    /// Directory where the result tables are written.
    pub pasta_saida: PathBuf,
    /// Inclusive tolerance for every amount comparison.
    pub tolerancia: Decimal,
    pub cfop_sem_credito_icms: Vec<String>,
    pub cfop_sem_credito_ipi: Vec<String>,
    pub regras_cliente: RegrasCliente,
}

/// Run-progress sink. Every method has a no-op default; callers override
/// what they need and marshal to their UI themselves — the callbacks fire
/// synchronously on the worker.
pub trait RunObserver {
    fn status(&mut self, _mensagem: &str) {}
    fn progress(&mut self, _atual: usize, _total: usize) {}
    fn done(&mut self, _saida: &Path, _problemas: usize) {}
    fn error(&mut self, _mensagem: &str) {}
}

/// An observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObservadorSilencioso;

impl RunObserver for ObservadorSilencioso {}

/// The in-memory result tables of one run.
#[derive(Debug, Default)]
pub struct ResultadoConciliacao {
    pub conciliacao: Vec<ReconRecord>,
    pub itens: Vec<ItemConciliado>,
    pub totalizadores_entrada: Vec<TotalizadorRow>,
    pub totalizadores_saida: Vec<TotalizadorRow>,
    pub conciliacao_cte: Vec<CteReconRecord>,
    pub base_difal: Vec<BaseDifalRow>,
}

/// Run the full pipeline and write the result tables.
///
/// Completion is reported through `observer.done(saida, problemas)`; any
/// fatal failure through `observer.error(mensagem)`. This function itself
/// never returns an error.
pub fn executar_analise(config: &RunConfig, observer: &mut dyn RunObserver) {
    match executar_interno(config, observer) {
        Ok((saida, problemas)) => observer.done(&saida, problemas),
        Err(erro) => {
            error!("falha crítica na análise: {erro}");
            observer.error(&erro.to_string());
        }
    }
}

fn executar_interno(
    config: &RunConfig,
    observer: &mut dyn RunObserver,
) -> Result<(PathBuf, usize), ConciliacaoError> {
    let resultado = analisar(config, observer)?;
    let problemas = contar_problemas(&resultado.conciliacao);

    observer.status("Gravando tabelas de resultado...");
    let saida = export::gravar_tabelas(&config.pasta_saida, &resultado)?;
    Ok((saida, problemas))
}

/// Run the pipeline and hand back the in-memory tables without writing them.
pub fn analisar(
    config: &RunConfig,
    observer: &mut dyn RunObserver,
) -> Result<ResultadoConciliacao, ConciliacaoError> {
    observer.status("Iniciando extração do SPED...");
    let sped = extrair_sped(&config.caminho_sped)?;

    observer.status("Processando XMLs...");
    let mut progresso = |atual: usize, total: usize| observer.progress(atual, total);
    let xmls = processar_pasta(&config.pasta_xmls, &mut progresso)?;

    observer.status("Lendo regras de acumuladores...");
    let regras = RegrasAcumuladores::carregar(&config.caminho_regras)?;
    let regras_ncm = match &config.caminho_regras_ncm {
        Some(caminho) => Some(RegrasNcm::carregar(caminho)?),
        None => None,
    };

    observer.status("Cruzando dados SPED x XML...");
    let parametros = ParametrosConciliacao {
        tolerancia: config.tolerancia,
        cfop_sem_credito_icms: config.cfop_sem_credito_icms.clone(),
        cfop_sem_credito_ipi: config.cfop_sem_credito_ipi.clone(),
        nao_calcular_pis_cofins: config.regras_cliente.nao_calcular_pis_cofins,
        exigir_acumulador: config.regras_cliente.exigir_acumulador,
    };
    let conciliacao = conciliar_documentos(
        &xmls.nfe_totais,
        &sped.documentos,
        &xmls.nfe_itens,
        &regras,
        &parametros,
    );

    observer.status("Conciliando itens...");
    let itens = conciliar_itens(
        &xmls.nfe_itens,
        &sped.itens,
        &conciliacao,
        regras_ncm.as_ref(),
    );

    observer.status("Calculando totalizadores...");
    let (totalizadores_entrada, totalizadores_saida) =
        dividir_entradas_saidas(totalizar(&sped.analiticos));
    let base_difal = base_difal_por_cfop(&sped.analiticos, &sped.chaves_difal);

    observer.status("Conciliando CT-e...");
    let conciliacao_cte = conciliar_cte(&sped.analiticos_cte, &xmls.cte_totais, config.tolerancia);

    info!(
        "análise concluída: {} documentos, {} itens, {} registros de CT-e",
        conciliacao.len(),
        itens.len(),
        conciliacao_cte.len()
    );

    Ok(ResultadoConciliacao {
        conciliacao,
        itens,
        totalizadores_entrada,
        totalizadores_saida,
        conciliacao_cte,
        base_difal,
    })
}
