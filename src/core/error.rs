use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a reconciliation stage.
///
/// Per-unit problems (a malformed XML file, a truncated SPED line, a duplicate
/// accumulator rule) are recoverable and never surface here — they are logged,
/// counted or collapsed to the REVISAR sentinel, and the batch continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConciliacaoError {
    /// Source file missing or unreadable.
    #[error("falha ao ler {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The XML directory does not exist or cannot be listed.
    #[error("pasta de XMLs não encontrada: {path}")]
    PastaXml { path: PathBuf },

    /// A rule/reference table could not be parsed as delimited text.
    #[error("falha ao processar {path}: {source}")]
    Tabela {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Required columns missing from a rule/reference table.
    #[error("{path}: colunas obrigatórias ausentes: {colunas}")]
    ColunasAusentes { path: PathBuf, colunas: String },

    /// Failure writing an output table.
    #[error("falha ao gravar {path}: {source}")]
    Saida {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
