//! Rule and reference tables.
//!
//! Both tables arrive as delimited text (the delimiter is sniffed, UTF-8 with
//! BOM tolerance and a Latin-1 retry). Schema problems — missing required
//! columns — are fatal for the load step; data conflicts collapse to the
//! REVISAR sentinel or to the first occurrence and are logged, never raised.

mod acumulador;
mod ncm;

pub use acumulador::{ACUMULADOR_REVISAR, RegrasAcumuladores};
pub use ncm::{RegimePisCofins, RegraNcm, RegrasNcm, regime_pis_cofins};

use std::path::Path;

use crate::core::ConciliacaoError;

/// Read a table file tolerating the encodings the sources actually ship.
pub(crate) fn ler_tabela(path: &Path) -> Result<String, ConciliacaoError> {
    let bytes = std::fs::read(path).map_err(|source| ConciliacaoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let texto = match String::from_utf8(bytes) {
        Ok(texto) => texto,
        Err(erro) => erro.into_bytes().iter().map(|&b| b as char).collect(),
    };
    Ok(texto.trim_start_matches('\u{feff}').to_string())
}

/// Pick the column separator by counting candidates on the header line.
pub(crate) fn detectar_delimitador(texto: &str) -> u8 {
    let cabecalho = texto.lines().next().unwrap_or("");
    let candidatos = [b';', b',', b'\t'];
    candidatos
        .into_iter()
        .max_by_key(|&d| cabecalho.bytes().filter(|&b| b == d).count())
        .unwrap_or(b';')
}

/// Locate each required column in the header, or fail naming every missing
/// one.
pub(crate) fn indices_obrigatorios(
    cabecalho: &csv::StringRecord,
    obrigatorias: &[&str],
    path: &Path,
) -> Result<Vec<usize>, ConciliacaoError> {
    let nomes: Vec<String> = cabecalho.iter().map(|c| c.trim().to_string()).collect();
    let mut indices = Vec::with_capacity(obrigatorias.len());
    let mut ausentes = Vec::new();
    for coluna in obrigatorias {
        match nomes.iter().position(|n| n == coluna) {
            Some(i) => indices.push(i),
            None => ausentes.push(*coluna),
        }
    }
    if !ausentes.is_empty() {
        return Err(ConciliacaoError::ColunasAusentes {
            path: path.to_path_buf(),
            colunas: ausentes.join(", "),
        });
    }
    Ok(indices)
}

/// Keep only the digits of a CNPJ/CPF.
pub(crate) fn somente_digitos(texto: &str) -> String {
    texto.chars().filter(char::is_ascii_digit).collect()
}

/// Spreadsheet exports often render integer codes as "123.0"; undo that.
pub(crate) fn normalizar_codigo(texto: &str) -> String {
    let limpo = texto.trim();
    if let Ok(d) = limpo.parse::<rust_decimal::Decimal>() {
        if d.fract().is_zero() {
            return d.trunc().to_string();
        }
    }
    limpo.to_string()
}
