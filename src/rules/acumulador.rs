use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::{info, warn};

use super::{detectar_delimitador, indices_obrigatorios, ler_tabela, normalizar_codigo, somente_digitos};
use crate::core::ConciliacaoError;

/// Sentinel label marking rules (or resolutions) that need human review.
pub const ACUMULADOR_REVISAR: &str = "REVISAR";

const COLUNAS: [&str; 3] = ["CNPJ_CPF", "CFOP", "ACUMULADOR"];

/// The loaded (CNPJ, CFOP) → accumulator-label table.
#[derive(Debug, Default, Clone)]
pub struct RegrasAcumuladores {
    mapa: HashMap<(String, String), String>,
}

impl RegrasAcumuladores {
    /// Load the rule table from delimited text.
    ///
    /// Duplicate (CNPJ, CFOP) keys — regardless of label — collapse to the
    /// REVISAR sentinel; only the first occurrence survives.
    pub fn carregar(path: &Path) -> Result<Self, ConciliacaoError> {
        info!("lendo regras de acumuladores de {}", path.display());
        let texto = ler_tabela(path)?;
        let delimitador = detectar_delimitador(&texto);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimitador)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(texto.as_bytes());

        let cabecalho = reader
            .headers()
            .map_err(|source| ConciliacaoError::Tabela {
                path: path.to_path_buf(),
                source,
            })?
            .clone();
        let indices = indices_obrigatorios(&cabecalho, &COLUNAS, path)?;

        let mut linhas: Vec<((String, String), String)> = Vec::new();
        for registro in reader.records() {
            let registro = registro.map_err(|source| ConciliacaoError::Tabela {
                path: path.to_path_buf(),
                source,
            })?;
            let campo = |i: usize| registro.get(indices[i]).unwrap_or("").trim();

            let cnpj = somente_digitos(campo(0));
            let cfop = normalizar_codigo(campo(1));
            let acumulador = normalizar_codigo(campo(2));
            if cnpj.is_empty() && cfop.is_empty() && acumulador.is_empty() {
                continue;
            }
            linhas.push(((cnpj, cfop), acumulador));
        }

        let mut ocorrencias: HashMap<&(String, String), usize> = HashMap::new();
        for (chave, _) in &linhas {
            *ocorrencias.entry(chave).or_insert(0) += 1;
        }

        let mut mapa = HashMap::with_capacity(linhas.len());
        for (chave, acumulador) in &linhas {
            let rotulo = if ocorrencias.get(chave).copied().unwrap_or(0) > 1 {
                warn!(
                    "regra duplicada para CNPJ {} / CFOP {}; marcada como {}",
                    chave.0, chave.1, ACUMULADOR_REVISAR
                );
                ACUMULADOR_REVISAR.to_string()
            } else {
                acumulador.clone()
            };
            mapa.entry(chave.clone()).or_insert(rotulo);
        }

        info!("encontradas {} regras de acumuladores únicas", mapa.len());
        Ok(Self { mapa })
    }

    /// Build a rule table directly from (CNPJ, CFOP) → label pairs.
    pub fn de_pares<I, C, F, A>(pares: I) -> Self
    where
        I: IntoIterator<Item = ((C, F), A)>,
        C: Into<String>,
        F: Into<String>,
        A: Into<String>,
    {
        let mapa = pares
            .into_iter()
            .map(|((cnpj, cfop), rotulo)| ((cnpj.into(), cfop.into()), rotulo.into()))
            .collect();
        Self { mapa }
    }

    pub fn len(&self) -> usize {
        self.mapa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapa.is_empty()
    }

    /// Resolve the accumulator label for one document.
    ///
    /// Uses the SPED CFOP set when non-empty, else the XML set. Returns empty
    /// when the issuer id or the CFOP set is empty or nothing matches; the
    /// REVISAR sentinel when any matched rule is REVISAR or more than one
    /// distinct label matched.
    pub fn resolver(&self, cnpj_emitente: &str, cfop_sped: &str, cfop_xml: &str) -> String {
        let cnpj = somente_digitos(cnpj_emitente);
        if cnpj.is_empty() {
            return String::new();
        }

        let cfops_campo = if !cfop_sped.is_empty() {
            cfop_sped
        } else {
            cfop_xml
        };
        let cfops: BTreeSet<&str> = cfops_campo.split('/').filter(|c| !c.is_empty()).collect();
        if cfops.is_empty() {
            return String::new();
        }

        let mut encontrados: BTreeSet<&str> = BTreeSet::new();
        for cfop in &cfops {
            if let Some(acumulador) = self.mapa.get(&(cnpj.clone(), (*cfop).to_string())) {
                encontrados.insert(acumulador.as_str());
            }
        }

        if encontrados.is_empty() {
            return String::new();
        }
        if encontrados.contains(ACUMULADOR_REVISAR) {
            return ACUMULADOR_REVISAR.to_string();
        }
        if encontrados.len() > 1 {
            warn!(
                "múltiplos acumuladores {encontrados:?} para CNPJ {cnpj}, CFOPs {cfops:?}; marcado {}",
                ACUMULADOR_REVISAR
            );
            return ACUMULADOR_REVISAR.to_string();
        }
        encontrados
            .into_iter()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}
