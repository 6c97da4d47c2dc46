use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};
use rust_decimal::Decimal;

use super::{detectar_delimitador, indices_obrigatorios, ler_tabela, normalizar_codigo};
use crate::core::ConciliacaoError;

/// PIS/COFINS treatment derived from the reference table's regime code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimePisCofins {
    Monofasico,
    Aliquota0,
    Normal,
    /// The reference table has no entry (or no code) for the product.
    NaoAvaliado,
}

impl RegimePisCofins {
    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::Monofasico => "MONOFÁSICO",
            Self::Aliquota0 => "ALÍQUOTA 0",
            Self::Normal => "NORMAL",
            Self::NaoAvaliado => "N/A",
        }
    }
}

impl std::fmt::Display for RegimePisCofins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

/// Map the reference table's PIS/COFINS regime code onto a treatment tag.
pub fn regime_pis_cofins(codigo: &str) -> RegimePisCofins {
    match codigo.trim() {
        "" => RegimePisCofins::NaoAvaliado,
        "4" => RegimePisCofins::Monofasico,
        "6" => RegimePisCofins::Aliquota0,
        "-" => RegimePisCofins::Normal,
        _ => RegimePisCofins::Normal,
    }
}

/// Benefit/regime metadata for one product classification code.
#[derive(Debug, Clone, Default)]
pub struct RegraNcm {
    pub produto: String,
    pub st: String,
    pub cst_pis_cofins: String,
    pub mva_original: Decimal,
}

/// Reference table keyed by NCM, first occurrence wins.
#[derive(Debug, Default, Clone)]
pub struct RegrasNcm {
    mapa: HashMap<String, RegraNcm>,
}

impl RegrasNcm {
    pub fn carregar(path: &Path) -> Result<Self, ConciliacaoError> {
        info!("lendo regras detalhadas por NCM de {}", path.display());
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
        let indice_ncm = indices_obrigatorios(&cabecalho, &["NCM"], path)?[0];

        let coluna = |nome: &str| {
            cabecalho
                .iter()
                .position(|c| c.trim() == nome)
        };
        let indice_produto = coluna("PRODUTO");
        let indice_st = coluna("ST");
        let indice_cst = coluna("CST PIS/COFINS");
        let indice_mva = coluna("MVA ORIGINAL");

        let mut mapa: HashMap<String, RegraNcm> = HashMap::new();
        for registro in reader.records() {
            let registro = registro.map_err(|source| ConciliacaoError::Tabela {
                path: path.to_path_buf(),
                source,
            })?;
            let campo = |indice: Option<usize>| {
                indice
                    .and_then(|i| registro.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };

            let ncm = registro.get(indice_ncm).unwrap_or("").trim().to_string();
            if ncm.is_empty() {
                continue;
            }

            let regra = RegraNcm {
                produto: campo(indice_produto),
                st: campo(indice_st),
                cst_pis_cofins: normalizar_codigo(&campo(indice_cst)),
                mva_original: campo(indice_mva)
                    .replace(',', ".")
                    .parse()
                    .unwrap_or(Decimal::ZERO),
            };
            if mapa.contains_key(&ncm) {
                warn!("NCM {ncm} duplicado nas regras detalhadas; mantida a primeira ocorrência");
                continue;
            }
            mapa.insert(ncm, regra);
        }

        info!("{} NCMs carregados das regras detalhadas", mapa.len());
        Ok(Self { mapa })
    }

    pub fn consultar(&self, ncm: &str) -> Option<&RegraNcm> {
        self.mapa.get(ncm.trim())
    }

    pub fn len(&self) -> usize {
        self.mapa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapa.is_empty()
    }
}
