//! NF-e / CT-e XML extraction.
//!
//! Iterates one directory (non-recursive), classifies each file structurally
//! — an `infNFe` element marks a merchandise invoice, an `infCte` a transport
//! invoice — and hands it to the matching event-driven reader. Element lookup
//! is by local name, so default-namespace and prefixed documents read the
//! same. Malformed files and bad keys are logged, counted and skipped; the
//! batch never aborts. Documents are deduplicated globally by their 44-char
//! key, first occurrence kept.

mod cte;
mod nfe;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

use crate::core::{ConciliacaoError, CteTotais, NfeItem, NfeTotais};

/// Everything extracted from one directory of XML files.
#[derive(Debug, Default)]
pub struct XmlExtracao {
    pub nfe_totais: Vec<NfeTotais>,
    pub nfe_itens: Vec<NfeItem>,
    pub cte_totais: Vec<CteTotais>,
    /// Files skipped for being malformed or carrying an invalid key.
    pub arquivos_com_erro: usize,
}

/// Why a single file was skipped. Never escapes the batch loop.
#[derive(Debug, Error)]
pub(crate) enum FalhaXml {
    #[error("XML mal formado: {0}")]
    Sintaxe(String),
    #[error("chave de acesso ausente ou fora do formato de 44 caracteres")]
    ChaveInvalida,
}

impl From<quick_xml::Error> for FalhaXml {
    fn from(erro: quick_xml::Error) -> Self {
        Self::Sintaxe(erro.to_string())
    }
}

enum Especie {
    Nfe,
    Cte,
    Desconhecida,
}

/// Process every `.xml` file in the directory, invoking `progresso` after
/// each one.
pub fn processar_pasta(
    pasta: &Path,
    progresso: &mut dyn FnMut(usize, usize),
) -> Result<XmlExtracao, ConciliacaoError> {
    let mut arquivos = listar_xmls(pasta)?;
    arquivos.sort();

    let total = arquivos.len();
    info!("encontrados {total} arquivos XML em {}", pasta.display());
    progresso(0, total);

    let mut saida = XmlExtracao::default();
    let mut chaves_processadas: HashSet<String> = HashSet::new();

    for (i, arquivo) in arquivos.iter().enumerate() {
        match processar_arquivo(arquivo, &mut chaves_processadas, &mut saida) {
            Ok(()) => {}
            Err(falha) => {
                warn!("{} ignorado: {falha}", arquivo.display());
                saida.arquivos_com_erro += 1;
            }
        }
        progresso(i + 1, total);
    }

    if saida.nfe_totais.is_empty() && saida.cte_totais.is_empty() {
        warn!("nenhum XML de NF-e ou CT-e válido foi processado");
    }
    if saida.arquivos_com_erro > 0 {
        warn!(
            "{} de {total} arquivos XML não puderam ser processados",
            saida.arquivos_com_erro
        );
    }

    Ok(saida)
}

fn listar_xmls(pasta: &Path) -> Result<Vec<PathBuf>, ConciliacaoError> {
    let entradas = fs::read_dir(pasta).map_err(|_| ConciliacaoError::PastaXml {
        path: pasta.to_path_buf(),
    })?;

    let mut arquivos = Vec::new();
    for entrada in entradas.flatten() {
        let caminho = entrada.path();
        let eh_xml = caminho
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if eh_xml && caminho.is_file() {
            arquivos.push(caminho);
        }
    }
    Ok(arquivos)
}

fn processar_arquivo(
    arquivo: &Path,
    chaves_processadas: &mut HashSet<String>,
    saida: &mut XmlExtracao,
) -> Result<(), FalhaXml> {
    let conteudo = ler_texto(arquivo)?;

    match classificar(&conteudo)? {
        Especie::Nfe => {
            let (totais, itens) = nfe::extrair(&conteudo)?;
            if chaves_processadas.insert(totais.chave.clone()) {
                saida.nfe_itens.extend(itens);
                saida.nfe_totais.push(totais);
            }
        }
        Especie::Cte => {
            let totais = cte::extrair(&conteudo)?;
            if chaves_processadas.insert(totais.chave.clone()) {
                saida.cte_totais.push(totais);
            }
        }
        // Some other fiscal document species; not ours to reconcile.
        Especie::Desconhecida => {}
    }
    Ok(())
}

fn ler_texto(arquivo: &Path) -> Result<String, FalhaXml> {
    let bytes = fs::read(arquivo).map_err(|e| FalhaXml::Sintaxe(e.to_string()))?;
    match String::from_utf8(bytes) {
        Ok(texto) => Ok(texto),
        // NF-e emitters occasionally ship ISO-8859-1 despite the declaration.
        Err(erro) => Ok(erro.into_bytes().iter().map(|&b| b as char).collect()),
    }
}

/// Structural sniff: the first `infNFe`/`infCte` start tag decides the
/// species.
fn classificar(xml: &str) -> Result<Especie, FalhaXml> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match local_name(e.local_name().as_ref()).as_str() {
                    "infNFe" => return Ok(Especie::Nfe),
                    "infCte" => return Ok(Especie::Cte),
                    _ => {}
                }
            }
            Event::Eof => return Ok(Especie::Desconhecida),
            _ => {}
        }
    }
}

pub(crate) fn local_name(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).unwrap_or("").to_string()
}

/// First-occurrence-wins assignment, mirroring document-order lookup.
pub(crate) fn define(alvo: &mut Option<String>, texto: &str) {
    if alvo.is_none() {
        *alvo = Some(texto.to_string());
    }
}

/// Amount parsing for XML fields: dot decimal, empty/absent → zero.
pub(crate) fn numero(campo: &Option<String>) -> rust_decimal::Decimal {
    campo
        .as_deref()
        .map(|texto| texto.trim().replace(',', "."))
        .and_then(|texto| texto.parse().ok())
        .unwrap_or(rust_decimal::Decimal::ZERO)
}

pub(crate) fn texto_ou_vazio(campo: &Option<String>) -> String {
    campo.clone().unwrap_or_default()
}
