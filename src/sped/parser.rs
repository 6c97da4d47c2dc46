use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use log::{info, warn};
use rust_decimal::Decimal;

use crate::core::{
    ConciliacaoError, CteSpedAnalitico, SpedAnalitico, SpedDocumento, SpedItem, TipoNota,
    juntar_cfops,
};

/// Everything extracted from one SPED file.
#[derive(Debug, Default)]
pub struct SpedExtracao {
    /// Document headers (C100 plus the single-record C500/D500 categories),
    /// deduplicated by key, first occurrence kept.
    pub documentos: Vec<SpedDocumento>,
    /// C170 line records, deduplicated by (key, sequence).
    pub itens: Vec<SpedItem>,
    /// C190/D190/C590/D590 analytic records merged across categories.
    pub analiticos: Vec<SpedAnalitico>,
    /// D190 records kept separately for the transport reconciliation.
    pub analiticos_cte: Vec<CteSpedAnalitico>,
    /// Keys of documents carrying a C101 rate-differential register.
    pub chaves_difal: HashSet<String>,
}

/// The document context currently open in the scan.
enum ContextoAberto {
    /// C100: header held back until the next header register (or EOF) so the
    /// line CFOPs can be folded into it.
    Mercadoria {
        documento: SpedDocumento,
        cfops: BTreeSet<String>,
    },
    /// D100: only the key is needed, for the D190 children.
    Transporte { chave: String },
    /// C500: header already emitted; key kept for the C590 children.
    Energia { chave: String },
    /// D500: header already emitted; key kept for the D590 children.
    Comunicacao { chave: String },
}

/// Parse one SPED file.
///
/// The file is decoded as UTF-8, retrying as Latin-1 when that fails; lines
/// shorter than a register's layout default the missing fields to zero/empty
/// rather than aborting the pass.
pub fn extrair_sped(path: &Path) -> Result<SpedExtracao, ConciliacaoError> {
    info!("lendo arquivo SPED {}", path.display());
    let conteudo = ler_texto(path)?;

    let mut parser = Parser::default();
    for linha in conteudo.lines() {
        parser.processar_linha(linha);
    }
    Ok(parser.finalizar())
}

/// UTF-8 first, Latin-1 retry. Latin-1 maps every byte, so only an I/O
/// failure is fatal here.
fn ler_texto(path: &Path) -> Result<String, ConciliacaoError> {
    let bytes = fs::read(path).map_err(|source| ConciliacaoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(texto) => Ok(texto),
        Err(erro) => {
            warn!(
                "{} não é UTF-8 válido; relendo como Latin-1",
                path.display()
            );
            Ok(erro.into_bytes().iter().map(|&b| b as char).collect())
        }
    }
}

#[derive(Default)]
struct Parser {
    contexto: Option<ContextoAberto>,
    documentos: Vec<SpedDocumento>,
    itens: Vec<SpedItem>,
    analiticos: Vec<SpedAnalitico>,
    analiticos_cte: Vec<CteSpedAnalitico>,
    chaves_difal: HashSet<String>,
}

impl Parser {
    fn processar_linha(&mut self, linha: &str) {
        let campos: Vec<&str> = linha.trim().split('|').collect();
        let Some(&registro) = campos.get(1) else {
            return;
        };

        match registro {
            "C100" => self.abrir_c100(&campos),
            "C101" => self.marcar_difal(),
            "C170" => self.item_c170(&campos),
            "C190" => self.analitico_c190(&campos),
            "D100" => self.abrir_d100(&campos),
            "D190" => self.analitico_d190(&campos),
            "C500" => self.documento_c500(&campos),
            "C590" => self.analitico_c590(&campos),
            "D500" => self.documento_d500(&campos),
            "D590" => self.analitico_d590(&campos),
            _ => {}
        }
    }

    /// Flush the open context. Only a merchandise context carries a pending
    /// header; the other variants just close.
    fn fechar(&mut self) {
        if let Some(ContextoAberto::Mercadoria {
            mut documento,
            cfops,
        }) = self.contexto.take()
        {
            documento.cfop = juntar_cfops(&cfops);
            self.documentos.push(documento);
        }
    }

    fn abrir(&mut self, novo: Option<ContextoAberto>) {
        self.fechar();
        self.contexto = novo;
    }

    fn abrir_c100(&mut self, campos: &[&str]) {
        if campos.len() <= 27 {
            self.abrir(None);
            return;
        }
        let documento = SpedDocumento {
            chave: campo(campos, 9).to_string(),
            vl_doc: valor(campos, 12),
            icms: valor(campos, 22),
            icms_st: valor(campos, 23),
            ipi: valor(campos, 25),
            pis: valor(campos, 26),
            cofins: valor(campos, 27),
            ..SpedDocumento::default()
        };
        self.abrir(Some(ContextoAberto::Mercadoria {
            documento,
            cfops: BTreeSet::new(),
        }));
    }

    fn marcar_difal(&mut self) {
        // No open merchandise document: the marker has nothing to attach to.
        if let Some(ContextoAberto::Mercadoria { documento, .. }) = &self.contexto {
            if !documento.chave.is_empty() {
                self.chaves_difal.insert(documento.chave.clone());
            }
        }
    }

    fn item_c170(&mut self, campos: &[&str]) {
        let Some(ContextoAberto::Mercadoria { documento, cfops }) = &mut self.contexto else {
            return;
        };
        if documento.chave.is_empty() || campos.len() <= 11 {
            return;
        }

        let cfop = campo(campos, 11);
        if !cfop.is_empty() {
            cfops.insert(cfop.to_string());
        }

        let vl_ipi = match campo(campos, 24) {
            "" => Decimal::ZERO,
            bruto => decimal_br(bruto).unwrap_or_else(|| {
                warn!("IPI ilegível no C170 ({bruto:?}); assumindo zero");
                Decimal::ZERO
            }),
        };

        self.itens.push(SpedItem {
            chave: documento.chave.clone(),
            n_item: campo(campos, 2).to_string(),
            cod_prod: campo(campos, 3).to_string(),
            cfop: cfop.to_string(),
            cst_icms: campo(campos, 10).to_string(),
            vl_opr: valor(campos, 7),
            vl_bc_icms: valor(campos, 13),
            vl_icms: valor(campos, 15),
            vl_bc_icms_st: valor(campos, 16),
            vl_icms_st: valor(campos, 18),
            vl_ipi,
        });
    }

    fn analitico_c190(&mut self, campos: &[&str]) {
        let Some(ContextoAberto::Mercadoria { documento, cfops }) = &mut self.contexto else {
            return;
        };
        if documento.chave.is_empty() || campos.len() <= 11 {
            return;
        }

        let cfop = campo(campos, 3);
        if !cfop.is_empty() {
            cfops.insert(cfop.to_string());
        }
        let chave = documento.chave.clone();
        self.analiticos.push(analitico(&chave, campos, valor(campos, 11)));
    }

    fn abrir_d100(&mut self, campos: &[&str]) {
        let chave = campo(campos, 9);
        if campos.len() > 9 && !chave.is_empty() {
            let chave = chave.to_string();
            self.abrir(Some(ContextoAberto::Transporte { chave }));
        } else {
            self.abrir(None);
        }
    }

    fn analitico_d190(&mut self, campos: &[&str]) {
        let Some(ContextoAberto::Transporte { chave }) = &self.contexto else {
            return;
        };
        if campos.len() <= 9 {
            return;
        }
        let chave = chave.clone();
        self.analiticos_cte.push(CteSpedAnalitico {
            chave: chave.clone(),
            cst_icms: campo(campos, 2).to_string(),
            cfop: campo(campos, 3).to_string(),
            aliq_icms: valor(campos, 4),
            vl_opr: valor(campos, 5),
            vl_bc_icms: valor(campos, 6),
            vl_icms: valor(campos, 7),
        });
        // Transport rows also enter the merged analytic set, with the
        // ST/IPI amounts they do not carry zeroed.
        self.analiticos.push(SpedAnalitico {
            chave,
            cst_icms: campo(campos, 2).to_string(),
            cfop: campo(campos, 3).to_string(),
            aliq_icms: valor(campos, 4),
            vl_opr: valor(campos, 5),
            vl_bc_icms: valor(campos, 6),
            vl_icms: valor(campos, 7),
            ..SpedAnalitico::default()
        });
    }

    fn documento_c500(&mut self, campos: &[&str]) {
        if campos.len() <= 23 {
            self.abrir(None);
            return;
        }
        let chave = match campo(campos, 10) {
            "" => format!("Energia_{}_{}", campo(campos, 6), campo(campos, 9)),
            chave => chave.to_string(),
        };
        self.abrir(Some(ContextoAberto::Energia {
            chave: chave.clone(),
        }));
        self.documentos.push(SpedDocumento {
            chave,
            vl_doc: valor(campos, 12),
            icms: valor(campos, 18),
            pis: valor(campos, 22),
            cofins: valor(campos, 23),
            cfop: campo(campos, 8).to_string(),
            tipo_nota: Some(TipoNota::EnergiaEletrica),
            ..SpedDocumento::default()
        });
    }

    fn analitico_c590(&mut self, campos: &[&str]) {
        let Some(ContextoAberto::Energia { chave }) = &self.contexto else {
            return;
        };
        if campos.len() <= 10 {
            return;
        }
        let chave = chave.clone();
        self.analiticos.push(analitico(&chave, campos, Decimal::ZERO));
    }

    fn documento_d500(&mut self, campos: &[&str]) {
        if campos.len() <= 21 {
            self.abrir(None);
            return;
        }
        let chave = format!("Comunicação_{}_{}", campo(campos, 6), campo(campos, 9));
        self.abrir(Some(ContextoAberto::Comunicacao {
            chave: chave.clone(),
        }));
        self.documentos.push(SpedDocumento {
            chave,
            vl_doc: valor(campos, 11),
            icms: valor(campos, 17),
            pis: valor(campos, 19),
            cofins: valor(campos, 21),
            cfop: campo(campos, 8).to_string(),
            tipo_nota: Some(TipoNota::Comunicacao),
            ..SpedDocumento::default()
        });
    }

    fn analitico_d590(&mut self, campos: &[&str]) {
        let Some(ContextoAberto::Comunicacao { chave }) = &self.contexto else {
            return;
        };
        if campos.len() <= 10 {
            return;
        }
        let chave = chave.clone();
        self.analiticos.push(analitico(&chave, campos, Decimal::ZERO));
    }

    fn finalizar(mut self) -> SpedExtracao {
        self.fechar();

        let mut chaves_vistas = HashSet::new();
        self.documentos
            .retain(|doc| chaves_vistas.insert(doc.chave.clone()));

        let mut itens_vistos = HashSet::new();
        self.itens
            .retain(|item| itens_vistos.insert((item.chave.clone(), item.n_item.clone())));

        SpedExtracao {
            documentos: self.documentos,
            itens: self.itens,
            analiticos: self.analiticos,
            analiticos_cte: self.analiticos_cte,
            chaves_difal: self.chaves_difal,
        }
    }
}

/// Analytic layout shared by C190/C590/D590 (fields 2..=9, IPI varies).
fn analitico(chave: &str, campos: &[&str], vl_ipi: Decimal) -> SpedAnalitico {
    SpedAnalitico {
        chave: chave.to_string(),
        cst_icms: campo(campos, 2).to_string(),
        cfop: campo(campos, 3).to_string(),
        aliq_icms: valor(campos, 4),
        vl_opr: valor(campos, 5),
        vl_bc_icms: valor(campos, 6),
        vl_icms: valor(campos, 7),
        vl_bc_icms_st: valor(campos, 8),
        vl_icms_st: valor(campos, 9),
        vl_ipi,
    }
}

fn campo<'a>(campos: &[&'a str], indice: usize) -> &'a str {
    campos.get(indice).copied().unwrap_or("")
}

/// SPED amounts use a comma decimal separator.
fn decimal_br(texto: &str) -> Option<Decimal> {
    texto
        .trim()
        .replace(',', ".")
        .parse::<Decimal>()
        .ok()
        .map(|d| d.round_dp(2))
}

fn valor(campos: &[&str], indice: usize) -> Decimal {
    decimal_br(campo(campos, indice)).unwrap_or(Decimal::ZERO)
}
