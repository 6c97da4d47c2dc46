//! CT-e (transport invoice) reader.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{FalhaXml, define, local_name, numero, texto_ou_vazio};
use crate::core::CteTotais;

pub(crate) fn extrair(xml: &str) -> Result<CteTotais, FalhaXml> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = CteParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let nome = local_name(e.local_name().as_ref());

                if nome == "infCte" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"Id" {
                            let id = String::from_utf8_lossy(&attr.value).to_string();
                            p.chave = id.trim_start_matches("CTe").to_string();
                        }
                    }
                }
                // Fallback source for the predominant-cargo description: the
                // first observation annotation under <compl>.
                if nome == "ObsCont" && path.iter().any(|n| n == "compl") {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"xCampo" {
                            let valor = String::from_utf8_lossy(&attr.value).to_string();
                            define(&mut p.obs_fallback, valor.trim());
                        }
                    }
                }
                // The single present regime group is the first child of the
                // <ICMS> block inside <imp>.
                if path.last().is_some_and(|ultimo| ultimo == "ICMS")
                    && path.iter().any(|n| n == "imp")
                    && p.grupo_icms.is_none()
                {
                    p.grupo_icms = Some(nome.clone());
                }

                path.push(nome);
            }
            // Self-closing annotations still carry the xCampo attribute.
            Ok(Event::Empty(ref e)) => {
                let nome = local_name(e.local_name().as_ref());
                if nome == "ObsCont" && path.iter().any(|n| n == "compl") {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"xCampo" {
                            let valor = String::from_utf8_lossy(&attr.value).to_string();
                            define(&mut p.obs_fallback, valor.trim());
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let texto = e.unescape().unwrap_or_default();
                let texto = texto.trim();
                if !texto.is_empty() {
                    p.handle_text(&path, texto);
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FalhaXml::Sintaxe(e.to_string())),
            _ => {}
        }
    }

    p.montar()
}

#[derive(Default, Clone)]
struct ParteParsed {
    cnpj: Option<String>,
    cpf: Option<String>,
    nome: Option<String>,
}

impl ParteParsed {
    fn identificador(&self) -> String {
        self.cnpj
            .clone()
            .or_else(|| self.cpf.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct CteParsed {
    chave: String,
    n_ct: Option<String>,
    cfop: Option<String>,
    mun_origem: Option<String>,
    mun_destino: Option<String>,

    toma_indicador: Option<String>,
    toma4: ParteParsed,

    emit_cnpj: Option<String>,
    emit_ie: Option<String>,
    emit_uf: Option<String>,

    remetente: ParteParsed,
    expedidor: ParteParsed,
    recebedor: ParteParsed,
    destinatario: ParteParsed,

    v_tprest: Option<String>,

    grupo_icms: Option<String>,
    v_bc: Option<String>,
    v_icms: Option<String>,
    p_icms: Option<String>,
    cst: Option<String>,

    pro_pred: Option<String>,
    obs_fallback: Option<String>,
}

impl CteParsed {
    fn handle_text(&mut self, path: &[String], texto: &str) {
        let folha = path.last().map(String::as_str).unwrap_or("");
        let pai = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };

        match (pai, folha) {
            ("ide", "nCT") => define(&mut self.n_ct, texto),
            ("ide", "CFOP") => define(&mut self.cfop, texto),
            ("ide", "xMunIni") => define(&mut self.mun_origem, texto),
            ("ide", "xMunFim") => define(&mut self.mun_destino, texto),
            ("toma3", "toma") | ("toma4", "toma") => define(&mut self.toma_indicador, texto),
            ("toma4", "CNPJ") => define(&mut self.toma4.cnpj, texto),
            ("toma4", "CPF") => define(&mut self.toma4.cpf, texto),
            ("toma4", "xNome") => define(&mut self.toma4.nome, texto),
            ("emit", "CNPJ") => define(&mut self.emit_cnpj, texto),
            ("emit", "IE") => define(&mut self.emit_ie, texto),
            // CT-e layouts ship the issuer address as enderEmit (and some
            // emitters as enderEmi); accept either.
            ("enderEmit", "UF") | ("enderEmi", "UF") => define(&mut self.emit_uf, texto),
            ("rem", "CNPJ") => define(&mut self.remetente.cnpj, texto),
            ("rem", "CPF") => define(&mut self.remetente.cpf, texto),
            ("rem", "xNome") => define(&mut self.remetente.nome, texto),
            ("exped", "CNPJ") => define(&mut self.expedidor.cnpj, texto),
            ("exped", "CPF") => define(&mut self.expedidor.cpf, texto),
            ("exped", "xNome") => define(&mut self.expedidor.nome, texto),
            ("receb", "CNPJ") => define(&mut self.recebedor.cnpj, texto),
            ("receb", "CPF") => define(&mut self.recebedor.cpf, texto),
            ("receb", "xNome") => define(&mut self.recebedor.nome, texto),
            ("dest", "CNPJ") => define(&mut self.destinatario.cnpj, texto),
            ("dest", "CPF") => define(&mut self.destinatario.cpf, texto),
            ("dest", "xNome") => define(&mut self.destinatario.nome, texto),
            ("vPrest", "vTPrest") => define(&mut self.v_tprest, texto),
            ("infCarga", "proPred") => define(&mut self.pro_pred, texto),
            ("ObsCont", "xTexto") => {
                if path.iter().any(|n| n == "compl") {
                    define(&mut self.obs_fallback, texto);
                }
            }
            _ => {}
        }

        if let Some(grupo) = self.grupo_icms.as_deref() {
            if pai == grupo {
                match folha {
                    "vBC" => define(&mut self.v_bc, texto),
                    "vICMS" => define(&mut self.v_icms, texto),
                    "pICMS" => define(&mut self.p_icms, texto),
                    "CST" => define(&mut self.cst, texto),
                    _ => {}
                }
            }
        }
    }

    fn montar(self) -> Result<CteTotais, FalhaXml> {
        if self.chave.len() != 44 {
            return Err(FalhaXml::ChaveInvalida);
        }

        // Payer indicator: 0 sender, 1 dispatcher, 2 receiver, 3 recipient,
        // 4 a third party identified on the toma4 node itself.
        let (tomador_cnpj, tomador_nome) = match self.toma_indicador.as_deref() {
            Some("0") => parte(&self.remetente),
            Some("1") => parte(&self.expedidor),
            Some("2") => parte(&self.recebedor),
            Some("3") => parte(&self.destinatario),
            Some("4") => parte(&self.toma4),
            _ => (String::new(), String::new()),
        };

        let item_predominante = self
            .pro_pred
            .clone()
            .or_else(|| self.obs_fallback.clone())
            .unwrap_or_default();

        Ok(CteTotais {
            chave: self.chave,
            num_cte: texto_ou_vazio(&self.n_ct),
            cnpj_transportador: texto_ou_vazio(&self.emit_cnpj),
            ie_transportador: texto_ou_vazio(&self.emit_ie),
            uf_emitente: texto_ou_vazio(&self.emit_uf),
            remetente_nome: texto_ou_vazio(&self.remetente.nome),
            destinatario_nome: texto_ou_vazio(&self.destinatario.nome),
            tomador_cnpj,
            tomador_nome,
            mun_origem: texto_ou_vazio(&self.mun_origem),
            mun_destino: texto_ou_vazio(&self.mun_destino),
            vl_total: numero(&self.v_tprest).round_dp(2),
            vl_bc_icms: numero(&self.v_bc).round_dp(2),
            vl_icms: numero(&self.v_icms).round_dp(2),
            aliq_icms: numero(&self.p_icms).round_dp(2),
            cfop: texto_ou_vazio(&self.cfop),
            cst: texto_ou_vazio(&self.cst),
            item_predominante,
        })
    }
}

fn parte(p: &ParteParsed) -> (String, String) {
    (p.identificador(), texto_ou_vazio(&p.nome))
}
