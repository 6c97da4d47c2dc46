//! NF-e (merchandise invoice) reader.

use std::collections::BTreeSet;

use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;

use super::{FalhaXml, define, local_name, numero, texto_ou_vazio};
use crate::core::{NfeItem, NfeTotais, TipoDestinatario, TipoNota, juntar_cfops};

pub(crate) fn extrair(xml: &str) -> Result<(NfeTotais, Vec<NfeItem>), FalhaXml> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = NfeParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let nome = local_name(e.local_name().as_ref());

                if nome == "infNFe" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"Id" {
                            let id = String::from_utf8_lossy(&attr.value).to_string();
                            p.chave = id.trim_start_matches("NFe").to_string();
                        }
                    }
                }
                if nome == "det" {
                    let mut item = ItemParsed::default();
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"nItem" {
                            item.n_item = String::from_utf8_lossy(&attr.value).to_string();
                        }
                    }
                    p.item_atual = Some(item);
                }
                if let Some(item) = p.item_atual.as_mut() {
                    match nome.as_str() {
                        "prod" => item.tem_prod = true,
                        "imposto" => item.tem_imposto = true,
                        _ => {}
                    }
                    // The single present regime group is the first child of
                    // <ICMS>.
                    if path.last().is_some_and(|ultimo| ultimo == "ICMS")
                        && item.grupo_icms.is_none()
                    {
                        item.grupo_icms = Some(nome.clone());
                    }
                }

                path.push(nome);
            }
            Ok(Event::Text(ref e)) => {
                let texto = e.unescape().unwrap_or_default();
                let texto = texto.trim();
                if !texto.is_empty() {
                    p.handle_text(&path, texto);
                }
            }
            Ok(Event::End(_)) => {
                let encerrado = path.pop().unwrap_or_default();
                if encerrado == "det" {
                    if let Some(item) = p.item_atual.take() {
                        // A line without its product or tax block carries
                        // nothing reconcilable.
                        if item.tem_prod && item.tem_imposto {
                            p.itens.push(item);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FalhaXml::Sintaxe(e.to_string())),
            _ => {}
        }
    }

    p.montar()
}

#[derive(Default)]
struct NfeParsed {
    chave: String,
    num_nf: Option<String>,
    fin_nfe: Option<String>,
    emit_cnpj: Option<String>,
    emit_cpf: Option<String>,
    dest_cnpj: Option<String>,
    dest_cpf: Option<String>,

    // ICMSTot header totals
    v_nf: Option<String>,
    v_icms: Option<String>,
    v_st: Option<String>,
    v_ipi: Option<String>,
    v_ipi_devol: Option<String>,
    v_fcp_st: Option<String>,

    itens: Vec<ItemParsed>,
    item_atual: Option<ItemParsed>,
}

#[derive(Default, Clone)]
struct ItemParsed {
    n_item: String,
    tem_prod: bool,
    tem_imposto: bool,

    c_prod: Option<String>,
    x_prod: Option<String>,
    ncm: Option<String>,
    cest: Option<String>,
    c_benef: Option<String>,
    cfop: Option<String>,
    u_com: Option<String>,
    q_com: Option<String>,
    v_un_com: Option<String>,
    v_prod: Option<String>,
    v_frete: Option<String>,
    v_seg: Option<String>,
    v_desc: Option<String>,
    v_outro: Option<String>,

    grupo_icms: Option<String>,
    cst: Option<String>,
    csosn: Option<String>,
    v_bc: Option<String>,
    p_icms: Option<String>,
    v_cred_sn: Option<String>,

    v_icms: Option<String>,
    v_icms_st: Option<String>,
    v_fcp_st: Option<String>,
    v_pis: Option<String>,
    v_cofins: Option<String>,
    v_ipi: Option<String>,
    v_ipi_devol: Option<String>,

    v_mono: Option<String>,
    v_mono_op: Option<String>,
    v_mono_difer: Option<String>,
    v_mono_ret: Option<String>,
}

impl NfeParsed {
    fn handle_text(&mut self, path: &[String], texto: &str) {
        let folha = path.last().map(String::as_str).unwrap_or("");
        let pai = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };

        if let Some(item) = self.item_atual.as_mut() {
            if pai == "prod" {
                match folha {
                    "cProd" => define(&mut item.c_prod, texto),
                    "xProd" => define(&mut item.x_prod, texto),
                    "NCM" => define(&mut item.ncm, texto),
                    "CEST" => define(&mut item.cest, texto),
                    "cBenef" => define(&mut item.c_benef, texto),
                    "CFOP" => define(&mut item.cfop, texto),
                    "uCom" => define(&mut item.u_com, texto),
                    "qCom" => define(&mut item.q_com, texto),
                    "vUnCom" => define(&mut item.v_un_com, texto),
                    "vProd" => define(&mut item.v_prod, texto),
                    "vFrete" => define(&mut item.v_frete, texto),
                    "vSeg" => define(&mut item.v_seg, texto),
                    "vDesc" => define(&mut item.v_desc, texto),
                    "vOutro" => define(&mut item.v_outro, texto),
                    _ => {}
                }
                return;
            }

            if path.iter().any(|n| n == "impostoDevol") {
                if folha == "vIPIDevol" {
                    define(&mut item.v_ipi_devol, texto);
                }
                return;
            }

            if path.iter().any(|n| n == "imposto") {
                if let Some(grupo) = item.grupo_icms.as_deref() {
                    if pai == grupo {
                        match folha {
                            "CST" => define(&mut item.cst, texto),
                            "CSOSN" => define(&mut item.csosn, texto),
                            "vBC" => define(&mut item.v_bc, texto),
                            "pICMS" => define(&mut item.p_icms, texto),
                            "vCredICMSSN" => define(&mut item.v_cred_sn, texto),
                            _ => {}
                        }
                    }
                }
                match folha {
                    "vICMS" => define(&mut item.v_icms, texto),
                    "vICMSST" => define(&mut item.v_icms_st, texto),
                    "vFCPST" => define(&mut item.v_fcp_st, texto),
                    "vPIS" => define(&mut item.v_pis, texto),
                    "vCOFINS" => define(&mut item.v_cofins, texto),
                    "vIPI" => define(&mut item.v_ipi, texto),
                    "vICMSMono" => define(&mut item.v_mono, texto),
                    "vICMSMonoOp" => define(&mut item.v_mono_op, texto),
                    "vICMSMonoDifer" => define(&mut item.v_mono_difer, texto),
                    "vICMSMonoRet" => define(&mut item.v_mono_ret, texto),
                    _ => {}
                }
            }
            return;
        }

        match (pai, folha) {
            ("ide", "nNF") => define(&mut self.num_nf, texto),
            ("ide", "finNFe") => define(&mut self.fin_nfe, texto),
            ("emit", "CNPJ") => define(&mut self.emit_cnpj, texto),
            ("emit", "CPF") => define(&mut self.emit_cpf, texto),
            ("dest", "CNPJ") => define(&mut self.dest_cnpj, texto),
            ("dest", "CPF") => define(&mut self.dest_cpf, texto),
            ("ICMSTot", "vNF") => define(&mut self.v_nf, texto),
            ("ICMSTot", "vICMS") => define(&mut self.v_icms, texto),
            ("ICMSTot", "vST") => define(&mut self.v_st, texto),
            ("ICMSTot", "vIPI") => define(&mut self.v_ipi, texto),
            ("ICMSTot", "vIPIDevol") => define(&mut self.v_ipi_devol, texto),
            ("ICMSTot", "vFCPST") => define(&mut self.v_fcp_st, texto),
            _ => {}
        }
    }

    fn montar(self) -> Result<(NfeTotais, Vec<NfeItem>), FalhaXml> {
        if self.chave.len() != 44 {
            return Err(FalhaXml::ChaveInvalida);
        }

        let tipo_nota = TipoNota::from_fin_nfe(self.fin_nfe.as_deref().unwrap_or("1"));
        let cnpj_emitente = self
            .emit_cnpj
            .clone()
            .or_else(|| self.emit_cpf.clone())
            .unwrap_or_default();
        let tipo_destinatario = if self.dest_cnpj.as_deref().is_some_and(|c| c.len() >= 14) {
            TipoDestinatario::PessoaJuridica
        } else if self.dest_cpf.is_some() {
            TipoDestinatario::PessoaFisica
        } else {
            TipoDestinatario::Outro
        };

        let vl_doc = numero(&self.v_nf).round_dp(2);

        let mut cfops: BTreeSet<String> = BTreeSet::new();
        let mut cests: BTreeSet<String> = BTreeSet::new();
        let mut icms_sn_total = Decimal::ZERO;
        let mut icms_mono_total = Decimal::ZERO;
        let mut itens = Vec::with_capacity(self.itens.len());

        for item in &self.itens {
            let cfop = texto_ou_vazio(&item.cfop);
            if !cfop.is_empty() {
                cfops.insert(cfop.clone());
            }
            let cest = texto_ou_vazio(&item.cest);
            if !cest.is_empty() {
                cests.insert(cest.clone());
            }

            let v_icms = numero(&item.v_icms);
            let v_cred_sn = numero(&item.v_cred_sn);
            let v_mono = numero(&item.v_mono)
                + numero(&item.v_mono_op)
                + numero(&item.v_mono_difer)
                + numero(&item.v_mono_ret);
            let v_ipi = numero(&item.v_ipi) + numero(&item.v_ipi_devol);
            let v_st = numero(&item.v_icms_st);
            let v_fcp_st = numero(&item.v_fcp_st);

            let vlr_prod = (numero(&item.v_prod)
                + v_ipi
                + v_st
                + v_fcp_st
                + numero(&item.v_frete)
                + numero(&item.v_seg)
                - numero(&item.v_desc)
                + numero(&item.v_outro))
            .round_dp(2);

            // ICMS (and the Simples credit) only reduce the PIS/COFINS base
            // when the line carries no monophasic ICMS.
            let icms_a_deduzir = if v_mono.is_zero() {
                v_icms.round_dp(2) + v_cred_sn.round_dp(2)
            } else {
                Decimal::ZERO
            };
            let bc_pis_cofins = (vlr_prod
                - icms_a_deduzir
                - v_st.round_dp(2)
                - v_fcp_st.round_dp(2)
                - v_ipi.round_dp(2))
            .round_dp(2)
            .max(Decimal::ZERO);

            let p_icms_bruto = numero(&item.p_icms);
            let p_icms = if p_icms_bruto > Decimal::ZERO {
                (p_icms_bruto / Decimal::ONE_HUNDRED).round_dp(4)
            } else {
                Decimal::ZERO
            };

            icms_sn_total += v_cred_sn;
            icms_mono_total += v_mono;

            itens.push(NfeItem {
                chave: self.chave.clone(),
                cnpj_emitente: cnpj_emitente.clone(),
                n_item: item.n_item.clone(),
                tipo_nota,
                tipo_destinatario,
                cod_prod: texto_ou_vazio(&item.c_prod),
                desc_prod: texto_ou_vazio(&item.x_prod),
                ncm: texto_ou_vazio(&item.ncm),
                cest,
                c_benef: texto_ou_vazio(&item.c_benef),
                cfop,
                qtd: numero(&item.q_com),
                unid: texto_ou_vazio(&item.u_com),
                vlr_unit: numero(&item.v_un_com),
                vlr_prod,
                despesa: numero(&item.v_outro).round_dp(2),
                vlr_icms: v_icms.round_dp(2),
                vlr_icms_st: v_st.round_dp(2),
                vlr_fcp_st: v_fcp_st.round_dp(2),
                vlr_ipi: v_ipi.round_dp(2),
                vlr_pis: numero(&item.v_pis).round_dp(2),
                vlr_cofins: numero(&item.v_cofins).round_dp(2),
                vlr_icms_sn: v_cred_sn.round_dp(2),
                vlr_icms_mono: v_mono.round_dp(2),
                bc_pis_cofins,
                vl_total_nf: vl_doc,
                cst_icms: item
                    .cst
                    .clone()
                    .or_else(|| item.csosn.clone())
                    .unwrap_or_default(),
                vlr_bc_icms: numero(&item.v_bc).round_dp(2),
                p_icms,
            });
        }

        let totais = NfeTotais {
            chave: self.chave,
            num_nf: texto_ou_vazio(&self.num_nf),
            cnpj_emitente,
            cfop: juntar_cfops(&cfops),
            cest: cests.into_iter().collect::<Vec<_>>().join("/"),
            tipo_nota,
            vl_doc,
            icms: numero(&self.v_icms).round_dp(2),
            icms_st: numero(&self.v_st).round_dp(2),
            ipi: numero(&self.v_ipi).round_dp(2),
            ipi_devol: numero(&self.v_ipi_devol).round_dp(2),
            fcp_st: numero(&self.v_fcp_st).round_dp(2),
            icms_sn: icms_sn_total.round_dp(2),
            icms_mono: icms_mono_total.round_dp(2),
        };

        Ok((totais, itens))
    }
}
