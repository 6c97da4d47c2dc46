use std::fs;

use conciliador::xml::processar_pasta;
use conciliador::{TipoDestinatario, TipoNota};
use rust_decimal_macros::dec;
use tempfile::TempDir;

const CHAVE_NFE: &str = "35240112345678000195550010000001231000001234";
const CHAVE_NFE_2: &str = "35240112345678000195550010000009991000009999";
const CHAVE_CTE: &str = "35240211111111000111570010000005551000005550";

fn nfe_basica(chave: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{chave}" versao="4.00">
      <ide><nNF>123</nNF><finNFe>1</finNFe></ide>
      <emit><CNPJ>12345678000195</CNPJ></emit>
      <dest><CNPJ>98765432000100</CNPJ></dest>
      <det nItem="1">
        <prod>
          <cProd>P1</cProd><xProd>Parafuso</xProd><NCM>73181500</NCM>
          <CFOP>5102</CFOP><uCom>UN</uCom><qCom>10.0000</qCom>
          <vUnCom>11.5000</vUnCom><vProd>115.00</vProd>
        </prod>
        <imposto>
          <ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>115.00</vBC><pICMS>18.00</pICMS><vICMS>10.00</vICMS></ICMS00></ICMS>
          <IPI><IPITrib><vIPI>5.00</vIPI></IPITrib></IPI>
          <PIS><PISAliq><vPIS>1.90</vPIS></PISAliq></PIS>
          <COFINS><COFINSAliq><vCOFINS>8.74</vCOFINS></COFINSAliq></COFINS>
        </imposto>
      </det>
      <total><ICMSTot><vICMS>10.00</vICMS><vST>0.00</vST><vIPI>5.00</vIPI><vNF>120.00</vNF></ICMSTot></total>
    </infNFe>
  </NFe>
</nfeProc>
"#
    )
}

fn cte_basico(chave: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<cteProc xmlns="http://www.portalfiscal.inf.br/cte" versao="3.00">
  <CTe>
    <infCte Id="CTe{chave}" versao="3.00">
      <ide>
        <nCT>555</nCT><CFOP>5353</CFOP>
        <xMunIni>Sao Paulo</xMunIni><xMunFim>Campinas</xMunFim>
        <toma3><toma>0</toma></toma3>
      </ide>
      <emit><CNPJ>11111111000111</CNPJ><IE>123456</IE><enderEmit><UF>SP</UF></enderEmit></emit>
      <rem><CNPJ>22222222000122</CNPJ><xNome>Remetente SA</xNome></rem>
      <dest><CNPJ>33333333000133</CNPJ><xNome>Destinatario SA</xNome></dest>
      <vPrest><vTPrest>1500.00</vTPrest></vPrest>
      <imp><ICMS><ICMS00><CST>00</CST><vBC>1500.00</vBC><pICMS>12.00</pICMS><vICMS>180.00</vICMS></ICMS00></ICMS></imp>
      <infCTeNorm><infCarga><proPred>Moveis</proPred></infCarga></infCTeNorm>
    </infCte>
  </CTe>
</cteProc>
"#
    )
}

fn sem_progresso() -> impl FnMut(usize, usize) {
    |_, _| {}
}

#[test]
fn nfe_extrai_totais_e_itens() {
    let pasta = TempDir::new().unwrap();
    fs::write(pasta.path().join("nota.xml"), nfe_basica(CHAVE_NFE)).unwrap();

    let extracao = processar_pasta(pasta.path(), &mut sem_progresso()).unwrap();

    assert_eq!(extracao.arquivos_com_erro, 0);
    assert_eq!(extracao.nfe_totais.len(), 1);
    let totais = &extracao.nfe_totais[0];
    assert_eq!(totais.chave, CHAVE_NFE);
    assert_eq!(totais.num_nf, "123");
    assert_eq!(totais.cnpj_emitente, "12345678000195");
    assert_eq!(totais.tipo_nota, TipoNota::Normal);
    assert_eq!(totais.cfop, "5102");
    assert_eq!(totais.vl_doc, dec!(120.00));
    assert_eq!(totais.icms, dec!(10.00));
    assert_eq!(totais.ipi, dec!(5.00));

    assert_eq!(extracao.nfe_itens.len(), 1);
    let item = &extracao.nfe_itens[0];
    assert_eq!(item.n_item, "1");
    assert_eq!(item.tipo_destinatario, TipoDestinatario::PessoaJuridica);
    assert_eq!(item.cst_icms, "00");
    assert_eq!(item.vlr_bc_icms, dec!(115.00));
    // 18% stored as a fraction
    assert_eq!(item.p_icms, dec!(0.1800));
    // accounted value: 115.00 product + 5.00 IPI
    assert_eq!(item.vlr_prod, dec!(120.00));
    // PIS/COFINS base: 120.00 - 10.00 ICMS - 5.00 IPI
    assert_eq!(item.bc_pis_cofins, dec!(105.00));
}

#[test]
fn nfe_com_desconto_frete_e_csosn() {
    let pasta = TempDir::new().unwrap();
    let xml = format!(
        r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe><infNFe Id="NFe{CHAVE_NFE}">
    <ide><nNF>77</nNF><finNFe>4</finNFe></ide>
    <emit><CPF>12345678901</CPF></emit>
    <dest><CPF>98765432109</CPF></dest>
    <det nItem="1">
      <prod><cProd>X</cProd><xProd>Caixa</xProd><NCM>44190000</NCM><CFOP>5405</CFOP>
        <qCom>1</qCom><vUnCom>200</vUnCom><vProd>200.00</vProd>
        <vFrete>12.00</vFrete><vSeg>3.00</vSeg><vDesc>15.00</vDesc><vOutro>5.00</vOutro></prod>
      <imposto>
        <ICMS><ICMSSN101><orig>0</orig><CSOSN>101</CSOSN><vCredICMSSN>4.00</vCredICMSSN></ICMSSN101></ICMS>
      </imposto>
    </det>
    <total><ICMSTot><vNF>205.00</vNF></ICMSTot></total>
  </infNFe></NFe>
</nfeProc>"#
    );
    fs::write(pasta.path().join("nota.xml"), xml).unwrap();

    let extracao = processar_pasta(pasta.path(), &mut sem_progresso()).unwrap();

    let totais = &extracao.nfe_totais[0];
    assert_eq!(totais.tipo_nota, TipoNota::Devolucao);
    // issuer identified by CPF; Simples credit aggregated from the lines
    assert_eq!(totais.cnpj_emitente, "12345678901");
    assert_eq!(totais.icms_sn, dec!(4.00));

    let item = &extracao.nfe_itens[0];
    assert_eq!(item.tipo_destinatario, TipoDestinatario::PessoaFisica);
    assert_eq!(item.cst_icms, "101");
    // 200 + 12 + 3 - 15 + 5
    assert_eq!(item.vlr_prod, dec!(205.00));
    // Simples credit deducted from the base alongside ICMS
    assert_eq!(item.bc_pis_cofins, dec!(201.00));
    assert_eq!(item.vlr_icms_sn, dec!(4.00));
}

#[test]
fn nfe_monofasico_nao_deduz_icms_da_base() {
    let pasta = TempDir::new().unwrap();
    let xml = format!(
        r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe><infNFe Id="NFe{CHAVE_NFE}">
    <ide><nNF>88</nNF><finNFe>1</finNFe></ide>
    <emit><CNPJ>12345678000195</CNPJ></emit>
    <dest><CNPJ>98765432000100</CNPJ></dest>
    <det nItem="1">
      <prod><cProd>G</cProd><xProd>Gasolina</xProd><NCM>27101259</NCM><CFOP>5656</CFOP>
        <qCom>100</qCom><vUnCom>6</vUnCom><vProd>600.00</vProd></prod>
      <imposto>
        <ICMS><ICMS61><orig>0</orig><CST>61</CST><qBCMono>100.00</qBCMono><vICMSMono>30.00</vICMSMono><vICMSMonoRet>12.00</vICMSMonoRet></ICMS61></ICMS>
      </imposto>
    </det>
    <total><ICMSTot><vNF>600.00</vNF></ICMSTot></total>
  </infNFe></NFe>
</nfeProc>"#
    );
    fs::write(pasta.path().join("nota.xml"), xml).unwrap();

    let extracao = processar_pasta(pasta.path(), &mut sem_progresso()).unwrap();

    let item = &extracao.nfe_itens[0];
    assert_eq!(item.vlr_icms_mono, dec!(42.00));
    // monophasic lines keep ICMS in the PIS/COFINS base
    assert_eq!(item.bc_pis_cofins, dec!(600.00));
    assert_eq!(extracao.nfe_totais[0].icms_mono, dec!(42.00));
}

#[test]
fn cte_extrai_partes_e_impostos() {
    let pasta = TempDir::new().unwrap();
    fs::write(pasta.path().join("cte.xml"), cte_basico(CHAVE_CTE)).unwrap();

    let extracao = processar_pasta(pasta.path(), &mut sem_progresso()).unwrap();

    assert_eq!(extracao.cte_totais.len(), 1);
    let cte = &extracao.cte_totais[0];
    assert_eq!(cte.chave, CHAVE_CTE);
    assert_eq!(cte.num_cte, "555");
    assert_eq!(cte.cnpj_transportador, "11111111000111");
    assert_eq!(cte.uf_emitente, "SP");
    assert_eq!(cte.cfop, "5353");
    assert_eq!(cte.cst, "00");
    assert_eq!(cte.vl_total, dec!(1500.00));
    assert_eq!(cte.vl_bc_icms, dec!(1500.00));
    assert_eq!(cte.vl_icms, dec!(180.00));
    assert_eq!(cte.aliq_icms, dec!(12.00));
    assert_eq!(cte.mun_origem, "Sao Paulo");
    assert_eq!(cte.mun_destino, "Campinas");
    assert_eq!(cte.item_predominante, "Moveis");
    // indicator 0: the sender pays
    assert_eq!(cte.tomador_cnpj, "22222222000122");
    assert_eq!(cte.tomador_nome, "Remetente SA");
}

#[test]
fn cte_tomador_outros_le_do_proprio_indicador() {
    let pasta = TempDir::new().unwrap();
    let xml = format!(
        r#"<cteProc xmlns="http://www.portalfiscal.inf.br/cte">
  <CTe><infCte Id="CTe{CHAVE_CTE}">
    <ide><nCT>9</nCT><CFOP>6353</CFOP>
      <toma4><toma>4</toma><CNPJ>44444444000144</CNPJ><xNome>Pagador Externo</xNome></toma4>
    </ide>
    <emit><CNPJ>11111111000111</CNPJ></emit>
    <vPrest><vTPrest>90.00</vTPrest></vPrest>
    <imp><ICMS><ICMS45><CST>45</CST></ICMS45></ICMS></imp>
  </infCte></CTe>
</cteProc>"#
    );
    fs::write(pasta.path().join("cte.xml"), xml).unwrap();

    let extracao = processar_pasta(pasta.path(), &mut sem_progresso()).unwrap();

    let cte = &extracao.cte_totais[0];
    assert_eq!(cte.tomador_cnpj, "44444444000144");
    assert_eq!(cte.tomador_nome, "Pagador Externo");
    assert_eq!(cte.vl_icms, dec!(0));
}

#[test]
fn lote_deduplica_e_conta_erros() {
    let pasta = TempDir::new().unwrap();
    fs::write(pasta.path().join("a.xml"), nfe_basica(CHAVE_NFE)).unwrap();
    // same key again: first occurrence wins
    fs::write(pasta.path().join("b.xml"), nfe_basica(CHAVE_NFE)).unwrap();
    fs::write(pasta.path().join("c.xml"), nfe_basica(CHAVE_NFE_2)).unwrap();
    // malformed file: counted, not fatal
    fs::write(pasta.path().join("quebrado.xml"), "<nfeProc><infNFe").unwrap();
    // short key: counted
    fs::write(
        pasta.path().join("chave_curta.xml"),
        r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe"><infNFe Id="NFe123"><ide><nNF>1</nNF></ide></infNFe></NFe>"#,
    )
    .unwrap();
    // unrelated XML species: silently skipped
    fs::write(pasta.path().join("outro.xml"), "<recibo><ok/></recibo>").unwrap();
    // non-XML extension: not listed
    fs::write(pasta.path().join("leia-me.txt"), "nada").unwrap();

    let mut chamadas = Vec::new();
    let mut progresso = |atual: usize, total: usize| chamadas.push((atual, total));
    let extracao = processar_pasta(pasta.path(), &mut progresso).unwrap();

    assert_eq!(extracao.nfe_totais.len(), 2);
    assert_eq!(extracao.arquivos_com_erro, 2);
    // initial call plus one per file
    assert_eq!(chamadas.first(), Some(&(0, 6)));
    assert_eq!(chamadas.last(), Some(&(6, 6)));
    assert_eq!(chamadas.len(), 7);
}

#[test]
fn pasta_inexistente_eh_fatal() {
    let pasta = TempDir::new().unwrap();
    let inexistente = pasta.path().join("nao_existe");

    let resultado = processar_pasta(&inexistente, &mut sem_progresso());

    assert!(resultado.is_err());
}
