use std::io::Write;

use conciliador::recon::conciliar_itens;
use conciliador::rules::RegrasNcm;
use conciliador::{
    CFOP_SEM_SPED, NfeItem, ReconRecord, Situacao, SpedItem, Status, StatusGeral,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

const CHAVE: &str = "35240112345678000195550010000001231000001234";

fn item_xml(n_item: &str, vlr_prod: Decimal) -> NfeItem {
    NfeItem {
        chave: CHAVE.to_string(),
        n_item: n_item.to_string(),
        cfop: "5102".to_string(),
        ncm: "73181500".to_string(),
        vlr_prod,
        bc_pis_cofins: vlr_prod,
        ..NfeItem::default()
    }
}

fn item_sped(n_item: &str) -> SpedItem {
    SpedItem {
        chave: CHAVE.to_string(),
        n_item: n_item.to_string(),
        cfop: "1102".to_string(),
        cst_icms: "000".to_string(),
        vl_opr: dec!(100.00),
        vl_icms: dec!(18.00),
        ..SpedItem::default()
    }
}

fn registro_cabecalho() -> ReconRecord {
    ReconRecord {
        status_geral: StatusGeral::Ok,
        situacao: Situacao::Ok,
        chave: CHAVE.to_string(),
        num_nf: "123".to_string(),
        cnpj_emitente: "12345678000195".to_string(),
        acumulador: "101".to_string(),
        tipo_nota: None,
        status_valor: Status::Ok,
        vl_doc_xml: dec!(200.00),
        vl_doc_sped: dec!(200.00),
        status_cfop: Status::Ok,
        cfop_xml: "5102".to_string(),
        cfop_sped: "1102".to_string(),
        cest_xml: String::new(),
        status_icms: Status::Ok,
        icms_total_xml: dec!(36.00),
        icms_sped: dec!(36.00),
        status_icms_st: Status::Ok,
        icms_st_xml: dec!(0),
        icms_st_sped: dec!(0),
        status_fcp_st: Status::Ok,
        fcp_st_xml: dec!(0),
        fcp_st_sped: dec!(0),
        status_ipi: Status::Ok,
        ipi_total_xml: dec!(0),
        ipi_sped: dec!(0),
        status_icms_mono: Status::Ok,
        icms_mono_xml: dec!(0),
        icms_mono_sped: dec!(0),
        bc_pis_cofins: dec!(200.00),
        status_pis: Status::Ok,
        pis_calc: dec!(3.30),
        pis_sped: dec!(3.30),
        status_cofins: Status::Ok,
        cofins_calc: dec!(15.20),
        cofins_sped: dec!(15.20),
    }
}

#[test]
fn rateio_proporcional_pelo_valor_do_documento() {
    // two lines, 150/50 of a 200.00 document
    let itens = conciliar_itens(
        &[item_xml("1", dec!(150.00)), item_xml("2", dec!(50.00))],
        &[item_sped("1"), item_sped("2")],
        &[registro_cabecalho()],
        None,
    );

    assert_eq!(itens.len(), 2);
    // header ICMS 36.00 split 75% / 25%
    assert_eq!(itens[0].icms_sped, dec!(27.00));
    assert_eq!(itens[1].icms_sped, dec!(9.00));
    // header PIS 3.30 split the same way (0.825 rounds to even)
    assert_eq!(itens[0].pis_sped, dec!(2.48));
    assert_eq!(itens[1].pis_sped, dec!(0.82));
    // per-line PIS recomputed from the line base
    assert_eq!(itens[0].pis_calc, dec!(2.48));
    assert_eq!(itens[1].cofins_calc, dec!(3.80));
}

#[test]
fn item_sem_sped_recebe_sentinela() {
    let itens = conciliar_itens(
        &[item_xml("1", dec!(150.00))],
        &[],
        &[registro_cabecalho()],
        None,
    );

    assert_eq!(itens[0].cfop_sped_item, CFOP_SEM_SPED);
    assert_eq!(itens[0].status_cfop_item, Status::RevisarSemSped);
    assert_eq!(itens[0].vl_opr_sped_item, dec!(0));
}

#[test]
fn status_de_cfop_por_item() {
    let itens = conciliar_itens(
        &[item_xml("1", dec!(100.00))],
        &[item_sped("1")],
        &[registro_cabecalho()],
        None,
    );
    // 5102 books as 1102
    assert_eq!(itens[0].status_cfop_item, Status::Ok);

    let mut divergente = item_sped("1");
    divergente.cfop = "2102".to_string();
    let itens = conciliar_itens(
        &[item_xml("1", dec!(100.00))],
        &[divergente],
        &[registro_cabecalho()],
        None,
    );
    assert_eq!(itens[0].status_cfop_item, Status::Divergente);
}

#[test]
fn sequencias_sao_coagidas_para_inteiro() {
    let mut sped = item_sped("1");
    sped.n_item = "1.0".to_string();
    let itens = conciliar_itens(
        &[item_xml("1", dec!(100.00))],
        &[sped],
        &[registro_cabecalho()],
        None,
    );

    assert_eq!(itens[0].n_item, 1);
    // "1" and "1.0" joined as the same sequence
    assert_eq!(itens[0].cst_icms_sped_item, "000");
}

#[test]
fn enriquecimento_por_ncm() {
    let mut arquivo = NamedTempFile::new().unwrap();
    writeln!(arquivo, "NCM;PRODUTO;ST;CST PIS/COFINS;MVA ORIGINAL").unwrap();
    writeln!(arquivo, "73181500;Parafusos;SIM;4;45,5").unwrap();
    writeln!(arquivo, "84219999;Filtros;NAO;6;0").unwrap();
    let regras = RegrasNcm::carregar(arquivo.path()).unwrap();

    let itens = conciliar_itens(
        &[item_xml("1", dec!(100.00))],
        &[item_sped("1")],
        &[registro_cabecalho()],
        Some(&regras),
    );

    assert_eq!(itens[0].produto_regra, "Parafusos");
    assert_eq!(itens[0].st_regra, "SIM");
    assert_eq!(itens[0].regime_pis_cofins, "MONOFÁSICO");
    assert_eq!(itens[0].mva_original, dec!(45.5));

    // NCM absent from the table: regime not evaluated
    let mut sem_regra = item_xml("1", dec!(100.00));
    sem_regra.ncm = "00000000".to_string();
    let itens = conciliar_itens(
        &[sem_regra],
        &[item_sped("1")],
        &[registro_cabecalho()],
        Some(&regras),
    );
    assert_eq!(itens[0].regime_pis_cofins, "N/A");
    assert_eq!(itens[0].produto_regra, "");
}

#[test]
fn dif_valor_total_e_icms_total_do_item() {
    let mut cabecalho = registro_cabecalho();
    cabecalho.vl_doc_sped = dec!(190.00);

    let mut item = item_xml("1", dec!(100.00));
    item.vlr_icms = dec!(10.00);
    item.vlr_icms_sn = dec!(2.00);
    item.vlr_icms_mono = dec!(1.00);

    let itens = conciliar_itens(&[item], &[item_sped("1")], &[cabecalho], None);

    assert_eq!(itens[0].dif_valor_total, dec!(10.00));
    assert_eq!(itens[0].vlr_icms_total_item, dec!(13.00));
}
