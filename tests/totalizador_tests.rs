use std::collections::HashSet;

use conciliador::SpedAnalitico;
use conciliador::recon::{base_difal_por_cfop, dividir_entradas_saidas, totalizar};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn analitico(
    chave: &str,
    cfop: &str,
    cst: &str,
    aliq: Decimal,
    vl_opr: Decimal,
    vl_icms: Decimal,
) -> SpedAnalitico {
    SpedAnalitico {
        chave: chave.to_string(),
        cfop: cfop.to_string(),
        cst_icms: cst.to_string(),
        aliq_icms: aliq,
        vl_opr,
        vl_bc_icms: vl_opr,
        vl_icms,
        ..SpedAnalitico::default()
    }
}

#[test]
fn linhas_do_mesmo_grupo_somam_e_recalculam_aliquota() {
    let linhas = vec![
        analitico("A", "5102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("B", "5102", "000", dec!(18.00), dec!(300.00), dec!(54.00)),
    ];

    let totais = totalizar(&linhas);

    assert_eq!(totais.len(), 1);
    let linha = &totais[0];
    assert_eq!(linha.cfop, "5102");
    assert_eq!(linha.total_operacao, dec!(400.00));
    assert_eq!(linha.total_icms, dec!(72.00));
    assert_eq!(linha.qtd_documentos, 2);
    // recomputed from the merged sums: 72 / 400 × 100
    assert_eq!(linha.aliquota_efetiva, dec!(18.00));
    assert_eq!(linha.descricao_cst, "00 - Tributada integralmente");
}

#[test]
fn aliquota_efetiva_desconta_ipi_e_st() {
    let mut linha = analitico("A", "5102", "000", dec!(18.00), dec!(120.00), dec!(18.00));
    linha.vl_ipi = dec!(10.00);
    linha.vl_icms_st = dec!(10.00);

    let totais = totalizar(&[linha]);

    // 18 / (120 - 10 - 10) × 100
    assert_eq!(totais[0].aliquota_efetiva, dec!(18.00));
}

#[test]
fn denominador_nao_positivo_zera_aliquota() {
    let mut linha = analitico("A", "5102", "000", dec!(18.00), dec!(10.00), dec!(5.00));
    linha.vl_ipi = dec!(10.00);

    let totais = totalizar(&[linha]);

    assert_eq!(totais[0].aliquota_efetiva, dec!(0));
}

#[test]
fn grupos_distintos_por_aliquota() {
    let linhas = vec![
        analitico("A", "5102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("A", "5102", "000", dec!(12.00), dec!(100.00), dec!(12.00)),
    ];

    let totais = totalizar(&linhas);

    assert_eq!(totais.len(), 2);
    // the same document counted once per group
    assert!(totais.iter().all(|t| t.qtd_documentos == 1));
}

#[test]
fn divisao_entre_entradas_e_saidas() {
    let linhas = vec![
        analitico("A", "1102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("B", "2102", "000", dec!(12.00), dec!(100.00), dec!(12.00)),
        analitico("C", "5102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("D", "6102", "000", dec!(12.00), dec!(100.00), dec!(12.00)),
    ];

    let (entradas, saidas) = dividir_entradas_saidas(totalizar(&linhas));

    assert_eq!(entradas.len(), 2);
    assert_eq!(saidas.len(), 2);
    assert!(entradas.iter().all(|t| t.cfop.starts_with(['1', '2'])));
    assert!(saidas.iter().all(|t| t.cfop.starts_with(['5', '6'])));
}

#[test]
fn ordenacao_por_cfop_cst_aliquota() {
    let linhas = vec![
        analitico("A", "5405", "060", dec!(0.00), dec!(50.00), dec!(0.00)),
        analitico("B", "5102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("C", "5102", "000", dec!(12.00), dec!(100.00), dec!(12.00)),
    ];

    let totais = totalizar(&linhas);

    let ordem: Vec<(&str, Decimal)> = totais
        .iter()
        .map(|t| (t.cfop.as_str(), t.aliquota))
        .collect();
    assert_eq!(
        ordem,
        vec![
            ("5102", dec!(12.00)),
            ("5102", dec!(18.00)),
            ("5405", dec!(0.00)),
        ]
    );
}

#[test]
fn base_difal_restrita_as_chaves_marcadas() {
    let linhas = vec![
        analitico("A", "6102", "000", dec!(18.00), dec!(100.00), dec!(18.00)),
        analitico("B", "6102", "000", dec!(18.00), dec!(200.00), dec!(36.00)),
        analitico("A", "6108", "000", dec!(18.00), dec!(50.00), dec!(9.00)),
    ];
    let marcadas: HashSet<String> = ["A".to_string()].into_iter().collect();

    let base = base_difal_por_cfop(&linhas, &marcadas);

    assert_eq!(base.len(), 2);
    assert_eq!(base[0].cfop, "6102");
    assert_eq!(base[0].valor_base, dec!(100.00));
    assert_eq!(base[1].cfop, "6108");
    assert_eq!(base[1].valor_base, dec!(50.00));

    assert!(base_difal_por_cfop(&linhas, &HashSet::new()).is_empty());
}
