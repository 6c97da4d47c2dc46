//! Property-based tests for the comparison and aggregation rules.

use conciliador::core::cfop::cfop_equivalente_entrada;
use conciliador::recon::{ParametrosConciliacao, conciliar_documentos, totalizar};
use conciliador::rules::RegrasAcumuladores;
use conciliador::{NfeTotais, SpedAnalitico, SpedDocumento, Status, dentro_da_tolerancia};
use proptest::prelude::*;
use rust_decimal::Decimal;

const CHAVE: &str = "35240112345678000195550010000001231000001234";

fn centavos(valor: i64) -> Decimal {
    Decimal::new(valor, 2)
}

fn sem_regras() -> RegrasAcumuladores {
    RegrasAcumuladores::de_pares(Vec::<((String, String), String)>::new())
}

proptest! {
    /// The value status is OK exactly when the absolute difference does not
    /// exceed the tolerance — the boundary itself included.
    #[test]
    fn status_de_valor_espelha_a_tolerancia(
        xml_centavos in 0i64..10_000_000,
        sped_centavos in 0i64..10_000_000,
        tolerancia_centavos in 0i64..10_000,
    ) {
        let vl_xml = centavos(xml_centavos);
        let vl_sped = centavos(sped_centavos);
        let tolerancia = centavos(tolerancia_centavos);

        let nota = NfeTotais {
            chave: CHAVE.to_string(),
            cnpj_emitente: "12345678000195".to_string(),
            vl_doc: vl_xml,
            ..NfeTotais::default()
        };
        let documento = SpedDocumento {
            chave: CHAVE.to_string(),
            vl_doc: vl_sped,
            ..SpedDocumento::default()
        };
        let parametros = ParametrosConciliacao { tolerancia, ..Default::default() };

        let registros =
            conciliar_documentos(&[nota], &[documento], &[], &sem_regras(), &parametros);

        let esperado = if (vl_xml - vl_sped).abs() <= tolerancia {
            Status::Ok
        } else {
            Status::Divergente
        };
        prop_assert_eq!(registros[0].status_valor, esperado);
        prop_assert_eq!(
            dentro_da_tolerancia(vl_xml, vl_sped, tolerancia),
            esperado == Status::Ok
        );
    }

    /// Transforming a code is idempotent: the result is always an inbound
    /// code and a second application never changes it.
    #[test]
    fn transformacao_de_cfop_e_idempotente(cfop in "[1-7][0-9]{3}") {
        let uma_vez = cfop_equivalente_entrada(&cfop);
        let duas_vezes = cfop_equivalente_entrada(&uma_vez);
        prop_assert_eq!(&uma_vez, &duas_vezes);
        prop_assert!(!uma_vez.starts_with(['5', '6', '7']));
        // only the leading digit ever changes
        prop_assert_eq!(&uma_vez[1..], &cfop[1..]);
    }

    /// Merging analytic rows of one (CFOP, CST, rate) group totals the sums
    /// arithmetically and recomputes the effective rate from them.
    #[test]
    fn totalizador_soma_e_recalcula(
        valores in prop::collection::vec((1i64..1_000_000, 0i64..200_000), 1..8),
    ) {
        let linhas: Vec<SpedAnalitico> = valores
            .iter()
            .enumerate()
            .map(|(i, (opr, icms))| SpedAnalitico {
                chave: format!("DOC{i}"),
                cfop: "5102".to_string(),
                cst_icms: "000".to_string(),
                aliq_icms: Decimal::new(18, 0),
                vl_opr: centavos(*opr),
                vl_bc_icms: centavos(*opr),
                vl_icms: centavos(*icms),
                ..SpedAnalitico::default()
            })
            .collect();

        let totais = totalizar(&linhas);
        prop_assert_eq!(totais.len(), 1);

        let soma_opr: Decimal = valores.iter().map(|(opr, _)| centavos(*opr)).sum();
        let soma_icms: Decimal = valores.iter().map(|(_, icms)| centavos(*icms)).sum();
        prop_assert_eq!(totais[0].total_operacao, soma_opr);
        prop_assert_eq!(totais[0].total_icms, soma_icms);
        prop_assert_eq!(totais[0].qtd_documentos, valores.len());

        let esperada = if soma_opr > Decimal::ZERO {
            (soma_icms / soma_opr * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        prop_assert_eq!(totais[0].aliquota_efetiva, esperada);
    }

    /// The serialized CFOP set survives a split/join round trip.
    #[test]
    fn conjunto_de_cfops_ordenado_e_estavel(cfops in prop::collection::btree_set("[1-7][0-9]{3}", 0..6)) {
        let juntado = conciliador::juntar_cfops(&cfops);
        let de_volta: std::collections::BTreeSet<String> = juntado
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        prop_assert_eq!(de_volta, cfops);
    }
}
