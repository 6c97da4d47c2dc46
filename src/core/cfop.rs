//! CFOP correspondence rules.
//!
//! An outbound CFOP on the issuer's document (leading digit 5/6/7) books as
//! the matching inbound code (1/2/3) on the recipient's ledger; every other
//! code books unchanged.

use std::collections::BTreeSet;

use crate::core::{CFOP_SEM_SPED, Status};

/// Inbound equivalent of a CFOP: leading digit 5→1, 6→2, 7→3, else unchanged.
/// Idempotent on codes that are already inbound.
pub fn cfop_equivalente_entrada(cfop: &str) -> String {
    match cfop.as_bytes().first() {
        Some(b'5') => format!("1{}", &cfop[1..]),
        Some(b'6') => format!("2{}", &cfop[1..]),
        Some(b'7') => format!("3{}", &cfop[1..]),
        _ => cfop.to_string(),
    }
}

/// Split a "/"-joined CFOP field into its non-empty codes.
pub fn separar_cfops(campo: &str) -> BTreeSet<&str> {
    campo.split('/').filter(|c| !c.is_empty()).collect()
}

/// Join a CFOP set back into the serialized "/"-sorted form.
pub fn juntar_cfops<I, S>(cfops: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ordenados: BTreeSet<String> = cfops
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    ordenados.into_iter().collect::<Vec<_>>().join("/")
}

/// Document-level CFOP check over the two "/"-joined sets.
pub fn conferir_cfop(cfop_xml: &str, cfop_sped: &str) -> Status {
    if cfop_xml.is_empty() && !cfop_sped.is_empty() {
        return Status::NaoAplicavel;
    }

    let xml = separar_cfops(cfop_xml);
    let sped = separar_cfops(cfop_sped);
    if xml.is_empty() && sped.is_empty() {
        return Status::NaoAplicavel;
    }
    if xml.is_empty() || sped.is_empty() {
        return Status::Divergente;
    }

    if xml.len() == 1 && sped.len() == 1 {
        let xml_cfop = xml.iter().next().copied().unwrap_or_default();
        let sped_cfop = sped.iter().next().copied().unwrap_or_default();
        if xml_cfop == sped_cfop || cfop_equivalente_entrada(xml_cfop) == sped_cfop {
            return Status::Ok;
        }
        return Status::Divergente;
    }

    if xml == sped {
        return Status::OkMultiplos;
    }
    let esperados: BTreeSet<String> = xml.iter().map(|c| cfop_equivalente_entrada(c)).collect();
    let sped_owned: BTreeSet<String> = sped.iter().map(|c| c.to_string()).collect();
    if sped_owned == esperados {
        Status::OkMultiplos
    } else {
        Status::RevisarMultiplos
    }
}

/// Line-level CFOP check; one absent side flags the row for review instead of
/// divergence.
pub fn conferir_cfop_item(cfop_xml: &str, cfop_sped: &str) -> Status {
    if cfop_sped.is_empty() || cfop_sped == CFOP_SEM_SPED {
        return Status::RevisarSemSped;
    }
    if cfop_xml.is_empty() {
        return Status::RevisarSemXml;
    }
    if cfop_xml == cfop_sped || cfop_equivalente_entrada(cfop_xml) == cfop_sped {
        Status::Ok
    } else {
        Status::Divergente
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformacao_digito_inicial() {
        assert_eq!(cfop_equivalente_entrada("5102"), "1102");
        assert_eq!(cfop_equivalente_entrada("6108"), "2108");
        assert_eq!(cfop_equivalente_entrada("7101"), "3101");
        // inbound codes pass through untouched
        assert_eq!(cfop_equivalente_entrada("1102"), "1102");
        assert_eq!(cfop_equivalente_entrada("2403"), "2403");
    }

    #[test]
    fn conferencia_valor_unico() {
        assert_eq!(conferir_cfop("5102", "5102"), Status::Ok);
        assert_eq!(conferir_cfop("5102", "1102"), Status::Ok);
        assert_eq!(conferir_cfop("5102", "2102"), Status::Divergente);
    }

    #[test]
    fn conferencia_multiplos() {
        assert_eq!(conferir_cfop("5102/5405", "5102/5405"), Status::OkMultiplos);
        assert_eq!(conferir_cfop("5102/5405", "1102/1405"), Status::OkMultiplos);
        assert_eq!(
            conferir_cfop("5102/5405", "1102/2405"),
            Status::RevisarMultiplos
        );
    }

    #[test]
    fn lados_ausentes() {
        assert_eq!(conferir_cfop("", "1102"), Status::NaoAplicavel);
        assert_eq!(conferir_cfop("", ""), Status::NaoAplicavel);
        assert_eq!(conferir_cfop("5102", ""), Status::Divergente);
    }

    #[test]
    fn conferencia_item() {
        assert_eq!(conferir_cfop_item("5102", CFOP_SEM_SPED), Status::RevisarSemSped);
        assert_eq!(conferir_cfop_item("", "1102"), Status::RevisarSemXml);
        assert_eq!(conferir_cfop_item("5102", "1102"), Status::Ok);
        assert_eq!(conferir_cfop_item("6102", "1102"), Status::Divergente);
    }
}
