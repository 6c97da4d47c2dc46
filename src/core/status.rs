use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Join outcome for one document across the two sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Situacao {
    /// Present in both sources.
    Ok,
    /// Present only in the XML batch.
    FaltaNoSped,
    /// Present only in the SPED file.
    FaltaXml,
    /// Present in both, but the XML carries no issuer identifier.
    SemCnpjNoXml,
}

impl Situacao {
    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::FaltaNoSped => "FALTA NO SPED",
            Self::FaltaXml => "FALTA XML",
            Self::SemCnpjNoXml => "SEM CNPJ NO XML",
        }
    }
}

impl std::fmt::Display for Situacao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

/// Per-dimension comparison status (value, CFOP, each tax kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    /// Multi-valued CFOP sets that match (directly or transformed).
    OkMultiplos,
    Divergente,
    Revisar,
    /// Multi-valued CFOP sets that do not match.
    RevisarMultiplos,
    /// Line-level check with no SPED counterpart.
    RevisarSemSped,
    /// Line-level check with no XML counterpart.
    RevisarSemXml,
    /// Dimension not evaluated for this document.
    NaoAplicavel,
}

impl Status {
    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::OkMultiplos => "OK (Múltiplos)",
            Self::Divergente => "DIVERGENTE",
            Self::Revisar => "REVISAR",
            Self::RevisarMultiplos => "REVISAR (Múltiplos)",
            Self::RevisarSemSped => "REVISAR (Sem SPED)",
            Self::RevisarSemXml => "REVISAR (Sem XML)",
            Self::NaoAplicavel => "N/A",
        }
    }

    pub fn is_divergente(&self) -> bool {
        matches!(self, Self::Divergente)
    }

    /// Variants that pull the overall status down to REVISAR.
    pub fn exige_revisao(&self) -> bool {
        matches!(self, Self::Revisar | Self::RevisarMultiplos)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

/// Overall per-document status. Priority: missing source > DIVERGENTE >
/// REVISAR > OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusGeral {
    Ok,
    Divergente,
    Revisar,
    FaltaNoSped,
    FaltaXml,
}

impl StatusGeral {
    pub fn rotulo(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Divergente => "DIVERGENTE",
            Self::Revisar => "REVISAR",
            Self::FaltaNoSped => "FALTA NO SPED",
            Self::FaltaXml => "FALTA XML",
        }
    }
}

impl std::fmt::Display for StatusGeral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rotulo())
    }
}

/// Roll the per-dimension statuses up into the overall document status.
pub fn consolidar_status(situacao: Situacao, dimensoes: &[Status]) -> StatusGeral {
    match situacao {
        Situacao::FaltaNoSped => return StatusGeral::FaltaNoSped,
        Situacao::FaltaXml => return StatusGeral::FaltaXml,
        Situacao::Ok | Situacao::SemCnpjNoXml => {}
    }
    if dimensoes.iter().any(Status::is_divergente) {
        return StatusGeral::Divergente;
    }
    if dimensoes.iter().any(Status::exige_revisao) || situacao == Situacao::SemCnpjNoXml {
        return StatusGeral::Revisar;
    }
    StatusGeral::Ok
}

/// Inclusive absolute-difference comparison against the caller's tolerance.
pub fn dentro_da_tolerancia(a: Decimal, b: Decimal, tolerancia: Decimal) -> bool {
    (a - b).abs() <= tolerancia
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tolerancia_inclusiva() {
        assert!(dentro_da_tolerancia(dec!(1000.00), dec!(1000.02), dec!(0.02)));
        assert!(!dentro_da_tolerancia(dec!(1000.00), dec!(1000.02), dec!(0.01)));
    }

    #[test]
    fn prioridade_do_status_geral() {
        let dims = [Status::Ok, Status::Divergente, Status::Revisar];
        assert_eq!(consolidar_status(Situacao::Ok, &dims), StatusGeral::Divergente);

        let dims = [Status::Ok, Status::RevisarMultiplos];
        assert_eq!(consolidar_status(Situacao::Ok, &dims), StatusGeral::Revisar);

        let dims = [Status::NaoAplicavel; 9];
        assert_eq!(
            consolidar_status(Situacao::SemCnpjNoXml, &dims),
            StatusGeral::Revisar
        );

        let dims = [Status::Divergente];
        assert_eq!(
            consolidar_status(Situacao::FaltaXml, &dims),
            StatusGeral::FaltaXml
        );
    }
}
