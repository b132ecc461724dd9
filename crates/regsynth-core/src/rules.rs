use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifier of a consistency rule. Declaration order is evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    DuplicateActiveResidency,
    ExpiredButActiveLicense,
    FutureStartResidency,
    ConflictingCitizenship,
    ReferentialIntegrity,
    ResidencyPeriodOrder,
    ResidencyStatusPeriod,
    ResidencyOverlap,
    DeceasedActiveResidency,
    LicenseDateOrder,
    PersonalCodeFormat,
}

impl RuleId {
    pub const ALL: [RuleId; 11] = [
        RuleId::DuplicateActiveResidency,
        RuleId::ExpiredButActiveLicense,
        RuleId::FutureStartResidency,
        RuleId::ConflictingCitizenship,
        RuleId::ReferentialIntegrity,
        RuleId::ResidencyPeriodOrder,
        RuleId::ResidencyStatusPeriod,
        RuleId::ResidencyOverlap,
        RuleId::DeceasedActiveResidency,
        RuleId::LicenseDateOrder,
        RuleId::PersonalCodeFormat,
    ];

    /// Rules the error injector knows how to violate.
    pub const INJECTABLE: [RuleId; 4] = [
        RuleId::DuplicateActiveResidency,
        RuleId::ExpiredButActiveLicense,
        RuleId::FutureStartResidency,
        RuleId::ConflictingCitizenship,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::DuplicateActiveResidency => "duplicate-active-residency",
            RuleId::ExpiredButActiveLicense => "expired-but-active-license",
            RuleId::FutureStartResidency => "future-start-residency",
            RuleId::ConflictingCitizenship => "conflicting-citizenship",
            RuleId::ReferentialIntegrity => "referential-integrity",
            RuleId::ResidencyPeriodOrder => "residency-period-order",
            RuleId::ResidencyStatusPeriod => "residency-status-period",
            RuleId::ResidencyOverlap => "residency-overlap",
            RuleId::DeceasedActiveResidency => "deceased-active-residency",
            RuleId::LicenseDateOrder => "license-date-order",
            RuleId::PersonalCodeFormat => "personal-code-format",
        }
    }

    pub fn is_injectable(self) -> bool {
        Self::INJECTABLE.contains(&self)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        RuleId::ALL
            .into_iter()
            .find(|rule| rule.as_str() == trimmed)
            .ok_or_else(|| Error::Configuration(format!("unknown rule id '{}'", trimmed)))
    }
}

/// Pointer to an offending row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowRef {
    pub table: String,
    pub id: u64,
}

impl RowRef {
    pub fn new(table: &str, id: u64) -> Self {
        Self {
            table: table.to_string(),
            id,
        }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_identifier() {
        for rule in RuleId::ALL {
            assert_eq!(rule.as_str().parse::<RuleId>().expect("parse"), rule);
        }
        assert!("no-such-rule".parse::<RuleId>().is_err());
    }

    #[test]
    fn all_is_sorted() {
        let mut sorted = RuleId::ALL;
        sorted.sort();
        assert_eq!(sorted, RuleId::ALL);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&RuleId::FutureStartResidency).expect("json");
        assert_eq!(json, "\"future-start-residency\"");
    }
}
