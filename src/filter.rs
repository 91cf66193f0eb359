use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::Champion;

static LEADING_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d[\d,]*)").unwrap());

/// Numeric company size, or `Unknown` when the descriptor has no leading number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanySize {
    Known(u64),
    Unknown,
}

/// Leading digit group, thousands separators dropped: "1,001-5,000 employees" → 1001.
/// A number too large for u64 saturates; it is still a known size.
pub fn parse_company_size(descriptor: &str) -> CompanySize {
    LEADING_DIGITS_RE
        .captures(descriptor)
        .map_or(CompanySize::Unknown, |c| {
            CompanySize::Known(c[1].replace(',', "").parse::<u64>().unwrap_or(u64::MAX))
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Role must contain one of these, case-insensitively.
    pub role_keywords: Vec<String>,
    pub min_size: u64,
    pub max_size: u64,
    /// Size assumed when the descriptor is "unknown" or has no number.
    pub unknown_size_default: u64,
    /// Companies whose name contains any of these, case-insensitively, are dropped.
    pub denylist: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            role_keywords: vec!["director".into(), "staff".into()],
            min_size: 250,
            max_size: 2500,
            unknown_size_default: 250,
            denylist: ["google", "amazon", "microsoft", "facebook", "uber", "linkedin"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl FilterRules {
    /// Survivors in input order. The input is left untouched.
    pub fn apply(&self, champions: &[Champion]) -> Vec<Champion> {
        champions.iter().filter(|c| self.admits(c)).cloned().collect()
    }

    pub fn admits(&self, champion: &Champion) -> bool {
        self.role_matches(&champion.role)
            && (self.min_size..=self.max_size).contains(&self.size_of(&champion.company_size))
            && !self.is_denied(&champion.company)
    }

    pub fn size_of(&self, descriptor: &str) -> u64 {
        match parse_company_size(descriptor) {
            CompanySize::Known(n) => n,
            CompanySize::Unknown => self.unknown_size_default,
        }
    }

    fn role_matches(&self, role: &str) -> bool {
        let role = role.to_lowercase();
        self.role_keywords.iter().any(|k| role.contains(&k.to_lowercase()))
    }

    fn is_denied(&self, company: &str) -> bool {
        let company = company.to_lowercase();
        self.denylist.iter().any(|d| company.contains(&d.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn champion(role: &str, size: &str, company: &str) -> Champion {
        Champion {
            name: "A".into(),
            role: role.into(),
            company: company.into(),
            company_size: size.into(),
            source: "https://vendor.test/customers".into(),
        }
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_company_size("1,001-5,000 employees"), CompanySize::Known(1001));
        assert_eq!(parse_company_size("300 employees"), CompanySize::Known(300));
        assert_eq!(parse_company_size("  51-200 employees"), CompanySize::Known(51));
        assert_eq!(parse_company_size("Unknown"), CompanySize::Unknown);
        assert_eq!(parse_company_size("unknown"), CompanySize::Unknown);
        assert_eq!(parse_company_size("about 300"), CompanySize::Unknown);
        assert_eq!(parse_company_size(""), CompanySize::Unknown);
    }

    #[test]
    fn oversized_number_is_known_and_rejected() {
        let huge = "99,999,999,999,999,999,999 employees";
        assert_eq!(parse_company_size(huge), CompanySize::Known(u64::MAX));
        assert!(!FilterRules::default().admits(&champion("Director", huge, "Acme")));
    }

    #[test]
    fn unknown_size_uses_named_default() {
        let rules = FilterRules::default();
        assert_eq!(rules.size_of("Unknown"), 250);
        assert_eq!(rules.size_of("250 employees"), 250);

        let strict = FilterRules {
            unknown_size_default: 0,
            ..FilterRules::default()
        };
        assert!(!strict.admits(&champion("Director", "unknown", "Acme")));
        assert!(strict.admits(&champion("Director", "250 employees", "Acme")));
    }

    #[test]
    fn staff_engineer_passes_microsoft_does_not() {
        let rules = FilterRules::default();
        assert!(rules.admits(&champion("Staff Engineer", "300 employees", "Acme")));
        assert!(!rules.admits(&champion("Staff Engineer", "300 employees", "Microsoft")));
    }

    #[test]
    fn denylist_ignores_case() {
        let rules = FilterRules::default();
        for company in ["Google Inc", "GOOGLE INC", "google inc", "Uber Freight"] {
            assert!(!rules.admits(&champion("Director", "300 employees", company)), "{company}");
        }
    }

    #[test]
    fn role_and_range_bounds() {
        let rules = FilterRules::default();
        assert!(rules.admits(&champion("Sr. DIRECTOR, Platform", "2,500 employees", "Acme")));
        assert!(!rules.admits(&champion("VP Engineering", "300 employees", "Acme")));
        assert!(!rules.admits(&champion("Director", "249 employees", "Acme")));
        assert!(!rules.admits(&champion("Director", "2,501 employees", "Acme")));
        assert!(!rules.admits(&champion("Director", "10,001+ employees", "Acme")));
    }

    #[test]
    fn apply_is_idempotent_and_keeps_order() {
        let rules = FilterRules::default();
        let input = vec![
            champion("Director", "300 employees", "Zeta"),
            champion("Intern", "300 employees", "Acme"),
            champion("Staff SRE", "Unknown", "Beta"),
            champion("Director", "300 employees", "Amazon"),
            champion("Staff PM", "1,001-5,000 employees", "Alpha"),
        ];
        let once = rules.apply(&input);
        let companies: Vec<&str> = once.iter().map(|c| c.company.as_str()).collect();
        assert_eq!(companies, ["Zeta", "Beta", "Alpha"]);
        assert_eq!(rules.apply(&once), once);
        assert_eq!(input.len(), 5);
    }
}
