//! Free-text screening that keeps contact details off the marketplace.
//!
//! Movers and clients must transact through the platform, so bid notes are blocked
//! when they leak a phone number, an email, a link, a company identity, or pressure
//! to move the conversation elsewhere.

mod normalize;
mod rules;

pub use normalize::ScanInput;
pub use rules::ScanRule;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of contact leak reported to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactViolation {
    PhoneNumber,
    EmailAddress,
    WebLink,
    DigitSequence,
    CircumventionAttempt,
    CompanyName,
}

impl ContactViolation {
    pub const fn code(self) -> &'static str {
        match self {
            Self::PhoneNumber => "phone_number",
            Self::EmailAddress => "email_address",
            Self::WebLink => "web_link",
            Self::DigitSequence => "digit_sequence",
            Self::CircumventionAttempt => "circumvention_attempt",
            Self::CompanyName => "company_name",
        }
    }

    /// Wording shown verbatim to the person whose text was blocked.
    pub const fn label(self) -> &'static str {
        match self {
            Self::PhoneNumber => "Numéros de téléphone interdits",
            Self::EmailAddress => "Adresses email interdites",
            Self::WebLink => "URLs et liens web interdits",
            Self::DigitSequence => "Séquences de chiffres interdites",
            Self::CircumventionAttempt => "Tentative de contournement de la plateforme détectée",
            Self::CompanyName => "Noms d'entreprise interdits",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactScanResult {
    pub is_valid: bool,
    pub violations: Vec<ContactViolation>,
    pub blocked_reasons: Vec<String>,
}

impl ContactScanResult {
    fn from_violations(violations: Vec<ContactViolation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            blocked_reasons: violations
                .iter()
                .map(|violation| violation.label().to_string())
                .collect(),
            violations,
        }
    }

    pub fn reason_codes(&self) -> Vec<&'static str> {
        self.violations.iter().map(|violation| violation.code()).collect()
    }
}

/// Ordered list of named detection rules. Every rule runs; a category is reported once.
#[derive(Clone)]
pub struct ContactInfoScanner {
    rules: Vec<(&'static str, ScanRule)>,
}

impl fmt::Debug for ContactInfoScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactInfoScanner")
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .finish()
    }
}

impl ContactInfoScanner {
    pub fn standard() -> Self {
        Self {
            rules: rules::STANDARD_RULES.to_vec(),
        }
    }

    /// Append a rule after the standard ones.
    pub fn with_rule(mut self, name: &'static str, rule: ScanRule) -> Self {
        self.rules.push((name, rule));
        self
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(name, _)| *name)
    }

    pub fn scan(&self, text: &str) -> ContactScanResult {
        if text.trim().is_empty() {
            return ContactScanResult::from_violations(Vec::new());
        }

        let input = ScanInput::new(text);
        let mut violations = Vec::new();
        for (_, rule) in &self.rules {
            if let Some(violation) = rule(&input) {
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }

        ContactScanResult::from_violations(violations)
    }

    /// The text itself when it passes, an empty string otherwise.
    pub fn sanitize<'a>(&self, text: &'a str) -> &'a str {
        if self.scan(text).is_valid {
            text
        } else {
            ""
        }
    }
}

impl Default for ContactInfoScanner {
    fn default() -> Self {
        Self::standard()
    }
}
