//! Eligibility predicates.
//!
//! Each check is a total function over [`ProjectMetadata`]: missing keys and
//! unexpected shapes make it return `false`, never an error.

use crate::metadata::{Node, ProjectMetadata};
use crate::reference::ReferenceSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

const TECHNOLOGICAL_DETAILS: &str = "Technological Details";
const TOKEN_LAUNCH: &str = "Token launch";
const SMART_CONTRACT: &str = "Smart Contract";

/// Runs for every project.
pub fn always_eligible(_meta: &ProjectMetadata) -> bool {
    true
}

/// Sections of `security_and_compliance` titled "Technological Details".
fn technological_details(meta: &ProjectMetadata) -> impl Iterator<Item = Node<'_>> {
    meta.get("security_and_compliance")
        .items()
        .filter(|section| section.has_title(TECHNOLOGICAL_DETAILS))
}

/// A "Technological Details" section lists a "Token launch" entry.
pub fn has_token_launch(meta: &ProjectMetadata) -> bool {
    technological_details(meta).any(|section| {
        section
            .get("value")
            .items()
            .any(|entry| entry.has_title(TOKEN_LAUNCH))
    })
}

/// `links[platform]` is present and neither null nor the empty string.
pub fn has_social_link(meta: &ProjectMetadata, platform: &str) -> bool {
    let link = meta.get("links").get(platform);
    !(link.is_absent() || link.is_null() || link.as_str() == Some(""))
}

/// `security_report` is present and truthy.
pub fn has_security_report(meta: &ProjectMetadata) -> bool {
    meta.get("security_report").is_truthy()
}

/// A whitepaper and a smart contract reference are both present.
///
/// Only the first "Smart Contract" entry of each "Technological Details"
/// section is looked at, and the search stops at the first section whose
/// contract value is truthy.
pub fn has_whitepaper_and_contract(meta: &ProjectMetadata) -> bool {
    if !meta.get("whitepaper").is_truthy() {
        return false;
    }

    technological_details(meta).any(|section| {
        section
            .get("value")
            .items()
            .find(|entry| entry.has_title(SMART_CONTRACT))
            .map(|entry| entry.get("value").is_truthy())
            .unwrap_or(false)
    })
}

/// The lower-cased `name` is a key of `references`.
pub fn name_in_reference_set(meta: &ProjectMetadata, references: &ReferenceSet) -> bool {
    meta.get("name")
        .as_str()
        .map(|name| references.contains(&name.to_lowercase()))
        .unwrap_or(false)
}

/// A resolved predicate, ready to evaluate.
#[derive(Debug, Clone)]
pub enum Predicate {
    Always,
    TokenLaunch,
    SocialLink(String),
    SecurityReport,
    WhitepaperAndContract,
    ReferenceName(Arc<ReferenceSet>),
}

impl Predicate {
    /// Evaluate against a project's metadata.
    pub fn evaluate(&self, meta: &ProjectMetadata) -> bool {
        match self {
            Predicate::Always => always_eligible(meta),
            Predicate::TokenLaunch => has_token_launch(meta),
            Predicate::SocialLink(platform) => has_social_link(meta, platform),
            Predicate::SecurityReport => has_security_report(meta),
            Predicate::WhitepaperAndContract => has_whitepaper_and_contract(meta),
            Predicate::ReferenceName(references) => name_in_reference_set(meta, references),
        }
    }
}

/// Error parsing a predicate name from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateParseError {
    #[error("Unknown predicate '{0}'")]
    Unknown(String),

    #[error("Predicate 'social_link' needs a platform, e.g. 'social_link:twitter'")]
    MissingPlatform,
}

/// Predicate as written in the config file.
///
/// Parsed from `always`, `token_launch`, `social_link:<platform>` (or the
/// `twitter` / `linkedin` shorthands), `security_report`,
/// `whitepaper_and_contract` and `reference_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PredicateSpec {
    Always,
    TokenLaunch,
    SocialLink(String),
    SecurityReport,
    WhitepaperAndContract,
    ReferenceName,
}

impl PredicateSpec {
    /// Whether this predicate needs a reference set to resolve.
    pub fn needs_references(&self) -> bool {
        matches!(self, PredicateSpec::ReferenceName)
    }

    /// Bind to runtime data. Returns `None` for `reference_name` without a set.
    pub fn resolve(&self, references: Option<&Arc<ReferenceSet>>) -> Option<Predicate> {
        Some(match self {
            PredicateSpec::Always => Predicate::Always,
            PredicateSpec::TokenLaunch => Predicate::TokenLaunch,
            PredicateSpec::SocialLink(platform) => Predicate::SocialLink(platform.clone()),
            PredicateSpec::SecurityReport => Predicate::SecurityReport,
            PredicateSpec::WhitepaperAndContract => Predicate::WhitepaperAndContract,
            PredicateSpec::ReferenceName => Predicate::ReferenceName(references?.clone()),
        })
    }
}

impl FromStr for PredicateSpec {
    type Err = PredicateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(platform) = s.strip_prefix("social_link:") {
            let platform = platform.trim();
            if platform.is_empty() {
                return Err(PredicateParseError::MissingPlatform);
            }
            return Ok(PredicateSpec::SocialLink(platform.to_string()));
        }

        match s {
            "always" => Ok(PredicateSpec::Always),
            "token_launch" => Ok(PredicateSpec::TokenLaunch),
            "twitter" | "linkedin" => Ok(PredicateSpec::SocialLink(s.to_string())),
            "social_link" => Err(PredicateParseError::MissingPlatform),
            "security_report" => Ok(PredicateSpec::SecurityReport),
            "whitepaper_and_contract" => Ok(PredicateSpec::WhitepaperAndContract),
            "reference_name" => Ok(PredicateSpec::ReferenceName),
            other => Err(PredicateParseError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for PredicateSpec {
    type Error = PredicateParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PredicateSpec> for String {
    fn from(spec: PredicateSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for PredicateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateSpec::Always => write!(f, "always"),
            PredicateSpec::TokenLaunch => write!(f, "token_launch"),
            PredicateSpec::SocialLink(platform) => write!(f, "social_link:{}", platform),
            PredicateSpec::SecurityReport => write!(f, "security_report"),
            PredicateSpec::WhitepaperAndContract => write!(f, "whitepaper_and_contract"),
            PredicateSpec::ReferenceName => write!(f, "reference_name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(yaml: &str) -> ProjectMetadata {
        ProjectMetadata::new(serde_yaml::from_str(yaml).unwrap())
    }

    const FULL: &str = r#"
name: Tether
whitepaper: https://tether.to/whitepaper.pdf
links:
  twitter: https://twitter.com/tether_to
  linkedin: ""
  telegram: ~
security_report:
  score: 87
security_and_compliance:
  - title: Audits
    value: none
  - title: Technological Details
    value:
      - title: Token launch
        value: "2014"
      - title: Smart Contract
        value: https://etherscan.io/token/0xdac17f958d2ee523a2206206994597c13d831ec7
"#;

    #[test]
    fn test_always_eligible() {
        assert!(always_eligible(&meta("{}")));
        assert!(always_eligible(&ProjectMetadata::new(serde_yaml::Value::Null)));
    }

    #[test]
    fn test_social_link() {
        let m = meta(FULL);
        assert!(has_social_link(&m, "twitter"));
        assert!(!has_social_link(&m, "linkedin"));
        assert!(!has_social_link(&m, "telegram"));
        assert!(!has_social_link(&m, "discord"));
        assert!(!has_social_link(&meta("name: x\n"), "twitter"));
        assert!(!has_social_link(&meta("links: [twitter]\n"), "twitter"));
        assert!(has_social_link(&meta("links: {twitter: \" \"}\n"), "twitter"));
    }

    #[test]
    fn test_token_launch() {
        assert!(has_token_launch(&meta(FULL)));
        assert!(!has_token_launch(&meta("name: x\n")));

        let wrong_section = r#"
security_and_compliance:
  - title: Audits
    value:
      - title: Token launch
"#;
        assert!(!has_token_launch(&meta(wrong_section)));

        let scalar_value = r#"
security_and_compliance:
  - title: Technological Details
    value: Token launch
"#;
        assert!(!has_token_launch(&meta(scalar_value)));

        let case_differs = r#"
security_and_compliance:
  - title: Technological Details
    value:
      - title: Token Launch
"#;
        assert!(!has_token_launch(&meta(case_differs)));
    }

    #[test]
    fn test_security_report() {
        assert!(has_security_report(&meta(FULL)));
        assert!(!has_security_report(&meta("security_report: \"\"\n")));
        assert!(!has_security_report(&meta("security_report: 0\n")));
        assert!(!has_security_report(&meta("security_report: ~\n")));
        assert!(!has_security_report(&meta("name: x\n")));
        assert!(has_security_report(&meta("security_report: true\n")));
    }

    #[test]
    fn test_whitepaper_and_contract() {
        assert!(has_whitepaper_and_contract(&meta(FULL)));

        let no_whitepaper = FULL.replace("whitepaper: https://tether.to/whitepaper.pdf", "whitepaper: \"\"");
        assert!(!has_whitepaper_and_contract(&meta(&no_whitepaper)));

        let whitepaper_only = "whitepaper: https://example.com/wp.pdf\n";
        assert!(!has_whitepaper_and_contract(&meta(whitepaper_only)));

        let contract_only = r#"
security_and_compliance:
  - title: Technological Details
    value:
      - title: Smart Contract
        value: 0xabc
"#;
        assert!(!has_whitepaper_and_contract(&meta(contract_only)));
    }

    #[test]
    fn test_whitepaper_and_contract_first_match() {
        // An empty first entry hides a later one in the same section
        let first_empty = r#"
whitepaper: https://example.com/wp.pdf
security_and_compliance:
  - title: Technological Details
    value:
      - title: Smart Contract
        value: ""
      - title: Smart Contract
        value: 0xabc
"#;
        assert!(!has_whitepaper_and_contract(&meta(first_empty)));

        // A later section is still searched when the first yields nothing
        let second_section = r#"
whitepaper: https://example.com/wp.pdf
security_and_compliance:
  - title: Technological Details
    value:
      - title: Token launch
  - title: Technological Details
    value:
      - title: Smart Contract
        value: 0xabc
"#;
        assert!(has_whitepaper_and_contract(&meta(second_section)));
    }

    #[test]
    fn test_name_in_reference_set() {
        let refs = ReferenceSet::from_keys(["usdt", "dai"]);
        assert!(name_in_reference_set(&meta("name: USDT\n"), &refs));
        assert!(name_in_reference_set(&meta("name: Dai\n"), &refs));
        assert!(!name_in_reference_set(&meta("name: Tether\n"), &refs));
        assert!(!name_in_reference_set(&meta("links: {}\n"), &refs));
        assert!(!name_in_reference_set(&meta("name: 42\n"), &refs));
    }

    #[test]
    fn test_predicate_spec_parse() {
        assert_eq!("always".parse::<PredicateSpec>(), Ok(PredicateSpec::Always));
        assert_eq!(
            "twitter".parse::<PredicateSpec>(),
            Ok(PredicateSpec::SocialLink("twitter".to_string()))
        );
        assert_eq!(
            "social_link:telegram".parse::<PredicateSpec>(),
            Ok(PredicateSpec::SocialLink("telegram".to_string()))
        );
        assert_eq!(
            "social_link:".parse::<PredicateSpec>(),
            Err(PredicateParseError::MissingPlatform)
        );
        assert_eq!(
            "sometimes".parse::<PredicateSpec>(),
            Err(PredicateParseError::Unknown("sometimes".to_string()))
        );

        for name in [
            "always",
            "token_launch",
            "social_link:linkedin",
            "security_report",
            "whitepaper_and_contract",
            "reference_name",
        ] {
            let spec: PredicateSpec = name.parse().unwrap();
            assert_eq!(spec.to_string(), name);
        }
    }

    #[test]
    fn test_resolve_reference_name() {
        assert!(PredicateSpec::ReferenceName.needs_references());
        assert!(PredicateSpec::ReferenceName.resolve(None).is_none());

        let refs = Arc::new(ReferenceSet::from_keys(["usdt"]));
        let predicate = PredicateSpec::ReferenceName.resolve(Some(&refs)).unwrap();
        assert!(predicate.evaluate(&meta("name: USDT\n")));
        assert!(!predicate.evaluate(&meta("name: usdc\n")));
    }

    #[test]
    fn test_predicate_evaluate_dispatches() {
        let m = meta(FULL);
        assert!(Predicate::Always.evaluate(&m));
        assert!(Predicate::TokenLaunch.evaluate(&m));
        assert!(Predicate::SocialLink("twitter".to_string()).evaluate(&m));
        assert!(!Predicate::SocialLink("linkedin".to_string()).evaluate(&m));
        assert!(Predicate::SecurityReport.evaluate(&m));
        assert!(Predicate::WhitepaperAndContract.evaluate(&m));
    }
}
