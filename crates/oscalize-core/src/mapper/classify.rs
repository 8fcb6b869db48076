//! Keyword-based section classification.
//!
//! All heuristics that decide what a section or origin text is about live
//! in one ordered rule table. Mappers ask for a category and never match
//! keywords themselves.
//!
//! Matching is a case-insensitive substring test on the section title.
//! A title may fall into several categories; rule order only matters for
//! `method`, where the first matching method wins.

use serde::{Deserialize, Serialize};

use crate::cir::model::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionCategory {
    SystemName,
    SystemId,
    Fips199,
    Description,
    AuthorizationBoundary,
    NetworkArchitecture,
    Diagram,
    DataFlow,
    Users,
    TermsAndConditions,
    ControlScope,
    AssessmentTools,
    Procedures,
    Findings,
    Observations,
    MethodTest,
    MethodExamine,
    MethodInterview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentMethod {
    Test,
    Examine,
    Interview,
}

impl AssessmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentMethod::Test => "TEST",
            AssessmentMethod::Examine => "EXAMINE",
            AssessmentMethod::Interview => "INTERVIEW",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Any keyword is a substring.
    Any(&'static [&'static str]),
    /// Every keyword is a substring.
    All(&'static [&'static str]),
}

impl Matcher {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Matcher::Any(keys) => keys.iter().any(|k| lowered.contains(k)),
            Matcher::All(keys) => keys.iter().all(|k| lowered.contains(k)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub category: SectionCategory,
    pub matcher: Matcher,
}

const fn any(category: SectionCategory, keys: &'static [&'static str]) -> Rule {
    Rule {
        category,
        matcher: Matcher::Any(keys),
    }
}

pub const DEFAULT_RULES: &[Rule] = &[
    any(SectionCategory::SystemName, &["system name", "information system"]),
    any(SectionCategory::SystemId, &["system id", "identifier"]),
    Rule {
        category: SectionCategory::Fips199,
        matcher: Matcher::All(&["fips", "199"]),
    },
    any(SectionCategory::Description, &["description", "overview"]),
    any(
        SectionCategory::AuthorizationBoundary,
        &["authorization boundary", "system boundary"],
    ),
    any(
        SectionCategory::NetworkArchitecture,
        &["network architecture", "network diagram", "system architecture"],
    ),
    any(SectionCategory::Diagram, &["network", "architecture", "topology"]),
    any(SectionCategory::DataFlow, &["data flow", "information flow"]),
    any(SectionCategory::Users, &["user", "role", "privilege", "access"]),
    any(
        SectionCategory::TermsAndConditions,
        &["terms and conditions", "assumptions", "constraints", "limitations"],
    ),
    any(SectionCategory::ControlScope, &["scope", "control"]),
    any(SectionCategory::AssessmentTools, &["tool", "resource", "asset"]),
    any(SectionCategory::Procedures, &["procedure", "task", "activity"]),
    any(SectionCategory::Findings, &["finding", "deficiency", "issue"]),
    any(SectionCategory::Observations, &["observation", "result"]),
    any(SectionCategory::MethodTest, &["test"]),
    any(SectionCategory::MethodExamine, &["examine"]),
    any(SectionCategory::MethodInterview, &["interview"]),
];

/// Origin text keywords, checked in order.
const ORIGIN_RULES: &[(&str, AssessmentMethod)] = &[
    ("assessment", AssessmentMethod::Test),
    ("review", AssessmentMethod::Examine),
    ("interview", AssessmentMethod::Interview),
];

#[derive(Debug, Clone)]
pub struct SectionClassifier {
    rules: Vec<Rule>,
}

impl Default for SectionClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl SectionClassifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Whether `title` falls into `category`.
    pub fn matches(&self, title: &str, category: SectionCategory) -> bool {
        let lowered = title.to_lowercase();
        self.rules
            .iter()
            .filter(|r| r.category == category)
            .any(|r| r.matcher.matches(&lowered))
    }

    /// Every category of `title`, in rule order.
    pub fn categories(&self, title: &str) -> Vec<SectionCategory> {
        let lowered = title.to_lowercase();
        let mut out = Vec::new();
        for rule in &self.rules {
            if rule.matcher.matches(&lowered) && !out.contains(&rule.category) {
                out.push(rule.category);
            }
        }
        out
    }

    /// First section, in document order, whose title is in `category`.
    pub fn first<'a>(&self, sections: &'a [Section], category: SectionCategory) -> Option<&'a Section> {
        sections.iter().find(|s| self.matches(&s.title, category))
    }

    pub fn all<'a>(
        &'a self,
        sections: &'a [Section],
        category: SectionCategory,
    ) -> impl Iterator<Item = &'a Section> + 'a {
        sections
            .iter()
            .filter(move |s| self.matches(&s.title, category))
    }

    /// Text of the first section in `category`, when non-empty.
    pub fn first_text<'a>(&'a self, sections: &'a [Section], category: SectionCategory) -> Option<&'a str> {
        self.all(sections, category)
            .map(|s| s.text.as_str())
            .find(|t| !t.trim().is_empty())
    }

    /// Assessment method named by a section title; test, then examine, then
    /// interview.
    pub fn method(&self, title: &str) -> Option<AssessmentMethod> {
        self.categories(title).into_iter().find_map(|c| match c {
            SectionCategory::MethodTest => Some(AssessmentMethod::Test),
            SectionCategory::MethodExamine => Some(AssessmentMethod::Examine),
            SectionCategory::MethodInterview => Some(AssessmentMethod::Interview),
            _ => None,
        })
    }

    /// Method implied by a POA&M origin such as "Annual Assessment".
    pub fn origin_method(&self, origin: &str) -> Option<AssessmentMethod> {
        let lowered = origin.to_lowercase();
        ORIGIN_RULES
            .iter()
            .find(|(key, _)| lowered.contains(key))
            .map(|(_, method)| *method)
    }
}
