//! The one table that maps OSCAL root keys to artifact types.
//!
//! Conversion output names, validator short codes, manifest types and
//! compliance discovery all read from `ARTIFACTS`. Nothing else in the
//! crate spells a root key.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    SystemSecurityPlan,
    PlanOfActionAndMilestones,
    AssessmentPlan,
    AssessmentResults,
    Catalog,
    Profile,
    ComponentDefinition,
}

pub struct ArtifactEntry {
    pub kind: ArtifactKind,
    /// Single top-level key of the JSON document.
    pub root_key: &'static str,
    /// `<doc-type>` argument of the external validator.
    pub code: &'static str,
    pub title: &'static str,
    /// Output file written by `convert`, when the tool produces this type.
    pub file_name: Option<&'static str>,
}

/// Iteration order is detection order.
pub const ARTIFACTS: [ArtifactEntry; 7] = [
    ArtifactEntry {
        kind: ArtifactKind::SystemSecurityPlan,
        root_key: "system-security-plan",
        code: "ssp",
        title: "System Security Plan",
        file_name: Some("ssp.json"),
    },
    ArtifactEntry {
        kind: ArtifactKind::PlanOfActionAndMilestones,
        root_key: "plan-of-action-and-milestones",
        code: "poam",
        title: "Plan of Action and Milestones",
        file_name: Some("poam.json"),
    },
    ArtifactEntry {
        kind: ArtifactKind::AssessmentPlan,
        root_key: "assessment-plan",
        code: "ap",
        title: "Assessment Plan",
        file_name: Some("assessment-plan.json"),
    },
    ArtifactEntry {
        kind: ArtifactKind::AssessmentResults,
        root_key: "assessment-results",
        code: "ar",
        title: "Assessment Results",
        file_name: Some("assessment-results.json"),
    },
    ArtifactEntry {
        kind: ArtifactKind::Catalog,
        root_key: "catalog",
        code: "catalog",
        title: "Catalog",
        file_name: None,
    },
    ArtifactEntry {
        kind: ArtifactKind::Profile,
        root_key: "profile",
        code: "profile",
        title: "Profile",
        file_name: None,
    },
    ArtifactEntry {
        kind: ArtifactKind::ComponentDefinition,
        root_key: "component-definition",
        code: "component-definition",
        title: "Component Definition",
        file_name: Some("component-definition.json"),
    },
];

impl ArtifactKind {
    pub fn entry(self) -> &'static ArtifactEntry {
        // Every variant has exactly one row.
        match ARTIFACTS.iter().find(|e| e.kind == self) {
            Some(entry) => entry,
            None => unreachable!("artifact table is missing {self:?}"),
        }
    }

    pub fn root_key(self) -> &'static str {
        self.entry().root_key
    }

    pub fn code(self) -> &'static str {
        self.entry().code
    }

    pub fn title(self) -> &'static str {
        self.entry().title
    }

    pub fn file_name(self) -> Option<&'static str> {
        self.entry().file_name
    }

    pub fn from_root_key(key: &str) -> Option<Self> {
        ARTIFACTS.iter().find(|e| e.root_key == key).map(|e| e.kind)
    }

    /// SSP, POA&M, AP and AR: the artifacts an authorization package needs.
    pub fn is_package_artifact(self) -> bool {
        matches!(
            self,
            ArtifactKind::SystemSecurityPlan
                | ArtifactKind::PlanOfActionAndMilestones
                | ArtifactKind::AssessmentPlan
                | ArtifactKind::AssessmentResults
        )
    }

    /// Detect the artifact type of a parsed JSON document.
    pub fn detect_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        ARTIFACTS
            .iter()
            .find(|e| obj.contains_key(e.root_key))
            .map(|e| e.kind)
    }

    /// Detect from raw text, using the file extension to pick the syntax.
    ///
    /// YAML takes the first unindented mapping key, XML the root element.
    pub fn detect_text(path: &Path, text: &str) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => serde_json::from_str(text)
                .ok()
                .and_then(|v: serde_json::Value| Self::detect_json(&v)),
            Some("yaml" | "yml") => yaml_root_key(text).and_then(Self::from_root_key),
            Some("xml") => xml_root_element(text).and_then(Self::from_root_key),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.root_key())
    }
}

fn yaml_root_key(text: &str) -> Option<&str> {
    text.lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#') && !l.starts_with("---"))
        .find(|l| !l.starts_with(' ') && !l.starts_with('\t'))
        .and_then(|l| l.split_once(':'))
        .map(|(key, _)| key.trim().trim_matches('"').trim_matches('\''))
}

fn xml_root_element(text: &str) -> Option<&str> {
    let mut rest = text;
    loop {
        let start = rest.find('<')?;
        rest = &rest[start + 1..];
        if rest.starts_with('?') || rest.starts_with('!') {
            continue;
        }
        let end = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
        let name = &rest[..end];
        // Drop a namespace prefix such as `oscal:`.
        return Some(name.rsplit(':').next().unwrap_or(name));
    }
}
