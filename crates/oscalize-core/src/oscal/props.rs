//! Property emission against a versioned vocabulary.
//!
//! OSCAL closes the set of property names allowed in its default namespace
//! for many elements. `VOCABULARY_1_1_3` lists, per element, the names the
//! mappers may emit there. `PropsBuilder` is the only way mapper code
//! creates properties: a default-namespace name outside the table is a
//! `MappingError`, and everything else goes under the extension namespace
//! or into a consolidated `marking` value.

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::oscal::model::Property;

/// How per-record metadata is encoded when it has no default-namespace
/// name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyPolicy {
    /// One `marking` property holding `key:value; key:value`.
    #[default]
    Consolidate,
    /// One property per key, under the extension namespace.
    Separate,
}

/// Elements the mappers attach properties to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Metadata,
    BackMatterResource,
    PoamItem,
    OriginActor,
    Activity,
    Component,
    InventoryItem,
    ImplementedComponent,
    ImplementedRequirement,
    ReviewedControls,
    AssessmentPlatform,
    Finding,
    Result,
    ResponsibleRole,
}

impl Element {
    pub fn path(self) -> &'static str {
        match self {
            Element::Metadata => "metadata",
            Element::BackMatterResource => "back-matter/resource",
            Element::PoamItem => "poam-item",
            Element::OriginActor => "origin/actor",
            Element::Activity => "activity",
            Element::Component => "component",
            Element::InventoryItem => "inventory-item",
            Element::ImplementedComponent => "implemented-component",
            Element::ImplementedRequirement => "implemented-requirement",
            Element::ReviewedControls => "reviewed-controls",
            Element::AssessmentPlatform => "assessment-platform",
            Element::Finding => "finding",
            Element::Result => "result",
            Element::ResponsibleRole => "responsible-role",
        }
    }
}

/// Allowed default-namespace property names for one schema version.
#[derive(Debug)]
pub struct Vocabulary {
    pub oscal_version: &'static str,
    entries: &'static [(Element, &'static [&'static str])],
}

const ASSET_PROPS: &[&str] = &[
    "asset-id",
    "asset-tag",
    "asset-type",
    "public",
    "virtual",
    "fqdn",
    "ipv4-address",
    "ipv6-address",
    "mac-address",
    "vlan-id",
    "network-id",
    "patch-level",
    "baseline-configuration-name",
    "software-identifier",
    "version",
    "function",
    "physical-location",
    "is-scanned",
    "allows-authenticated-scan",
    "marking",
];

pub static VOCABULARY_1_1_3: Vocabulary = Vocabulary {
    oscal_version: "1.1.3",
    entries: &[
        (Element::Metadata, &["keywords", "marking"]),
        (
            Element::BackMatterResource,
            &["type", "version", "published", "marking"],
        ),
        (Element::PoamItem, &["marking"]),
        (Element::OriginActor, &["marking"]),
        (Element::Activity, &["method", "marking"]),
        (Element::Component, ASSET_PROPS),
        (Element::InventoryItem, ASSET_PROPS),
        (Element::ImplementedComponent, &["asset-id", "marking"]),
        (Element::ImplementedRequirement, &["marking"]),
        (Element::ReviewedControls, &["marking"]),
        (Element::AssessmentPlatform, &["asset-type", "marking"]),
        (Element::Finding, &["marking"]),
        (Element::Result, &["marking"]),
        (Element::ResponsibleRole, &["marking"]),
    ],
};

impl Vocabulary {
    pub fn allowed(&self, element: Element) -> &'static [&'static str] {
        self.entries
            .iter()
            .find(|(e, _)| *e == element)
            .map(|(_, names)| *names)
            .unwrap_or(&[])
    }

    pub fn allows(&self, element: Element, name: &str) -> bool {
        self.allowed(element).contains(&name)
    }
}

/// Builds the `props` array of one element.
pub struct PropsBuilder<'a> {
    element: Element,
    vocabulary: &'a Vocabulary,
    namespace: &'a str,
    props: Vec<Property>,
}

impl<'a> PropsBuilder<'a> {
    pub fn new(element: Element, vocabulary: &'a Vocabulary, namespace: &'a str) -> Self {
        Self {
            element,
            vocabulary,
            namespace,
            props: Vec::new(),
        }
    }

    /// Default-namespace property; the name must be in the vocabulary.
    pub fn oscal(
        mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<Self, MappingError> {
        if !self.vocabulary.allows(self.element, name) {
            return Err(MappingError::DisallowedProperty {
                element: self.element.path(),
                name: name.to_string(),
            });
        }
        self.props.push(Property::new(name, value));
        Ok(self)
    }

    /// Property under the extension namespace. Any name is accepted there.
    pub fn extension(mut self, name: &str, value: impl Into<String>) -> Self {
        let mut prop = Property::new(name, value);
        prop.ns = Some(self.namespace.to_string());
        self.props.push(prop);
        self
    }

    pub fn extension_opt(self, name: &str, value: Option<&str>) -> Self {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => self.extension(name, v),
            None => self,
        }
    }

    /// Emit `pairs` under `policy`: one `marking` or separate extension
    /// properties. Empty values are skipped; nothing is emitted when every
    /// value is empty.
    pub fn metadata_pairs(
        self,
        policy: PropertyPolicy,
        pairs: &[(&str, String)],
    ) -> Result<Self, MappingError> {
        let present: Vec<&(&str, String)> =
            pairs.iter().filter(|(_, v)| !v.trim().is_empty()).collect();
        if present.is_empty() {
            return Ok(self);
        }
        match policy {
            PropertyPolicy::Consolidate => {
                let marking = present
                    .iter()
                    .map(|(k, v)| format!("{k}:{v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                self.oscal("marking", marking)
            }
            PropertyPolicy::Separate => Ok(present
                .into_iter()
                .fold(self, |b, (k, v)| b.extension(k, v.clone()))),
        }
    }

    pub fn build(self) -> Vec<Property> {
        self.props
    }
}
