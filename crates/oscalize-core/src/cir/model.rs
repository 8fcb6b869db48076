//! Canonical Intermediate Representation.
//!
//! These types mirror the JSON produced by the document and spreadsheet
//! readers. Every record carries its source attribution so that mapped
//! artifacts can cite the exact file, sheet, row or heading they came from.
//!
//! Enumerated domains (severity, status, asset type) are kept as strings
//! on the record and parsed on demand: source data is messy, and an
//! out-of-domain value must degrade to a default instead of rejecting the
//! whole input.

use serde::{Deserialize, Serialize};

/// The four CIR flavours, keyed by their top-level collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CirKind {
    Document,
    Poam,
    Inventory,
    Controls,
}

impl CirKind {
    pub const ALL: [CirKind; 4] = [
        CirKind::Document,
        CirKind::Poam,
        CirKind::Inventory,
        CirKind::Controls,
    ];

    /// Name of the top-level array holding this kind's records.
    pub fn collection_key(self) -> &'static str {
        match self {
            CirKind::Document => "sections",
            CirKind::Poam => "rows",
            CirKind::Inventory => "assets",
            CirKind::Controls => "controls",
        }
    }

    pub fn schema_name(self) -> &'static str {
        match self {
            CirKind::Document => "cir_document",
            CirKind::Poam => "cir_poam",
            CirKind::Inventory => "cir_inventory",
            CirKind::Controls => "cir_controls",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CirKind::Document => "document",
            CirKind::Poam => "poam",
            CirKind::Inventory => "inventory",
            CirKind::Controls => "controls",
        }
    }

    /// Detect the kind from the first recognised collection key.
    pub fn detect(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        Self::ALL
            .into_iter()
            .find(|kind| obj.contains_key(kind.collection_key()))
    }
}

impl std::fmt::Display for CirKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance attached to every CIR input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CirMetadata {
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    pub extraction_date: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pandoc_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stakeholders: Vec<Stakeholder>,
}

/// A person or organization named by the source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stakeholder {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub party_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentCir {
    pub metadata: CirMetadata,
    pub sections: Vec<Section>,
    /// Explicit role definitions, when the reader recognised a role table.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub id: String,
    pub title: String,
    /// Heading depth, 1 for top-level headings.
    pub level: u32,
    pub text: String,
    pub tables: Vec<Table>,
    #[serde(alias = "source", skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<SectionSource>,
    /// Control IDs found in `text`, filled in by the processor.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub control_references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Table {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionSource {
    pub file: String,
    /// Titles of the enclosing headings, outermost first.
    pub heading_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_end: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRole {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub privileges: Vec<PrivilegeSpec>,
}

/// A privilege as written by a reader: either a bare name or a full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrivilegeSpec {
    Name(String),
    Detailed(PrivilegeDetail),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeDetail {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub functions_performed: Vec<String>,
}

// ---------------------------------------------------------------------------
// POA&M
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoamCir {
    pub metadata: CirMetadata,
    pub rows: Vec<PoamRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoamRow {
    pub poam_id: String,
    pub title: String,
    pub description: String,
    pub control_ids: Vec<String>,
    pub asset_ids: Vec<String>,
    pub severity: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_completion_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_completion_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_of_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_plan: Option<String>,
    pub milestones: Vec<Milestone>,
    #[serde(alias = "source", skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<RowSource>,
    /// Derived by the processor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u32>,
}

impl PoamRow {
    pub fn severity_level(&self) -> Option<Severity> {
        Severity::parse(&self.severity)
    }

    pub fn status_value(&self) -> Option<PoamStatus> {
        PoamStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Spreadsheet provenance of a row or asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowSource {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_range: Option<String>,
}

/// Ordered severity scale shared by POA&M severity and asset criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "moderate" | "medium" => Some(Severity::Moderate),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    /// Base of the POA&M risk score.
    pub fn base_score(self) -> u32 {
        match self {
            Severity::Critical => 10,
            Severity::High => 7,
            Severity::Moderate => 4,
            Severity::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoamStatus {
    Open,
    Ongoing,
    Completed,
    #[serde(rename = "Risk Accepted")]
    RiskAccepted,
}

impl PoamStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(PoamStatus::Open),
            "ongoing" => Some(PoamStatus::Ongoing),
            "completed" | "closed" => Some(PoamStatus::Completed),
            "risk accepted" | "risk-accepted" => Some(PoamStatus::RiskAccepted),
            _ => None,
        }
    }

    /// Risk multiplier in tenths, so that truncation stays exact.
    pub fn multiplier_tenths(self) -> u32 {
        match self {
            PoamStatus::Open => 10,
            PoamStatus::Ongoing => 7,
            PoamStatus::RiskAccepted => 3,
            PoamStatus::Completed => 1,
        }
    }

    /// Lowercase slug used in marking strings.
    pub fn slug(self) -> &'static str {
        match self {
            PoamStatus::Open => "open",
            PoamStatus::Ongoing => "ongoing",
            PoamStatus::Completed => "completed",
            PoamStatus::RiskAccepted => "risk-accepted",
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryCir {
    pub metadata: CirMetadata,
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    pub asset_id: String,
    pub asset_type: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_location: Option<String>,
    pub public_access: bool,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_admin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_level: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<AssetLink>,
    #[serde(alias = "source", skip_serializing_if = "Option::is_none")]
    pub source_attribution: Option<RowSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<RiskCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address_valid: Option<bool>,
}

impl Asset {
    pub fn criticality_level(&self) -> Option<Severity> {
        self.criticality.as_deref().and_then(Severity::parse)
    }

    pub fn kind(&self) -> Option<AssetType> {
        AssetType::parse(&self.asset_type)
    }

    pub fn is_production(&self) -> bool {
        self.environment.as_deref() == Some("Production")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetLink {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Hardware,
    Software,
    Data,
    Network,
    Service,
    Other,
}

impl AssetType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hardware" => Some(AssetType::Hardware),
            "software" => Some(AssetType::Software),
            "data" => Some(AssetType::Data),
            "network" => Some(AssetType::Network),
            "service" => Some(AssetType::Service),
            "other" => Some(AssetType::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Hardware => "hardware",
            AssetType::Software => "software",
            AssetType::Data => "data",
            AssetType::Network => "network",
            AssetType::Service => "service",
            AssetType::Other => "other",
        }
    }

    /// OSCAL component type this asset type rolls up into.
    pub fn component_type(self) -> &'static str {
        match self {
            AssetType::Hardware | AssetType::Network => "hardware",
            _ => "software",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsCir {
    pub metadata: CirMetadata,
    pub controls: Vec<ControlEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlEntry {
    pub control_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// One parsed CIR input of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Cir {
    Document(DocumentCir),
    Poam(PoamCir),
    Inventory(InventoryCir),
    Controls(ControlsCir),
}

impl Cir {
    pub fn kind(&self) -> CirKind {
        match self {
            Cir::Document(_) => CirKind::Document,
            Cir::Poam(_) => CirKind::Poam,
            Cir::Inventory(_) => CirKind::Inventory,
            Cir::Controls(_) => CirKind::Controls,
        }
    }

    pub fn metadata(&self) -> &CirMetadata {
        match self {
            Cir::Document(d) => &d.metadata,
            Cir::Poam(p) => &p.metadata,
            Cir::Inventory(i) => &i.metadata,
            Cir::Controls(c) => &c.metadata,
        }
    }

    /// Deserialize a JSON value as the given kind.
    pub fn from_value(kind: CirKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            CirKind::Document => Cir::Document(serde_json::from_value(value)?),
            CirKind::Poam => Cir::Poam(serde_json::from_value(value)?),
            CirKind::Inventory => Cir::Inventory(serde_json::from_value(value)?),
            CirKind::Controls => Cir::Controls(serde_json::from_value(value)?),
        })
    }
}

/// The CIR inputs that feed one system security plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CirBundle {
    pub document: Option<DocumentCir>,
    pub poam: Option<PoamCir>,
    pub inventory: Option<InventoryCir>,
    pub controls: Option<ControlsCir>,
}

impl CirBundle {
    pub fn is_empty(&self) -> bool {
        self.document.is_none()
            && self.poam.is_none()
            && self.inventory.is_none()
            && self.controls.is_none()
    }

    /// Metadata of every present input, in kind order.
    pub fn sources(&self) -> Vec<(CirKind, &CirMetadata)> {
        let mut out = Vec::new();
        if let Some(d) = &self.document {
            out.push((CirKind::Document, &d.metadata));
        }
        if let Some(p) = &self.poam {
            out.push((CirKind::Poam, &p.metadata));
        }
        if let Some(i) = &self.inventory {
            out.push((CirKind::Inventory, &i.metadata));
        }
        if let Some(c) = &self.controls {
            out.push((CirKind::Controls, &c.metadata));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_kind_from_collection_key() {
        assert_eq!(CirKind::detect(&json!({"sections": []})), Some(CirKind::Document));
        assert_eq!(CirKind::detect(&json!({"rows": []})), Some(CirKind::Poam));
        assert_eq!(CirKind::detect(&json!({"assets": []})), Some(CirKind::Inventory));
        assert_eq!(CirKind::detect(&json!({"controls": []})), Some(CirKind::Controls));
        assert_eq!(CirKind::detect(&json!({"other": []})), None);
        assert_eq!(CirKind::detect(&json!([1, 2])), None);
    }

    #[test]
    fn section_accepts_reader_source_key() {
        let section: Section = serde_json::from_value(json!({
            "id": "s1",
            "title": "Overview",
            "level": 1,
            "text": "body",
            "source": {"file": "ssp.docx", "heading_path": ["Root"]}
        }))
        .unwrap();

        let source = section.source_attribution.unwrap();
        assert_eq!(source.file, "ssp.docx");
        assert_eq!(source.heading_path, vec!["Root"]);
        assert!(section.tables.is_empty());
    }

    #[test]
    fn privilege_accepts_string_or_object() {
        let role: UserRole = serde_json::from_value(json!({
            "title": "Operator",
            "privileges": ["read", {"title": "deploy", "functions_performed": ["release"]}]
        }))
        .unwrap();

        assert_eq!(role.privileges[0], PrivilegeSpec::Name("read".into()));
        match &role.privileges[1] {
            PrivilegeSpec::Detailed(detail) => {
                assert_eq!(detail.title, "deploy");
                assert_eq!(detail.functions_performed, vec!["release"]);
            }
            other => panic!("expected detailed privilege, got {other:?}"),
        }
    }

    #[test]
    fn severity_and_status_parse_leniently() {
        assert_eq!(Severity::parse(" high "), Some(Severity::High));
        assert_eq!(Severity::parse("Medium"), Some(Severity::Moderate));
        assert_eq!(Severity::parse("urgent"), None);
        assert_eq!(PoamStatus::parse("Risk Accepted"), Some(PoamStatus::RiskAccepted));
        assert_eq!(PoamStatus::parse("pending"), None);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn asset_virtual_flag_uses_reader_key() {
        let asset: Asset = serde_json::from_value(json!({
            "asset_id": "srv-1",
            "asset_type": "hardware",
            "name": "web01",
            "virtual": true
        }))
        .unwrap();
        assert!(asset.is_virtual);
        assert!(!asset.public_access);
        assert_eq!(asset.kind(), Some(AssetType::Hardware));
    }

    #[test]
    fn network_assets_roll_up_to_hardware_components() {
        assert_eq!(AssetType::Network.component_type(), "hardware");
        assert_eq!(AssetType::Data.component_type(), "software");
        assert_eq!(AssetType::Service.component_type(), "software");
    }
}
