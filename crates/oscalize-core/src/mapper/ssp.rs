//! System security plan mapper.
//!
//! Responsibilities:
//! - Derive system identity, FIPS-199 levels and narrative blocks from
//!   classified document sections.
//! - Synthesize implemented requirements from control IDs found in section
//!   titles and text, from a controls CIR, and from POA&M rows.
//! - Fold inventory assets into components and inventory items.
//!
//! Non-responsibilities:
//! - Finding detail. Open weaknesses are only referenced here; the POA&M
//!   artifact owns them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::base::{
    file_name, metadata, metadata_source_props, new_uuid, oscal_control_id, roles,
    row_citation_pairs, section_citation_pairs, security_impact_level, source_resource,
    stakeholder_party,
};
use super::classify::{SectionCategory, SectionClassifier};
use super::extract::{
    Fips199, extract_fips199, extract_system_id, extract_system_name, truncate,
};
use super::{MapContext, Mapper};
use crate::cir::model::{
    Asset, AssetType, CirBundle, CirKind, DocumentCir, InventoryCir, PrivilegeSpec, Section,
    UserRole,
};
use crate::cir::processor::{extract_control_ids, is_canonical_control_id, normalize_asset_id};
use crate::error::MappingError;
use crate::oscal::model::{
    AuthorizedPrivilege, BackMatter, Categorization, Component, ControlImplementation,
    DescribedBlock, Diagram, Impact, ImplementedComponent, ImplementedRequirement, ImportRef,
    InformationType, InventoryItem, ResponsibleParty, ResponsibleRole, SspDocument, Statement,
    Status, SystemCharacteristics, SystemId, SystemImplementation, SystemInformation,
    SystemSecurityPlan, User,
};
use crate::oscal::props::Element;

pub const SYSTEM_ID_TYPE: &str = "https://ietf.org/rfc/rfc4122";
const RESPONSIBLE_ROLES: [&str; 3] = ["system-owner", "authorizing-official", "isso"];
const DESCRIPTION_LIMIT: usize = 500;

const BOUNDARY_MISSING: &str = "Authorization boundary description not found in source document.";
const NETWORK_MISSING: &str = "Network architecture description not found in source document.";
const DATA_FLOW_MISSING: &str = "Data flow description not found in source document.";
const DESCRIPTION_MISSING: &str = "System description not found in source document.";

/// Identity fields pulled from classified sections.
#[derive(Debug, Default)]
struct SystemInfo {
    name: Option<String>,
    id: Option<String>,
    description: Option<String>,
    fips: Fips199,
}

pub struct SspMapper<'a> {
    ctx: &'a MapContext,
    classifier: SectionClassifier,
}

impl<'a> SspMapper<'a> {
    pub fn new(ctx: &'a MapContext) -> Self {
        Self::with_classifier(ctx, SectionClassifier::default())
    }

    pub fn with_classifier(ctx: &'a MapContext, classifier: SectionClassifier) -> Self {
        Self { ctx, classifier }
    }

    fn system_info(&self, sections: &[Section]) -> SystemInfo {
        let c = &self.classifier;
        // A later matching section overrides an earlier one.
        let name = c
            .all(sections, SectionCategory::SystemName)
            .filter_map(|s| extract_system_name(&s.text))
            .last();
        let id = c
            .all(sections, SectionCategory::SystemId)
            .filter_map(|s| extract_system_id(&s.text))
            .last();
        let description = c
            .all(sections, SectionCategory::Description)
            .map(|s| s.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .last()
            .map(|t| truncate(t, DESCRIPTION_LIMIT));
        let fips = c
            .all(sections, SectionCategory::Fips199)
            .last()
            .map(|s| extract_fips199(&s.text))
            .unwrap_or_default();

        SystemInfo {
            name,
            id,
            description,
            fips,
        }
    }

    fn characteristics(&self, sections: &[Section], info: &SystemInfo) -> SystemCharacteristics {
        let c = &self.classifier;
        let described = |category, missing: &str| DescribedBlock {
            description: c
                .first_text(sections, category)
                .map(str::to_string)
                .unwrap_or_else(|| missing.to_string()),
            diagrams: Vec::new(),
        };

        let mut network = described(SectionCategory::NetworkArchitecture, NETWORK_MISSING);
        network.diagrams = c
            .all(sections, SectionCategory::Diagram)
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| Diagram {
                uuid: new_uuid(),
                description: s.text.clone(),
                caption: Some(s.title.clone()),
            })
            .collect();

        SystemCharacteristics {
            system_ids: vec![SystemId {
                identifier_type: SYSTEM_ID_TYPE.to_string(),
                id: info.id.clone().unwrap_or_else(new_uuid),
            }],
            system_name: info.name.clone().unwrap_or_else(|| "Unknown System".to_string()),
            description: info
                .description
                .clone()
                .unwrap_or_else(|| DESCRIPTION_MISSING.to_string()),
            security_sensitivity_level: info.fips.overall.as_ref().map(|o| o.to_lowercase()),
            system_information: SystemInformation {
                information_types: vec![default_information_type()],
            },
            security_impact_level: (!info.fips.is_empty())
                .then(|| security_impact_level(&info.fips)),
            status: Status::new("operational"),
            authorization_boundary: described(
                SectionCategory::AuthorizationBoundary,
                BOUNDARY_MISSING,
            ),
            network_architecture: Some(network),
            data_flow: Some(described(SectionCategory::DataFlow, DATA_FLOW_MISSING)),
        }
    }

    fn users(&self, doc: Option<&DocumentCir>) -> Vec<User> {
        let declared: Vec<UserRole> = match doc {
            Some(d) if !d.users.is_empty() => d.users.clone(),
            Some(d) => self.roles_from_tables(&d.sections),
            None => Vec::new(),
        };
        let roles = if declared.is_empty() {
            default_roles()
        } else {
            declared
        };
        roles.iter().map(user).collect()
    }

    /// Roles from a `Role`/`Privileges` table inside a user section.
    fn roles_from_tables(&self, sections: &[Section]) -> Vec<UserRole> {
        for section in self.classifier.all(sections, SectionCategory::Users) {
            for table in &section.tables {
                let column = |needle: &str| {
                    table
                        .headers
                        .iter()
                        .position(|h| h.to_lowercase().contains(needle))
                };
                let (Some(role_col), Some(priv_col)) = (column("role"), column("privilege"))
                else {
                    continue;
                };
                let desc_col = column("description");

                let roles: Vec<UserRole> = table
                    .rows
                    .iter()
                    .filter_map(|row| {
                        let title = row.get(role_col)?.trim();
                        if title.is_empty() {
                            return None;
                        }
                        let privileges = row
                            .get(priv_col)
                            .map(|p| {
                                p.split([',', ';'])
                                    .map(str::trim)
                                    .filter(|p| !p.is_empty())
                                    .map(|p| PrivilegeSpec::Name(p.to_string()))
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some(UserRole {
                            title: title.to_string(),
                            description: desc_col
                                .and_then(|i| row.get(i))
                                .filter(|d| !d.trim().is_empty())
                                .cloned(),
                            privileges,
                        })
                    })
                    .collect();
                if !roles.is_empty() {
                    debug!(section = %section.title, count = roles.len(), "roles read from table");
                    return roles;
                }
            }
        }
        Vec::new()
    }

    fn requirement(
        &self,
        control_id: &str,
        status: &str,
        remarks: String,
        section: Option<&Section>,
    ) -> Result<ImplementedRequirement, MappingError> {
        let oscal_id = oscal_control_id(control_id);
        let mut props = self
            .ctx
            .props(Element::ImplementedRequirement)
            .extension("implementation-status", status);
        if let Some(section) = section {
            props = props.extension("source-section", section.title.as_str());
            if let Some(source) = &section.source_attribution {
                props = props.metadata_pairs(self.ctx.policy, &section_citation_pairs(source))?;
            }
        }
        Ok(ImplementedRequirement {
            uuid: new_uuid(),
            statements: vec![Statement {
                statement_id: format!("{oscal_id}_smt"),
                uuid: new_uuid(),
                remarks: Some(remarks),
            }],
            control_id: oscal_id,
            props: props.build(),
        })
    }

    fn control_implementation(
        &self,
        bundle: &CirBundle,
    ) -> Result<ControlImplementation, MappingError> {
        let mut requirements: Vec<ImplementedRequirement> = Vec::new();
        let mut covered: BTreeSet<String> = BTreeSet::new();

        if let Some(doc) = &bundle.document {
            // One requirement per control; later sections extend its statement.
            let mut seen: BTreeMap<String, usize> = BTreeMap::new();
            for section in &doc.sections {
                let found = extract_control_ids(&format!("{} {}", section.title, section.text));
                for control_id in found {
                    let oscal_id = oscal_control_id(&control_id);
                    if let Some(&index) = seen.get(&oscal_id) {
                        merge_statement(&mut requirements[index], &section.text);
                        covered.insert(control_id);
                        continue;
                    }
                    seen.insert(oscal_id, requirements.len());
                    requirements.push(self.requirement(
                        &control_id,
                        "implemented",
                        section.text.clone(),
                        Some(section),
                    )?);
                    covered.insert(control_id);
                }
            }
        }

        if let Some(controls) = &bundle.controls {
            for entry in &controls.controls {
                let id = entry.control_id.trim();
                if id.is_empty() || covered.contains(id) {
                    continue;
                }
                let remarks = [
                    entry.control_description.as_deref(),
                    entry.implementation_guidance.as_deref(),
                    entry.notes.as_deref(),
                ]
                .into_iter()
                .flatten()
                .filter(|t| !t.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
                let status = entry
                    .implementation_status
                    .as_deref()
                    .map(|s| normalize_asset_id(s))
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "planned".to_string());
                let remarks = if remarks.is_empty() {
                    format!("Control {id} listed in the controls source.")
                } else {
                    remarks
                };
                requirements.push(self.requirement(id, &status, remarks, None)?);
                covered.insert(id.to_string());
            }
        }

        if let Some(poam) = &bundle.poam {
            for control_id in poam.rows.iter().flat_map(|r| r.control_ids.iter()) {
                let id = control_id.trim();
                if id.is_empty() || covered.contains(id) {
                    continue;
                }
                if !is_canonical_control_id(id) {
                    debug!(control_id = %id, "non-canonical control id carried from POA&M");
                }
                requirements.push(self.requirement(
                    id,
                    "partially-implemented",
                    format!(
                        "Control {id} implementation has open POA&M items. See POA&M artifact for details."
                    ),
                    None,
                )?);
                covered.insert(id.to_string());
            }
        }

        Ok(ControlImplementation {
            description: "Control implementation descriptions extracted from source documents."
                .to_string(),
            implemented_requirements: requirements,
        })
    }

    fn back_matter(&self, bundle: &CirBundle) -> Result<BackMatter, MappingError> {
        let mut resources = Vec::new();
        for (kind, meta) in bundle.sources() {
            if meta.source_file.is_empty() {
                continue;
            }
            let title = format!("Source {}: {}", kind_title(kind), file_name(&meta.source_file));
            resources.push(source_resource(self.ctx, title, meta)?);
        }
        Ok(BackMatter { resources })
    }
}

impl Mapper for SspMapper<'_> {
    type Input = CirBundle;
    type Output = SspDocument;

    fn map(&self, bundle: &CirBundle) -> Result<SspDocument, MappingError> {
        let sections: &[Section] = bundle
            .document
            .as_ref()
            .map(|d| d.sections.as_slice())
            .unwrap_or_default();
        let info = self.system_info(sections);
        let characteristics = self.characteristics(sections, &info);

        let props = match &bundle.document {
            Some(doc) => metadata_source_props(self.ctx, &doc.metadata)?,
            None => Vec::new(),
        };
        let mut meta = metadata(self.ctx, &characteristics.system_name, props);

        if let Some(doc) = &bundle.document {
            let mut assigned: Vec<ResponsibleParty> = Vec::new();
            for stakeholder in &doc.metadata.stakeholders {
                let party = stakeholder_party(stakeholder);
                let role = stakeholder
                    .role
                    .as_deref()
                    .map(|r| r.trim().to_lowercase().replace(' ', "-"))
                    .unwrap_or_default();
                if RESPONSIBLE_ROLES.contains(&role.as_str()) {
                    match assigned.iter_mut().find(|rp| rp.role_id == role) {
                        Some(rp) => rp.party_uuids.push(party.uuid.clone()),
                        None => assigned.push(ResponsibleParty {
                            role_id: role,
                            party_uuids: vec![party.uuid.clone()],
                        }),
                    }
                }
                meta.parties.push(party);
            }
            meta.responsible_parties = assigned;
        }

        let users = self.users(bundle.document.as_ref());
        meta.roles = roles(
            meta.responsible_parties
                .iter()
                .map(|rp| rp.role_id.as_str())
                .chain(users.iter().flat_map(|u| u.role_ids.iter().map(String::as_str)))
                .chain(["system-administrator"]),
        );

        let mut document = SspDocument {
            system_security_plan: SystemSecurityPlan {
                uuid: new_uuid(),
                metadata: meta,
                import_profile: ImportRef {
                    href: self.ctx.import_profile.clone(),
                },
                system_implementation: SystemImplementation {
                    users,
                    components: vec![this_system(&characteristics)],
                    inventory_items: Vec::new(),
                },
                system_characteristics: characteristics,
                control_implementation: self.control_implementation(bundle)?,
                back_matter: self.back_matter(bundle)?,
            },
        };

        if let Some(inventory) = &bundle.inventory {
            integrate_inventory(&mut document, inventory, self.ctx)?;
        }

        Ok(document)
    }
}

/// Replace the plan's asset components and inventory items with those
/// built from `inventory`. Not additive: a second call discards the first.
pub fn integrate_inventory(
    ssp: &mut SspDocument,
    inventory: &InventoryCir,
    ctx: &MapContext,
) -> Result<(), MappingError> {
    let plan = &mut ssp.system_security_plan;
    let mut components: Vec<Component> = plan
        .system_implementation
        .components
        .drain(..)
        .filter(|c| c.component_type == "this-system")
        .collect();

    let mut groups: BTreeMap<String, Vec<&Asset>> = BTreeMap::new();
    for asset in &inventory.assets {
        groups.entry(asset_type_key(asset)).or_default().push(asset);
    }

    let mut uuid_by_type: BTreeMap<String, String> = BTreeMap::new();
    for (type_key, assets) in &groups {
        let component_type = AssetType::parse(type_key)
            .map(|t| t.component_type())
            .unwrap_or("software");
        let component = Component {
            uuid: new_uuid(),
            component_type: component_type.to_string(),
            title: format!("{} Components", capitalise(type_key)),
            description: format!("Components of type: {type_key}"),
            props: ctx
                .props(Element::Component)
                .oscal("asset-type", type_key.as_str())?
                .extension("asset-count", assets.len().to_string())
                .build(),
            links: Vec::new(),
            status: Status::new("operational"),
            responsible_roles: vec![ResponsibleRole {
                role_id: "system-administrator".to_string(),
                props: Vec::new(),
            }],
            control_implementations: Vec::new(),
        };
        uuid_by_type.insert(type_key.clone(), component.uuid.clone());
        components.push(component);
    }

    let mut items = Vec::with_capacity(inventory.assets.len());
    for asset in &inventory.assets {
        let component_uuid = uuid_by_type
            .get(&asset_type_key(asset))
            .cloned()
            .ok_or_else(|| MappingError::MissingInput {
                artifact: "system-security-plan",
                detail: format!("no component groups asset {}", asset.asset_id),
            })?;
        items.push(inventory_item(asset, &component_uuid, ctx)?);
    }

    debug!(
        components = components.len(),
        items = items.len(),
        "inventory integrated into system security plan"
    );
    plan.system_implementation.components = components;
    plan.system_implementation.inventory_items = items;
    Ok(())
}

/// One inventory item per asset, linked to the component grouping it.
pub fn inventory_item(
    asset: &Asset,
    component_uuid: &str,
    ctx: &MapContext,
) -> Result<InventoryItem, MappingError> {
    let mut props = ctx
        .props(Element::InventoryItem)
        .oscal("asset-id", asset.asset_id.as_str())?;
    if !asset.asset_type.is_empty() {
        props = props.oscal("asset-type", asset.asset_type.as_str())?;
    }
    props = props
        .oscal("public", bool_str(asset.public_access))?
        .oscal("virtual", bool_str(asset.is_virtual))?;
    if let Some(fqdn) = asset.fqdn.as_deref() {
        props = props.oscal("fqdn", fqdn)?;
    }
    if let Some(ip) = asset.ip_address.as_deref().filter(|_| asset.ip_address_valid == Some(true)) {
        let name = if ip.contains(':') {
            "ipv6-address"
        } else {
            "ipv4-address"
        };
        props = props.oscal(name, ip)?;
    }
    for (name, value) in [
        ("mac-address", asset.mac_address.as_deref()),
        ("vlan-id", asset.vlan.as_deref()),
        ("patch-level", asset.patch_level.as_deref()),
        ("baseline-configuration-name", asset.baseline.as_deref()),
        ("version", asset.software_version.as_deref()),
        ("function", asset.function.as_deref()),
    ] {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            props = props.oscal(name, v)?;
        }
    }
    props = props
        .extension_opt("environment", asset.environment.as_deref())
        .extension_opt("criticality", asset.criticality.as_deref())
        .extension_opt("asset-owner", asset.asset_owner.as_deref())
        .extension_opt("system-admin", asset.system_admin.as_deref());
    for tag in &asset.tags {
        props = props.extension_opt("tag", Some(tag.trim()));
    }
    if let Some(source) = &asset.source_attribution {
        props = props.metadata_pairs(ctx.policy, &row_citation_pairs(source))?;
    }

    Ok(InventoryItem {
        uuid: new_uuid(),
        description: if asset.description.trim().is_empty() {
            asset.name.clone()
        } else {
            asset.description.clone()
        },
        props: props.build(),
        implemented_components: vec![ImplementedComponent {
            component_uuid: component_uuid.to_string(),
            props: ctx
                .props(Element::ImplementedComponent)
                .oscal("asset-id", asset.asset_id.as_str())?
                .build(),
        }],
    })
}

fn asset_type_key(asset: &Asset) -> String {
    let key = asset.asset_type.trim().to_lowercase();
    if key.is_empty() { "other".to_string() } else { key }
}

fn bool_str(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn kind_title(kind: CirKind) -> &'static str {
    match kind {
        CirKind::Document => "Document",
        CirKind::Poam => "Poam",
        CirKind::Inventory => "Inventory",
        CirKind::Controls => "Controls",
    }
}

fn this_system(characteristics: &SystemCharacteristics) -> Component {
    Component {
        uuid: new_uuid(),
        component_type: "this-system".to_string(),
        title: characteristics.system_name.clone(),
        description: "The system as a whole, as described by this plan.".to_string(),
        props: Vec::new(),
        links: Vec::new(),
        status: Status::new("operational"),
        responsible_roles: Vec::new(),
        control_implementations: Vec::new(),
    }
}

fn default_information_type() -> InformationType {
    let impact = |base: &str| Impact {
        base: base.to_string(),
    };
    InformationType {
        uuid: new_uuid(),
        title: "General Business Information".to_string(),
        description: "General business information processed by the system".to_string(),
        categorizations: vec![Categorization {
            system: "https://doi.org/10.6028/NIST.SP.800-60v1r1".to_string(),
            information_type_ids: vec!["C.2.8.12".to_string()],
        }],
        confidentiality_impact: impact("moderate"),
        integrity_impact: impact("moderate"),
        availability_impact: impact("low"),
    }
}

fn default_roles() -> Vec<UserRole> {
    let names = |items: &[&str]| {
        items
            .iter()
            .map(|s| PrivilegeSpec::Name(s.to_string()))
            .collect()
    };
    vec![
        UserRole {
            title: "System Administrator".to_string(),
            description: Some("Administrative access to system components".to_string()),
            privileges: names(&["admin", "configure", "monitor"]),
        },
        UserRole {
            title: "System User".to_string(),
            description: Some("Standard user access to system".to_string()),
            privileges: names(&["read", "write"]),
        },
    ]
}

fn user(role: &UserRole) -> User {
    let authorized_privileges = role
        .privileges
        .iter()
        .map(|p| match p {
            PrivilegeSpec::Name(name) => AuthorizedPrivilege {
                title: name.clone(),
                description: None,
                functions_performed: vec![name.clone()],
            },
            PrivilegeSpec::Detailed(detail) => AuthorizedPrivilege {
                title: detail.title.clone(),
                description: detail.description.clone(),
                functions_performed: if detail.functions_performed.is_empty() {
                    vec![detail.title.clone()]
                } else {
                    detail.functions_performed.clone()
                },
            },
        })
        .collect();

    User {
        uuid: new_uuid(),
        title: role.title.clone(),
        description: role.description.clone(),
        role_ids: vec![normalize_asset_id(&role.title)],
        authorized_privileges,
    }
}

/// Append a repeated control's narrative to its existing statement.
fn merge_statement(requirement: &mut ImplementedRequirement, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let Some(statement) = requirement.statements.first_mut() else {
        return;
    };
    match &mut statement.remarks {
        Some(remarks) if !remarks.trim().is_empty() => {
            if !remarks.contains(text) {
                remarks.push_str("\n\n");
                remarks.push_str(text);
            }
        }
        slot => *slot = Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cir::model::{
        CirMetadata, ControlEntry, ControlsCir, PoamCir, PoamRow, PrivilegeDetail, Stakeholder,
        Table,
    };
    use crate::mapper::test_support::{assert_unique_uuids, ctx};

    fn section(title: &str, text: &str) -> Section {
        Section {
            id: normalize_asset_id(title),
            title: title.into(),
            level: 1,
            text: text.into(),
            ..Default::default()
        }
    }

    fn doc(sections: Vec<Section>) -> DocumentCir {
        DocumentCir {
            metadata: CirMetadata {
                source_file: "inputs/ssp.docx".into(),
                source_type: Some("document".into()),
                extraction_date: "2026-01-01".into(),
                hash: "abc".into(),
                ..Default::default()
            },
            sections,
            users: Vec::new(),
        }
    }

    fn map(bundle: CirBundle) -> SspDocument {
        let c = ctx();
        SspMapper::new(&c).map(&bundle).unwrap()
    }

    #[test]
    fn minimal_document_gets_default_information_type() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![section("Overview", "A small system.")])),
            ..Default::default()
        });
        let chars = &ssp.system_security_plan.system_characteristics;
        assert_eq!(chars.system_information.information_types.len(), 1);
        assert_eq!(
            chars.system_information.information_types[0].title,
            "General Business Information"
        );
        assert_eq!(chars.description, "A small system.");
        assert!(
            ssp.system_security_plan
                .control_implementation
                .implemented_requirements
                .is_empty()
        );
    }

    #[test]
    fn identity_and_fips_come_from_classified_sections() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![
                section("System Name", "System Name: Payroll Cloud"),
                section("System Identifier", "ID: PAY-01"),
                section(
                    "FIPS 199 Categorization",
                    "Confidentiality: High\nIntegrity: Moderate\nAvailability: Low\nOverall Impact: High",
                ),
            ])),
            ..Default::default()
        });
        let plan = &ssp.system_security_plan;
        assert_eq!(plan.metadata.title, "Payroll Cloud");
        let chars = &plan.system_characteristics;
        assert_eq!(chars.system_ids[0].id, "PAY-01");
        assert_eq!(chars.security_sensitivity_level.as_deref(), Some("high"));
        let level = chars.security_impact_level.as_ref().unwrap();
        assert_eq!(level.security_objective_confidentiality, "high");
        assert_eq!(level.security_objective_availability, "low");
    }

    #[test]
    fn later_identity_sections_override_earlier_ones() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![
                section("System Name", "System Name: Draft Name"),
                section("Information System Name", "Name: Payroll Cloud"),
                section("FIPS 199 Draft", "Overall Impact: Low"),
                section("FIPS 199 Categorization", "Overall Impact: High"),
            ])),
            ..Default::default()
        });
        let plan = &ssp.system_security_plan;
        assert_eq!(plan.metadata.title, "Payroll Cloud");
        assert_eq!(
            plan.system_characteristics.security_sensitivity_level.as_deref(),
            Some("high")
        );
    }

    #[test]
    fn missing_narratives_use_fixed_sentences() {
        let ssp = map(CirBundle::default());
        let chars = &ssp.system_security_plan.system_characteristics;
        assert_eq!(chars.authorization_boundary.description, BOUNDARY_MISSING);
        assert_eq!(
            chars.data_flow.as_ref().unwrap().description,
            DATA_FLOW_MISSING
        );
        assert_eq!(chars.system_name, "Unknown System");
    }

    #[test]
    fn controls_in_sections_become_requirements() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![section(
                "AC-2 Account Management",
                "Accounts are reviewed per AC-2(1) and IA.2.",
            )])),
            ..Default::default()
        });
        let reqs = &ssp.system_security_plan.control_implementation.implemented_requirements;
        let ids: Vec<&str> = reqs.iter().map(|r| r.control_id.as_str()).collect();
        assert_eq!(ids, vec!["ac-2", "ac-2.1", "ia.2"]);
        assert_eq!(reqs[0].statements[0].statement_id, "ac-2_smt");
        assert_eq!(
            reqs[0].statements[0].remarks.as_deref(),
            Some("Accounts are reviewed per AC-2(1) and IA.2.")
        );
        assert!(reqs[0].props.iter().all(|p| p.ns.is_some()));
    }

    #[test]
    fn repeated_control_merges_into_one_requirement() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![
                section("AC-2 Account Management", "Accounts are provisioned by ticket."),
                section("Access Reviews", "AC-2 reviews run quarterly."),
                section("Audit", "AU-6 logs are reviewed."),
            ])),
            ..Default::default()
        });
        let reqs = &ssp.system_security_plan.control_implementation.implemented_requirements;
        let ids: Vec<&str> = reqs.iter().map(|r| r.control_id.as_str()).collect();
        assert_eq!(ids, vec!["ac-2", "au-6"]);
        assert_eq!(reqs[0].statements.len(), 1);
        assert_eq!(
            reqs[0].statements[0].remarks.as_deref(),
            Some("Accounts are provisioned by ticket.\n\nAC-2 reviews run quarterly.")
        );
    }

    #[test]
    fn poam_controls_fill_gaps_only() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![section("Access", "Implements AC-3.")])),
            poam: Some(PoamCir {
                rows: vec![
                    PoamRow {
                        poam_id: "V-001".into(),
                        control_ids: vec!["AC-3".into(), "SI-2".into()],
                        ..Default::default()
                    },
                    PoamRow {
                        poam_id: "V-002".into(),
                        control_ids: vec!["SI-2".into(), "".into()],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        });
        let reqs = &ssp.system_security_plan.control_implementation.implemented_requirements;
        assert_eq!(reqs.len(), 2);
        let si2 = &reqs[1];
        assert_eq!(si2.control_id, "si-2");
        assert_eq!(si2.props[0].value, "partially-implemented");
        assert!(
            si2.statements[0]
                .remarks
                .as_deref()
                .unwrap()
                .contains("See POA&M artifact")
        );
    }

    #[test]
    fn controls_cir_adds_uncovered_entries() {
        let ssp = map(CirBundle {
            controls: Some(ControlsCir {
                controls: vec![ControlEntry {
                    control_id: "CM-6".into(),
                    control_description: Some("Settings are enforced.".into()),
                    implementation_status: Some("Partially Implemented".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        });
        let req = &ssp.system_security_plan.control_implementation.implemented_requirements[0];
        assert_eq!(req.control_id, "cm-6");
        assert_eq!(req.props[0].value, "partially-implemented");
    }

    #[test]
    fn privileges_are_always_objects() {
        let mut d = doc(vec![]);
        d.users = vec![UserRole {
            title: "Operator".into(),
            description: None,
            privileges: vec![
                PrivilegeSpec::Name("read".into()),
                PrivilegeSpec::Detailed(PrivilegeDetail {
                    title: "deploy".into(),
                    description: None,
                    functions_performed: vec![],
                }),
            ],
        }];
        let ssp = map(CirBundle {
            document: Some(d),
            ..Default::default()
        });
        let value = serde_json::to_value(&ssp).unwrap();
        let privileges = &value["system-security-plan"]["system-implementation"]["users"][0]
            ["authorized-privileges"];
        for p in privileges.as_array().unwrap() {
            assert!(p.is_object());
            assert!(p["title"].is_string());
            assert!(!p["functions-performed"].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn users_fall_back_to_role_table_then_defaults() {
        let mut roles = section("User Roles and Privileges", "");
        roles.tables = vec![Table {
            id: "t1".into(),
            caption: None,
            headers: vec!["Role".into(), "Privileges".into()],
            rows: vec![vec!["Auditor".into(), "read logs; export".into()]],
        }];
        let ssp = map(CirBundle {
            document: Some(doc(vec![roles])),
            ..Default::default()
        });
        let users = &ssp.system_security_plan.system_implementation.users;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role_ids, vec!["auditor"]);
        assert_eq!(users[0].authorized_privileges.len(), 2);

        let defaults = map(CirBundle::default());
        assert_eq!(defaults.system_security_plan.system_implementation.users.len(), 2);
    }

    #[test]
    fn stakeholders_become_parties_with_array_responsible_parties() {
        let mut d = doc(vec![]);
        d.metadata.stakeholders = vec![
            Stakeholder {
                name: "Ann".into(),
                party_type: Some("person".into()),
                role: Some("System Owner".into()),
                ..Default::default()
            },
            Stakeholder {
                name: "Ops Team".into(),
                role: Some("operator".into()),
                ..Default::default()
            },
        ];
        let ssp = map(CirBundle {
            document: Some(d),
            ..Default::default()
        });
        let value = serde_json::to_value(&ssp).unwrap();
        let meta = &value["system-security-plan"]["metadata"];
        assert_eq!(meta["parties"].as_array().unwrap().len(), 2);
        assert_eq!(meta["responsible-parties"][0]["role-id"], "system-owner");
        assert_eq!(
            meta["responsible-parties"][0]["party-uuids"][0],
            meta["parties"][0]["uuid"]
        );
        let role_ids: Vec<&str> = meta["roles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert!(role_ids.contains(&"system-owner"));
    }

    #[test]
    fn inventory_items_reference_their_group_component() {
        let inventory = InventoryCir {
            assets: vec![
                Asset {
                    asset_id: "web-01".into(),
                    asset_type: "hardware".into(),
                    name: "web01".into(),
                    ip_address: Some("10.0.0.5".into()),
                    ip_address_valid: Some(true),
                    ..Default::default()
                },
                Asset {
                    asset_id: "db-01".into(),
                    asset_type: "software".into(),
                    name: "postgres".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let ssp = map(CirBundle {
            inventory: Some(inventory),
            ..Default::default()
        });
        let imp = &ssp.system_security_plan.system_implementation;
        assert_eq!(imp.components[0].component_type, "this-system");
        assert_eq!(imp.components.len(), 3);
        for item in &imp.inventory_items {
            let target = &item.implemented_components[0].component_uuid;
            assert!(imp.components.iter().any(|c| &c.uuid == target));
        }
        let web = &imp.inventory_items[0];
        assert!(web.props.iter().any(|p| p.name == "ipv4-address" && p.value == "10.0.0.5"));
    }

    #[test]
    fn asset_tags_become_namespaced_props() {
        let c = ctx();
        let asset = Asset {
            asset_id: "web-01".into(),
            asset_type: "hardware".into(),
            name: "web01".into(),
            tags: vec!["pci".into(), "  ".into(), " internet-facing ".into()],
            ..Default::default()
        };
        let item = inventory_item(&asset, "component-uuid", &c).unwrap();
        let tags: Vec<&str> = item
            .props
            .iter()
            .filter(|p| p.name == "tag")
            .map(|p| p.value.as_str())
            .collect();
        assert_eq!(tags, vec!["pci", "internet-facing"]);
        assert!(
            item.props
                .iter()
                .filter(|p| p.name == "tag")
                .all(|p| p.ns.as_deref() == Some(c.namespace.as_str()))
        );
    }

    #[test]
    fn integrate_inventory_replaces_rather_than_appends() {
        let c = ctx();
        let inventory = InventoryCir {
            assets: vec![Asset {
                asset_id: "a".into(),
                asset_type: "data".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut ssp = SspMapper::new(&c).map(&CirBundle::default()).unwrap();
        integrate_inventory(&mut ssp, &inventory, &c).unwrap();
        integrate_inventory(&mut ssp, &inventory, &c).unwrap();
        let imp = &ssp.system_security_plan.system_implementation;
        assert_eq!(imp.components.len(), 2);
        assert_eq!(imp.inventory_items.len(), 1);
    }

    #[test]
    fn back_matter_cites_each_input_and_uuids_are_unique() {
        let ssp = map(CirBundle {
            document: Some(doc(vec![section("AC-1 Policy", "Text for AC-1.")])),
            poam: Some(PoamCir {
                metadata: CirMetadata {
                    source_file: "poam.xlsx".into(),
                    ..Default::default()
                },
                rows: vec![],
            }),
            ..Default::default()
        });
        let titles: Vec<&str> = ssp
            .system_security_plan
            .back_matter
            .resources
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Source Document: ssp.docx", "Source Poam: poam.xlsx"]);

        let value = serde_json::to_value(&ssp).unwrap();
        assert_unique_uuids(&value);
        assert_eq!(
            value["system-security-plan"]["import-profile"]["href"],
            ctx().import_profile.as_str()
        );
    }
}
