//! Inventory mapper: flat asset records grouped into component-definition
//! components.
//!
//! Grouping key, in priority order: service layer (as `"<layer> Layer"`),
//! then function, then asset name. Groups keep first-seen order.

use std::collections::BTreeSet;

use tracing::info;

use super::base::{
    file_name, link, metadata, new_uuid, oscal_control_id, roles, source_resource,
};
use super::ssp::inventory_item;
use super::{MapContext, Mapper};
use crate::cir::model::{Asset, AssetType, InventoryCir, Severity};
use crate::error::MappingError;
use crate::oscal::model::{
    BackMatter, Component, ComponentControlImplementation, ComponentDefinition,
    ComponentDefinitionDocument, ComponentRequirement, InventoryItem, Link, ResponsibleRole,
    Status,
};
use crate::oscal::props::Element;

pub const INVENTORY_TITLE: &str = "System Component Inventory";
pub const REV5_CATALOG: &str =
    "https://raw.githubusercontent.com/usnistgov/oscal-content/master/nist.gov/SP800-53/rev5/json/NIST_SP-800-53_rev5_catalog.json";

pub struct InventoryMapper<'a> {
    ctx: &'a MapContext,
}

/// Assets sharing one grouping key.
#[derive(Debug)]
pub struct AssetGroup<'a> {
    pub key: String,
    pub assets: Vec<&'a Asset>,
}

pub fn group_key(asset: &Asset) -> String {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    if let Some(layer) = present(&asset.service_layer) {
        return format!("{layer} Layer");
    }
    if let Some(function) = present(&asset.function) {
        return function;
    }
    if !asset.name.trim().is_empty() {
        return asset.name.trim().to_string();
    }
    "Unknown Component".to_string()
}

/// Groups in first-seen key order.
pub fn group_assets(assets: &[Asset]) -> Vec<AssetGroup<'_>> {
    let mut groups: Vec<AssetGroup<'_>> = Vec::new();
    for asset in assets {
        let key = group_key(asset);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.assets.push(asset),
            None => groups.push(AssetGroup {
                key,
                assets: vec![asset],
            }),
        }
    }
    groups
}

/// Majority component type; software wins ties.
fn component_type(assets: &[&Asset]) -> &'static str {
    let hardware = assets
        .iter()
        .filter(|a| a.kind().map(AssetType::component_type) == Some("hardware"))
        .count();
    if hardware * 2 > assets.len() {
        "hardware"
    } else {
        "software"
    }
}

fn component_status(assets: &[&Asset]) -> &'static str {
    let envs: BTreeSet<&str> = assets
        .iter()
        .filter_map(|a| a.environment.as_deref())
        .collect();
    if envs.contains("Production") {
        "operational"
    } else if envs.contains("Development") || envs.contains("Test") {
        "under-development"
    } else {
        "operational"
    }
}

fn component_description(assets: &[&Asset]) -> String {
    if let Some(asset) = assets.iter().find(|a| !a.description.trim().is_empty()) {
        return asset.description.clone();
    }
    let count = assets.len();
    let types: BTreeSet<&str> = assets
        .iter()
        .map(|a| {
            if a.asset_type.is_empty() {
                "unknown"
            } else {
                a.asset_type.as_str()
            }
        })
        .collect();
    format!(
        "Component containing {count} asset{} of type(s): {}",
        if count == 1 { "" } else { "s" },
        types.into_iter().collect::<Vec<_>>().join(", ")
    )
}

pub fn max_criticality(assets: &[&Asset]) -> Option<Severity> {
    assets.iter().filter_map(|a| a.criticality_level()).max()
}

impl<'a> InventoryMapper<'a> {
    pub fn new(ctx: &'a MapContext) -> Self {
        Self { ctx }
    }

    fn component(&self, group: &AssetGroup<'_>) -> Result<Component, MappingError> {
        let assets = group.assets.as_slice();

        let environments: BTreeSet<&str> = assets
            .iter()
            .filter_map(|a| a.environment.as_deref())
            .filter(|e| !e.is_empty())
            .collect();
        let virtual_count = assets.iter().filter(|a| a.is_virtual).count();
        let criticality = max_criticality(assets);

        let mut props = self
            .ctx
            .props(Element::Component)
            .extension("asset-count", assets.len().to_string());
        if !environments.is_empty() {
            props = props.extension(
                "environments",
                environments.iter().copied().collect::<Vec<_>>().join(","),
            );
        }
        if let Some(level) = criticality {
            props = props.extension("max-criticality", level.as_str());
        }
        if assets.iter().any(|a| a.public_access) {
            props = props.extension("public-access", "true");
        }
        if virtual_count > 0 {
            props = props.extension("virtual-assets", virtual_count.to_string());
        }

        let links: Vec<Link> = assets
            .iter()
            .flat_map(|a| a.links.iter())
            .filter(|l| !l.href.trim().is_empty())
            .map(|l| {
                let rel = l.rel.as_deref().unwrap_or("reference");
                link(&l.href, Some(rel), l.text.as_deref())
            })
            .collect();

        let owners: BTreeSet<&str> = assets
            .iter()
            .filter_map(|a| a.asset_owner.as_deref())
            .collect();
        let admins: BTreeSet<&str> = assets
            .iter()
            .filter_map(|a| a.system_admin.as_deref())
            .collect();
        let mut responsible_roles = Vec::new();
        for (role_id, names) in [("asset-owner", owners), ("system-administrator", admins)] {
            let names: Vec<&str> = names
                .into_iter()
                .filter(|n| !n.trim().is_empty())
                .collect();
            if names.is_empty() {
                continue;
            }
            responsible_roles.push(ResponsibleRole {
                role_id: role_id.to_string(),
                props: self
                    .ctx
                    .props(Element::ResponsibleRole)
                    .extension("party-names", names.join(", "))
                    .build(),
            });
        }

        let control_implementations = if criticality >= Some(Severity::High) {
            vec![ComponentControlImplementation {
                uuid: new_uuid(),
                source: REV5_CATALOG.to_string(),
                description: "Implementation of access controls for sensitive data handling"
                    .to_string(),
                implemented_requirements: vec![ComponentRequirement {
                    uuid: new_uuid(),
                    control_id: oscal_control_id("AC-3"),
                    description: "Access controls implemented at component level".to_string(),
                }],
            }]
        } else {
            Vec::new()
        };

        Ok(Component {
            uuid: new_uuid(),
            component_type: component_type(assets).to_string(),
            title: group.key.clone(),
            description: component_description(assets),
            props: props.build(),
            links,
            status: Status::new(component_status(assets)),
            responsible_roles,
            control_implementations,
        })
    }

    /// Per-asset inventory items, each linked to the component whose title
    /// is the asset's grouping key.
    pub fn build_inventory_items(
        &self,
        assets: &[Asset],
        components: &[Component],
    ) -> Result<Vec<InventoryItem>, MappingError> {
        assets
            .iter()
            .map(|asset| {
                let key = group_key(asset);
                let component = components.iter().find(|c| c.title == key).ok_or_else(|| {
                    MappingError::MissingInput {
                        artifact: "component-definition",
                        detail: format!("no component titled {key} for asset {}", asset.asset_id),
                    }
                })?;
                inventory_item(asset, &component.uuid, self.ctx)
            })
            .collect()
    }
}

impl Mapper for InventoryMapper<'_> {
    type Input = InventoryCir;
    type Output = ComponentDefinitionDocument;

    fn map(&self, inventory: &InventoryCir) -> Result<ComponentDefinitionDocument, MappingError> {
        let components = group_assets(&inventory.assets)
            .iter()
            .map(|group| self.component(group))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            components = components.len(),
            assets = inventory.assets.len(),
            "built components from inventory"
        );

        let meta = &inventory.metadata;
        let meta_props = self
            .ctx
            .props(Element::Metadata)
            .metadata_pairs(
                self.ctx.policy,
                &[
                    ("source-file", meta.source_file.clone()),
                    ("sheet-name", meta.sheet_name.clone().unwrap_or_default()),
                    (
                        "template-version",
                        meta.template_version.clone().unwrap_or_default(),
                    ),
                    ("extraction-date", meta.extraction_date.clone()),
                    ("file-hash", meta.hash.clone()),
                ],
            )?
            .build();
        let mut metadata = metadata(self.ctx, INVENTORY_TITLE, meta_props);
        metadata.roles = roles(
            components
                .iter()
                .flat_map(|c| c.responsible_roles.iter().map(|r| r.role_id.as_str())),
        );

        let mut resources = Vec::new();
        if !meta.source_file.is_empty() {
            let title = format!("Inventory Source: {}", file_name(&meta.source_file));
            resources.push(source_resource(self.ctx, title, meta)?);
        }

        Ok(ComponentDefinitionDocument {
            component_definition: ComponentDefinition {
                uuid: new_uuid(),
                metadata,
                components,
                back_matter: BackMatter { resources },
            },
        })
    }
}
