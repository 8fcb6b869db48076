//! Plan of action and milestones mapper.
//!
//! Item metadata goes through the run's property policy: under the default
//! policy it collapses into one `marking` string because `poam-item` allows
//! no other default-namespace names.

use std::collections::BTreeSet;

use tracing::info;

use super::base::{file_name, metadata, new_uuid, source_resource};
use super::classify::SectionClassifier;
use super::ssp::SYSTEM_ID_TYPE;
use super::{MapContext, Mapper};
use crate::cir::model::{PoamCir, PoamRow};
use crate::error::MappingError;
use crate::oscal::model::{
    Activity, Actor, BackMatter, Component, LocalDefinitions, Origin, PlanOfActionAndMilestones,
    PoamDocument, PoamItem, RelatedFinding, RelatedRisk, Status, SystemId,
};
use crate::oscal::props::{Element, PropertyPolicy};

pub const POAM_TITLE: &str =
    "Plan of Action and Milestones (POA&M) - FedRAMP Cloud Service Provider";

/// Indicator terms carried in the metadata keywords.
pub const FEDRAMP_KEYWORDS: &[&str] = &[
    "fedramp",
    "fedramp-poam",
    "cloud service provider",
    "cloud-service-provider-remediation",
    "customer responsibility matrix",
    "customer-responsibility-matrix",
    "authorization boundary",
    "authorization-boundary-deficiencies",
    "fips 199",
    "fedramp-continuous-monitoring",
];

pub struct PoamMapper<'a> {
    ctx: &'a MapContext,
    classifier: SectionClassifier,
}

impl<'a> PoamMapper<'a> {
    pub fn new(ctx: &'a MapContext) -> Self {
        Self {
            ctx,
            classifier: SectionClassifier::default(),
        }
    }

    fn keywords(&self, poam: &PoamCir) -> String {
        let meta = &poam.metadata;
        let mut parts: Vec<String> = Vec::new();
        let mut push = |key: &str, value: Option<&str>| {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                parts.push(format!("{key}:{v}"));
            }
        };
        push("source-file", Some(meta.source_file.as_str()));
        push("sheet-name", meta.sheet_name.as_deref());
        push("template-version", meta.template_version.as_deref());
        push("extraction-date", Some(meta.extraction_date.as_str()));
        push("file-hash", Some(meta.hash.as_str()));
        parts.extend(FEDRAMP_KEYWORDS.iter().map(|k| k.to_string()));
        parts.join(", ")
    }

    fn local_definitions(
        &self,
        rows: &[PoamRow],
    ) -> Result<Option<LocalDefinitions>, MappingError> {
        let asset_ids: BTreeSet<&str> = rows
            .iter()
            .flat_map(|r| r.asset_ids.iter())
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        let methods: BTreeSet<&'static str> = rows
            .iter()
            .filter_map(|r| r.origin.as_deref())
            .filter_map(|o| self.classifier.origin_method(o))
            .map(|m| m.as_str())
            .collect();

        let mut components = Vec::with_capacity(asset_ids.len());
        for id in asset_ids {
            components.push(Component {
                uuid: new_uuid(),
                component_type: "software".to_string(),
                title: id.to_string(),
                description: format!("Component referenced in POA&M: {id}"),
                props: self.ctx.props(Element::Component).oscal("asset-id", id)?.build(),
                links: Vec::new(),
                status: Status::new("operational"),
                responsible_roles: Vec::new(),
                control_implementations: Vec::new(),
            });
        }

        let mut activities = Vec::with_capacity(methods.len());
        for method in methods {
            activities.push(Activity {
                uuid: new_uuid(),
                title: format!("{method} Assessment"),
                description: format!("Assessment activity using {method} method"),
                props: self.ctx.props(Element::Activity).oscal("method", method)?.build(),
                steps: Vec::new(),
            });
        }

        Ok(LocalDefinitions {
            components,
            activities,
        }
        .into_option())
    }

    /// Ordered `key:value` pairs describing one row.
    fn item_pairs(row: &PoamRow) -> Vec<(&'static str, String)> {
        let severity = row
            .severity_level()
            .map(|s| s.as_str().to_lowercase())
            .unwrap_or_else(|| row.severity.trim().to_lowercase());
        let status = row
            .status_value()
            .map(|s| s.slug().to_string())
            .unwrap_or_else(|| row.status.trim().to_lowercase());
        let source = row.source_attribution.as_ref();

        vec![
            ("poam-id", row.poam_id.clone()),
            ("severity", severity),
            ("status", status),
            (
                "risk-score",
                row.risk_score.map(|s| s.to_string()).unwrap_or_default(),
            ),
            (
                "scheduled-completion-date",
                row.scheduled_completion_date.clone().unwrap_or_default(),
            ),
            (
                "actual-completion-date",
                row.actual_completion_date.clone().unwrap_or_default(),
            ),
            ("affected-assets", row.asset_ids.join(",")),
            ("comments", row.comments.clone().unwrap_or_default()),
            (
                "source-row",
                source
                    .and_then(|s| s.row)
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            ),
            (
                "source-sheet",
                source.and_then(|s| s.sheet.clone()).unwrap_or_default(),
            ),
        ]
    }

    fn item(&self, row: &PoamRow) -> Result<PoamItem, MappingError> {
        let props = self
            .ctx
            .props(Element::PoamItem)
            .metadata_pairs(self.ctx.policy, &Self::item_pairs(row))?
            .build();

        let origins = match row.origin.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(origin) => {
                // The actor vocabulary has only `marking`, so origin detail
                // is always consolidated.
                let actor_props = self
                    .ctx
                    .props(Element::OriginActor)
                    .metadata_pairs(
                        PropertyPolicy::Consolidate,
                        &[
                            ("origin-type", "assessment".to_string()),
                            ("origin", origin.to_string()),
                        ],
                    )?
                    .build();
                vec![Origin {
                    actors: vec![Actor {
                        actor_type: "party".to_string(),
                        actor_uuid: new_uuid(),
                        props: actor_props,
                    }],
                }]
            }
            None => Vec::new(),
        };

        let title = [row.title.as_str(), row.poam_id.as_str()]
            .into_iter()
            .find(|t| !t.trim().is_empty())
            .unwrap_or("Untitled POA&M item")
            .to_string();
        let description = if row.description.trim().is_empty() {
            title.clone()
        } else {
            row.description.clone()
        };

        Ok(PoamItem {
            uuid: new_uuid(),
            title,
            description,
            props,
            origins,
            related_findings: vec![RelatedFinding {
                finding_uuid: new_uuid(),
            }],
            related_risks: vec![RelatedRisk {
                risk_uuid: new_uuid(),
            }],
        })
    }
}

impl Mapper for PoamMapper<'_> {
    type Input = PoamCir;
    type Output = PoamDocument;

    fn map(&self, poam: &PoamCir) -> Result<PoamDocument, MappingError> {
        let meta_props = self
            .ctx
            .props(Element::Metadata)
            .oscal("keywords", self.keywords(poam))?
            .build();

        let items = poam
            .rows
            .iter()
            .map(|row| self.item(row))
            .collect::<Result<Vec<_>, _>>()?;
        info!(items = items.len(), "mapped POA&M items");

        let mut resources = Vec::new();
        if !poam.metadata.source_file.is_empty() {
            let title = format!("POA&M Source: {}", file_name(&poam.metadata.source_file));
            resources.push(source_resource(self.ctx, title, &poam.metadata)?);
        }

        Ok(PoamDocument {
            plan_of_action_and_milestones: PlanOfActionAndMilestones {
                uuid: new_uuid(),
                metadata: metadata(self.ctx, POAM_TITLE, meta_props),
                system_id: SystemId {
                    identifier_type: SYSTEM_ID_TYPE.to_string(),
                    id: new_uuid(),
                },
                local_definitions: self.local_definitions(&poam.rows)?,
                poam_items: items,
                back_matter: BackMatter { resources },
            },
        })
    }
}
