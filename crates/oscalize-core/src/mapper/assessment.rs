//! Assessment plan and assessment results mappers.
//!
//! Both read a document CIR and rely on section classification only; no
//! prose is interpreted beyond keyword matching and list extraction.

use tracing::info;

use super::base::{file_name, metadata, new_uuid, oscal_control_id, source_pairs, source_resource};
use super::classify::{AssessmentMethod, SectionCategory, SectionClassifier};
use super::extract::{extract_steps, truncate};
use super::{MapContext, Mapper};
use crate::cir::model::{DocumentCir, Section};
use crate::cir::processor::extract_control_ids;
use crate::error::MappingError;
use crate::oscal::model::{
    Activity, AssessmentAssets, AssessmentPlan, AssessmentPlanDocument, AssessmentPlatform,
    AssessmentResult, AssessmentResults, AssessmentResultsDocument, AssessmentSubject, BackMatter,
    ControlSelection, Finding, FindingTarget, ImportRef, IncludeAll, LocalDefinitions, Metadata,
    Observation, OnDate, ReviewedControls, Status, Step, Task, TermsAndConditions, Timing,
};
use crate::oscal::props::Element;

pub const PLAN_TITLE: &str = "Security Assessment Plan";
pub const RESULTS_TITLE: &str = "Security Assessment Report";
const STEP_TITLE_LIMIT: usize = 50;
const PLATFORM_REMARKS_LIMIT: usize = 200;
const TERMS_MISSING: &str = "Terms and conditions not specified in source document.";

/// Whether an assessment reviews every control or a named subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScope {
    Full,
    Selective,
}

impl ControlScope {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlScope::Full => "full",
            ControlScope::Selective => "selective",
        }
    }
}

fn document_metadata(
    ctx: &MapContext,
    title: &str,
    document_type: &str,
    doc: &DocumentCir,
) -> Result<Metadata, MappingError> {
    let props = ctx
        .props(Element::Metadata)
        .extension("document-type", document_type)
        .metadata_pairs(ctx.policy, &source_pairs(&doc.metadata))?
        .build();
    Ok(metadata(ctx, title, props))
}

fn back_matter(ctx: &MapContext, doc: &DocumentCir) -> Result<BackMatter, MappingError> {
    let meta = &doc.metadata;
    let mut resources = Vec::new();
    if !meta.source_file.is_empty() {
        let title = format!("Assessment Source: {}", file_name(&meta.source_file));
        resources.push(source_resource(ctx, title, meta)?);
    }
    Ok(BackMatter { resources })
}

fn text_or_title(section: &Section) -> String {
    if section.text.trim().is_empty() {
        section.title.clone()
    } else {
        section.text.clone()
    }
}

pub struct AssessmentPlanMapper<'a> {
    ctx: &'a MapContext,
    classifier: SectionClassifier,
}

impl<'a> AssessmentPlanMapper<'a> {
    pub fn new(ctx: &'a MapContext) -> Self {
        Self {
            ctx,
            classifier: SectionClassifier::default(),
        }
    }

    /// One activity per method, taken from the first section naming it.
    fn activities(&self, sections: &[Section]) -> Result<Vec<Activity>, MappingError> {
        let mut seen: Vec<AssessmentMethod> = Vec::new();
        let mut activities = Vec::new();
        for section in sections {
            let Some(method) = self.classifier.method(&section.title) else {
                continue;
            };
            if seen.contains(&method) {
                continue;
            }
            seen.push(method);

            let steps = extract_steps(&section.text)
                .into_iter()
                .map(|step| Step {
                    uuid: new_uuid(),
                    title: truncate(&step, STEP_TITLE_LIMIT),
                    description: step,
                })
                .collect();
            activities.push(Activity {
                uuid: new_uuid(),
                title: section.title.clone(),
                description: text_or_title(section),
                props: self
                    .ctx
                    .props(Element::Activity)
                    .oscal("method", method.as_str())?
                    .build(),
                steps,
            });
        }
        Ok(activities)
    }

    /// Scope wording of the last scope section wins; selective scope lists
    /// the control IDs those sections name.
    pub fn control_scope(&self, sections: &[Section]) -> (ControlScope, Vec<String>) {
        let mut scope = ControlScope::Full;
        let mut ids: Vec<String> = Vec::new();
        for section in self.classifier.all(sections, SectionCategory::ControlScope) {
            let text = section.text.to_lowercase();
            if text.contains("all controls") || text.contains("complete") {
                scope = ControlScope::Full;
            } else if text.contains("selected") || text.contains("subset") {
                scope = ControlScope::Selective;
            }
            for id in extract_control_ids(&section.text) {
                let id = oscal_control_id(&id);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        (scope, ids)
    }

    fn reviewed_controls(&self, sections: &[Section]) -> ReviewedControls {
        let (scope, ids) = self.control_scope(sections);
        let selection = match scope {
            ControlScope::Selective if !ids.is_empty() => ControlSelection::controls(&ids),
            _ => ControlSelection::all(),
        };
        ReviewedControls {
            description: Some("Controls to be reviewed during assessment".to_string()),
            props: self
                .ctx
                .props(Element::ReviewedControls)
                .extension("scope", scope.as_str())
                .build(),
            control_selections: vec![selection],
        }
    }

    fn platforms(&self, sections: &[Section]) -> Result<Option<AssessmentAssets>, MappingError> {
        let mut platforms = Vec::new();
        for section in self.classifier.all(sections, SectionCategory::AssessmentTools) {
            platforms.push(AssessmentPlatform {
                uuid: new_uuid(),
                title: section.title.clone(),
                remarks: Some(truncate(&section.text, PLATFORM_REMARKS_LIMIT))
                    .filter(|r| !r.is_empty()),
                props: self
                    .ctx
                    .props(Element::AssessmentPlatform)
                    .oscal("asset-type", "tool")?
                    .build(),
            });
        }
        Ok((!platforms.is_empty()).then_some(AssessmentAssets {
            assessment_platforms: platforms,
        }))
    }

    fn tasks(&self, sections: &[Section]) -> Vec<Task> {
        self.classifier
            .all(sections, SectionCategory::Procedures)
            .map(|section| Task {
                uuid: new_uuid(),
                task_type: "action".to_string(),
                title: section.title.clone(),
                description: text_or_title(section),
                timing: Some(Timing {
                    on_date: OnDate {
                        date: self.ctx.timestamp.clone(),
                    },
                }),
            })
            .collect()
    }
}

impl Mapper for AssessmentPlanMapper<'_> {
    type Input = DocumentCir;
    type Output = AssessmentPlanDocument;

    fn map(&self, doc: &DocumentCir) -> Result<AssessmentPlanDocument, MappingError> {
        let sections = doc.sections.as_slice();
        let activities = self.activities(sections)?;
        let tasks = self.tasks(sections);
        info!(
            activities = activities.len(),
            tasks = tasks.len(),
            "mapped assessment plan"
        );

        Ok(AssessmentPlanDocument {
            assessment_plan: AssessmentPlan {
                uuid: new_uuid(),
                metadata: document_metadata(self.ctx, PLAN_TITLE, "assessment-plan", doc)?,
                import_ssp: ImportRef {
                    href: "./ssp.json".to_string(),
                },
                local_definitions: LocalDefinitions {
                    components: Vec::new(),
                    activities,
                }
                .into_option(),
                terms_and_conditions: TermsAndConditions {
                    description: self
                        .classifier
                        .first_text(sections, SectionCategory::TermsAndConditions)
                        .unwrap_or(TERMS_MISSING)
                        .to_string(),
                },
                reviewed_controls: self.reviewed_controls(sections),
                assessment_subjects: vec![AssessmentSubject {
                    subject_type: "inventory-item".to_string(),
                    description: "All system components subject to assessment".to_string(),
                    include_all: IncludeAll {},
                }],
                assessment_assets: self.platforms(sections)?,
                tasks,
                back_matter: back_matter(self.ctx, doc)?,
            },
        })
    }
}

pub struct AssessmentResultsMapper<'a> {
    ctx: &'a MapContext,
    classifier: SectionClassifier,
}

impl<'a> AssessmentResultsMapper<'a> {
    pub fn new(ctx: &'a MapContext) -> Self {
        Self {
            ctx,
            classifier: SectionClassifier::default(),
        }
    }

    fn findings(&self, sections: &[Section]) -> Vec<Finding> {
        self.classifier
            .all(sections, SectionCategory::Findings)
            .map(|section| {
                let target = extract_control_ids(&format!("{} {}", section.title, section.text))
                    .first()
                    .map(|id| FindingTarget {
                        target_type: "objective-id".to_string(),
                        target_id: format!("{}_obj", oscal_control_id(id)),
                        status: Status::new("not-satisfied"),
                    });
                Finding {
                    uuid: new_uuid(),
                    title: section.title.clone(),
                    description: text_or_title(section),
                    props: self
                        .ctx
                        .props(Element::Finding)
                        .extension("finding-type", "deficiency")
                        .build(),
                    target,
                }
            })
            .collect()
    }

    fn observations(&self, sections: &[Section]) -> Vec<Observation> {
        self.classifier
            .all(sections, SectionCategory::Observations)
            .map(|section| Observation {
                uuid: new_uuid(),
                title: section.title.clone(),
                description: text_or_title(section),
                methods: vec![AssessmentMethod::Examine.as_str().to_string()],
                types: vec!["finding".to_string()],
                collected: self.ctx.timestamp.clone(),
            })
            .collect()
    }
}

impl Mapper for AssessmentResultsMapper<'_> {
    type Input = DocumentCir;
    type Output = AssessmentResultsDocument;

    fn map(&self, doc: &DocumentCir) -> Result<AssessmentResultsDocument, MappingError> {
        let sections = doc.sections.as_slice();
        let findings = self.findings(sections);
        let observations = self.observations(sections);
        info!(
            findings = findings.len(),
            observations = observations.len(),
            "mapped assessment results"
        );

        let result = AssessmentResult {
            uuid: new_uuid(),
            title: "Assessment Results".to_string(),
            description: "Results from security assessment activities".to_string(),
            start: self.ctx.timestamp.clone(),
            end: self.ctx.timestamp.clone(),
            props: self
                .ctx
                .props(Element::Result)
                .extension("assessment-status", "complete")
                .build(),
            reviewed_controls: ReviewedControls {
                description: Some("Controls reviewed during assessment".to_string()),
                props: Vec::new(),
                control_selections: vec![ControlSelection::all()],
            },
            observations,
            findings,
        };

        Ok(AssessmentResultsDocument {
            assessment_results: AssessmentResults {
                uuid: new_uuid(),
                metadata: document_metadata(self.ctx, RESULTS_TITLE, "assessment-results", doc)?,
                import_ap: ImportRef {
                    href: "./assessment-plan.json".to_string(),
                },
                local_definitions: None,
                results: vec![result],
                back_matter: back_matter(self.ctx, doc)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cir::model::CirMetadata;
    use crate::mapper::test_support::{assert_unique_uuids, ctx, default_ns_prop_names};

    fn section(title: &str, text: &str) -> Section {
        Section {
            id: title.to_lowercase().replace(' ', "-"),
            title: title.into(),
            level: 2,
            text: text.into(),
            ..Default::default()
        }
    }

    fn doc(sections: Vec<Section>) -> DocumentCir {
        DocumentCir {
            metadata: CirMetadata {
                source_file: "docs/sap.docx".into(),
                hash: "abc".into(),
                ..Default::default()
            },
            sections,
            users: Vec::new(),
        }
    }

    fn plan(sections: Vec<Section>) -> AssessmentPlanDocument {
        let c = ctx();
        AssessmentPlanMapper::new(&c).map(&doc(sections)).unwrap()
    }

    #[test]
    fn method_sections_become_activities_with_steps() {
        let long = "x".repeat(60);
        let ap = plan(vec![
            section(
                "Test Procedures",
                &format!("1. Run scanner\n2. {long}\n3. Archive results"),
            ),
            section("Interview Plan", "- Talk to admins\n- Talk to devs"),
            section("Second Test Round", "1. Repeat"),
        ]);
        let local = ap.assessment_plan.local_definitions.as_ref().unwrap();
        assert_eq!(local.activities.len(), 2);

        let test = &local.activities[0];
        assert_eq!(test.props[0].value, "TEST");
        assert_eq!(test.steps.len(), 3);
        assert_eq!(test.steps[1].title, format!("{}...", "x".repeat(50)));
        assert_eq!(test.steps[1].description, long);

        let interview = &local.activities[1];
        assert_eq!(interview.props[0].value, "INTERVIEW");
        assert_eq!(interview.steps[0].title, "Talk to admins");
    }

    #[test]
    fn terms_default_when_absent() {
        let ap = plan(vec![]);
        assert_eq!(ap.assessment_plan.terms_and_conditions.description, TERMS_MISSING);
        assert!(ap.assessment_plan.local_definitions.is_none());
        assert!(ap.assessment_plan.assessment_assets.is_none());

        let ap = plan(vec![section("Assumptions", "Access is granted on day one.")]);
        assert_eq!(
            ap.assessment_plan.terms_and_conditions.description,
            "Access is granted on day one."
        );
    }

    #[test]
    fn selective_scope_lists_named_controls() {
        let ap = plan(vec![section(
            "Assessment Scope",
            "A selected subset: AC-2, AU-6(1).",
        )]);
        let reviewed = &ap.assessment_plan.reviewed_controls;
        assert_eq!(reviewed.props[0].value, "selective");
        let ids: Vec<&str> = reviewed.control_selections[0]
            .include_controls
            .iter()
            .map(|c| c.control_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ac-2", "au-6.1"]);

        let full = plan(vec![section("Control Scope", "All controls are in scope.")]);
        let selection = &full.assessment_plan.reviewed_controls.control_selections[0];
        assert!(selection.include_all.is_some());
    }

    #[test]
    fn platforms_and_tasks_come_from_sections() {
        let ap = plan(vec![
            section("Assessment Tools", &"t".repeat(250)),
            section("Task Schedule", "Kickoff."),
        ]);
        let platforms = &ap.assessment_plan.assessment_assets.as_ref().unwrap().assessment_platforms;
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].remarks.as_ref().unwrap().chars().count(), 203);

        let value = serde_json::to_value(&ap).unwrap();
        let task = &value["assessment-plan"]["tasks"][0];
        assert_eq!(task["type"], "action");
        assert_eq!(task["timing"]["on-date"]["date"], "2026-01-01T00:00:00Z");
        assert_eq!(value["assessment-plan"]["import-ssp"]["href"], "./ssp.json");
        assert_eq!(
            value["assessment-plan"]["assessment-subjects"][0]["include-all"],
            serde_json::json!({})
        );
        assert_unique_uuids(&value);
    }

    #[test]
    fn results_collect_findings_and_observations() {
        let c = ctx();
        let ar = AssessmentResultsMapper::new(&c)
            .map(&doc(vec![
                section("Findings", "AC-2 accounts were not reviewed."),
                section("Deficiency Summary", ""),
                section("Observations", "Logs retained for 90 days."),
            ]))
            .unwrap();
        let result = &ar.assessment_results.results[0];
        assert_eq!(result.findings.len(), 2);
        assert_eq!(
            result.findings[0].target.as_ref().unwrap().target_id,
            "ac-2_obj"
        );
        assert!(result.findings[1].target.is_none());
        assert_eq!(result.findings[1].description, "Deficiency Summary");
        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.observations[0].methods, vec!["EXAMINE"]);
        assert_eq!(result.observations[0].types, vec!["finding"]);
        assert_eq!(ar.assessment_results.import_ap.href, "./assessment-plan.json");
        assert_eq!(
            ar.assessment_results.back_matter.resources[0].title,
            "Assessment Source: sap.docx"
        );

        let value = serde_json::to_value(&ar).unwrap();
        let mut names = Vec::new();
        default_ns_prop_names(&value, &mut names);
        assert!(names.iter().all(|n| n == "marking" || n == "method"), "{names:?}");
    }
}
