//! Builders shared by every mapper.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use super::MapContext;
use crate::OSCAL_VERSION;
use crate::cir::model::{CirMetadata, RowSource, SectionSource, Stakeholder};
use crate::error::MappingError;
use crate::oscal::model::{
    EmailAddress, Link, Metadata, Party, Property, Resource, Rlink, Role, SecurityImpactLevel,
    TelephoneNumber,
};
use crate::oscal::props::Element;

use super::extract::Fips199;

pub const DEFAULT_ARTIFACT_VERSION: &str = "1.0";

/// Fresh random identifier. Never reused across entities.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC time, RFC 3339 with a `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Metadata block stamped with the run timestamp.
pub fn metadata(ctx: &MapContext, title: &str, props: Vec<Property>) -> Metadata {
    Metadata {
        title: title.to_string(),
        published: ctx.timestamp.clone(),
        last_modified: ctx.timestamp.clone(),
        version: DEFAULT_ARTIFACT_VERSION.to_string(),
        oscal_version: OSCAL_VERSION.to_string(),
        props,
        roles: Vec::new(),
        parties: Vec::new(),
        responsible_parties: Vec::new(),
    }
}

pub fn party(
    name: &str,
    party_type: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
) -> Party {
    Party {
        uuid: new_uuid(),
        party_type: party_type.unwrap_or("organization").to_string(),
        name: name.to_string(),
        email_addresses: email
            .filter(|e| !e.trim().is_empty())
            .map(|e| vec![EmailAddress(e.to_string())])
            .unwrap_or_default(),
        telephone_numbers: phone
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                vec![TelephoneNumber {
                    number: p.to_string(),
                }]
            })
            .unwrap_or_default(),
    }
}

pub fn stakeholder_party(stakeholder: &Stakeholder) -> Party {
    party(
        &stakeholder.name,
        stakeholder.party_type.as_deref(),
        stakeholder.email.as_deref(),
        stakeholder.phone.as_deref(),
    )
}

pub fn link(href: &str, rel: Option<&str>, text: Option<&str>) -> Link {
    Link {
        href: href.to_string(),
        rel: rel.map(str::to_string),
        media_type: None,
        text: text.map(str::to_string),
    }
}

/// Role whose title is the id with its words capitalised.
pub fn role(id: &str) -> Role {
    let title = id
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| match w {
            "isso" => "ISSO".to_string(),
            _ => {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Role {
        id: id.to_string(),
        title,
    }
}

/// Roles for every id, deduplicated in first-seen order.
pub fn roles<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<Role> {
    let mut out: Vec<Role> = Vec::new();
    for id in ids {
        if !out.iter().any(|r| r.id == id) {
            out.push(role(id));
        }
    }
    out
}

/// Catalog form of a control ID: `AC-2(1)` becomes `ac-2.1`.
pub fn oscal_control_id(id: &str) -> String {
    id.trim()
        .to_lowercase()
        .replace('(', ".")
        .replace(')', "")
}

/// FIPS-199 levels lowercased into the OSCAL impact block.
pub fn security_impact_level(fips: &Fips199) -> SecurityImpactLevel {
    let level = |v: &Option<String>| v.as_deref().unwrap_or("moderate").to_lowercase();
    SecurityImpactLevel {
        security_objective_confidentiality: level(&fips.confidentiality),
        security_objective_integrity: level(&fips.integrity),
        security_objective_availability: level(&fips.availability),
    }
}

/// Provenance pairs of a CIR input, in emission order.
pub fn source_pairs(meta: &CirMetadata) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("source-file", meta.source_file.clone()),
        ("source-type", meta.source_type.clone().unwrap_or_default()),
        ("extraction-date", meta.extraction_date.clone()),
        ("file-hash", meta.hash.clone()),
    ];
    if let Some(v) = &meta.pandoc_version {
        pairs.push(("pandoc-version", v.clone()));
    }
    pairs
}

/// Citation pairs for a spreadsheet row.
pub fn row_citation_pairs(source: &RowSource) -> Vec<(&'static str, String)> {
    vec![
        ("source-file", source.file.clone()),
        ("excel-sheet", source.sheet.clone().unwrap_or_default()),
        (
            "excel-row",
            source.row.map(|r| r.to_string()).unwrap_or_default(),
        ),
    ]
}

/// Citation pairs for a document section.
pub fn section_citation_pairs(source: &SectionSource) -> Vec<(&'static str, String)> {
    vec![
        ("source-file", source.file.clone()),
        ("document-heading", source.heading_path.join(" > ")),
    ]
}

/// Metadata properties citing the CIR input, encoded per the run policy.
pub fn metadata_source_props(
    ctx: &MapContext,
    meta: &CirMetadata,
) -> Result<Vec<Property>, MappingError> {
    Ok(ctx
        .props(Element::Metadata)
        .metadata_pairs(ctx.policy, &source_pairs(meta))?
        .build())
}

/// Back-matter resource pointing at one CIR source file.
pub fn source_resource(
    ctx: &MapContext,
    title: String,
    meta: &CirMetadata,
) -> Result<Resource, MappingError> {
    let mut marking = Vec::new();
    if let Some(sheet) = &meta.sheet_name {
        marking.push(("sheet-name", sheet.clone()));
    }
    marking.push(("file-hash", meta.hash.clone()));

    let mut props = ctx.props(Element::BackMatterResource);
    if let Some(version) = meta.template_version.as_deref().filter(|v| !v.is_empty()) {
        props = props.oscal("version", version)?;
    }
    // Resource markings are always consolidated: the resource vocabulary
    // has no source-specific names.
    let props = props
        .metadata_pairs(crate::oscal::props::PropertyPolicy::Consolidate, &marking)?
        .build();

    Ok(Resource {
        uuid: new_uuid(),
        title,
        description: Some(format!(
            "Source file extracted on {}",
            if meta.extraction_date.is_empty() {
                "an unknown date"
            } else {
                meta.extraction_date.as_str()
            }
        )),
        props,
        rlinks: if meta.source_file.is_empty() {
            Vec::new()
        } else {
            vec![Rlink {
                href: meta.source_file.clone(),
                media_type: None,
            }]
        },
    })
}

/// File name component of a source path, for resource titles.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
