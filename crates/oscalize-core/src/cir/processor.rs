//! Normalization and enrichment of CIR data before mapping.
//!
//! Responsibilities:
//! - Canonicalize free text, control IDs and asset IDs
//! - Derive risk scores, risk categories, FQDNs and IP validity
//! - Attach control references found in section text
//!
//! Non-responsibilities:
//! - Rejecting malformed input (handled in `cir::validate`)
//! - Building artifacts (handled in `mapper`)
//!
//! Every pass takes its input by reference and returns a new value.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::model::{
    Asset, Cir, ControlEntry, ControlsCir, DocumentCir, InventoryCir, PoamCir, PoamRow,
    PoamStatus, RiskCategory, Section, Severity, Table,
};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

// `XX-#` with an optional `(#)` enhancement. The alternation replaces a
// trailing word boundary so `AC-2(1)` is captured whole.
static DASHED_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2}-\d+(?:\(\d+\)|\b)").expect("dashed control regex is valid")
});

static DOTTED_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\.\d+\b").expect("dotted control regex is valid"));

static CANONICAL_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]{2}-\d+(?:\(\d+\))?|[A-Z]{2}\.\d+)$")
        .expect("canonical control regex is valid")
});

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]+").expect("slug regex is valid"));

static HYPHEN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("hyphen regex is valid"));

/// Strip non-printable characters, collapse whitespace runs and trim.
///
/// Printable ASCII plus newline and tab survive the filter; the collapse
/// then folds newlines and tabs into single spaces.
pub fn normalize_text(s: &str) -> String {
    let printable: String = s
        .chars()
        .filter(|c| matches!(c, '\x20'..='\x7E' | '\n' | '\t'))
        .collect();
    WHITESPACE_RUN
        .replace_all(&printable, " ")
        .trim()
        .to_string()
}

/// Control IDs present in `text`, sorted and de-duplicated.
pub fn extract_control_ids(text: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    for m in DASHED_CONTROL.find_iter(text) {
        found.insert(m.as_str().to_string());
    }
    for m in DOTTED_CONTROL.find_iter(text) {
        found.insert(m.as_str().to_string());
    }
    found.into_iter().collect()
}

pub fn is_canonical_control_id(id: &str) -> bool {
    CANONICAL_CONTROL.is_match(id)
}

/// Uppercase and trim a control ID.
///
/// An ID matching neither accepted form is returned unchanged and logged.
pub fn normalize_control_id(id: &str) -> String {
    let candidate = id.trim().to_uppercase();
    if is_canonical_control_id(&candidate) {
        candidate
    } else {
        warn!(control_id = %id, "control id does not match a recognised format");
        id.to_string()
    }
}

/// Slug an asset ID: lowercase, hyphen-separated, no leading or trailing
/// hyphen.
pub fn normalize_asset_id(id: &str) -> String {
    let lowered = id.trim().to_lowercase();
    let replaced = NON_SLUG.replace_all(&lowered, "-");
    let collapsed = HYPHEN_RUN.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}

/// Severity base score times status multiplier, truncated.
///
/// Unknown severity counts as 1 and unknown status as 1.0.
pub fn risk_score(severity: &str, status: &str) -> u32 {
    let base = Severity::parse(severity).map_or(1, Severity::base_score);
    let tenths = PoamStatus::parse(status).map_or(10, PoamStatus::multiplier_tenths);
    base * tenths / 10
}

pub fn risk_category(asset: &Asset) -> RiskCategory {
    let exposed = asset.public_access || asset.is_production();
    match asset.criticality_level() {
        Some(Severity::Critical | Severity::High) if exposed => RiskCategory::High,
        Some(Severity::Moderate) => RiskCategory::Medium,
        _ if exposed => RiskCategory::Medium,
        _ => RiskCategory::Low,
    }
}

/// Fully qualified name: the name itself when dotted, else the name joined
/// to a dotted network location.
pub fn derive_fqdn(name: &str, network_location: Option<&str>) -> Option<String> {
    if name.contains('.') {
        return Some(name.to_string());
    }
    match network_location {
        Some(loc) if loc.contains('.') && !name.is_empty() => Some(format!("{name}.{loc}")),
        _ => None,
    }
}

/// Format-only IPv4/IPv6 check.
pub fn is_valid_ip(raw: &str) -> bool {
    raw.trim().parse::<IpAddr>().is_ok()
}

fn normalize_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().map(normalize_text)
}

fn process_table(table: &Table) -> Table {
    Table {
        id: table.id.clone(),
        caption: normalize_opt(&table.caption),
        headers: table.headers.iter().map(|h| normalize_text(h)).collect(),
        rows: table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| normalize_text(cell)).collect())
            .collect(),
    }
}

fn process_section(section: &Section) -> Section {
    let mut out = section.clone();
    out.title = normalize_text(&section.title);
    out.tables = section.tables.iter().map(process_table).collect();
    out.control_references = extract_control_ids(&section.text);
    out
}

pub fn process_document(doc: &DocumentCir) -> DocumentCir {
    debug!(sections = doc.sections.len(), "processing document CIR");
    DocumentCir {
        metadata: doc.metadata.clone(),
        sections: doc.sections.iter().map(process_section).collect(),
        users: doc.users.clone(),
    }
}

fn process_row(row: &PoamRow) -> PoamRow {
    let mut out = row.clone();
    out.title = normalize_text(&row.title);
    out.description = normalize_text(&row.description);
    out.comments = normalize_opt(&row.comments);
    out.control_ids = row
        .control_ids
        .iter()
        .filter(|id| !id.trim().is_empty())
        .map(|id| normalize_control_id(id))
        .collect();
    out.asset_ids = row
        .asset_ids
        .iter()
        .map(|id| normalize_asset_id(id))
        .filter(|id| !id.is_empty())
        .collect();
    for milestone in &mut out.milestones {
        milestone.description = normalize_text(&milestone.description);
    }
    if row.severity_level().is_none() {
        warn!(poam_id = %row.poam_id, severity = %row.severity, "unknown severity, scoring as lowest");
    }
    out.risk_score = Some(risk_score(&row.severity, &row.status));
    out
}

pub fn process_poam(poam: &PoamCir) -> PoamCir {
    debug!(rows = poam.rows.len(), "processing POA&M CIR");
    PoamCir {
        metadata: poam.metadata.clone(),
        rows: poam.rows.iter().map(process_row).collect(),
    }
}

fn process_asset(asset: &Asset) -> Asset {
    let mut out = asset.clone();
    out.name = normalize_text(&asset.name);
    out.description = normalize_text(&asset.description);
    out.asset_owner = normalize_opt(&asset.asset_owner);
    out.system_admin = normalize_opt(&asset.system_admin);
    out.asset_id = normalize_asset_id(&asset.asset_id);
    out.fqdn = derive_fqdn(&out.name, asset.network_location.as_deref());
    out.risk_category = Some(risk_category(asset));
    out.ip_address_valid = asset.ip_address.as_deref().map(|ip| {
        let valid = is_valid_ip(ip);
        if !valid {
            warn!(asset_id = %asset.asset_id, ip_address = %ip, "ip address does not parse");
        }
        valid
    });
    out
}

pub fn process_inventory(inventory: &InventoryCir) -> InventoryCir {
    debug!(assets = inventory.assets.len(), "processing inventory CIR");
    InventoryCir {
        metadata: inventory.metadata.clone(),
        assets: inventory.assets.iter().map(process_asset).collect(),
    }
}

fn process_control(control: &ControlEntry) -> ControlEntry {
    ControlEntry {
        control_id: normalize_control_id(&control.control_id),
        control_title: normalize_opt(&control.control_title),
        control_description: normalize_opt(&control.control_description),
        implementation_guidance: normalize_opt(&control.implementation_guidance),
        implementation_status: control.implementation_status.clone(),
        notes: normalize_opt(&control.notes),
    }
}

pub fn process_controls(controls: &ControlsCir) -> ControlsCir {
    ControlsCir {
        metadata: controls.metadata.clone(),
        controls: controls.controls.iter().map(process_control).collect(),
    }
}

/// Run the pass matching the input's declared kind.
pub fn process(cir: &Cir) -> Cir {
    match cir {
        Cir::Document(d) => Cir::Document(process_document(d)),
        Cir::Poam(p) => Cir::Poam(process_poam(p)),
        Cir::Inventory(i) => Cir::Inventory(process_inventory(i)),
        Cir::Controls(c) => Cir::Controls(process_controls(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(severity: &str, status: &str) -> PoamRow {
        PoamRow {
            poam_id: "V-001".into(),
            title: "  Unpatched   OS ".into(),
            severity: severity.into(),
            status: status.into(),
            control_ids: vec![" ac-3 ".into(), "".into()],
            asset_ids: vec!["SRV 1".into()],
            ..Default::default()
        }
    }

    fn asset(criticality: &str, public: bool, env: &str) -> Asset {
        Asset {
            asset_id: "a".into(),
            name: "web01".into(),
            criticality: Some(criticality.into()),
            public_access: public,
            environment: Some(env.into()),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_text_collapses_and_strips() {
        assert_eq!(normalize_text("  a\n\tb   c  "), "a b c");
        assert_eq!(normalize_text("caf\u{e9} ok"), "caf ok");
        assert_eq!(normalize_text("x \u{e9} y"), "x y");
        assert_eq!(normalize_text("\u{7}bell"), "bell");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn extracts_both_control_forms_sorted_and_unique() {
        let ids = extract_control_ids("Implements AC-2(1), AC-1 and IA.5; see AC-1 again.");
        assert_eq!(ids, vec!["AC-1", "AC-2(1)", "IA.5"]);
    }

    #[test]
    fn extraction_ignores_embedded_tokens() {
        assert!(extract_control_ids("XAC-1 and ac-2 and AC-12x").is_empty());
    }

    #[test]
    fn normalize_control_id_uppercases_known_forms() {
        assert_eq!(normalize_control_id(" ac-2(3) "), "AC-2(3)");
        assert_eq!(normalize_control_id("sc.7"), "SC.7");
    }

    #[test]
    fn normalize_control_id_falls_back_to_original() {
        assert_eq!(normalize_control_id("Access Control 2"), "Access Control 2");
    }

    #[test]
    fn normalize_asset_id_slugs() {
        assert_eq!(normalize_asset_id("  Web Server #1 "), "web-server-1");
        assert_eq!(normalize_asset_id("--DB__01--"), "db__01");
        assert_eq!(normalize_asset_id("a - - b"), "a-b");
    }

    #[test]
    fn risk_scores_follow_table() {
        assert_eq!(risk_score("Critical", "Open"), 10);
        assert_eq!(risk_score("Critical", "Completed"), 1);
        assert_eq!(risk_score("High", "Ongoing"), 4);
        assert_eq!(risk_score("Moderate", "Risk Accepted"), 1);
        assert_eq!(risk_score("Low", "Ongoing"), 0);
        assert_eq!(risk_score("bogus", "bogus"), 1);
    }

    #[test]
    fn risk_category_weighs_exposure() {
        assert_eq!(risk_category(&asset("High", true, "Test")), RiskCategory::High);
        assert_eq!(risk_category(&asset("Critical", false, "Production")), RiskCategory::High);
        assert_eq!(risk_category(&asset("High", false, "Test")), RiskCategory::Low);
        assert_eq!(risk_category(&asset("Moderate", false, "Test")), RiskCategory::Medium);
        assert_eq!(risk_category(&asset("Low", true, "Test")), RiskCategory::Medium);
        assert_eq!(risk_category(&asset("Low", false, "Development")), RiskCategory::Low);
    }

    #[test]
    fn fqdn_derivation() {
        assert_eq!(derive_fqdn("web.example.com", None).as_deref(), Some("web.example.com"));
        assert_eq!(derive_fqdn("web", Some("corp.local")).as_deref(), Some("web.corp.local"));
        assert_eq!(derive_fqdn("web", Some("dmz")), None);
        assert_eq!(derive_fqdn("web", None), None);
    }

    #[test]
    fn ip_validation_is_format_only() {
        assert!(is_valid_ip("10.0.0.1"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("10.0.0.256"));
        assert!(!is_valid_ip("host.local"));
    }

    #[test]
    fn poam_processing_returns_a_new_value() {
        let input = PoamCir {
            rows: vec![row("Critical", "Open")],
            ..Default::default()
        };
        let snapshot = input.clone();

        let out = process_poam(&input);

        assert_eq!(input, snapshot);
        let processed = &out.rows[0];
        assert_eq!(processed.title, "Unpatched OS");
        assert_eq!(processed.control_ids, vec!["AC-3"]);
        assert_eq!(processed.asset_ids, vec!["srv-1"]);
        assert_eq!(processed.risk_score, Some(10));
    }

    #[test]
    fn document_processing_adds_control_references() {
        let doc = DocumentCir {
            sections: vec![Section {
                id: "s1".into(),
                title: " Access   Control ".into(),
                level: 1,
                text: "Implements AC-2 and AC-3.".into(),
                tables: vec![Table {
                    id: "t1".into(),
                    caption: None,
                    headers: vec![" Role ".into()],
                    rows: vec![vec![" admin\n".into()]],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let out = process_document(&doc);
        let section = &out.sections[0];
        assert_eq!(section.title, "Access Control");
        assert_eq!(section.control_references, vec!["AC-2", "AC-3"]);
        assert_eq!(section.tables[0].headers, vec!["Role"]);
        assert_eq!(section.tables[0].rows[0], vec!["admin"]);
    }

    #[test]
    fn inventory_processing_derives_fields() {
        let inventory = InventoryCir {
            assets: vec![Asset {
                asset_id: "Web Server 01".into(),
                name: "web01".into(),
                network_location: Some("corp.example".into()),
                ip_address: Some("300.1.1.1".into()),
                criticality: Some("High".into()),
                public_access: true,
                ..Default::default()
            }],
            ..Default::default()
        };

        let out = process_inventory(&inventory);
        let asset = &out.assets[0];
        assert_eq!(asset.asset_id, "web-server-01");
        assert_eq!(asset.fqdn.as_deref(), Some("web01.corp.example"));
        assert_eq!(asset.risk_category, Some(RiskCategory::High));
        assert_eq!(asset.ip_address_valid, Some(false));
    }

    #[test]
    fn dispatch_matches_kind() {
        let cir = Cir::Controls(ControlsCir {
            controls: vec![ControlEntry {
                control_id: "ac-1".into(),
                notes: Some(" a  b ".into()),
                ..Default::default()
            }],
            ..Default::default()
        });

        match process(&cir) {
            Cir::Controls(c) => {
                assert_eq!(c.controls[0].control_id, "AC-1");
                assert_eq!(c.controls[0].notes.as_deref(), Some("a b"));
            }
            other => panic!("unexpected kind {:?}", other.kind()),
        }
    }
}
