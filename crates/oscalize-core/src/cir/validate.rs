//! Structural gate over raw CIR JSON.
//!
//! Runs before deserialization so that type problems are reported with a
//! JSON path instead of a serde message. Structural problems (missing
//! containers, wrong JSON types) are errors and reject the input. Record
//! level gaps and out-of-domain values are warnings: the processor and
//! mappers substitute defaults for them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::CirKind;
use super::processor::is_valid_ip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
    StringArray,
}

impl JsonType {
    fn name(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::StringArray => "array of strings",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Integer => value.is_u64() || value.is_i64(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
            JsonType::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

struct FieldRule {
    name: &'static str,
    ty: JsonType,
    required: bool,
    nullable: bool,
    allowed: &'static [&'static str],
}

const fn req(name: &'static str, ty: JsonType) -> FieldRule {
    FieldRule {
        name,
        ty,
        required: true,
        nullable: false,
        allowed: &[],
    }
}

const fn opt(name: &'static str, ty: JsonType) -> FieldRule {
    FieldRule {
        name,
        ty,
        required: false,
        nullable: false,
        allowed: &[],
    }
}

/// Optional string that readers may emit as `null`.
const fn text(name: &'static str) -> FieldRule {
    FieldRule {
        name,
        ty: JsonType::String,
        required: false,
        nullable: true,
        allowed: &[],
    }
}

const fn one_of(mut rule: FieldRule, allowed: &'static [&'static str]) -> FieldRule {
    rule.allowed = allowed;
    rule
}

const SEVERITIES: &[&str] = &["Low", "Moderate", "High", "Critical"];
const STATUSES: &[&str] = &["Open", "Ongoing", "Completed", "Risk Accepted"];
const ASSET_TYPES: &[&str] = &["hardware", "software", "data", "network", "service", "other"];
const ENVIRONMENTS: &[&str] = &["Production", "Development", "Test", "Staging", "Other"];

const METADATA_RULES: &[FieldRule] = &[
    req("source_file", JsonType::String),
    req("extraction_date", JsonType::String),
    req("hash", JsonType::String),
    text("source_type"),
    text("sheet_name"),
    text("template_version"),
    text("pandoc_version"),
    opt("stakeholders", JsonType::Array),
];

const SECTION_RULES: &[FieldRule] = &[
    req("id", JsonType::String),
    req("title", JsonType::String),
    req("level", JsonType::Integer),
    opt("text", JsonType::String),
    opt("tables", JsonType::Array),
    opt("source", JsonType::Object),
    opt("source_attribution", JsonType::Object),
    opt("control_references", JsonType::StringArray),
];

const TABLE_RULES: &[FieldRule] = &[
    opt("id", JsonType::String),
    text("caption"),
    opt("headers", JsonType::StringArray),
    opt("rows", JsonType::Array),
];

const ROW_RULES: &[FieldRule] = &[
    req("poam_id", JsonType::String),
    req("title", JsonType::String),
    one_of(req("severity", JsonType::String), SEVERITIES),
    one_of(req("status", JsonType::String), STATUSES),
    opt("description", JsonType::String),
    opt("control_ids", JsonType::StringArray),
    opt("asset_ids", JsonType::StringArray),
    text("scheduled_completion_date"),
    text("actual_completion_date"),
    text("origin"),
    text("comments"),
    text("control_name"),
    text("implementation_guidance"),
    text("point_of_contact"),
    text("resources_required"),
    text("remediation_plan"),
    opt("milestones", JsonType::Array),
    opt("source", JsonType::Object),
];

const ASSET_RULES: &[FieldRule] = &[
    req("asset_id", JsonType::String),
    one_of(req("asset_type", JsonType::String), ASSET_TYPES),
    req("name", JsonType::String),
    opt("description", JsonType::String),
    FieldRule {
        allowed: ENVIRONMENTS,
        ..text("environment")
    },
    FieldRule {
        allowed: SEVERITIES,
        ..text("criticality")
    },
    opt("public_access", JsonType::Boolean),
    opt("virtual", JsonType::Boolean),
    text("ip_address"),
    text("mac_address"),
    text("vlan"),
    text("network_location"),
    text("service_layer"),
    text("function"),
    text("asset_owner"),
    text("system_admin"),
    text("baseline"),
    text("operating_system"),
    text("software_version"),
    text("patch_level"),
    opt("tags", JsonType::StringArray),
    opt("links", JsonType::Array),
    opt("source", JsonType::Object),
];

const CONTROL_RULES: &[FieldRule] = &[
    req("control_id", JsonType::String),
    text("control_title"),
    text("control_description"),
    text("implementation_guidance"),
    text("implementation_status"),
    text("notes"),
];

fn record_rules(kind: CirKind) -> &'static [FieldRule] {
    match kind {
        CirKind::Document => SECTION_RULES,
        CirKind::Poam => ROW_RULES,
        CirKind::Inventory => ASSET_RULES,
        CirKind::Controls => CONTROL_RULES,
    }
}

/// One finding against a JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirIssue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSummary {
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirValidationReport {
    pub valid: bool,
    pub schema: String,
    pub errors: Vec<CirIssue>,
    pub warnings: Vec<CirIssue>,
    pub data_summary: DataSummary,
}

#[derive(Default)]
struct Collector {
    errors: Vec<CirIssue>,
    warnings: Vec<CirIssue>,
}

impl Collector {
    fn error(&mut self, path: String, message: impl Into<String>) {
        self.errors.push(CirIssue {
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: String, message: impl Into<String>) {
        self.warnings.push(CirIssue {
            path,
            message: message.into(),
        });
    }

    fn check_fields(&mut self, obj: &Map<String, Value>, rules: &[FieldRule], base: &str) {
        for rule in rules {
            let path = format!("{base}.{}", rule.name);
            match obj.get(rule.name) {
                None => {
                    if rule.required {
                        self.warning(path, format!("required field `{}` is missing", rule.name));
                    }
                }
                Some(Value::Null) if rule.nullable => {}
                Some(value) if !rule.ty.matches(value) => {
                    self.error(path, format!("expected {}", rule.ty.name()));
                }
                Some(Value::String(s)) if !rule.allowed.is_empty() => {
                    if !rule.allowed.iter().any(|a| a.eq_ignore_ascii_case(s.trim())) {
                        self.warning(
                            path,
                            format!("`{s}` is not one of {}", rule.allowed.join(", ")),
                        );
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn check_table(&mut self, table: &Value, base: &str) {
        let Some(obj) = table.as_object() else {
            self.error(base.to_string(), "expected object");
            return;
        };
        self.check_fields(obj, TABLE_RULES, base);
        if let Some(rows) = obj.get("rows").and_then(Value::as_array) {
            for (r, row) in rows.iter().enumerate() {
                if !JsonType::StringArray.matches(row) {
                    self.error(format!("{base}.rows[{r}]"), "expected array of strings");
                }
            }
        }
    }

    fn check_record(&mut self, kind: CirKind, record: &Value, base: &str) {
        let Some(obj) = record.as_object() else {
            self.error(base.to_string(), "expected object");
            return;
        };
        self.check_fields(obj, record_rules(kind), base);

        match kind {
            CirKind::Document => {
                if let Some(tables) = obj.get("tables").and_then(Value::as_array) {
                    for (t, table) in tables.iter().enumerate() {
                        self.check_table(table, &format!("{base}.tables[{t}]"));
                    }
                }
            }
            CirKind::Inventory => {
                if let Some(ip) = obj.get("ip_address").and_then(Value::as_str) {
                    if !ip.trim().is_empty() && !is_valid_ip(ip) {
                        self.warning(
                            format!("{base}.ip_address"),
                            format!("`{ip}` is not a valid IP address"),
                        );
                    }
                }
            }
            CirKind::Poam | CirKind::Controls => {}
        }
    }
}

/// Validate a raw CIR value against the model for `kind`.
pub fn validate_cir(kind: CirKind, value: &Value) -> CirValidationReport {
    let mut collector = Collector::default();
    let mut summary = DataSummary::default();

    match value.as_object() {
        None => collector.error("$".to_string(), "CIR root must be an object"),
        Some(root) => {
            summary.keys = root.keys().cloned().collect();

            match root.get("metadata") {
                None => collector.error("$.metadata".to_string(), "metadata block is missing"),
                Some(Value::Object(meta)) => {
                    collector.check_fields(meta, METADATA_RULES, "$.metadata")
                }
                Some(_) => collector.error("$.metadata".to_string(), "expected object"),
            }

            let key = kind.collection_key();
            match root.get(key) {
                None => collector.error(format!("$.{key}"), format!("`{key}` collection is missing")),
                Some(Value::Array(records)) => {
                    let count = Some(records.len());
                    match kind {
                        CirKind::Document => summary.section_count = count,
                        CirKind::Poam => summary.row_count = count,
                        CirKind::Inventory => summary.asset_count = count,
                        CirKind::Controls => summary.control_count = count,
                    }
                    for (i, record) in records.iter().enumerate() {
                        collector.check_record(kind, record, &format!("$.{key}[{i}]"));
                    }
                }
                Some(_) => collector.error(format!("$.{key}"), "expected array"),
            }

            if kind == CirKind::Document {
                if let Some(users) = root.get("users") {
                    if !users.is_array() {
                        collector.error("$.users".to_string(), "expected array");
                    }
                }
            }
        }
    }

    CirValidationReport {
        valid: collector.errors.is_empty(),
        schema: kind.schema_name().to_string(),
        errors: collector.errors,
        warnings: collector.warnings,
        data_summary: summary,
    }
}
