//! Pure text extraction helpers over section prose.

use std::sync::LazyLock;

use regex::Regex;

static NUMBERED_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.?\s+(.+)$").expect("numbered step regex is valid"));

// A following numbered item must carry the dot to end the current step.
static NUMBERED_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.").expect("numbered boundary regex is valid"));

static BULLETED_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[•\-\*]\s+(.+)$").expect("bulleted step regex is valid"));

static BULLETED_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[•\-\*]").expect("bulleted boundary regex is valid"));

static CONFIDENTIALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)confidentiality\s*:?\s*(\w+)").expect("confidentiality regex is valid")
});

static INTEGRITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)integrity\s*:?\s*(\w+)").expect("integrity regex is valid"));

static AVAILABILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)availability\s*:?\s*(\w+)").expect("availability regex is valid")
});

static OVERALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)overall\s+impact\s*:?\s*(\w+)").expect("overall impact regex is valid")
});

/// FIPS-199 levels found in a categorization section, title-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fips199 {
    pub confidentiality: Option<String>,
    pub integrity: Option<String>,
    pub availability: Option<String>,
    pub overall: Option<String>,
}

impl Fips199 {
    pub fn is_empty(&self) -> bool {
        self.confidentiality.is_none()
            && self.integrity.is_none()
            && self.availability.is_none()
            && self.overall.is_none()
    }
}

fn collect_items(text: &str, start: &Regex, boundary: &Regex) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let begins_item = match &current {
            None => start.captures(line),
            Some(_) if boundary.is_match(line) => start.captures(line),
            Some(_) => None,
        };

        match (begins_item, current.as_mut()) {
            (Some(caps), _) => {
                if let Some(done) = current.take() {
                    items.push(done);
                }
                current = Some(caps[1].to_string());
            }
            (None, Some(item)) => {
                item.push('\n');
                item.push_str(line);
            }
            (None, None) => {}
        }
    }
    if let Some(done) = current {
        items.push(done);
    }

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Procedure steps from a numbered list, or from a bulleted list when no
/// numbered item is present. Continuation lines stay with their item.
pub fn extract_steps(text: &str) -> Vec<String> {
    let numbered = collect_items(text, &NUMBERED_START, &NUMBERED_BOUNDARY);
    if !numbered.is_empty() {
        return numbered;
    }
    collect_items(text, &BULLETED_START, &BULLETED_BOUNDARY)
}

/// One case-insensitive `Label: value` pattern per label.
fn field_patterns(labels: &[&str]) -> Vec<Regex> {
    labels
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i){}\s*:?\s*(.+)", regex::escape(label)))
                .expect("field label regex is valid")
        })
        .collect()
}

// Labels are tried in order.
static SYSTEM_NAME_FIELD: LazyLock<Vec<Regex>> =
    LazyLock::new(|| field_patterns(&["system name", "name"]));

static SYSTEM_ID_FIELD: LazyLock<Vec<Regex>> =
    LazyLock::new(|| field_patterns(&["system id", "identifier", "id"]));

/// Value after the first label found.
fn field_value(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

pub fn extract_system_name(text: &str) -> Option<String> {
    field_value(&SYSTEM_NAME_FIELD, text)
}

pub fn extract_system_id(text: &str) -> Option<String> {
    field_value(&SYSTEM_ID_FIELD, text)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| title_case(&caps[1]))
}

pub fn extract_fips199(text: &str) -> Fips199 {
    Fips199 {
        confidentiality: capture(&CONFIDENTIALITY, text),
        integrity: capture(&INTEGRITY, text),
        availability: capture(&AVAILABILITY, text),
        overall: capture(&OVERALL, text),
    }
}

/// At most `max` characters, with `...` appended when cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_steps_keep_continuation_lines() {
        let text = "Run these:\n1. Scan hosts\n   with credentials\n2. Review output\n3 Archive";
        assert_eq!(
            extract_steps(text),
            vec!["Scan hosts\n   with credentials", "Review output\n3 Archive"]
        );
    }

    #[test]
    fn bulleted_steps_are_the_fallback() {
        let text = "- Interview admins\n* Inspect logs\n• Sign off";
        assert_eq!(
            extract_steps(text),
            vec!["Interview admins", "Inspect logs", "Sign off"]
        );
    }

    #[test]
    fn prose_without_lists_has_no_steps() {
        assert!(extract_steps("Plain paragraph of prose.").is_empty());
    }

    #[test]
    fn field_values_try_labels_in_order() {
        let text = "System Name: Payroll Cloud\nOwner: HR";
        assert_eq!(extract_system_name(text).as_deref(), Some("Payroll Cloud"));
        assert_eq!(extract_system_name("Name: Ledger").as_deref(), Some("Ledger"));
        assert_eq!(
            extract_system_id("System ID: PAY-01\nIdentifier: other").as_deref(),
            Some("PAY-01")
        );
        assert_eq!(extract_system_id("Owner: HR"), None);
    }

    #[test]
    fn fips_levels_are_extracted_and_title_cased() {
        let text = "Confidentiality: MODERATE\nIntegrity - high\nAvailability: low\nOverall Impact: Moderate";
        let fips = extract_fips199(text);
        assert_eq!(fips.confidentiality.as_deref(), Some("Moderate"));
        assert_eq!(fips.availability.as_deref(), Some("Low"));
        assert_eq!(fips.overall.as_deref(), Some("Moderate"));
        // A dash is not a label separator.
        assert!(fips.integrity.is_none());
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé...");
    }
}
