use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{Extraction, PersonRecord};

/// Candidate keys for a people collection, probed in order.
const PEOPLE_KEYS: &[&str] = &["team", "founders", "people", "members"];

static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?linkedin\.com/in/[A-Za-z0-9\-_]+").unwrap()
});

/// Founders from a structured (JSON) company payload.
///
/// The first key that yields people wins; collections under different keys
/// are never merged. Without any collection, profile links found anywhere in
/// the payload are returned as link-only records.
pub fn extract(payload: &Value) -> Extraction {
    if let Value::Object(fields) = payload {
        let found = PEOPLE_KEYS
            .iter()
            .filter_map(|key| fields.get(*key)?.as_array())
            .map(|entries| entries.iter().filter_map(normalize).collect::<Vec<_>>())
            .find(|people| !people.is_empty());
        if let Some(people) = found {
            return Extraction::Found(people);
        }
    }

    Extraction::from_people(scan_profile_links(payload))
}

fn normalize(entry: &Value) -> Option<PersonRecord> {
    let person = match entry {
        Value::String(name) => PersonRecord::named(name),
        Value::Object(fields) => {
            let name = ["name", "full_name"]
                .iter()
                .filter_map(|k| fields.get(*k)?.as_str())
                .find(|s| !s.trim().is_empty())
                .unwrap_or_default();
            let link = fields
                .get("linkedin")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| fields.get("links")?.get("linkedin")?.as_str())
                .unwrap_or_default();
            PersonRecord {
                name: name.trim().to_string(),
                profile_link: link.trim().to_string(),
            }
        }
        _ => return None,
    };
    (!person.is_blank()).then_some(person)
}

fn scan_profile_links(payload: &Value) -> Vec<PersonRecord> {
    let text = payload.to_string();
    let mut seen = HashSet::new();
    PROFILE_URL_RE
        .find_iter(&text)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(*url))
        .map(PersonRecord::link_only)
        .collect()
}
