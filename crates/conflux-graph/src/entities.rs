//! Named-entity recognition seam. A real NER/IE model service is an
//! external collaborator — grounded on
//! the original implementation's
//! `is_available`/`extract_entities` surface. [`RuleEntityExtractor`] is the
//! always-available fallback the source falls back to when no IE model is
//! loaded, ported from `_extract_entities_by_rules`.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// Implemented by a real NER/IE model client; `is_available` lets callers
/// fall back to [`RuleEntityExtractor`] the way the source falls back to
/// "pure rule mode" when the model service failed to load.
pub trait EntityExtractor: Send + Sync {
    fn is_available(&self) -> bool;
    fn extract_entities(&self, text: &str) -> Vec<Entity>;
}

static PERSON_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-龥]{2,4}").unwrap());
const COMMON_SURNAMES: &[&str] = &[
    "刘", "关", "张", "赵", "马", "黄", "曹", "孙", "周", "吴", "郑", "王", "李", "陈", "杨",
    "林", "何", "郭", "罗", "高",
];

/// Surname-prefix heuristic over 2-4 character Chinese runs; never
/// "available" in the [`EntityExtractor`] sense (the source uses it as a
/// bare helper, not a registered service), but callers needing *something*
/// when no IE model is loaded construct entities from it directly via
/// [`extract_entities_by_rules`].
pub struct RuleEntityExtractor;

impl EntityExtractor for RuleEntityExtractor {
    fn is_available(&self) -> bool {
        false
    }

    fn extract_entities(&self, text: &str) -> Vec<Entity> {
        extract_entities_by_rules(text)
    }
}

/// Best-effort person-name spotting used so the NER+rule path still has
/// *some* entities to match against when no real IE model is wired in.
pub fn extract_entities_by_rules(text: &str) -> Vec<Entity> {
    let mut seen = std::collections::HashSet::new();
    let mut entities = Vec::new();
    for m in PERSON_NAME.find_iter(text) {
        let name = m.as_str();
        let starts_with_surname = name
            .chars()
            .next()
            .map(|c| COMMON_SURNAMES.contains(&c.to_string().as_str()))
            .unwrap_or(false);
        if starts_with_surname && seen.insert(name.to_string()) {
            entities.push(Entity {
                text: name.to_string(),
                label: "person".to_string(),
            });
        }
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_surnamed_runs() {
        let entities = extract_entities_by_rules("刘备和关羽在桃园结义");
        let names: Vec<_> = entities.iter().map(|e| e.text.as_str()).collect();
        assert!(names.contains(&"刘备"));
        assert!(names.contains(&"关羽"));
    }
}
