//! The fixed rule-pattern table and event-entity patterns,
//! ported from the original implementation's
//! `_extract_triples_rule_based`/`_extract_triples_ner_rule_hybrid` pattern
//! lists and `_sample_text`.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// One relation-extraction rule: a regex plus which capture groups hold the
/// subject/object/(optional) relation, and which entity labels the rule is
/// allowed to fire for in the NER+rule path (`None` = unrestricted, used by
/// the pure rule-based path and by dynamic rules).
pub struct RelationPattern {
    pub regex: &'static str,
    /// `None` means the relation text comes from a capture group instead of
    /// being fixed (only used by the pure rule-based default table).
    pub fixed_relation: Option<&'static str>,
    pub subject_group: usize,
    pub object_group: usize,
    pub relation_group: Option<usize>,
    pub allowed_labels: Option<&'static [&'static str]>,
}

/// Rule-based mode's pattern table (no NER, no label filtering), in the
/// order the source tries them — first match per sentence per pattern wins.
pub static DEFAULT_RULE_PATTERNS: &[RelationPattern] = &[
    RelationPattern { regex: r"(.+?)是(.+)", fixed_relation: Some("是"), subject_group: 1, object_group: 2, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(位于|在)(.+)", fixed_relation: None, subject_group: 1, object_group: 3, relation_group: Some(2), allowed_labels: None },
    RelationPattern { regex: r"(.+?)(属于|归属)(.+)", fixed_relation: None, subject_group: 1, object_group: 3, relation_group: Some(2), allowed_labels: None },
    RelationPattern { regex: r"(.+?)(使用|采用)(.+)", fixed_relation: None, subject_group: 1, object_group: 3, relation_group: Some(2), allowed_labels: None },
    RelationPattern { regex: r"(.+?)(包含)(.+)", fixed_relation: Some("包含"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(和|与|同)(.+?)(结义|结拜)", fixed_relation: Some("结义"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(在)(.+?)(地|处|地方)", fixed_relation: Some("位于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(来自|出自)(.+)", fixed_relation: Some("来自"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(去|到|前往)(.+)", fixed_relation: Some("前往"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(说|道|曰)(.+)", fixed_relation: Some("说"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(做|进行|执行)(.+)", fixed_relation: Some("执行"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(有)(.+)", fixed_relation: Some("有"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
    RelationPattern { regex: r"(.+?)(成为|变成)(.+)", fixed_relation: Some("成为"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: None },
];

/// NER+rule mode's default pattern table: the same spirit as
/// [`DEFAULT_RULE_PATTERNS`] plus a label allow-list per rule.
pub static NER_RULE_PATTERNS: &[RelationPattern] = &[
    RelationPattern { regex: r"(.+?)(是|为|成为)(.+)", fixed_relation: Some("是"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "location", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(位于|在|处于)(.+)", fixed_relation: Some("位于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["location", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(属于|归属)(.+)", fixed_relation: Some("属于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(使用|采用|利用)(.+)", fixed_relation: Some("使用"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(包含|包括)(.+)", fixed_relation: Some("包含"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["organization", "location", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(创建|建立|开发)(.+)", fixed_relation: Some("创建"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(工作于|就职于)(.+)", fixed_relation: Some("工作于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(和|与|同)(.+?)(结义|结拜)", fixed_relation: Some("结义"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(说|道|曰)(.+)", fixed_relation: Some("说"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(做|进行|执行)(.+)", fixed_relation: Some("执行"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(去|到|前往)(.+)", fixed_relation: Some("前往"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(来自|出自)(.+)", fixed_relation: Some("来自"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "location", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(有)(.+)", fixed_relation: Some("有"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(拥有)(.+)", fixed_relation: Some("拥有"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(在)(.+?)(地|处|地方)", fixed_relation: Some("位于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "location", "UNKNOWN"]) },
    RelationPattern { regex: r"(.+?)(于)(.+?)(时|时候|期间)", fixed_relation: Some("发生于"), subject_group: 1, object_group: 3, relation_group: None, allowed_labels: Some(&["person", "organization", "UNKNOWN"]) },
];

/// A dynamically generated (per-document, LLM-sourced) rule. Shares
/// [`RelationPattern`]'s group-index convention but owns its strings since
/// it isn't known at compile time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DynamicRule {
    pub pattern: String,
    pub relation: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_subject_group")]
    pub subject_group: usize,
    #[serde(default = "default_object_group")]
    pub object_group: usize,
    #[serde(default)]
    pub relation_group: Option<usize>,
}

fn default_subject_group() -> usize {
    1
}

fn default_object_group() -> usize {
    3
}

static MULTI_PERSON_SWORN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)[、，,](.+?)[、，,](.+?)(结义|结拜)").unwrap());

/// Every pairwise `结义` triple for a multi-person sworn-brotherhood
/// sentence, e.g. `"刘备、关羽、张飞结义"` yields three pairs. `filter` lets
/// the NER+rule path restrict pairs to known entities; the rule-based path
/// passes a no-op filter.
pub fn multi_person_sworn_pairs(sentence: &str, filter: impl Fn(&str) -> bool) -> Vec<(String, String)> {
    let Some(captures) = MULTI_PERSON_SWORN.captures(sentence) else {
        return Vec::new();
    };
    let persons: Vec<String> = [1, 2, 3]
        .iter()
        .filter_map(|i| captures.get(*i).map(|m| m.as_str().trim().to_string()))
        .filter(|p| filter(p))
        .collect();
    let mut pairs = Vec::new();
    for i in 0..persons.len() {
        for j in (i + 1)..persons.len() {
            if persons[i].chars().count() < 50 && persons[j].chars().count() < 50 {
                pairs.push((persons[i].clone(), persons[j].clone()));
            }
        }
    }
    pairs
}

pub struct EventEntity {
    pub name: String,
    pub location: String,
    pub action: String,
    pub participants: Vec<String>,
}

static EVENT_PATTERN_MULTI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)[、，,](.+?)[、，,](.+?)在(.+?)(结义|结拜)").unwrap());
static EVENT_PATTERN_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)(和|与|同)(.+?)在(.+?)(结义|结拜)").unwrap());
static EVENT_PATTERN_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"在(.+?)(结义|结拜)").unwrap());
static PERSON_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[一-龥]{2,4}(?:[，、。！？\s]|$)").unwrap());

const COMMON_SURNAMES: &[&str] = &[
    "刘", "关", "张", "赵", "马", "黄", "曹", "孙", "周", "吴", "郑", "王", "李", "陈", "杨",
    "林", "何", "郭", "罗", "高",
];

/// Event-entity recognition: finds
/// `X、Y、Z在W结义`-shaped constructs, synthesizing event name `{W}{结义}`.
/// Works without NER, so it runs for every extraction mode.
pub fn extract_event_entities(text: &str) -> Vec<EventEntity> {
    let mut events = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for captures in EVENT_PATTERN_MULTI.captures_iter(text) {
        let participants = [1, 2, 3]
            .iter()
            .filter_map(|i| captures.get(*i).map(|m| m.as_str().trim().to_string()))
            .collect::<Vec<_>>();
        let location = captures.get(4).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let action = captures.get(5).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let name = format!("{location}{action}");
        if seen.insert(name.clone()) {
            events.push(EventEntity { name, location, action, participants });
        }
    }

    for captures in EVENT_PATTERN_PAIR.captures_iter(text) {
        let p1 = captures.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let p2 = captures.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let location = captures.get(4).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let action = captures.get(5).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let name = format!("{location}{action}");
        if seen.insert(name.clone()) {
            events.push(EventEntity { name, location, action, participants: vec![p1, p2] });
        }
    }

    for captures in EVENT_PATTERN_BARE.captures_iter(text) {
        let whole = captures.get(0).unwrap();
        let location = captures.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let action = captures.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        let name = format!("{location}{action}");

        let context_start = whole.start().saturating_sub(50);
        let context = &text[context_start..whole.start()];
        let participants: Vec<String> = PERSON_NAME
            .find_iter(context)
            .map(|m| m.as_str().trim_end_matches(['，', '、', '。', '！', '？']).to_string())
            .filter(|name| name.chars().next().map(|c| COMMON_SURNAMES.contains(&c.to_string().as_str())).unwrap_or(false))
            .collect();

        if (!participants.is_empty() || !location.is_empty()) && seen.insert(name.clone()) {
            events.push(EventEntity { name, location, action, participants });
        }
    }

    events
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMethod {
    Fixed,
    Random,
    Mixed,
}

impl SampleMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "random" => Some(Self::Random),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// Samples a document down to `max_length` chars for the dynamic-rule
/// analysis prompts.
pub fn sample_text(text: &str, max_length: usize, method: SampleMethod) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return text.to_string();
    }

    match method {
        SampleMethod::Fixed => chars[..max_length].iter().collect(),
        SampleMethod::Random => {
            let mut rng = rand::rng();
            let start = rng.random_range(0..=chars.len() - max_length);
            chars[start..start + max_length].iter().collect()
        }
        SampleMethod::Mixed => {
            let part1_len = max_length / 2;
            let part2_len = max_length - part1_len;
            let part1: String = chars[..part1_len.min(chars.len())].iter().collect();
            if chars.len() > part1_len {
                let mut rng = rand::rng();
                let lo = part1_len;
                let hi = part1_len.max(chars.len().saturating_sub(part2_len));
                let start = if hi > lo { rng.random_range(lo..=hi) } else { lo };
                let end = (start + part2_len).min(chars.len());
                let part2: String = chars[start..end].iter().collect();
                format!("{part1}\n...\n{part2}")
            } else {
                part1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_entities_recognize_peach_garden_oath() {
        let text = "刘备、关羽、张飞在桃园结义，誓同生死。";
        let events = extract_event_entities(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "桃园结义");
        assert_eq!(events[0].location, "桃园");
        assert_eq!(events[0].participants, vec!["刘备", "关羽", "张飞"]);
    }

    #[test]
    fn multi_person_pairs_cover_every_combination() {
        let pairs = multi_person_sworn_pairs("刘备、关羽、张飞结义", |_| true);
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn sample_text_fixed_takes_the_head() {
        let text = "a".repeat(100);
        let sampled = sample_text(&text, 10, SampleMethod::Fixed);
        assert_eq!(sampled, "a".repeat(10));
    }

    #[test]
    fn sample_text_under_limit_is_unchanged() {
        assert_eq!(sample_text("short", 100, SampleMethod::Mixed), "short");
    }
}
