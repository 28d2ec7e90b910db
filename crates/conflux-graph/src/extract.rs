//! Extraction-mode dispatch and the rule-based / NER+rule / LLM triple
//! extractors, grounded on
//! the original implementation's
//! `extract_entities_and_relations`, `_extract_triples_rule_based`,
//! `_extract_triples_ner_rule_hybrid`, `_extract_triples_with_llm`, and
//! `_parse_triples`.

use crate::entities::{extract_entities_by_rules, Entity, EntityExtractor};
use crate::rules::{
    extract_event_entities, multi_person_sworn_pairs, DynamicRule, RelationPattern,
    DEFAULT_RULE_PATTERNS, NER_RULE_PATTERNS,
};
use conflux_model::history::HistoryMessage;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Llm,
    Rule,
    Hybrid,
    Model,
    NerRule,
}

impl ExtractionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "llm" => Some(Self::Llm),
            "rule" => Some(Self::Rule),
            "hybrid" => Some(Self::Hybrid),
            "model" => Some(Self::Model),
            "ner_rule" => Some(Self::NerRule),
            _ => None,
        }
    }
}

/// One extracted fact before it is wrapped into a [`conflux_types::model::Triple`]
/// and assigned kb/document/chunk ids.
#[derive(Debug, Clone)]
pub struct RawTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
}

impl RawTriple {
    fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>, confidence: f32) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence,
        }
    }

    fn key(&self) -> (String, String, String) {
        (self.subject.clone(), self.predicate.clone(), self.object.clone())
    }
}

fn normalize_entity(entity: &str) -> String {
    let collapsed = entity.split_whitespace().collect::<Vec<_>>().join(" ");
    let unified = collapsed.replace('，', ",").replace('。', ".");
    unified
        .trim_matches(|c: char| ".,;:!?，。；：！？".contains(c))
        .to_string()
}

fn valid_triple(subj: &str, pred: &str, obj: &str) -> bool {
    if subj.is_empty() || pred.is_empty() || obj.is_empty() {
        return false;
    }
    if subj.chars().count() > 100 || obj.chars().count() > 100 || pred.chars().count() > 20 {
        return false;
    }
    if subj.chars().count() < 2 || obj.chars().count() < 2 {
        return false;
    }
    true
}

fn event_triples(text: &str, known_entity: impl Fn(&str) -> bool) -> Vec<RawTriple> {
    let mut out = Vec::new();
    for event in extract_event_entities(text) {
        out.push(RawTriple::new(&event.name, "类型", "结义事件", 0.9));
        if !event.location.is_empty() {
            out.push(RawTriple::new(&event.name, "发生地点", &event.location, 0.9));
        }
        for participant in &event.participants {
            if !participant.is_empty() && known_entity(participant) {
                out.push(RawTriple::new(participant, "参与", &event.name, 0.9));
            }
        }
    }
    out
}

/// Pure rule-based extraction: event-entity pass
/// first, then sentence-by-sentence pattern matching with no NER gate.
pub fn extract_rule_based(text: &str) -> Vec<RawTriple> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut triples = event_triples(text, |_| true);

    let sentences: Vec<&str> = text
        .split(['。', '！', '？', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for sent in &sentences {
        if sent.chars().count() < 6 {
            continue;
        }

        for pair in multi_person_sworn_pairs(sent, |_| true) {
            triples.push(RawTriple::new(pair.0, "结义", pair.1, 0.8));
        }

        for pattern in DEFAULT_RULE_PATTERNS {
            if let Some(t) = match_pattern(pattern, sent) {
                triples.push(t);
            }
        }
    }

    dedup(triples)
}

fn match_pattern(pattern: &RelationPattern, sentence: &str) -> Option<RawTriple> {
    let regex = compiled(pattern.regex);
    let captures = regex.captures(sentence)?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str().trim());

    let subj = normalize_entity(group(pattern.subject_group)?);
    let obj = normalize_entity(group(pattern.object_group)?);
    let pred = match pattern.relation_group {
        Some(g) => group(g)?.to_string(),
        None => pattern.fixed_relation?.to_string(),
    };

    if !valid_triple(&subj, &pred, &obj) {
        return None;
    }
    Some(RawTriple::new(subj, pred, obj, 0.8))
}

static PATTERN_CACHE: Lazy<dashmap::DashMap<&'static str, Regex>> = Lazy::new(dashmap::DashMap::new);

fn compiled(pattern: &'static str) -> Regex {
    PATTERN_CACHE
        .entry(pattern)
        .or_insert_with(|| Regex::new(pattern).expect("static relation patterns are valid regex"))
        .clone()
}

/// NER+rule extraction: entities
/// come from `extractor` (or the surname-rule fallback when unavailable),
/// relations from [`NER_RULE_PATTERNS`] plus any per-document `dynamic_rules`.
pub fn extract_ner_rule_hybrid(
    text: &str,
    extractor: Option<&dyn EntityExtractor>,
    dynamic_rules: &[DynamicRule],
) -> Vec<RawTriple> {
    if text.is_empty() {
        return Vec::new();
    }

    let entities: Vec<Entity> = match extractor {
        Some(e) if e.is_available() => e.extract_entities(text),
        _ => extract_entities_by_rules(text),
    };

    if entities.is_empty() {
        return extract_rule_based(text);
    }

    let mut entity_labels: HashMap<String, String> = HashMap::new();
    let mut entity_texts: HashSet<String> = HashSet::new();
    for entity in &entities {
        if entity.text.chars().count() < 2 {
            continue;
        }
        entity_texts.insert(entity.text.clone());
        entity_labels.entry(entity.text.clone()).or_insert_with(|| entity.label.clone());
    }

    let sentences: Vec<&str> = text
        .split(['。', '！', '？', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().count() >= 6)
        .collect();

    let mut triples = Vec::new();

    for sent in &sentences {
        let present: Vec<&String> = entity_texts.iter().filter(|e| sent.contains(e.as_str())).collect();
        if present.len() < 2 {
            continue;
        }

        for pattern in NER_RULE_PATTERNS {
            if let Some(t) = match_ner_pattern(pattern, sent, &entity_texts, &entity_labels) {
                triples.push(t);
            }
        }

        for rule in dynamic_rules {
            if let Some(t) = match_dynamic_rule(rule, sent, &entity_texts) {
                triples.push(t);
            }
        }
    }

    for sent in &sentences {
        for pair in multi_person_sworn_pairs(sent, |p| entity_texts.contains(p)) {
            triples.push(RawTriple::new(pair.0, "结义", pair.1, 0.9));
        }
    }

    triples.extend(event_triples(text, |p| entity_texts.contains(p)));

    dedup(triples)
}

fn match_ner_pattern(
    pattern: &RelationPattern,
    sentence: &str,
    entity_texts: &HashSet<String>,
    entity_labels: &HashMap<String, String>,
) -> Option<RawTriple> {
    let regex = compiled(pattern.regex);
    let captures = regex.captures(sentence)?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str().trim());

    let mut subj = group(pattern.subject_group)?.to_string();
    let mut obj = group(pattern.object_group)?.to_string();
    let pred = match pattern.relation_group {
        Some(g) => group(g)?.to_string(),
        None => pattern.fixed_relation?.to_string(),
    };

    let mut subj_is_entity = entity_texts.contains(&subj);
    let mut obj_is_entity = entity_texts.contains(&obj);

    if subj_is_entity && !obj_is_entity {
        if let Some(found) = entity_texts.iter().find(|e| obj.contains(e.as_str()) && e.chars().count() >= 2) {
            obj = found.clone();
            obj_is_entity = true;
        }
    }
    if obj_is_entity && !subj_is_entity {
        if let Some(found) = entity_texts.iter().find(|e| subj.contains(e.as_str()) && e.chars().count() >= 2) {
            subj = found.clone();
            subj_is_entity = true;
        }
    }

    if !subj_is_entity && !obj_is_entity {
        return None;
    }

    if let Some(allowed) = pattern.allowed_labels {
        let subj_label = entity_labels.get(&subj).map(String::as_str).unwrap_or("UNKNOWN");
        let obj_label = entity_labels.get(&obj).map(String::as_str).unwrap_or("UNKNOWN");
        if !allowed.contains(&subj_label) && !allowed.contains(&"UNKNOWN") {
            return None;
        }
        if !allowed.contains(&obj_label) && !allowed.contains(&"UNKNOWN") {
            return None;
        }
    }

    let subj = normalize_entity(&subj);
    let obj = normalize_entity(&obj);
    if !valid_triple(&subj, &pred, &obj) {
        return None;
    }

    let confidence = if subj_is_entity && obj_is_entity { 0.9 } else { 0.85 };
    Some(RawTriple::new(subj, pred, obj, confidence))
}

fn match_dynamic_rule(rule: &DynamicRule, sentence: &str, entity_texts: &HashSet<String>) -> Option<RawTriple> {
    let regex = Regex::new(&rule.pattern).ok()?;
    let captures = regex.captures(sentence)?;
    let group = |i: usize| captures.get(i).map(|m| m.as_str().trim());

    let subj = group(rule.subject_group)?.to_string();
    let obj = group(rule.object_group)?.to_string();
    let pred = match rule.relation_group {
        Some(g) => group(g).map(str::to_string).unwrap_or_else(|| rule.relation.clone()),
        None => rule.relation.clone(),
    };

    if !entity_texts.contains(&subj) && !entity_texts.contains(&obj) {
        return None;
    }

    let subj = normalize_entity(&subj);
    let obj = normalize_entity(&obj);
    if !valid_triple(&subj, &pred, &obj) {
        return None;
    }
    Some(RawTriple::new(subj, pred, obj, 0.85))
}

fn dedup(triples: Vec<RawTriple>) -> Vec<RawTriple> {
    let mut seen = HashSet::new();
    triples.into_iter().filter(|t| seen.insert(t.key())).collect()
}

/// LLM-based extraction: a single completion prompt asking for `subject | predicate |
/// object` lines, parsed by [`parse_triples`].
pub async fn extract_with_llm(llm: &dyn LlmProvider, text: &str) -> Vec<RawTriple> {
    let sample: String = text.chars().take(3000).collect();
    let prompt = format!(
        "请从以下文本中提取所有实体关系三元组。\n\n要求：\n1. 提取所有可能的(主语, 关系, 宾语)三元组\n2. 每个三元组一行，格式：主语 | 关系 | 宾语\n3. 只输出三元组，不要其他解释\n\n文本：\n{sample}"
    );
    let request = CompletionRequest::new(vec![
        HistoryMessage::system("你是一个专业的实体关系抽取专家，擅长从文本中准确识别实体和关系。"),
        HistoryMessage::user(prompt),
    ]);
    match llm.complete(request).await {
        Ok(response) => parse_triples(&response),
        Err(err) => {
            tracing::warn!(error = %err, "llm triple extraction failed");
            Vec::new()
        }
    }
}

static SEPARATORS: &[&str] = &["|", "，", ",", "\t", " -> ", " ->", "-> ", "→"];

/// Parses `subject <sep> predicate <sep> object` lines out of raw LLM text,
/// tolerating numbered/bulleted prefixes and several separators.
pub fn parse_triples(text: &str) -> Vec<RawTriple> {
    let mut triples = Vec::new();
    for raw_line in text.lines() {
        let mut line = raw_line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(|c: char| c.is_ascii_digit()) || line.starts_with(['-', '*', '#']) {
            line = strip_list_prefix(&line);
        }

        let mut parts: Option<Vec<String>> = None;
        for sep in SEPARATORS {
            if line.contains(sep) {
                let candidate: Vec<String> = line.split(sep).map(|p| p.trim().trim_matches(['"', '\'']).to_string()).collect();
                if candidate.len() >= 3 {
                    parts = Some(candidate);
                    break;
                }
            }
        }

        if let Some(parts) = parts {
            let subject = parts[0].clone();
            let predicate = parts[1].clone();
            let object = parts[2].clone();
            if !subject.is_empty()
                && !predicate.is_empty()
                && !object.is_empty()
                && subject.chars().count() < 200
                && predicate.chars().count() < 100
                && object.chars().count() < 200
            {
                let confidence = calculate_confidence(&predicate);
                triples.push(RawTriple::new(subject, predicate, object, confidence));
            }
        }
    }
    triples
}

fn strip_list_prefix(line: &str) -> String {
    let trimmed = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let trimmed = trimmed.trim_start_matches(['.', ')']).trim_start();
    trimmed.trim_start_matches(['-', '*', '#']).trim_start().to_string()
}

const RELATION_TYPE_KEYWORDS: &[&[&str]] = &[
    &["是", "有", "属于", "包含", "具有"],
    &["做", "进行", "实现", "完成", "执行", "创建", "开发"],
    &["在", "位于", "来自", "去", "到"],
    &["导致", "引起", "因为", "所以", "由于"],
    &["与", "和", "同", "一起", "合作"],
];

/// Common relation keywords score slightly higher than novel ones.
pub fn calculate_confidence(predicate: &str) -> f32 {
    for keywords in RELATION_TYPE_KEYWORDS {
        if keywords.iter().any(|kw| predicate.contains(kw)) {
            return 0.9;
        }
    }
    0.8
}

/// Top-level dispatch matching `extract_entities_and_relations`'s mode
/// switch, minus the `hybrid` supplement step (the caller decides whether
/// to call [`extract_with_llm`] afterward, since that needs an `&dyn
/// LlmProvider` the pure modes don't).
pub fn dispatch_non_llm(mode: ExtractionMode, text: &str, extractor: Option<&dyn EntityExtractor>, dynamic_rules: &[DynamicRule]) -> Vec<RawTriple> {
    match mode {
        ExtractionMode::Rule => extract_rule_based(text),
        ExtractionMode::NerRule | ExtractionMode::Model => extract_ner_rule_hybrid(text, extractor, dynamic_rules),
        ExtractionMode::Hybrid => extract_rule_based(text),
        ExtractionMode::Llm => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_based_extracts_peach_garden_scenario() {
        let text = "刘备、关羽、张飞在桃园结义。桃园位于涿郡。";
        let triples = extract_rule_based(text);
        let has = |s: &str, p: &str, o: &str| triples.iter().any(|t| t.subject == s && t.predicate == p && t.object == o);
        assert!(has("刘备", "参与", "桃园结义"));
        assert!(has("关羽", "参与", "桃园结义"));
        assert!(has("张飞", "参与", "桃园结义"));
        assert!(has("桃园结义", "发生地点", "桃园"));
    }

    #[test]
    fn ner_rule_hybrid_falls_back_without_entities() {
        let text = "这是一个测试文本，没有任何已知实体。";
        let triples = extract_ner_rule_hybrid(text, None, &[]);
        assert!(triples.is_empty() || triples.iter().all(|t| t.confidence <= 0.9));
    }

    #[test]
    fn parse_triples_reads_pipe_separated_lines() {
        let text = "张三 | 工作于 | 公司A\n北京 | 位于 | 中国";
        let triples = parse_triples(text);
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].subject, "张三");
        assert_eq!(triples[0].object, "公司A");
    }

    #[test]
    fn parse_triples_skips_numbered_prefixes() {
        let text = "1. 张三 | 工作于 | 公司A";
        let triples = parse_triples(text);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].subject, "张三");
    }

    #[test]
    fn dedup_drops_repeated_triples() {
        let triples = vec![
            RawTriple::new("a", "p", "b", 0.8),
            RawTriple::new("a", "p", "b", 0.9),
        ];
        assert_eq!(dedup(triples).len(), 1);
    }
}
