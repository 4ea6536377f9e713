//! Observation extractor (C4) — turns raw per-entity facts collected
//! during parsing into the fixed `key:value` tag schema stored on
//! `Entity::observations`. Observations are advisory: a missing fact
//! simply means the corresponding tag is omitted.

/// Branch/loop/boolean-operator count thresholds for the complexity
/// bucket. Configured once; must not change between runs or historical
/// complexity tags become incomparable.
const COMPLEXITY_LOW_MAX: u32 = 5;
const COMPLEXITY_MEDIUM_MAX: u32 = 15;

/// Name fragments that heuristically suggest a design pattern. Purely
/// name-based; false positives are expected and acceptable.
const PATTERN_HINTS: &[(&str, &str)] = &[
    ("factory", "factory"),
    ("singleton", "singleton"),
    ("observer", "observer"),
    ("listener", "observer"),
    ("builder", "builder"),
    ("adapter", "adapter"),
    ("decorator", "decorator"),
    ("strategy", "strategy"),
    ("visitor", "visitor"),
];

/// Raw facts a language parser gathers while walking one declaration.
/// Fields left at their default simply produce no tag.
#[derive(Debug, Clone, Default)]
pub struct ObservationInput {
    pub purpose: Option<String>,
    pub param_count: Option<usize>,
    pub returns: Option<String>,
    pub branch_count: Option<u32>,
    pub calls: Vec<String>,
    pub raises: Vec<String>,
    pub catches: Vec<String>,
    pub decorators: Vec<String>,
    pub is_async: Option<bool>,
}

fn complexity_bucket(branch_count: u32) -> &'static str {
    if branch_count <= COMPLEXITY_LOW_MAX {
        "low"
    } else if branch_count <= COMPLEXITY_MEDIUM_MAX {
        "medium"
    } else {
        "high"
    }
}

fn detect_pattern(entity_name: &str, decorators: &[String]) -> Option<&'static str> {
    let haystack = entity_name.to_ascii_lowercase();
    for (hint, pattern) in PATTERN_HINTS {
        if haystack.contains(hint) {
            return Some(pattern);
        }
    }
    for decorator in decorators {
        let lower = decorator.to_ascii_lowercase();
        for (hint, pattern) in PATTERN_HINTS {
            if lower.contains(hint) {
                return Some(pattern);
            }
        }
    }
    None
}

/// Expands an `ObservationInput` into the fixed tag vocabulary.
pub fn extract_observations(entity_name: &str, input: &ObservationInput) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(purpose) = &input.purpose {
        let first_sentence = purpose
            .split(['.', '\n'])
            .next()
            .unwrap_or(purpose)
            .trim();
        if !first_sentence.is_empty() {
            tags.push(format!("purpose:{first_sentence}"));
        }
    }
    if let Some(n) = input.param_count {
        tags.push(format!("params:{n}"));
    }
    tags.push(format!(
        "returns:{}",
        input.returns.as_deref().unwrap_or("unknown")
    ));
    if let Some(branches) = input.branch_count {
        tags.push(format!("complexity:{}", complexity_bucket(branches)));
    }
    for callee in &input.calls {
        tags.push(format!("calls:{callee}"));
    }
    for name in &input.raises {
        tags.push(format!("raises:{name}"));
    }
    for name in &input.catches {
        tags.push(format!("catches:{name}"));
    }
    for decorator in &input.decorators {
        tags.push(format!("decorator:{decorator}"));
    }
    if let Some(pattern) = detect_pattern(entity_name, &input.decorators) {
        tags.push(format!("pattern:{pattern}"));
    }
    if let Some(is_async) = input.is_async {
        tags.push(format!("async:{is_async}"));
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_buckets() {
        assert_eq!(complexity_bucket(0), "low");
        assert_eq!(complexity_bucket(10), "medium");
        assert_eq!(complexity_bucket(50), "high");
    }

    #[test]
    fn purpose_takes_first_sentence_only() {
        let input = ObservationInput {
            purpose: Some("Loads the user. Caches the result.".into()),
            ..Default::default()
        };
        let tags = extract_observations("load_user", &input);
        assert!(tags.contains(&"purpose:Loads the user".to_string()));
    }

    #[test]
    fn pattern_detected_from_name() {
        let input = ObservationInput::default();
        let tags = extract_observations("UserFactory", &input);
        assert!(tags.iter().any(|t| t == "pattern:factory"));
    }

    #[test]
    fn missing_facts_produce_no_tag() {
        let input = ObservationInput::default();
        let tags = extract_observations("f", &input);
        assert!(!tags.iter().any(|t| t.starts_with("params:")));
        assert!(tags.iter().any(|t| t == "returns:unknown"));
    }
}
