//! Rule-table intent matching
//!
//! Rules are tried in table order and the first whose trigger appears in
//! the normalized text wins. Order is the tie-break: a command mentioning
//! both "theme" and "background" resolves to the theme rule because it is
//! listed first. Content rules come before the structural ones so that a
//! value such as "Hide and Seek" does not hijack a title edit, and the
//! subtitle rule precedes the title rule because "subtitle" contains
//! "title".

use std::sync::LazyLock;

use regex::Regex;

use super::{Action, Intent, NormalizedText};

/// Value after a trigger word: "to Hello", "say Hello", "says Hello"
static PHRASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:to|say|says)\s+(.+)").expect("valid regex"));

/// Counts such as "10k", "2,500+" or "3M"
static COUNT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*[kKmM]?\+?)").expect("valid regex"));

/// How a rule pulls its value out of the original text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extract {
    None,
    /// Free text after "to"/"say"/"says", case preserved
    Phrase,
    /// First number, upper-cased suffix
    Count,
}

/// One row of the rule table
#[derive(Debug)]
struct Rule {
    action: Action,
    /// Any group may match; every word of a group must be present
    triggers: &'static [&'static [&'static str]],
    extract: Extract,
    /// Closed target set as `(keyword, canonical)` pairs, first hit wins
    targets: &'static [(&'static str, &'static str)],
    default_target: Option<&'static str>,
    /// Closed modifier set as `(keyword, canonical)` pairs, first hit wins
    modifiers: &'static [(&'static str, &'static str)],
    default_modifier: Option<&'static str>,
}

impl Rule {
    const fn new(action: Action, triggers: &'static [&'static [&'static str]]) -> Self {
        Self {
            action,
            triggers,
            extract: Extract::None,
            targets: &[],
            default_target: None,
            modifiers: &[],
            default_modifier: None,
        }
    }

    const fn extract(mut self, extract: Extract) -> Self {
        self.extract = extract;
        self
    }

    const fn targets(
        mut self,
        targets: &'static [(&'static str, &'static str)],
        default: Option<&'static str>,
    ) -> Self {
        self.targets = targets;
        self.default_target = default;
        self
    }

    const fn modifiers(
        mut self,
        modifiers: &'static [(&'static str, &'static str)],
        default: Option<&'static str>,
    ) -> Self {
        self.modifiers = modifiers;
        self.default_modifier = default;
        self
    }

    /// First trigger word of the matching group, if any group matches
    fn trigger(&self, text: &NormalizedText) -> Option<&'static str> {
        self.triggers
            .iter()
            .find(|group| group.iter().all(|word| text.contains(word)))
            .and_then(|group| group.first().copied())
    }
}

static RULES: &[Rule] = &[
    Rule::new(Action::Subtitle, &[&["subtitle"], &["description"], &["tagline"]])
        .extract(Extract::Phrase),
    Rule::new(Action::Title, &[&["title"], &["heading"], &["headline"]]).extract(Extract::Phrase),
    Rule::new(Action::Logo, &[&["logo"], &["brand"], &["company name"]]).extract(Extract::Phrase),
    Rule::new(Action::Badge, &[&["badge"], &["label"]]).extract(Extract::Phrase),
    Rule::new(Action::Button, &[&["button"]])
        .extract(Extract::Phrase)
        .targets(
            &[
                ("primary", "primary"),
                ("first", "primary"),
                ("secondary", "secondary"),
                ("second", "secondary"),
            ],
            Some("primary"),
        ),
    Rule::new(Action::Cta, &[&["cta"], &["call to action"]]).extract(Extract::Phrase),
    Rule::new(Action::Scroll, &[&["scroll"], &["go to"], &["navigate to"], &["jump to"]]).targets(
        &[
            ("top", "top"),
            ("bottom", "bottom"),
            ("footer", "bottom"),
            ("feature", "features"),
            ("stat", "stats"),
        ],
        None,
    ),
    Rule::new(Action::Theme, &[&["theme"], &["mode"], &["color scheme"]]).modifiers(
        &[
            ("light", "light"),
            ("white", "light"),
            ("dark", "dark"),
            ("black", "dark"),
            ("blue", "blue"),
            ("green", "green"),
            ("purple", "purple"),
            ("toggle", "toggle"),
            ("switch", "toggle"),
        ],
        None,
    ),
    Rule::new(Action::Visibility, &[&["hide"], &["show"], &["toggle"]])
        .targets(
            &[
                ("navigation", "nav"),
                ("nav", "nav"),
                ("menu", "nav"),
                ("statistic", "stats"),
                ("stat", "stats"),
                ("feature", "features"),
            ],
            None,
        )
        .modifiers(&[("hide", "hide"), ("show", "show"), ("toggle", "toggle")], None),
    Rule::new(Action::Stat, &[&["stat"], &["number"], &["user count"]])
        .extract(Extract::Count)
        .targets(&[("user", "users")], None),
    Rule::new(Action::Gradient, &[&["gradient"]])
        .modifiers(&[("remove", "remove"), ("disable", "remove")], Some("add")),
    Rule::new(Action::Background, &[&["background"]]).modifiers(
        &[
            ("dark", "dark"),
            ("black", "dark"),
            ("light", "light"),
            ("white", "light"),
            ("blue", "blue"),
            ("green", "green"),
            ("purple", "purple"),
        ],
        None,
    ),
    Rule::new(Action::FeatureAdd, &[&["add", "feature"], &["new", "feature"]]),
    Rule::new(Action::FeatureRemove, &[&["remove", "feature"], &["delete", "feature"]]),
    Rule::new(Action::Animate, &[&["animate"], &["animation"]]),
    Rule::new(Action::Help, &[&["help"], &["hello"], &["what can you do"]]),
];

/// Deterministic keyword-table matcher
#[derive(Debug, Clone, Copy)]
pub struct IntentMatcher {
    rules: &'static [Rule],
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self { rules: RULES }
    }
}

impl IntentMatcher {
    /// Match a normalized transcript against the rule table
    ///
    /// `original` is the untouched transcript; extracted values keep its
    /// casing. A recognized action whose value cannot be extracted comes
    /// back with `value: None` so the caller can ask for clarification.
    #[must_use]
    pub fn match_intent(&self, normalized: &NormalizedText, original: &str) -> Intent {
        if normalized.is_empty() {
            return Intent::unknown();
        }

        let Some((rule, trigger)) = self
            .rules
            .iter()
            .find_map(|rule| rule.trigger(normalized).map(|t| (rule, t)))
        else {
            tracing::trace!(text = %normalized, "no rule matched");
            return Intent::unknown();
        };

        let mut intent = Intent::new(rule.action);
        intent.target = lookup(rule.targets, normalized)
            .or(rule.default_target)
            .map(str::to_string);
        intent.modifier = lookup(rule.modifiers, normalized)
            .or(rule.default_modifier)
            .map(str::to_string);

        let tail = after_trigger(original, trigger);
        intent.value = match rule.extract {
            Extract::None => None,
            Extract::Phrase => extract_phrase(tail),
            Extract::Count => extract_count(tail),
        };

        tracing::debug!(
            action = %intent.action,
            target = ?intent.target,
            value = ?intent.value,
            modifier = ?intent.modifier,
            "matched intent"
        );
        intent
    }
}

fn lookup(table: &[(&'static str, &'static str)], text: &NormalizedText) -> Option<&'static str> {
    table
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, canonical)| *canonical)
}

/// Slice of `original` after the first occurrence of `trigger`
///
/// ASCII lower-casing keeps byte offsets aligned with `original`. Falls
/// back to the whole text when the trigger spans collapsed whitespace.
fn after_trigger<'a>(original: &'a str, trigger: &str) -> &'a str {
    original
        .to_ascii_lowercase()
        .find(trigger)
        .map_or(original, |pos| &original[pos + trigger.len()..])
}

fn extract_phrase(text: &str) -> Option<String> {
    let captured = PHRASE_REGEX.captures(text)?.get(1)?.as_str();
    let value = captured
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim_matches(['"', '\''])
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn extract_count(text: &str) -> Option<String> {
    COUNT_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}
