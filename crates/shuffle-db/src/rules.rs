//! Rule engine — derives per-file properties from condition→action rules.
//!
//! Rule file syntax, one rule per line:
//!
//! ```text
//! # comment
//! condition[, condition...]: prop=value[, prop=value...]
//! : prop=value                      <- no conditions: applies to every file
//! ```
//!
//! A condition is `prop OP value` with `OP` one of `~` (case-insensitive
//! glob, string properties only), `=`, `<` or `>`. Values are integers, or
//! strings when quoted or when they do not parse as integers.
//!
//! Rules are applied in order; each matching rule overwrites only the
//! properties its action names, so later rules refine earlier ones.

use tracing::{debug, warn};

use crate::error::RuleError;
use crate::glob::Glob;
use crate::props::{Assignment, PropName, PropertySet, Value};

/// Built-in extension rules, applied before any user rule.
pub const BUILTIN_RULES: &[&str] = &[
    "filename ~ *.mp3: type=1, shuffle=1, bookmark=0",
    "filename ~ *.m4?: type=2, shuffle=1, bookmark=0",
    "filename ~ *.m4b: shuffle=0, bookmark=1",
    "filename ~ *.aa: type=1, shuffle=0, bookmark=1, reuse=1",
    "filename ~ *.wav: type=4, shuffle=0, bookmark=0",
    "filename ~ *.book.???: shuffle=0, bookmark=1",
    "filename ~ *.announce.???: shuffle=0, bookmark=0",
    "filename ~ /recycled/*: ignore=1",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    Glob(Glob),
    Eq(Value),
    Gt(Value),
    Lt(Value),
}

/// One `prop OP value` test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    prop: PropName,
    test: Test,
}

impl Condition {
    /// Parse a single condition such as `filename ~ *.mp3` or `size > 1000`.
    ///
    /// The operator is the earliest of `~ = < >` that is not the first
    /// character.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let (pos, op) = text
            .char_indices()
            .skip(1)
            .find(|&(_, c)| matches!(c, '~' | '=' | '<' | '>'))
            .ok_or_else(|| RuleError::MissingOperator(text.to_owned()))?;
        // SAFETY: pos is a char boundary from char_indices and the operator is
        // one ASCII byte, so pos+1 is a char boundary as well.
        #[allow(clippy::indexing_slicing)]
        let (name, literal) = (text[..pos].trim(), text[pos.saturating_add(1)..].trim());
        if name.is_empty() {
            return Err(RuleError::EmptyProperty(text.to_owned()));
        }
        let prop = PropName::parse(name);
        if !prop.is_known() {
            warn!(property = name, "unknown property in rule condition");
        }
        let value = Value::parse(literal);
        let test = match op {
            '~' => {
                let pattern = match &value {
                    Value::Str(s) => s.as_str(),
                    Value::Int(_) => literal,
                };
                Test::Glob(Glob::new(pattern))
            }
            '=' => Test::Eq(value),
            '<' => Test::Lt(value),
            _ => Test::Gt(value),
        };
        Ok(Self { prop, test })
    }

    /// Evaluate against `props`. Absent properties and incomparable value
    /// kinds never match.
    #[must_use]
    pub fn matches(&self, props: &PropertySet) -> bool {
        let Some(actual) = props.get(&self.prop) else {
            return false;
        };
        match &self.test {
            Test::Glob(glob) => actual.as_str().is_some_and(|s| glob.matches(s)),
            Test::Eq(expected) => actual == *expected,
            Test::Gt(expected) => same_kind(&actual, expected) && actual > *expected,
            Test::Lt(expected) => same_kind(&actual, expected) && actual < *expected,
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Int(_), Value::Int(_)) | (Value::Str(_), Value::Str(_)))
}

/// A conjunction of conditions plus the assignments made when all hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    conditions: Vec<Condition>,
    actions: Vec<Assignment>,
}

impl Rule {
    /// Parse one line of a rule file.
    ///
    /// Returns `Ok(None)` for blank lines and `#` comments.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] describing the first problem found; the caller
    /// is expected to report it and carry on with the next line.
    pub fn parse(line: &str) -> Result<Option<Self>, RuleError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (ruleset, actions) = line.rsplit_once(':').ok_or(RuleError::MissingColon)?;

        let ruleset = ruleset.trim();
        let conditions = if ruleset.is_empty() {
            Vec::new()
        } else {
            ruleset
                .split(',')
                .map(|c| Condition::parse(c.trim()))
                .collect::<Result<Vec<_>, _>>()?
        };
        let actions = actions
            .split(',')
            .map(parse_action)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Self { conditions, actions }))
    }

    /// A rule with no conditions matches every file.
    #[must_use]
    pub fn matches(&self, props: &PropertySet) -> bool {
        self.conditions.iter().all(|c| c.matches(props))
    }

    pub fn apply(&self, props: &mut PropertySet) {
        for action in &self.actions {
            props.apply(action);
        }
    }
}

fn parse_action(text: &str) -> Result<Assignment, RuleError> {
    let (name, literal) = text
        .split_once('=')
        .ok_or_else(|| RuleError::BadAction(text.trim().to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(RuleError::BadAction(text.trim().to_owned()));
    }
    let prop = PropName::parse(name);
    if !prop.is_known() {
        warn!(property = name, "unknown property in rule action");
    }
    Assignment::new(&prop, Value::parse(literal.trim()))
        .ok_or_else(|| RuleError::BadValue(text.trim().to_owned(), name.to_owned()))
}

/// Parse a whole rule file, dropping malformed lines with a warning.
#[must_use]
pub fn parse_rules(text: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match Rule::parse(line) {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => {}
            Err(err) => warn!(
                line = number.saturating_add(1),
                rule = line.trim(),
                %err,
                "rule is malformed, ignoring"
            ),
        }
    }
    rules
}

/// An ordered list of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// The built-in extension rules ([`BUILTIN_RULES`]).
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .filter_map(|line| Rule::parse(line).ok().flatten())
                .collect(),
        }
    }

    /// Built-in rules followed by the rules parsed from `text`.
    #[must_use]
    pub fn with_user_rules(text: &str) -> Self {
        let mut set = Self::builtin();
        set.extend(parse_rules(text));
        set
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every matching rule, in order, on top of `defaults`.
    #[must_use]
    pub fn resolve(&self, mut props: PropertySet) -> PropertySet {
        for rule in &self.rules {
            if rule.matches(&props) {
                rule.apply(&mut props);
            }
        }
        debug!(
            file = %props.filename,
            ignore = props.ignore,
            kind = props.kind,
            shuffle = props.shuffle,
            bookmark = props.bookmark,
            "resolved properties"
        );
        props
    }
}

impl Extend<Rule> for RuleSet {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}

/// Resolve `defaults` through `builtin` rules, then `user` rules.
#[must_use]
pub fn resolve(defaults: PropertySet, builtin: &[Rule], user: &[Rule]) -> PropertySet {
    let mut props = defaults;
    for rule in builtin.iter().chain(user) {
        if rule.matches(&props) {
            rule.apply(&mut props);
        }
    }
    props
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn file(name: &str) -> PropertySet {
        PropertySet::defaults(name, Some(4_000_000), true)
    }

    fn rule(line: &str) -> Rule {
        Rule::parse(line).unwrap().expect("rule line")
    }

    #[test]
    fn builtin_rules_all_parse() {
        assert_eq!(RuleSet::builtin().len(), BUILTIN_RULES.len());
        assert!(!RuleSet::builtin().is_empty());
        assert!(RuleSet::default().is_empty());
    }

    #[test]
    fn mp3_is_shuffled_not_bookmarked() {
        let p = RuleSet::builtin().resolve(file("/music/a.mp3"));
        assert_eq!((p.kind, p.shuffle, p.bookmark), (1, 1, 0));
        assert!(!p.ignore);
    }

    #[test]
    fn m4b_overrides_m4_rule_per_property() {
        let p = RuleSet::builtin().resolve(file("/books/a.M4B"));
        // type from the *.m4? rule survives, shuffle/bookmark from *.m4b
        assert_eq!((p.kind, p.shuffle, p.bookmark), (2, 0, 1));
    }

    #[test]
    fn audible_forces_reuse() {
        let p = RuleSet::builtin().resolve(PropertySet::defaults("/a.aa", None, false));
        assert!(p.reuse);
        assert_eq!((p.kind, p.shuffle, p.bookmark), (1, 0, 1));
    }

    #[test]
    fn wav_and_announcements_stay_out_of_shuffle() {
        let p = RuleSet::builtin().resolve(file("/a.wav"));
        assert_eq!((p.kind, p.shuffle), (4, 0));
        let p = RuleSet::builtin().resolve(file("/intro.announce.mp3"));
        assert_eq!((p.kind, p.shuffle, p.bookmark), (1, 0, 0));
        let p = RuleSet::builtin().resolve(file("/ch1.book.mp3"));
        assert_eq!((p.shuffle, p.bookmark), (0, 1));
    }

    #[test]
    fn recycled_files_are_ignored() {
        assert!(RuleSet::builtin().resolve(file("/Recycled/x.mp3")).ignore);
        assert!(!RuleSet::builtin().resolve(file("/music/Recycled/x.mp3")).ignore);
    }

    #[test]
    fn parse_skips_blank_and_comment_lines() {
        assert_eq!(Rule::parse("").unwrap(), None);
        assert_eq!(Rule::parse("   ").unwrap(), None);
        assert_eq!(Rule::parse("# size > 5: ignore=1").unwrap(), None);
    }

    #[test]
    fn empty_condition_list_is_global() {
        let r = rule(": bookmark=1");
        assert!(r.matches(&file("/anything.wav")));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(Rule::parse("shuffle=0"), Err(RuleError::MissingColon));
        assert!(matches!(
            Rule::parse("filename: shuffle=0"),
            Err(RuleError::MissingOperator(_))
        ));
        assert!(matches!(
            Rule::parse("size > 3: shuffle"),
            Err(RuleError::BadAction(_))
        ));
        assert!(matches!(
            Rule::parse("size > 3: type='mp3'"),
            Err(RuleError::BadValue(_, _))
        ));
        assert!(matches!(
            Rule::parse("size > 3,: shuffle=0"),
            Err(RuleError::MissingOperator(_))
        ));
    }

    #[test]
    fn one_bad_line_does_not_drop_the_rest() {
        let text = "size > 10: shuffle=0\nthis is nonsense\n\n# note\nfilename ~ '*.wav': ignore=1\n";
        assert_eq!(parse_rules(text).len(), 2);
    }

    #[test]
    fn size_comparisons() {
        let big = rule("size > 1000: shuffle=0");
        assert!(big.matches(&file("/a.mp3")));
        let small = rule("size < 1000: shuffle=0");
        assert!(!small.matches(&file("/a.mp3")));
    }

    #[test]
    fn absent_property_never_matches() {
        let r = rule("size > 0: shuffle=0");
        assert!(!r.matches(&PropertySet::defaults("/a.mp3", None, true)));
        let r = rule("rating = 5: shuffle=0");
        assert!(!r.matches(&file("/a.mp3")));
    }

    #[test]
    fn glob_on_integer_property_never_matches() {
        let r = rule("size ~ *: shuffle=0");
        assert!(!r.matches(&file("/a.mp3")));
    }

    #[test]
    fn ordering_between_kinds_never_matches() {
        let r = rule("filename > 5: shuffle=0");
        assert!(!r.matches(&file("/a.mp3")));
        let r = rule("filename > '/a': shuffle=0");
        assert!(r.matches(&file("/b.mp3")));
    }

    #[test]
    fn equality_is_kind_sensitive() {
        let r = rule("type = 1: bookmark=1");
        assert!(r.matches(&file("/a.mp3")));
        let r = rule("type = '1': bookmark=1");
        assert!(!r.matches(&file("/a.mp3")));
    }

    #[test]
    fn all_conditions_must_hold() {
        let r = rule("filename ~ *.mp3, size > 10000000: ignore=1");
        assert!(!r.matches(&file("/a.mp3")));
        let r = rule("filename ~ *.mp3, size > 1000: ignore=1");
        assert!(r.matches(&file("/a.mp3")));
    }

    #[test]
    fn later_rules_override_earlier_per_property() {
        let a = rule("filename ~ *.mp3: shuffle=0, bookmark=1");
        let b = rule("size > 10: shuffle=1");
        let ab = resolve(file("/a.mp3"), &[], &[a.clone(), b.clone()]);
        assert_eq!((ab.shuffle, ab.bookmark), (1, 1));
        let ba = resolve(file("/a.mp3"), &[], &[b, a]);
        assert_eq!((ba.shuffle, ba.bookmark), (0, 1));
    }

    #[test]
    fn user_rules_run_after_builtins() {
        let set = RuleSet::with_user_rules("filename ~ *.wav: shuffle=1");
        let p = set.resolve(file("/a.wav"));
        assert_eq!((p.kind, p.shuffle), (4, 1));
    }

    #[test]
    fn resolution_is_deterministic() {
        let set = RuleSet::with_user_rules("size > 5: bookmark=1\n: reuse=0");
        let first = set.resolve(file("/x/y.m4a"));
        for _ in 0..10 {
            assert_eq!(set.resolve(file("/x/y.m4a")), first);
        }
    }

    #[test]
    fn unknown_properties_are_stored() {
        let set = RuleSet::with_user_rules("filename ~ *.mp3: genre='rock'");
        let p = set.resolve(file("/a.mp3"));
        assert_eq!(p.extra.get("genre"), Some(&Value::Str("rock".into())));
    }

    #[test]
    fn condition_values_may_contain_colons() {
        let r = rule("filename = '/a:b.mp3': ignore=1");
        assert!(r.matches(&file("/a:b.mp3")));
    }
}
