//! Number normalization between local and E.164 form
//!
//! A profile's rules are selected by prefix index, ordered by
//! `(priority, id)` and applied one after the other; a rule that changed the
//! number does not stop the following ones. Missing profiles and
//! non-matching numbers are identity transforms.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::prefix::lookup_prefixes;
use crate::store::ConfigAccessor;
use crate::types::{NormalizationProfile, NormalizationRule, RuleType};
use crate::Result;

/// Keep only the digits of a dialed number (a leading `+` is dropped too)
pub fn clean_number(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Translate a replacement template using `\1` / `\g<name>` back-references
/// into the `${1}` / `${name}` syntax of the regex crate.
pub fn translate_replacement(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        if group.len() == 2 {
                            break;
                        }
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                        out.push_str(&format!("${{{}}}", name));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }

    out
}

/// Apply `rules` in order, each as a global regex substitution.
///
/// Rules whose regex does not compile are skipped.
pub fn apply_rules(number: &str, rules: &[NormalizationRule]) -> String {
    let mut number = number.to_string();
    for rule in rules {
        let regex = match Regex::new(&rule.match_regex) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(rule_id = rule.id, regex = %rule.match_regex, error = %e, "Skipping invalid normalization rule");
                continue;
            }
        };
        let replacement = translate_replacement(&rule.replace_regex);
        number = regex.replace_all(&number, replacement.as_str()).into_owned();
    }
    number
}

/// Rewrites numbers using the rules stored for a profile
#[derive(Clone)]
pub struct Normalizer {
    store: Arc<dyn ConfigAccessor>,
}

impl Normalizer {
    pub fn new(store: Arc<dyn ConfigAccessor>) -> Self {
        Self { store }
    }

    async fn rewrite(
        &self,
        number: &str,
        profile: &NormalizationProfile,
        rule_type: RuleType,
    ) -> Result<String> {
        let prefixes = lookup_prefixes(number);
        let rules = self
            .store
            .normalization_rules(profile.id, rule_type, &prefixes)
            .await?;
        let rewritten = apply_rules(number, &rules);
        debug!(profile_id = profile.id, ?rule_type, from = %number, to = %rewritten, "Normalized number");
        Ok(rewritten)
    }

    /// Local dialed form to E.164 (without the leading `+`)
    pub async fn to_e164(&self, number: &str, profile: Option<&NormalizationProfile>) -> Result<String> {
        let number = clean_number(number);
        match profile {
            Some(profile) => self.rewrite(&number, profile, RuleType::LocalToE164).await,
            None => Ok(number),
        }
    }

    /// E.164 to the local form expected by the profile's owner
    pub async fn to_local(&self, number: &str, profile: Option<&NormalizationProfile>) -> Result<String> {
        let number = clean_number(number);
        let Some(profile) = profile else {
            return Ok(number);
        };

        let number = self.rewrite(&number, profile, RuleType::E164ToLocal).await?;
        if profile.always_intl_prefix_plus && !number.is_empty() {
            Ok(format!("+{}", number))
        } else {
            Ok(number)
        }
    }

    /// Resolve an optional profile id
    pub async fn profile(&self, profile_id: Option<i64>) -> Result<Option<NormalizationProfile>> {
        match profile_id {
            Some(id) => self.store.normalization_profile(id).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, match_regex: &str, replace_regex: &str) -> NormalizationRule {
        NormalizationRule {
            id,
            profile_id: 1,
            rule_type: 1,
            priority: 0,
            match_regex: match_regex.to_string(),
            match_prefix: crate::prefix::prefix_from_regex(match_regex),
            replace_regex: replace_regex.to_string(),
        }
    }

    #[test]
    fn test_clean_number() {
        assert_eq!(clean_number("+39 011 625234"), "39011625234");
        assert_eq!(clean_number("(040) 12-34"), "0401234");
        assert_eq!(clean_number("alice"), "");
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement(r"36\1"), "36${1}");
        assert_eq!(translate_replacement(r"\g<rest>00"), "${rest}00");
        assert_eq!(translate_replacement(r"\12"), "${12}");
        assert_eq!(translate_replacement("$1"), "$$1");
        assert_eq!(translate_replacement(r"a\\b"), r"a\b");
    }

    #[test]
    fn test_apply_single_rule() {
        let rules = vec![rule(1, r"^39(.+)", r"36\1")];
        assert_eq!(apply_rules("39011625234", &rules), "36011625234");
    }

    #[test]
    fn test_apply_rules_does_not_short_circuit() {
        let rules = vec![rule(1, r"^0(\d+)", r"39\1"), rule(2, r"^39(\d+)", r"+39\1")];
        assert_eq!(apply_rules("0116252", &rules), "+390116252");
    }

    #[test]
    fn test_apply_rules_skips_invalid_regex() {
        let rules = vec![rule(1, r"^(39", r"\1"), rule(2, r"^39", "0039")];
        assert_eq!(apply_rules("391234", &rules), "00391234");
    }

    #[test]
    fn test_non_matching_rule_is_noop() {
        let rules = vec![rule(1, r"^44(.+)", r"0\1")];
        assert_eq!(apply_rules("391234", &rules), "391234");
    }
}
