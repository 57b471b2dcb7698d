//! Text condition semantics for scalar subjects and repeated fields.

use regex::Regex;

use crate::condition::TextCondition;
use crate::textnorm::{apply_transforms, fold_accents};

fn normalize_literal(lit: &str, cond: &TextCondition) -> String {
    let mut s = lit.to_string();
    if !cond.case_sensitive {
        s = s.to_lowercase();
    }
    if !cond.accent_sensitive {
        s = fold_accents(&s);
    }
    s
}

/// Evaluate a text condition against one subject string.
///
/// The subject first goes through the condition's transforms, then the
/// case/accent folding implied by the sensitivity flags; literals get the
/// same folding but not the transforms. Comparisons run on trimmed strings.
/// `has` gates presence: positive operators need a present subject, negated
/// ones hold vacuously for absent subjects.
pub fn evaluate_text(has: bool, subject: &str, cond: &TextCondition) -> bool {
    let mut s = apply_transforms(subject, &cond.transforms);
    if !cond.case_sensitive {
        s = s.to_lowercase();
    }
    if !cond.accent_sensitive {
        s = fold_accents(&s);
    }

    match cond.op.as_str() {
        "any" => true,
        "has_value" => has && !s.is_empty(),
        "is_empty" => !has || s.is_empty(),
        "eq" => {
            if cond.eq.is_empty() {
                return true;
            }
            if !has {
                return false;
            }
            cond.eq.iter().any(|lit| s.trim() == normalize_literal(lit, cond).trim())
        }
        "neq" => {
            if cond.neq.is_empty() {
                return true;
            }
            if !has {
                return true;
            }
            !cond.neq.iter().any(|lit| s.trim() == normalize_literal(lit, cond).trim())
        }
        "regex" => {
            if !has {
                return false;
            }
            match Regex::new(&cond.regex) {
                Ok(re) => re.is_match(&s),
                Err(_) => false,
            }
        }
        "start_with" => {
            has && cond
                .start_with
                .iter()
                .any(|lit| s.trim().starts_with(normalize_literal(lit, cond).trim()))
        }
        "end_with" => {
            has && cond
                .end_with
                .iter()
                .any(|lit| s.trim().ends_with(normalize_literal(lit, cond).trim()))
        }
        "contain" => {
            has && cond
                .contain
                .iter()
                .any(|lit| s.trim().contains(normalize_literal(lit, cond).trim()))
        }
        "not_contain" => {
            !has || !cond
                .not_contain
                .iter()
                .any(|lit| s.trim().contains(normalize_literal(lit, cond).trim()))
        }
        "not_start_with" => {
            !has || !cond
                .not_start_with
                .iter()
                .any(|lit| s.trim().starts_with(normalize_literal(lit, cond).trim()))
        }
        "not_end_with" => {
            !has || !cond
                .not_end_with
                .iter()
                .any(|lit| s.trim().ends_with(normalize_literal(lit, cond).trim()))
        }
        _ => true,
    }
}

/// Evaluate a text condition over a repeated field: true when any element
/// matches. An empty field is evaluated once as an absent scalar so that
/// `has_value`/`is_empty` behave.
pub fn evaluate_text_any<'a, I>(values: I, cond: &TextCondition) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut empty = true;
    for v in values {
        empty = false;
        if evaluate_text(true, v, cond) {
            return true;
        }
    }
    if empty {
        return evaluate_text(false, "", cond);
    }
    false
}
