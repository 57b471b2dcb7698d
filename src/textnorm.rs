//! Text normalization shared by the evaluator: caller-requested transforms,
//! accent folding and whitespace stripping.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::condition::TextTransform;

/// Apply the condition's transforms in order. Unknown names are ignored.
pub fn apply_transforms(s: &str, transforms: &[TextTransform]) -> String {
    let mut out = s.to_string();
    for t in transforms {
        match t.name.as_str() {
            "trim" => out = out.trim().to_string(),
            "lower_case" => out = out.to_lowercase(),
            "upper_case" => out = out.to_uppercase(),
            _ => {}
        }
    }
    out
}

/// Strip diacritics: NFD decomposition with combining marks removed.
/// Vietnamese đ/Đ do not decompose, so they are mapped explicitly.
pub fn fold_accents(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            _ => c,
        })
        .collect()
}

/// Remove every whitespace rune. Keyword search compares space-free tokens so
/// "Nguyen Van A" and "nguyenvana" collide.
pub fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_apply_in_order() {
        let ts = vec![
            TextTransform { name: "trim".into() },
            TextTransform { name: "upper_case".into() },
        ];
        assert_eq!(apply_transforms("  café ", &ts), "CAFÉ");
        // unknown transform is a no-op
        let ts = vec![TextTransform { name: "rot13".into() }];
        assert_eq!(apply_transforms("abc", &ts), "abc");
    }

    #[test]
    fn folds_latin_accents() {
        assert_eq!(fold_accents("Café"), "Cafe");
        assert_eq!(fold_accents("àéîõü"), "aeiou");
    }

    #[test]
    fn folds_vietnamese() {
        assert_eq!(fold_accents("Nguyễn Văn A"), "Nguyen Van A");
        assert_eq!(fold_accents("Đặng"), "Dang");
    }

    #[test]
    fn strips_all_whitespace() {
        assert_eq!(strip_spaces(" a b\tc\nd "), "abcd");
    }
}
