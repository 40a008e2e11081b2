//! Token-overlap similarity between free-text ledger descriptions and the
//! names printed on an invoice.

use std::collections::HashSet;

/// Company-form suffixes and connectives that carry no identity.
const STOPWORDS: &[&str] = &[
    "A", "DA", "DAS", "DE", "DO", "DOS", "E", "EIRELI", "EPP", "LTDA", "ME", "S", "SA",
];

/// Shortest token that may match another by prefix (truncated bank memos).
const MIN_PREFIX_LEN: usize = 4;

/// Best similarity of `text` to any non-empty reference, in `[0, 1]`.
pub fn best_similarity(text: &str, references: &[&str]) -> f64 {
    references
        .iter()
        .map(|r| similarity(r, text))
        .fold(0.0, f64::max)
}

/// How much of `reference` appears in `text`.
///
/// Takes the larger of containment (share of reference tokens found in the
/// text) and Jaccard overlap. A token also matches a longer or shorter token
/// it is a prefix of, when the shorter side has at least four characters.
pub fn similarity(reference: &str, text: &str) -> f64 {
    let reference = tokens(reference);
    let text = tokens(text);
    if reference.is_empty() || text.is_empty() {
        return 0.0;
    }

    let found = reference
        .iter()
        .filter(|r| text.iter().any(|t| tokens_match(r, t)))
        .count();
    let containment = found as f64 / reference.len() as f64;

    let exact: HashSet<&String> = reference.iter().collect();
    let other: HashSet<&String> = text.iter().collect();
    let union = exact.union(&other).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        exact.intersection(&other).count() as f64 / union as f64
    };

    containment.max(jaccard)
}

fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.chars().count() >= MIN_PREFIX_LEN && long.starts_with(short)
}

/// Uppercase, accent-folded, punctuation-split tokens without stopwords.
fn tokens(s: &str) -> Vec<String> {
    let folded: String = s
        .chars()
        .map(|c| {
            let c = fold_accent(c.to_ascii_uppercase());
            if c.is_ascii_alphanumeric() { c } else { ' ' }
        })
        .collect();

    let mut out: Vec<String> = Vec::new();
    for token in folded.split_whitespace() {
        if STOPWORDS.contains(&token) || out.iter().any(|t| t == token) {
            continue;
        }
        out.push(token.to_string());
    }
    out
}

fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'á' | 'à' | 'â' | 'ã' | 'ä' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' | 'é' | 'è' | 'ê' | 'ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' | 'í' | 'ì' | 'î' | 'ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' | 'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'ú' | 'ù' | 'û' | 'ü' => 'U',
        'Ç' | 'ç' => 'C',
        other => other,
    }
}
