// 🔍 Fuzzy String Similarity - 0-100 scores for club name matching
//
// "pakistani student association" vs "pakistani student assoc." → ~86.8
// "chess club" vs "chess club at berkeley"                     → 90.0
//
// All scores are computed over chars, not bytes.

use std::collections::BTreeSet;

// ============================================================================
// BASE RATIOS
// ============================================================================

/// Indel similarity: 200 × LCS / (len_a + len_b)
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_length(a, b) as f64 / total as f64
}

/// Longest common subsequence, one rolling row
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Best `ratio` of the shorter string against every same-length window of the longer
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return 0.0;
    }

    long.windows(short.len())
        .map(|window| ratio_chars(&short, window))
        .fold(0.0, f64::max)
}

// ============================================================================
// TOKEN RATIOS
// ============================================================================

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Word order insensitive: "club chess" == "chess club"
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn partial_token_sort_ratio(a: &str, b: &str) -> f64 {
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Compares shared words against each side's leftovers. A name whose words
/// are all contained in the other scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |set: BTreeSet<&str>| set.into_iter().collect::<Vec<_>>().join(" ");
    let intersection = join(tokens_a.intersection(&tokens_b).copied().collect());
    let diff_ab = join(tokens_a.difference(&tokens_b).copied().collect());
    let diff_ba = join(tokens_b.difference(&tokens_a).copied().collect());

    if intersection.is_empty() {
        return ratio(&diff_ab, &diff_ba);
    }
    if diff_ab.is_empty() || diff_ba.is_empty() {
        return 100.0;
    }

    let combined_ab = format!("{} {}", intersection, diff_ab);
    let combined_ba = format!("{} {}", intersection, diff_ba);

    ratio(&intersection, &combined_ab)
        .max(ratio(&intersection, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

// ============================================================================
// WEIGHTED RATIO
// ============================================================================

/// Blend of the ratios above, picking partial variants when lengths differ a lot.
/// Empty input scores 0.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let base = ratio(a, b);
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return base.max(token * 0.95);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    base.max(partial_ratio(a, b) * partial_scale)
        .max(partial_token_sort_ratio(a, b) * 0.95 * partial_scale)
}

/// Best candidate by `weighted_ratio`: (index, score). Scans every candidate;
/// on ties the first index wins. None for an empty pool.
pub fn extract_one<S: AsRef<str>>(query: &str, choices: &[S]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, choice) in choices.iter().enumerate() {
        let score = weighted_ratio(query, choice.as_ref());
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ratio_basics() {
        assert!(approx(ratio("chess club", "chess club"), 100.0));
        assert!(approx(ratio("abcd", "abce"), 75.0));
        assert!(approx(ratio("", ""), 100.0));
        assert!(approx(ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_partial_ratio_substring() {
        assert!(approx(partial_ratio("robotics", "berkeley robotics club"), 100.0));
        assert!(approx(partial_ratio("", "anything"), 0.0));
    }

    #[test]
    fn test_token_ratios_ignore_order() {
        assert!(approx(token_sort_ratio("club chess", "chess club"), 100.0));
        assert!(approx(token_set_ratio("chess club", "chess club berkeley"), 100.0));
    }

    #[test]
    fn test_weighted_ratio_abbreviation() {
        let score = weighted_ratio("pakistani student association", "pakistani student assoc.");
        assert!(score > 85.0 && score < 90.0, "{score}");
    }

    #[test]
    fn test_weighted_ratio_length_mismatch_uses_partial() {
        assert!(approx(weighted_ratio("chess club", "chess club at berkeley"), 90.0));
    }

    #[test]
    fn test_weighted_ratio_exact_value_at_boundary() {
        assert!(approx(weighted_ratio("abcd", "abce"), 75.0));
        assert!(approx(weighted_ratio("", "abc"), 0.0));
    }

    #[test]
    fn test_unicode_counted_by_char() {
        assert!(approx(ratio("café", "cafe"), 75.0));
    }

    #[test]
    fn test_extract_one_first_index_wins_ties() {
        let choices = ["debate", "chess club", "chess club"];
        let (index, score) = extract_one("chess club", &choices).unwrap();
        assert_eq!(index, 1);
        assert!(approx(score, 100.0));

        let empty: [&str; 0] = [];
        assert_eq!(extract_one("chess", &empty), None);
    }
}
