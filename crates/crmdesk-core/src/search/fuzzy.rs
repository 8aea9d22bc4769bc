//! Approximate substring scoring.

/// Smallest edit distance between `pattern` and any substring of `text`.
///
/// Sellers' variant of the Levenshtein DP: the first row is all zeros so a
/// match may start anywhere in `text`, and the answer is the minimum of the
/// last row so it may end anywhere.
pub fn substring_distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    if m == 0 {
        return 0;
    }
    if text.is_empty() {
        return m;
    }

    // column[i] = distance of pattern[..i] ending at the current text position
    let mut column: Vec<usize> = (0..=m).collect();
    let mut best = m;

    for &tc in text {
        let mut diag = column[0];
        column[0] = 0;
        for i in 1..=m {
            let cost = usize::from(pattern[i - 1] != tc);
            let next = (diag + cost).min(column[i] + 1).min(column[i - 1] + 1);
            diag = column[i];
            column[i] = next;
        }
        best = best.min(column[m]);
        if best == 0 {
            break;
        }
    }
    best
}

/// Normalised score in `0.0..=1.0`; 0 is an exact substring hit.
pub fn match_score(pattern: &[char], text: &[char]) -> f64 {
    if pattern.is_empty() {
        return 0.0;
    }
    let distance = substring_distance(pattern, text).min(pattern.len());
    distance as f64 / pattern.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_exact_substring() {
        assert_eq!(substring_distance(&chars("chen"), &chars("sarah chen")), 0);
    }

    #[test]
    fn test_one_typo() {
        // dropping the stray 'n' leaves "che"
        assert_eq!(substring_distance(&chars("chne"), &chars("sarah chen")), 1);
        assert_eq!(substring_distance(&chars("chem"), &chars("sarah chen")), 1);
    }

    #[test]
    fn test_no_overlap() {
        assert_eq!(match_score(&chars("zzz"), &chars("bob")), 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(substring_distance(&chars(""), &chars("abc")), 0);
        assert_eq!(substring_distance(&chars("abc"), &chars("")), 3);
    }
}
