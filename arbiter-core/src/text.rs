//! Name normalization helpers shared across the pipeline
//!
//! Grouping and matching never compare raw provider strings; everything goes
//! through `normalize_name` first so that "LA Lakers", "L.A. Lakers" and
//! "la lakers" collapse to the same token.

/// Normalize an entity name for comparison: lowercase, strip everything
/// outside `[a-z0-9]`, join the surviving segments without separators.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Deterministic key for a set of teams: normalized names, sorted, joined
/// with a delimiter. Order-insensitive so home/away swaps do not split
/// groups.
pub fn teams_key(teams: &[String]) -> String {
    let mut normalized: Vec<String> = teams
        .iter()
        .map(|t| normalize_name(t))
        .filter(|t| !t.is_empty())
        .collect();
    normalized.sort();
    normalized.join("|")
}

/// Case-insensitive containment check on normalized names.
pub fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_name(a), normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_name("L.A. Lakers"), "lalakers");
        assert_eq!(normalize_name("Real Madrid CF"), "realmadridcf");
    }

    #[test]
    fn test_teams_key_is_order_insensitive() {
        let a = teams_key(&["Lakers".to_string(), "Suns".to_string()]);
        let b = teams_key(&["Suns".to_string(), "Lakers".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a, "lakers|suns");
    }

    #[test]
    fn test_names_match_partial() {
        assert!(names_match("Los Angeles Lakers", "Lakers"));
        assert!(!names_match("Lakers", "Suns"));
    }
}
