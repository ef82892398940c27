//! Sibling name disambiguation.

use std::collections::{HashMap, HashSet};

/// Make `names` pairwise distinct.
///
/// The first occurrence of a name is kept; later duplicates become
/// `name~1`, `name~2`, ... in first-seen order. A suffix that would collide
/// with any other name (given or generated) is skipped.
pub fn make_unique(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut counters: HashMap<&str, usize> = HashMap::new();
    let originals: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        if taken.insert(name.clone()) {
            out.push(name.clone());
            continue;
        }
        let counter = counters.entry(name.as_str()).or_insert(0);
        let candidate = loop {
            *counter += 1;
            let candidate = format!("{name}~{counter}");
            if !taken.contains(&candidate) && !originals.contains(candidate.as_str()) {
                break candidate;
            }
        };
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unique_names_untouched() {
        let names = strings(&["a", "b", "c"]);
        assert_eq!(make_unique(&names), names);
    }

    #[test]
    fn test_duplicates_get_suffixes_in_order() {
        let names = strings(&["Solid", "Face", "Solid", "Solid"]);
        assert_eq!(
            make_unique(&names),
            strings(&["Solid", "Face", "Solid~1", "Solid~2"])
        );
    }

    #[test]
    fn test_suffix_skips_existing_names() {
        let names = strings(&["a", "a~1", "a"]);
        assert_eq!(make_unique(&names), strings(&["a", "a~1", "a~2"]));
    }

    #[test]
    fn test_result_is_pairwise_distinct() {
        let names = strings(&["x", "x", "x~1", "x", "x~1"]);
        let out = make_unique(&names);
        let set: HashSet<&String> = out.iter().collect();
        assert_eq!(set.len(), out.len(), "{out:?}");
    }

    #[test]
    fn test_empty() {
        assert!(make_unique(&[]).is_empty());
    }
}
