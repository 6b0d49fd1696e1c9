//! Domain ordering for UI-facing lists.
//!
//! Sorting hostnames as plain strings scatters subdomains of the same
//! site across the list. Comparing domains by their label sequence in
//! reverse keeps siblings together, without separating a one-label
//! suffix from the component before it (so `example.com` compares as
//! `["example.com"]`, not `["com", "example"]`).

use std::cmp::Ordering;

/// Lexicographic comparison of two ordered sequences.
///
/// A prefix sorts before any longer sequence it is a prefix of.
pub fn compare_sequences<T, A, B>(a: A, b: B) -> Ordering
where
    T: Ord,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let mut a = a.into_iter();
    let mut b = b.into_iter();

    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}

/// Builds the sort key for a domain: labels reversed, with a one-label
/// suffix glued to the preceding label.
///
/// `a.example.com` -> `["example.com", "a"]`, `localhost` -> `["localhost"]`.
pub fn domain_sort_key(domain: &str) -> Vec<String> {
    let mut components: Vec<String> = domain.split('.').map(str::to_owned).collect();

    // TODO: use the effective TLD list instead of assuming one suffix label.
    if components.len() > 1 {
        let tail = components.pop().unwrap_or_default();
        if let Some(last) = components.last_mut() {
            last.push('.');
            last.push_str(&tail);
        }
    }

    components.reverse();
    components
}

/// Compares two domains by their sort keys.
pub fn compare_domains(a: &str, b: &str) -> Ordering {
    compare_sequences(domain_sort_key(a), domain_sort_key(b))
}

/// Sorts a list of domains so that siblings end up adjacent.
pub fn sort_domains(domains: &mut [String]) {
    domains.sort_by(|a, b| compare_domains(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== compare_sequences Tests ====================

    #[test]
    fn test_equal_sequences() {
        assert_eq!(compare_sequences(["a", "b"], ["a", "b"]), Ordering::Equal);
        assert_eq!(
            compare_sequences(Vec::<&str>::new(), Vec::<&str>::new()),
            Ordering::Equal
        );
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(compare_sequences(["a"], ["a", "b"]), Ordering::Less);
        assert_eq!(compare_sequences(["a", "b"], ["a"]), Ordering::Greater);
    }

    #[test]
    fn test_element_order_decides() {
        assert_eq!(compare_sequences(["a", "b"], ["a", "c"]), Ordering::Less);
        assert_eq!(compare_sequences(["b"], ["a", "z"]), Ordering::Greater);
    }

    // ==================== domain sort Tests ====================

    #[test]
    fn test_sort_key_keeps_suffix_attached() {
        assert_eq!(domain_sort_key("example.com"), vec!["example.com"]);
        assert_eq!(domain_sort_key("a.example.com"), vec!["example.com", "a"]);
        assert_eq!(
            domain_sort_key("x.y.example.com"),
            vec!["example.com", "y", "x"]
        );
    }

    #[test]
    fn test_sort_key_single_label() {
        assert_eq!(domain_sort_key("localhost"), vec!["localhost"]);
    }

    #[test]
    fn test_siblings_sort_adjacent() {
        let mut domains = vec![
            "b.example.com".to_string(),
            "example.net".to_string(),
            "example.com".to_string(),
            "a.example.com".to_string(),
        ];
        sort_domains(&mut domains);

        assert_eq!(
            domains,
            vec!["example.com", "a.example.com", "b.example.com", "example.net"]
        );
    }
}
