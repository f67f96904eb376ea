//! Text rendering utilities for human-friendly error messages.
//!
//! Formats resolution paths, type names and suggestions in error output.

/// Renders the services on a resolution path, outermost first.
///
/// Cycle errors pass the path from the first visit of a service to its
/// repeated visit, so the same name opens and closes the output.
///
/// # Examples
/// ```
/// use tenure_support::rendering::render_chain;
///
/// let path = ["Mailer", "Transport", "Pool", "Mailer"];
/// assert_eq!(render_chain(path), "Mailer → Transport → Pool → Mailer");
/// ```
pub fn render_chain<I>(path: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut rendered = String::new();
    for (position, service) in path.into_iter().enumerate() {
        if position > 0 {
            rendered.push_str(" → ");
        }
        rendered.push_str(service.as_ref());
    }
    rendered
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use tenure_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("billing::invoices::InvoiceService"), "InvoiceService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn billing::Clock>"),
///     "Arc<dyn Clock>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '[' | ']' | '(' | ')' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Suggests registered names that look like `requested`.
///
/// Candidates are scored by substring containment on the full name,
/// then on the short name, then by common prefix length. At most
/// `max_suggestions` names are returned, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_cycle() {
        assert_eq!(render_chain(["A", "B", "A"]), "A → B → A");
    }

    #[test]
    fn render_owned_names() {
        let path = vec![String::from("Session"), String::from("Session")];
        assert_eq!(render_chain(&path), "Session → Session");
    }

    #[test]
    fn render_empty_chain() {
        assert_eq!(render_chain(Vec::<&str>::new()), "");
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            shorten_type_name("alloc::vec::Vec<alloc::sync::Arc<dyn app::Plugin>>"),
            "Vec<Arc<dyn Plugin>>"
        );
    }

    #[test]
    fn shorten_reference_and_slice() {
        assert_eq!(shorten_type_name("&[core::primitive::u8]"), "&[u8]");
    }

    #[test]
    fn shorten_plain_name() {
        assert_eq!(shorten_type_name("Config"), "Config");
    }

    #[test]
    fn suggestions_rank_typos() {
        let available = vec!["app::InvoiceService", "app::InvoiceStore", "app::Clock"];
        let suggestions = suggest_similar("app::InvoiceServise", &available, 2);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().any(|s| s.contains("InvoiceService")));
    }

    #[test]
    fn suggestions_skip_exact_and_unrelated() {
        let available = vec!["app::Clock"];
        assert!(suggest_similar("app::Clock", &available, 3).is_empty());
        assert!(suggest_similar("Zebra", &available, 3).is_empty());
    }
}
