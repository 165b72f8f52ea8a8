use log::debug;

/// Match a free-text category against the allowed options
///
/// Case-insensitive, first match wins:
/// 1. an option equal to the text,
/// 2. the first option containing the text or contained in it,
/// 3. the text itself, verbatim, so the destination can create it.
///
/// Returns `None` for blank text or when there are no options at all.
pub fn resolve_category(free_text: &str, options: &[String]) -> Option<String> {
    let needle = free_text.trim().to_lowercase();
    if needle.is_empty() || options.is_empty() {
        return None;
    }

    if let Some(exact) = options.iter().find(|o| o.trim().to_lowercase() == needle) {
        debug!("Exact category match: {}", exact);
        return Some(exact.clone());
    }

    let partial = options.iter().find(|o| {
        let option = o.trim().to_lowercase();
        !option.is_empty() && (option.contains(&needle) || needle.contains(&option))
    });
    if let Some(partial) = partial {
        debug!("Partial category match for '{}': {}", free_text, partial);
        return Some(partial.clone());
    }

    debug!("No category match, using '{}' as a new value", free_text);
    Some(free_text.to_string())
}
