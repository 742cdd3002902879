use crate::model::task::LinkType;

/// One entry of a `depends::` value, before resolution to a task key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub link: LinkType,
    /// Document part of `doc#^id` / `[[doc#^id]]` references
    pub document: Option<String>,
    /// Lowercase id without the `^`
    pub id: String,
}

/// Parse a comma-separated `depends::` value.
///
/// Entries: `^id`, `id`, `doc#^id`, `[[doc#^id|alias]]`, each optionally
/// prefixed with a link-type token and `:` (`FS:^sb-1`). Entries without an
/// id are dropped.
pub fn parse_depends(value: &str) -> Vec<DependencyRef> {
    value
        .split(',')
        .filter_map(|entry| parse_entry(entry.trim()))
        .collect()
}

fn parse_entry(entry: &str) -> Option<DependencyRef> {
    if entry.is_empty() {
        return None;
    }

    let (link, reference) = match entry.split_once(':') {
        Some((token, rest)) => match LinkType::parse_token(token) {
            Some(link) => (link, rest.trim()),
            None => (LinkType::default(), entry),
        },
        None => (LinkType::default(), entry),
    };

    let reference = reference
        .strip_prefix("[[")
        .and_then(|r| r.strip_suffix("]]"))
        .unwrap_or(reference);
    // Drop a wikilink alias
    let reference = reference.split('|').next().unwrap_or(reference).trim();

    let (document, id) = match reference.rsplit_once('#') {
        Some((doc, id)) => {
            let doc = doc.trim();
            (
                (!doc.is_empty()).then(|| doc.to_string()),
                id.trim(),
            )
        }
        None => (None, reference),
    };

    let id = id.trim_start_matches('^').trim().to_lowercase();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    Some(DependencyRef { link, document, id })
}
