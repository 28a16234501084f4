use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use http::header::CACHE_CONTROL;
use http::HeaderMap;

/// Parsed `Cache-Control` directives of one message.
///
/// Directive names are compared lowercase; the first value wins when a
/// directive is repeated with conflicting arguments. Kept as a sorted map so
/// reformatting is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CacheControl {
    directives: BTreeMap<Box<str>, Option<Box<str>>>,
    /// A directive appeared more than once with disagreeing values.
    conflicting: bool,
}

impl CacheControl {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let mut cc = CacheControl::default();
        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else { continue };
            for part in value.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let mut kv = part.splitn(2, '=');
                let name = kv.next().unwrap_or_default().trim();
                if name.is_empty() {
                    continue;
                }
                let arg =
                    kv.next().map(|v| v.trim().trim_matches('"').to_owned());
                match cc.directives.entry(name.to_ascii_lowercase().into()) {
                    Entry::Occupied(seen) => {
                        if seen.get().as_deref() != arg.as_deref() {
                            cc.conflicting = true;
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(arg.map(Into::into));
                    }
                }
            }
        }
        cc
    }

    pub(crate) fn has(&self, directive: &str) -> bool {
        self.directives.contains_key(directive)
    }

    /// Numeric argument of a directive, when present and parseable.
    pub(crate) fn seconds(&self, directive: &str) -> Option<u64> {
        self.directives.get(directive)?.as_deref()?.parse().ok()
    }

    /// Whether the directive is present with no argument at all.
    pub(crate) fn is_bare(&self, directive: &str) -> bool {
        matches!(self.directives.get(directive), Some(None))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub(crate) fn had_conflicts(&self) -> bool {
        self.conflicting
    }

    /// Reformats the directives as a single header value.
    pub(crate) fn to_header_value(&self) -> String {
        let mut out = String::new();
        for (name, arg) in &self.directives {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(name);
            if let Some(arg) = arg {
                out.push('=');
                let quote = arg.is_empty()
                    || arg.bytes().any(|b| !b.is_ascii_alphanumeric());
                if quote {
                    out.push('"');
                }
                out.push_str(arg);
                if quote {
                    out.push('"');
                }
            }
        }
        out
    }
}
