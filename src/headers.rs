//! Response header filtering.
//!
//! Header names are compared through [`HeaderName`], which is normalized on
//! construction, so `cookie`, `Cookie` and `COOKIE` are the same key.

use hyper::header::{COOKIE, HeaderMap, HeaderName, InvalidHeaderName};
use std::collections::HashSet;

/// Header keys removed from every relayed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedKeySet {
    keys: HashSet<HeaderName>,
}

impl DeniedKeySet {
    pub fn new(keys: impl IntoIterator<Item = HeaderName>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, InvalidHeaderName> {
        names
            .iter()
            .map(|name| HeaderName::from_bytes(name.as_ref().as_bytes()))
            .collect::<Result<HashSet<_>, _>>()
            .map(|keys| Self { keys })
    }

    #[must_use]
    pub fn contains(&self, key: &HeaderName) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderName> {
        self.keys.iter()
    }
}

impl Default for DeniedKeySet {
    fn default() -> Self {
        Self::new([COOKIE])
    }
}

/// Returns a copy of `headers` without any key in `denied`.
///
/// Every retained key keeps its full value sequence in the original order.
#[must_use]
pub fn filter_headers(headers: &HeaderMap, denied: &DeniedKeySet) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.keys_len());
    // HeaderMap iteration yields each value of a key in insertion order.
    for (name, value) in headers {
        if !denied.contains(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{CONTENT_TYPE, HeaderValue, SET_COOKIE};
    use proptest::prelude::*;

    fn values<'a>(headers: &'a HeaderMap, key: &HeaderName) -> Vec<&'a HeaderValue> {
        headers.get_all(key).iter().collect()
    }

    #[test]
    fn removes_cookie_and_keeps_the_rest() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=b"));
        headers.append(COOKIE, HeaderValue::from_static("c=d"));
        headers.append(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(SET_COOKIE, HeaderValue::from_static("session=1"));

        let filtered = filter_headers(&headers, &DeniedKeySet::default());

        assert!(!filtered.contains_key(COOKIE));
        assert_eq!(filtered.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(filtered.get(SET_COOKIE).unwrap(), "session=1");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn preserves_value_order_of_repeated_keys() {
        let via = HeaderName::from_static("via");
        let mut headers = HeaderMap::new();
        for hop in ["1.1 first", "1.1 second", "1.1 third"] {
            headers.append(via.clone(), HeaderValue::from_static(hop));
        }

        let filtered = filter_headers(&headers, &DeniedKeySet::default());
        assert_eq!(values(&filtered, &via), values(&headers, &via));
    }

    #[test]
    fn denied_names_are_case_insensitive() {
        let denied = DeniedKeySet::from_names(&["COOKIE", "X-Secret"]).unwrap();
        assert!(denied.contains(&COOKIE));
        assert!(denied.contains(&HeaderName::from_static("x-secret")));
        assert_eq!(denied.len(), 2);

        let mut names: Vec<_> = denied.iter().map(HeaderName::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, ["cookie", "x-secret"]);
    }

    #[test]
    fn empty_denied_set_is_identity() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=b"));
        let denied = DeniedKeySet::new(std::iter::empty());
        assert!(denied.is_empty());
        assert_eq!(filter_headers(&headers, &denied), headers);
    }

    fn header_entries() -> impl Strategy<Value = Vec<(&'static str, String)>> {
        let names = prop::sample::select(vec![
            "cookie",
            "set-cookie",
            "content-type",
            "via",
            "x-trace",
        ]);
        prop::collection::vec((names, "[a-z0-9=;]{0,12}"), 0..24)
    }

    fn build_map(entries: &[(&'static str, String)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            headers.append(
                HeaderName::from_static(*name),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    fn denied_sets() -> impl Strategy<Value = DeniedKeySet> {
        prop::sample::subsequence(vec!["cookie", "set-cookie", "via", "x-unused"], 0..=4)
            .prop_map(|names| DeniedKeySet::new(names.into_iter().map(HeaderName::from_static)))
    }

    proptest! {
        #[test]
        fn keeps_exactly_the_allowed_entries(entries in header_entries(), denied in denied_sets()) {
            let headers = build_map(&entries);
            let filtered = filter_headers(&headers, &denied);

            for key in headers.keys() {
                if denied.contains(key) {
                    prop_assert!(!filtered.contains_key(key));
                } else {
                    prop_assert_eq!(values(&filtered, key), values(&headers, key));
                }
            }
            let expected = headers.iter().filter(|(name, _)| !denied.contains(name)).count();
            prop_assert_eq!(filtered.len(), expected);
        }

        #[test]
        fn filtering_is_idempotent(entries in header_entries(), denied in denied_sets()) {
            let once = filter_headers(&build_map(&entries), &denied);
            let twice = filter_headers(&once, &denied);
            prop_assert_eq!(twice, once);
        }
    }
}
