//! Header containers the codec can read from and write to.

use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// A set of string headers.
///
/// Lookups are case-insensitive, matching HTTP header semantics.
pub trait HeaderCarrier {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, value: String);
    fn keys(&self) -> Vec<String>;
}

fn find_ignore_case<'a, I>(entries: I, key: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

impl HeaderCarrier for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        match HashMap::get(self, key) {
            Some(value) => Some(value.as_str()),
            None => find_ignore_case(self.iter(), key),
        }
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn keys(&self) -> Vec<String> {
        HashMap::keys(self).cloned().collect()
    }
}

impl HeaderCarrier for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        match BTreeMap::get(self, key) {
            Some(value) => Some(value.as_str()),
            None => find_ignore_case(self.iter(), key),
        }
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn keys(&self) -> Vec<String> {
        BTreeMap::keys(self).cloned().collect()
    }
}

/// HTTP headers. Names are lowercased by `HeaderMap`; baggage keys are
/// lowercased at creation to match.
impl HeaderCarrier for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|value| value.to_str().ok())
    }

    fn set(&mut self, key: &str, value: String) {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                self.insert(name, value);
            }
            _ => tracing::debug!(header = key, "Skipping header that is not valid HTTP"),
        }
    }

    fn keys(&self) -> Vec<String> {
        HeaderMap::keys(self).map(|name| name.as_str().to_string()).collect()
    }
}
