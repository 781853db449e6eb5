//! Aggregated view over a raw response header block.

/// Response headers grouped by name, in first-seen order.
///
/// Names are kept exactly as received, so lookups are case-sensitive; use
/// `RequestController::response_header` for case-insensitive access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl ResponseHeaders {
    /// Parse a CRLF (or LF) separated `Name: value` block.
    ///
    /// Each line is split at its first colon and both sides are trimmed.
    /// Lines without a colon, or with an empty name or value, are skipped.
    /// Repeated names collect their values in order.
    pub fn parse(raw: &str) -> Self {
        let mut headers = Self::default();
        for line in raw.split('\n') {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            headers.push(name, value);
        }
        headers
    }

    fn push(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, values)) => values.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
