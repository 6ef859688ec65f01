use std::fmt::{Display, Formatter, Result};

use smol_str::{SmolStr, ToSmolStr};

/// Private key under which the resolved peer IP is recorded when
/// `store_peer_ip` is enabled.
pub const PEER_IP_KEY: &str = "_ip_";

/// Ordered, case-insensitive multimap of response header names to values.
///
/// Names are stored lowercased; insertion order is preserved both across
/// names and within the value list of a repeated name.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    entries: Vec<(SmolStr, Vec<SmolStr>)>,
}

impl HeaderStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, adding to the value list when the name repeats.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl ToSmolStr) {
        let name = name.as_ref();
        let value = value.to_smolstr();
        match self.entries.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some((_, values)) => values.push(value),
            None => {
                let key = SmolStr::new(name.to_ascii_lowercase());
                self.entries.push((key, vec![value]));
            }
        }
    }

    /// First value recorded for the given name, compared case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(SmolStr::as_str)
    }

    /// Every value recorded for the given name, in insertion order.
    pub fn values(&self, name: &str) -> &[SmolStr] {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map_or(&[], |(_, values)| values.as_slice())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &[SmolStr])> {
        self.entries.iter().map(|(key, values)| (key, values.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for HeaderStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for (key, values) in &self.entries {
            for value in values {
                write!(f, "{}: {}\r\n", key, value)?;
            }
        }
        Ok(())
    }
}
