use compact_str::CompactString;
use std::fmt;

use crate::record_type::RecordType;

/// DNS query class. Only IN is meaningfully served; other classes are kept
/// for fidelity of the cache key but never matched against local records or
/// the blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QClass {
    In,
    Other(u16),
}

impl QClass {
    pub fn as_u16(self) -> u16 {
        match self {
            QClass::In => 1,
            QClass::Other(v) => v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => QClass::In,
            other => QClass::Other(other),
        }
    }
}

/// The request fingerprint: (lower-cased name, qtype, qclass). Two questions
/// with the same fingerprint share a cache entry; distinct fingerprints never
/// do. Construction normalises case and strips a single trailing dot so that
/// `Example.COM.` and `example.com` collide on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    name: CompactString,
    qtype: RecordType,
    qclass: QClass,
}

impl Fingerprint {
    pub fn new(name: &str, qtype: RecordType, qclass: QClass) -> Self {
        let trimmed = name.strip_suffix('.').unwrap_or(name);
        let mut normalised = CompactString::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            normalised.push(ch.to_ascii_lowercase());
        }
        Self {
            name: normalised,
            qtype,
            qclass,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qtype(&self) -> RecordType {
        self.qtype
    }

    pub fn qclass(&self) -> QClass {
        self.qclass
    }

    /// The `dns:<name>:<qtype>:<qclass>` key layout used in the shared store.
    pub fn l1_key(&self) -> String {
        format!("dns:{}:{}:{}", self.name, self.qtype.as_u16(), self.qclass.as_u16())
    }

    pub fn hits_key(&self) -> String {
        format!("dnsmeta:hits:{}:{}:{}", self.name, self.qtype.as_u16(), self.qclass.as_u16())
    }

    /// Long-window counterpart of [`Fingerprint::hits_key`], used only by
    /// the refresh sweeper's `sweep_min_hits`/`sweep_hit_window_s` filter so
    /// a domain that was hot an hour ago still looks hot days later.
    pub fn sweep_hits_key(&self) -> String {
        format!("dnsmeta:sweephits:{}:{}:{}", self.name, self.qtype.as_u16(), self.qclass.as_u16())
    }

    pub fn lock_key(&self) -> String {
        format!("dnsmeta:lock:{}:{}:{}", self.name, self.qtype.as_u16(), self.qclass.as_u16())
    }

    /// Progressively shorter dot-separated suffixes of the name, including
    /// the name itself, longest first. Used by the blocklist's suffix walk.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        let full = self.name.as_str();
        std::iter::successors(Some(full), move |rest| {
            rest.find('.').map(|i| &rest[i + 1..])
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} IN", self.name, self.qtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_case_and_trailing_dot() {
        let a = Fingerprint::new("Example.COM.", RecordType::A, QClass::In);
        let b = Fingerprint::new("example.com", RecordType::A, QClass::In);
        assert_eq!(a, b);
        assert_eq!(a.name(), "example.com");
    }

    #[test]
    fn distinct_qtype_is_distinct_fingerprint() {
        let a = Fingerprint::new("example.com", RecordType::A, QClass::In);
        let b = Fingerprint::new("example.com", RecordType::Aaaa, QClass::In);
        assert_ne!(a, b);
    }

    #[test]
    fn suffix_walk_is_longest_first() {
        let fp = Fingerprint::new("ads.example.net", RecordType::A, QClass::In);
        let suffixes: Vec<&str> = fp.suffixes().collect();
        assert_eq!(suffixes, vec!["ads.example.net", "example.net", "net"]);
    }
}
