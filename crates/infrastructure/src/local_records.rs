use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, PTR, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType as HickoryRecordType};
use rustc_hash::FxHashMap;
use sentinel_dns_application::ports::LocalRecordsPort;
use sentinel_dns_domain::{CacheEntry, Fingerprint, LocalRecord, RecordType, Source};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Configured static answers (§4.9 step 2), compiled once at startup into
/// ready-to-serve wire bytes keyed by name + type — a pure in-memory lookup
/// with no further encoding work on the hot path.
pub struct StaticRecords {
    entries: FxHashMap<(String, RecordType), CacheEntry>,
}

impl StaticRecords {
    pub fn compile(records: &[LocalRecord]) -> Self {
        let mut entries = FxHashMap::default();
        for record in records {
            match build_entry(record) {
                Ok(entry) => {
                    entries.insert((record.fqdn(), record.record_type), entry);
                }
                Err(e) => {
                    warn!(name = %record.name, error = %e, "skipping unparsable local record");
                }
            }
        }
        Self { entries }
    }
}

impl LocalRecordsPort for StaticRecords {
    fn lookup(&self, fp: &Fingerprint) -> Option<CacheEntry> {
        self.entries
            .get(&(fp.name().to_ascii_lowercase(), fp.qtype()))
            .cloned()
    }
}

fn build_entry(record: &LocalRecord) -> Result<CacheEntry, String> {
    let name = Name::from_str(&format!("{}.", record.fqdn()))
        .map_err(|e| format!("invalid name: {e}"))?;

    let rdata = match record.record_type {
        RecordType::A => {
            let addr: Ipv4Addr = record.value.parse().map_err(|e| format!("{e}"))?;
            RData::A(A(addr))
        }
        RecordType::Aaaa => {
            let addr: Ipv6Addr = record.value.parse().map_err(|e| format!("{e}"))?;
            RData::AAAA(AAAA(addr))
        }
        RecordType::Cname => {
            let target = Name::from_str(&record.value).map_err(|e| format!("{e}"))?;
            RData::CNAME(CNAME(target))
        }
        RecordType::Ptr => {
            let target = Name::from_str(&record.value).map_err(|e| format!("{e}"))?;
            RData::PTR(PTR(target))
        }
        RecordType::Txt => RData::TXT(TXT::new(vec![record.value.clone()])),
        other => return Err(format!("unsupported local record type {other:?}")),
    };

    let mut query = Query::new();
    query.set_name(name.clone());
    query.set_query_type(to_hickory_qtype(record.record_type));
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(0, MessageType::Response, OpCode::Query);
    message.set_recursion_desired(true);
    message.set_recursion_available(true);
    message.add_query(query);
    message.add_answer(Record::from_rdata(name, record.ttl, rdata));

    let wire = message.to_vec().map_err(|e| format!("encode failed: {e}"))?;

    Ok(CacheEntry {
        wire: Arc::from(wire),
        rcode: 0,
        stored_at: 0,
        ttl_s: record.ttl,
        stale_until_s: 0,
        source: Source::Local,
        upstream_addr: None,
    })
}

fn to_hickory_qtype(rt: RecordType) -> HickoryRecordType {
    HickoryRecordType::from(rt.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_dns_domain::fingerprint::QClass;

    fn record(name: &str, record_type: RecordType, value: &str) -> LocalRecord {
        LocalRecord {
            name: name.to_string(),
            record_type,
            value: value.to_string(),
            ttl: 60,
        }
    }

    #[test]
    fn resolves_configured_a_record() {
        let records = StaticRecords::compile(&[record("router.home", RecordType::A, "192.168.1.1")]);
        let fp = Fingerprint::new("router.home", RecordType::A, QClass::In);
        let entry = records.lookup(&fp).expect("present");
        assert_eq!(entry.source, Source::Local);
        assert_eq!(entry.ttl_s, 60);
    }

    #[test]
    fn unknown_name_misses() {
        let records = StaticRecords::compile(&[record("router.home", RecordType::A, "192.168.1.1")]);
        let fp = Fingerprint::new("not-configured.home", RecordType::A, QClass::In);
        assert!(records.lookup(&fp).is_none());
    }

    #[test]
    fn malformed_value_is_skipped_not_fatal() {
        let records = StaticRecords::compile(&[record("bad.home", RecordType::A, "not-an-ip")]);
        let fp = Fingerprint::new("bad.home", RecordType::A, QClass::In);
        assert!(records.lookup(&fp).is_none());
    }
}
