use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType as HickoryRecordType};
use sentinel_dns_domain::Fingerprint;
use std::str::FromStr;

/// Build a fresh recursive query for `fp`, independent of whatever client
/// originally asked — single-flight may answer several original requests
/// with one upstream exchange, so the id here only needs to round-trip to
/// this pool, not to any particular client.
pub fn build_query(fp: &Fingerprint) -> (u16, Vec<u8>) {
    let id = fastrand::u16(..);
    let name = Name::from_str(fp.name()).unwrap_or_else(|_| Name::root());
    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(HickoryRecordType::from(fp.qtype().as_u16()));
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let wire = message.to_vec().unwrap_or_else(|_| {
        let mut header = vec![0u8; 12];
        header[0..2].copy_from_slice(&id.to_be_bytes());
        header[2] = 0x01;
        header[4..6].copy_from_slice(&1u16.to_be_bytes());
        header
    });
    (id, wire)
}
