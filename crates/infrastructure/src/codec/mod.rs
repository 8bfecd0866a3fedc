use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType as HickoryRecordType};
use sentinel_dns_application::ports::{CodecPort, DecodedRequest, SynthAnswer};
use sentinel_dns_domain::fingerprint::QClass;
use sentinel_dns_domain::{CacheEntry, DomainError, Fingerprint, RecordType};
use std::net::IpAddr;
use std::str::FromStr;

/// Message codec (C1) built on `hickory-proto`. Decode is transport-agnostic;
/// callers pass `is_tcp` so encode can decide whether truncation applies.
pub struct HickoryCodec;

impl Default for HickoryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HickoryCodec {
    pub fn new() -> Self {
        Self
    }
}

fn to_hickory_qtype(rt: RecordType) -> HickoryRecordType {
    HickoryRecordType::from(rt.as_u16())
}

fn encode_message(message: &Message) -> Vec<u8> {
    match message.to_vec() {
        Ok(buf) => buf,
        Err(_) => {
            // Fall back to a minimal SERVFAIL header carrying the original id.
            let id = message.id();
            let mut header = vec![0u8; 12];
            header[0..2].copy_from_slice(&id.to_be_bytes());
            header[2] = 0x80;
            header[3] = 0x02;
            header
        }
    }
}

/// Strip the answer/authority/additional sections and set the TC bit when a
/// UDP response exceeds the requester's negotiated buffer size.
fn truncate_if_needed(wire: Vec<u8>, is_tcp: bool, edns_bufsize: Option<u16>) -> Vec<u8> {
    if is_tcp {
        return wire;
    }
    let limit = edns_bufsize.unwrap_or(512) as usize;
    if wire.len() <= limit {
        return wire;
    }
    match Message::from_vec(&wire) {
        Ok(mut message) => {
            message.take_answers();
            message.take_name_servers();
            message.take_additionals();
            message.set_truncated(true);
            encode_message(&message)
        }
        Err(_) => wire,
    }
}

fn rewrite_id(mut wire: Vec<u8>, id: u16) -> Vec<u8> {
    if wire.len() >= 2 {
        let bytes = id.to_be_bytes();
        wire[0] = bytes[0];
        wire[1] = bytes[1];
    }
    wire
}

fn build_question(req: &DecodedRequest) -> (Name, Query) {
    let name = Name::from_str(req.fingerprint.name()).unwrap_or_else(|_| Name::root());
    let mut query = Query::new();
    query.set_name(name.clone());
    query.set_query_type(to_hickory_qtype(req.fingerprint.qtype()));
    query.set_query_class(DNSClass::IN);
    (name, query)
}

impl CodecPort for HickoryCodec {
    fn decode(&self, bytes: &[u8], is_tcp: bool) -> Result<DecodedRequest, DomainError> {
        let message =
            Message::from_vec(bytes).map_err(|e| DomainError::MalformedMessage(e.to_string()))?;
        let query = message
            .queries()
            .first()
            .ok_or_else(|| DomainError::MalformedMessage("no question section".into()))?;

        let name = query.name().to_utf8();
        let qtype = RecordType::from_u16(u16::from(query.query_type()));
        let qclass = QClass::from_u16(u16::from(query.query_class()));
        let edns_bufsize = message.extensions().as_ref().map(|opt| opt.max_payload());

        Ok(DecodedRequest {
            id: message.id(),
            fingerprint: Fingerprint::new(&name, qtype, qclass),
            edns_bufsize,
            is_tcp,
        })
    }

    fn encode_from_cache(&self, req: &DecodedRequest, entry: &CacheEntry) -> Vec<u8> {
        let wire = rewrite_id(entry.wire.to_vec(), req.id);
        truncate_if_needed(wire, req.is_tcp, req.edns_bufsize)
    }

    fn encode_synthetic(&self, req: &DecodedRequest, answer: SynthAnswer, ttl: u32) -> Vec<u8> {
        let (name, query) = build_question(req);
        let mut message = Message::new(req.id, MessageType::Response, OpCode::Query);
        message.set_recursion_desired(true);
        message.set_recursion_available(true);
        message.add_query(query);

        match answer {
            SynthAnswer::Nxdomain => {
                message.set_response_code(ResponseCode::NXDomain);
            }
            SynthAnswer::Servfail => {
                message.set_response_code(ResponseCode::ServFail);
            }
            SynthAnswer::Formerr => {
                message.set_response_code(ResponseCode::FormErr);
            }
            SynthAnswer::Sinkhole(ip) => {
                message.set_response_code(ResponseCode::NoError);
                let rdata = match ip {
                    IpAddr::V4(v4) => RData::A(A(v4)),
                    IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
                };
                message.add_answer(Record::from_rdata(name, ttl, rdata));
            }
        }

        let wire = encode_message(&message);
        truncate_if_needed(wire, req.is_tcp, req.edns_bufsize)
    }

    fn encode_raw_formerr(&self, raw: &[u8]) -> Vec<u8> {
        let id = if raw.len() >= 2 {
            u16::from_be_bytes([raw[0], raw[1]])
        } else {
            0
        };
        let mut message = Message::new(id, MessageType::Response, OpCode::Query);
        message.set_response_code(ResponseCode::FormErr);
        encode_message(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_query(name: &str, qtype: HickoryRecordType, id: u16) -> Vec<u8> {
        let mut message = Message::new(id, MessageType::Query, OpCode::Query);
        message.set_recursion_desired(true);
        let mut query = Query::new();
        query.set_name(Name::from_str(name).unwrap());
        query.set_query_type(qtype);
        query.set_query_class(DNSClass::IN);
        message.add_query(query);
        encode_message(&message)
    }

    #[test]
    fn decode_extracts_fingerprint_from_question() {
        let codec = HickoryCodec::new();
        let wire = sample_query("example.com.", HickoryRecordType::A, 7);
        let req = codec.decode(&wire, false).unwrap();
        assert_eq!(req.id, 7);
        assert_eq!(req.fingerprint.name(), "example.com");
        assert_eq!(req.fingerprint.qtype(), RecordType::A);
    }

    #[test]
    fn decode_rejects_message_without_question() {
        let codec = HickoryCodec::new();
        let message = Message::new(1, MessageType::Query, OpCode::Query);
        let wire = encode_message(&message);
        assert!(codec.decode(&wire, false).is_err());
    }

    #[test]
    fn encode_from_cache_rewrites_transaction_id() {
        let codec = HickoryCodec::new();
        let wire = sample_query("example.com.", HickoryRecordType::A, 99);
        let req = codec.decode(&wire, false).unwrap();
        let cached = CacheEntry {
            wire: std::sync::Arc::from(sample_query("example.com.", HickoryRecordType::A, 1)),
            rcode: 0,
            stored_at: 0,
            ttl_s: 60,
            stale_until_s: 0,
            source: sentinel_dns_domain::Source::Upstream,
            upstream_addr: None,
        };
        let req2 = DecodedRequest { id: 4242, ..req };
        let out = codec.encode_from_cache(&req2, &cached);
        assert_eq!(u16::from_be_bytes([out[0], out[1]]), 4242);
    }

    #[test]
    fn encode_synthetic_nxdomain_sets_rcode() {
        let codec = HickoryCodec::new();
        let wire = sample_query("blocked.test.", HickoryRecordType::A, 5);
        let req = codec.decode(&wire, false).unwrap();
        let out = codec.encode_synthetic(&req, SynthAnswer::Nxdomain, 60);
        let message = Message::from_vec(&out).unwrap();
        assert_eq!(message.response_code(), ResponseCode::NXDomain);
    }

    #[test]
    fn encode_raw_formerr_preserves_recoverable_id() {
        let codec = HickoryCodec::new();
        let out = codec.encode_raw_formerr(&[0x12, 0x34, 0xFF]);
        assert_eq!(u16::from_be_bytes([out[0], out[1]]), 0x1234);
    }
}
