use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use kctl::{Attributes, Flags, Header, MessageType, Record, Tag};

fn allocate_flow_record() -> Record {
    let mut attrs = Attributes::new();
    attrs.push_u32(Tag::PortId, 7);
    attrs.push_string(Tag::ApplicationName, "app1@src");

    Record {
        header: Header {
            sequence_number: 17,
            source_ipcp_id: 1,
            destination_ipcp_id: 0,
            destination_port: 0,
            message_type: MessageType::AllocateFlow,
            flags: Flags::request(),
        },
        attrs,
    }
}

fn bench_round_trip(c: &mut Criterion) {
    let record = allocate_flow_record();
    let mut buf = BytesMut::with_capacity(256);

    c.bench_function("kctl_encode_decode_allocate_flow", |b| {
        b.iter(|| {
            buf.clear();
            record.encode(&mut buf);
            Record::decode(&mut buf).unwrap()
        })
    });
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
