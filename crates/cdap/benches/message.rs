use bytes::BytesMut;
use cdap::{AuthType, CdapMessage, Opcode, decode, encode};
use criterion::{Criterion, criterion_group, criterion_main};

fn connect_message() -> CdapMessage {
    let mut msg = CdapMessage::new(Opcode::MConnect, 1);
    msg.abs_syntax = Some(1);
    msg.auth_mech = Some(AuthType::None);
    msg.auth_value = Some(vec![]);
    msg.src_ap_name = Some("ipcp-a".to_string());
    msg.dest_ap_name = Some("ipcp-b".to_string());
    msg
}

fn bench_round_trip(c: &mut Criterion) {
    let msg = connect_message();
    let mut buf = BytesMut::with_capacity(256);

    c.bench_function("cdap_encode_decode_m_connect", |b| {
        b.iter(|| {
            encode(&msg, &mut buf);
            decode(&buf).unwrap()
        })
    });
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
