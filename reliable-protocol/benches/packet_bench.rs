use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use reliable_protocol::endpoint::{MemoryOutput, MemoryTransport};
use reliable_protocol::packet::{internet_checksum, AckPacket, DataPacket, Packet, MAX_PAYLOAD_SIZE};
use reliable_protocol::recv_window::RecvWindow;
use reliable_protocol::sequence::SeqNumber;

fn full_data_packet() -> Packet {
    Packet::Data(
        DataPacket::new(SeqNumber::new(1000), Bytes::from(vec![0x5Au8; MAX_PAYLOAD_SIZE])).unwrap(),
    )
}

fn bench_data_packet_encode(c: &mut Criterion) {
    let packet = full_data_packet();

    let mut group = c.benchmark_group("data_packet");
    group.throughput(Throughput::Bytes(packet.size() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| {
            let bytes = black_box(&packet).encode();
            black_box(bytes);
        });
    });

    let bytes = packet.encode();
    group.bench_function("decode", |b| {
        b.iter(|| {
            let packet = Packet::decode(black_box(&bytes)).unwrap();
            black_box(packet);
        });
    });
    group.finish();
}

fn bench_ack_packet(c: &mut Criterion) {
    let packet = Packet::Ack(AckPacket::new(SeqNumber::new(77)));
    let bytes = packet.encode();

    c.bench_function("ack_packet_roundtrip", |b| {
        b.iter(|| {
            let decoded = Packet::decode(black_box(&black_box(&packet).encode())).unwrap();
            black_box(decoded);
        });
    });

    c.bench_function("ack_packet_decode", |b| {
        b.iter(|| black_box(Packet::decode(black_box(&bytes)).unwrap()));
    });
}

fn bench_checksum(c: &mut Criterion) {
    let data = vec![0xA5u8; 512];

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("internet_checksum_512", |b| {
        b.iter(|| black_box(internet_checksum(black_box(&data))));
    });
    group.finish();
}

fn bench_reorder_window(c: &mut Criterion) {
    // 64 packets arriving in reverse order: worst case for the reorder buffer.
    let packets: Vec<DataPacket> = (1..=64u32)
        .rev()
        .map(|seq| DataPacket::new(SeqNumber::new(seq), Bytes::from_static(b"payload")).unwrap())
        .collect();

    c.bench_function("recv_window_reverse_64", |b| {
        b.iter(|| {
            let mut window = RecvWindow::new(64);
            let mut transport = MemoryTransport::new();
            let mut output = MemoryOutput::unbounded();
            for packet in &packets {
                window.on_data(packet.clone(), &mut transport, &mut output);
            }
            black_box(window.frontier());
        });
    });
}

criterion_group!(
    benches,
    bench_data_packet_encode,
    bench_ack_packet,
    bench_checksum,
    bench_reorder_window
);
criterion_main!(benches);
