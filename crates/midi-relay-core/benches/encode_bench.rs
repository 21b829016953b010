//! Criterion benchmarks for the MIDI wire encoder and byte-stream parser.
//!
//! Every hardware event passes through both on the producer thread, so their
//! cost bounds the relay's event rate.
//!
//! Run with:
//! ```bash
//! cargo bench --package midi-relay-core --bench encode_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use midi_relay_core::{encode_event, MidiStreamParser, RawMidiEvent};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_note_on() -> RawMidiEvent {
    RawMidiEvent::new(1_000, 0x90, 60, 100)
}

fn make_clock() -> RawMidiEvent {
    RawMidiEvent::new(1_001, 0xF8, 0, 0)
}

fn make_sysex(len: usize) -> RawMidiEvent {
    let mut bytes = Vec::with_capacity(len + 2);
    bytes.push(0xF0);
    bytes.extend((0..len).map(|i| (i % 0x80) as u8));
    bytes.push(0xF7);
    RawMidiEvent::sysex(1_002, bytes)
}

/// A burst of running-status note-ons with real-time clock interleaved.
fn make_stream(notes: usize) -> Vec<u8> {
    let mut bytes = vec![0x90];
    for i in 0..notes {
        bytes.push((i % 0x80) as u8);
        if i % 8 == 0 {
            bytes.push(0xF8);
        }
        bytes.push(100);
    }
    bytes
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_event");

    let note_on = make_note_on();
    group.bench_function("note_on", |b| b.iter(|| encode_event(black_box(&note_on))));

    let clock = make_clock();
    group.bench_function("timing_clock", |b| b.iter(|| encode_event(black_box(&clock))));

    for len in [16usize, 256, 4_000] {
        let sysex = make_sysex(len);
        group.bench_with_input(BenchmarkId::new("sysex", len), &sysex, |b, event| {
            b.iter(|| encode_event(black_box(event)))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_stream");

    for notes in [16usize, 1_024] {
        let bytes = make_stream(notes);
        group.bench_with_input(BenchmarkId::new("running_status", notes), &bytes, |b, bytes| {
            b.iter(|| {
                let mut parser = MidiStreamParser::new();
                parser.feed(black_box(bytes), 0)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_parse);
criterion_main!(benches);
