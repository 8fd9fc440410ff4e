#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use msgqueue::NetworkMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Arbitrary, Serialize, Deserialize, PartialEq)]
enum Event {
    Spawn { id: u32, x: f32, y: f32 },
    Despawn(u32),
    Rename(String),
    Batch(Vec<(u16, bool)>),
}

#[derive(Debug, Arbitrary, Serialize, Deserialize, PartialEq)]
struct Frame {
    tick: u64,
    owner: Option<i64>,
    tag: char,
    events: Vec<Event>,
    blob: Vec<u8>,
}

fuzz_target!(|data: Frame| {
    roundtrip(data);
});

fn roundtrip(frame: Frame) {
    // length prefixes are 16 bits wide
    let Ok(msg) = NetworkMessage::from_serialize(&frame) else {
        return;
    };
    let out: Frame = msg.deserialize().unwrap();
    let comparable = frame.events.iter().all(|event| match event {
        Event::Spawn { x, y, .. } => !x.is_nan() && !y.is_nan(),
        _ => true,
    });
    if comparable {
        assert_eq!(frame, out);
    }
}
