#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use msgqueue::{channel::ChannelRegistry, protocol::decode_messages, ChannelSettings};

fuzz_target!(|input: ([ChannelSettings; 4], Vec<u8>)| {
    let (settings, packet) = input;
    let mut channels = ChannelRegistry::new();
    for (id, settings) in settings.into_iter().enumerate() {
        channels.configure(id as u8, settings).unwrap();
    }

    let len = packet.len();
    if let Ok(msgs) = decode_messages(Bytes::from(packet), &channels) {
        assert!(msgs.iter().map(|msg| msg.len()).sum::<usize>() <= len);
    }
});
