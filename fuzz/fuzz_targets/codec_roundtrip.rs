#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use msgqueue::{
    channel::ChannelRegistry,
    protocol::{decode_messages, encode_messages, serialized_size},
    ChannelSettings, NetworkMessage,
};

#[derive(Debug, Arbitrary)]
struct Input {
    settings: [ChannelSettings; 4],
    msgs: Vec<(u8, u32, Vec<u8>)>,
}

fuzz_target!(|input: Input| {
    let mut channels = ChannelRegistry::new();
    for (id, settings) in input.settings.iter().enumerate() {
        channels.configure(id as u8, *settings).unwrap();
    }

    let msgs: Vec<_> = input
        .msgs
        .into_iter()
        .map(|(channel, seq, payload)| NetworkMessage::with_header(channel % 4, seq, payload))
        .collect();
    let ordered = |msg: &NetworkMessage| input.settings[usize::from(msg.channel())].ordered;

    let mut total = 0;
    for msg in &msgs {
        match serialized_size(msg, ordered(msg)) {
            Ok(size) => total += size,
            Err(_) => return,
        }
    }

    let packet = encode_messages(&msgs, &channels, total).unwrap();
    assert_eq!(packet.len(), total);

    let decoded = decode_messages(packet, &channels).unwrap();
    assert_eq!(decoded.len(), msgs.len());
    for (sent, got) in msgs.iter().zip(&decoded) {
        assert_eq!(sent.channel(), got.channel());
        assert_eq!(sent.payload(), got.payload());
        let expected_seq = if ordered(sent) { sent.seq() & 0xFFFF } else { 0 };
        assert_eq!(got.seq(), expected_seq);
    }
});
