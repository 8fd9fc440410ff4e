use anyhow::Context;
use msgqueue::{net::memory::MemoryTransport, ChannelSettings, MessageQueue, NetworkMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Command {
    Join { name: String },
    Move { x: i16, y: i16 },
    Say(String),
    Leave,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Chat {
    from: u32,
    text: String,
    reply_to: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut sender = MessageQueue::new(MemoryTransport::new());
    let mut receiver = MessageQueue::new(MemoryTransport::new());
    for queue in [&mut sender, &mut receiver] {
        queue.configure_channel(0, ChannelSettings::reliable_ordered())?;
        queue.configure_channel(1, ChannelSettings::new(true, false, false))?;
    }

    let commands = [
        Command::Join {
            name: "ferris".into(),
        },
        Command::Move { x: 3, y: -7 },
        Command::Say("hello".into()),
        Command::Leave,
    ];
    for command in &commands {
        sender.enqueue(NetworkMessage::from_serialize(command)?, 0)?;
    }
    let chat = Chat {
        from: 1,
        text: "typed payloads share packets with raw ones".into(),
        reply_to: None,
    };
    sender.enqueue(NetworkMessage::from_serialize(&chat)?, 1)?;
    sender.enqueue(NetworkMessage::new(&b"raw bytes"[..]), 1)?;

    let sent = sender.send_all()?;
    tracing::info!("Sent {sent} packets");
    for packet in sender.transport_mut().take_sent() {
        receiver.transport_mut().push_inbound(packet.payload);
    }

    for msg in receiver.receive_all() {
        match msg.channel() {
            0 => {
                let command: Command = msg.deserialize().context("bad command")?;
                tracing::info!("Command #{}: {command:?}", msg.seq());
            }
            _ => match msg.deserialize::<Chat>() {
                Ok(chat) => tracing::info!("Chat: {chat:?}"),
                Err(e) => tracing::info!("Raw {} bytes ({e})", msg.len()),
            },
        }
    }
    Ok(())
}
