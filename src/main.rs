use std::time::Duration;

use msgqueue::{
    net::memory::MemoryTransport, ChannelSettings, MessageQueue, NetworkMessage, Result,
};
use random::Source;
use tracing_subscriber::EnvFilter;

const RELIABLE: u8 = 0;
const STATE: u8 = 1;
const LOSS: f64 = 0.3;
const ROUNDS: u32 = 40;

fn setup(queue: &mut MessageQueue<MemoryTransport>) -> Result<()> {
    queue.configure_channel(RELIABLE, ChannelSettings::new(true, true, true))?;
    queue.configure_channel(STATE, ChannelSettings::unreliable())?;
    Ok(())
}

/// Moves every packet `from` sent over to `to`, dropping some on the way.
/// Delivered packets are acked back to the sender.
fn deliver(
    from: &mut MessageQueue<MemoryTransport>,
    to: &mut MessageQueue<MemoryTransport>,
    random: &mut random::Default,
) -> usize {
    let mut lost = 0;
    for packet in from.transport_mut().take_sent() {
        if random.read_f64() < LOSS {
            tracing::debug!("Link lost packet {}", packet.tag);
            lost += 1;
            continue;
        }
        to.transport_mut().push_inbound(packet.payload);
        from.transport_mut().ack(packet.tag);
    }
    lost
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut client = MessageQueue::new(MemoryTransport::with_latency(Duration::from_millis(20)));
    let mut server = MessageQueue::new(MemoryTransport::with_latency(Duration::from_millis(20)));
    setup(&mut client)?;
    setup(&mut server)?;

    let mut random = random::default(10);
    let mut ticker = tokio::time::interval(Duration::from_millis(25));
    let mut received = 0;

    for round in 0..ROUNDS {
        ticker.tick().await;

        if round % 4 == 0 {
            client.enqueue(NetworkMessage::new(format!("event {round}")), RELIABLE)?;
        }
        client.enqueue(NetworkMessage::new(format!("position {round}")), STATE)?;
        client.send_all()?;

        let lost = deliver(&mut client, &mut server, &mut random);
        for msg in server.receive_all() {
            received += 1;
            tracing::info!(
                "Server got seq {} on channel {}: {:?}",
                msg.seq(),
                msg.channel(),
                String::from_utf8_lossy(msg.payload())
            );
        }
        if lost > 0 {
            tracing::info!("Round {round}: {lost} packets lost");
        }
    }

    // let the reliable channel catch up
    for _ in 0..20 {
        ticker.tick().await;
        if client.pending_packets() == 0 {
            break;
        }
        client.send_all()?;
        deliver(&mut client, &mut server, &mut random);
        received += server.receive_all().len();
    }

    let last = client.last_acked(RELIABLE)?.map(|msg| msg.seq());
    tracing::info!(
        "Server received {received} messages, last acked reliable seq {last:?}, client stats {:?}",
        client.stats()
    );
    Ok(())
}
