use skillswap_live::{
    config::WebSocketConfig,
    events::{ChannelEvent, TransportSignal, create_signal_channel},
    transport::{Transport, WebSocketTransport},
};
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:5000/ws/events".to_string());
    println!(" Connecting to event channel at {}...", url);

    let transport = WebSocketTransport::new(
        "debug",
        WebSocketConfig {
            url: url::Url::parse(&url)?,
            timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(2),
            max_reconnects: 1,
        },
    );

    let (signals_tx, mut signals_rx) = create_signal_channel();
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move { transport.run(signals_tx, stop_rx).await });

    println!(" Waiting for events... (Press Ctrl+C to stop)");

    let mut frame_count = 0;
    loop {
        let signal = tokio::select! {
            signal = signals_rx.recv() => signal,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(signal) = signal else { break };

        match signal {
            TransportSignal::Opened { connection_id } => {
                println!(" Connected ({})", connection_id);
            }
            TransportSignal::Frame(text) => {
                frame_count += 1;
                println!(" Frame #{}: {}", frame_count, text);

                match ChannelEvent::decode(&text) {
                    Ok(Some(event)) => println!(
                        " Event {}:\n{}",
                        event.name,
                        serde_json::to_string_pretty(&event.payload)?
                    ),
                    Ok(None) => println!(" Not a subscribed event"),
                    Err(e) => println!(" Undecodable frame: {}", e),
                }

                // Stop after 10 frames for debugging
                if frame_count >= 10 {
                    println!(" Stopping after {} frames for debugging", frame_count);
                    break;
                }
            }
            TransportSignal::Closed { reason } => {
                println!(" Connection closed: {}", reason);
            }
        }
    }

    let _ = stop_tx.send(true);
    if let Ok(Err(e)) = task.await {
        println!(" Transport ended with error: {}", e);
    }

    println!(" Debug session complete!");
    Ok(())
}
