//! dlogger-master - push events at a dlogger agent
//!
//! Stands in for the master: accepts one agent connection, logs the role
//! it registers under and pushes a batch of events at it. Answers the agent
//! sends back are logged.

use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use dlogger::protocol::{read_frame, write_frame, Frame};
use dlogger::{Event, EventKind};

#[derive(Parser)]
#[command(name = "dlogger-master")]
#[command(about = "Push events at a dlogger agent")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:1337")]
    listen: String,

    /// Event kind to send
    #[arg(long, default_value_t = EventKind::SENSOR_DATA.raw())]
    kind: i32,

    /// Payload bytes, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = [1u8, 2, 3])]
    payload: Vec<u8>,

    /// Number of events to send
    #[arg(long, short = 'n', default_value_t = 1)]
    count: u32,

    /// Delay between events in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Keep the connection open after sending until Ctrl+C
    #[arg(long)]
    keep_open: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let listener = TcpListener::bind(&args.listen).await?;
    info!("dlogger-master listening on {}", listener.local_addr()?);

    let (stream, peer) = listener.accept().await?;
    info!("agent connected from {}", peer);

    let (mut reader, mut writer) = stream.into_split();

    match tokio::time::timeout(Duration::from_secs(5), read_frame(&mut reader)).await {
        Ok(Ok(Some(Frame::Register { identity }))) => info!("agent registered as {}", identity),
        Ok(Ok(Some(other))) => {
            log::error!("expected registration, got {} frame", other.name());
            return Ok(());
        }
        Ok(Ok(None)) => {
            log::error!("agent disconnected before registering");
            return Ok(());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            log::error!("agent did not register within 5s");
            return Ok(());
        }
    }

    // Log answers until the agent goes away
    let answers = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(Frame::Event(event))) => {
                    info!("answer: event {} {:?}", event.kind, event.payload)
                }
                Ok(Some(other)) => log::warn!("unexpected {} frame from agent", other.name()),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("read error: {}", e);
                    break;
                }
            }
        }
    });

    let interval = Duration::from_millis(args.interval_ms);
    for i in 0..args.count {
        if i > 0 {
            tokio::time::sleep(interval).await;
        }
        let event = Event::new(args.kind, args.payload.clone());
        write_frame(&mut writer, &Frame::Event(event)).await?;
        info!("sent event {} ({}/{})", args.kind, i + 1, args.count);
    }

    if args.keep_open {
        info!("holding connection open, Ctrl+C to close");
        tokio::signal::ctrl_c().await?;
    }

    drop(writer);
    answers.abort();
    info!("closing connection");

    Ok(())
}
