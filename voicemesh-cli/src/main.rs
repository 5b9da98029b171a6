use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use voicemesh::client::{
    MemoryStore, NullPlayback, SessionEvent, SilenceSource, TransportConfig, VoiceClient,
};
use voicemesh::model::{ParticipantRecord, RoomId};

#[derive(Parser)]
#[command(name = "voicemesh")]
#[command(about = "Voice room mesh over an in-process document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full mesh of simulated participants in one process.
    Demo {
        /// Number of participants to join.
        #[arg(long, default_value_t = 3)]
        participants: usize,

        /// Server part of the room id.
        #[arg(long, default_value = "demo-server")]
        server: String,

        /// Channel part of the room id.
        #[arg(long, default_value = "voice")]
        channel: String,

        /// How long to keep the mesh alive before leaving.
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            participants,
            server,
            channel,
            seconds,
        } => demo(participants, RoomId::new(server, channel), seconds).await,
    }
}

async fn demo(participants: usize, room: RoomId, seconds: u64) -> Result<()> {
    println!(
        "{} {} participants in {}",
        "Starting voicemesh demo:".green().bold(),
        participants,
        room
    );

    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();

    for i in 1..=participants {
        let uid = format!("user{}", i);
        let client = VoiceClient::new(store.clone())
            .with_capture_source(Arc::new(SilenceSource))
            .with_playback(Arc::new(NullPlayback))
            .with_transport_config(TransportConfig {
                ice_servers: Vec::new(),
            });

        let record =
            ParticipantRecord::new(uid.as_str(), format!("User {}", i)).with_avatar("🎧");
        let handle = client.join(room.clone(), record).await?;

        let mut events = handle.events();
        let tag = uid.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                print_event(&tag, &event);
            }
        });

        println!("  {} {}", "joined:".cyan(), uid);
        handles.push(handle);
    }

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    for handle in handles {
        handle.leave().await;
    }

    println!("{}", "Demo finished".green().bold());
    Ok(())
}

fn print_event(uid: &str, event: &SessionEvent) {
    match event {
        SessionEvent::ParticipantJoined(record) => {
            println!("  [{}] {} {}", uid, "peer joined:".cyan(), record.uid)
        }
        SessionEvent::ParticipantLeft(peer) => {
            println!("  [{}] {} {}", uid, "peer left:".yellow(), peer)
        }
        SessionEvent::ConnectionEstablished(peer) => {
            println!("  [{}] {} {}", uid, "connected:".green().bold(), peer)
        }
        SessionEvent::ConnectionLost(peer) => {
            println!("  [{}] {} {}", uid, "connection lost:".red(), peer)
        }
        SessionEvent::MicToggled(on) => println!("  [{}] mic enabled: {}", uid, on),
        SessionEvent::SpeakerToggled(on) => println!("  [{}] speaker enabled: {}", uid, on),
    }
}
