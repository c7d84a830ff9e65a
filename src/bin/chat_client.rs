//! Terminal chat client
//!
//! Connects to one server port, registers a nickname, prints every frame
//! it receives and sends each stdin line as a message frame.

use std::process;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use portchat::frame::{nickname_frame, Frame, FRAME_SIZE, NICKNAME_SIZE};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(version, about = "Terminal client for the broadcast chat server")]
struct Cli {
    /// Nickname shown to other participants
    nickname: String,
    /// Server host
    host: String,
    /// Server port (selects the room)
    port: u16,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.nickname.is_empty() {
        eprintln!("Empty nickname is not allowed");
        process::exit(1);
    }
    if cli.nickname.len() >= NICKNAME_SIZE {
        eprintln!(
            "Nickname is too long. Maximum length is {} characters.",
            NICKNAME_SIZE - 1
        );
        process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Connection error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> std::io::Result<()> {
    let stream = TcpStream::connect((cli.host.as_str(), cli.port)).await?;
    let (mut reader, mut writer) = stream.into_split();

    writer.write_all(&nickname_frame(&cli.nickname)).await?;

    // Print incoming frames until the server goes away
    let read_task = tokio::spawn(async move {
        let mut buf = [0u8; FRAME_SIZE];
        while reader.read_exact(&mut buf).await.is_ok() {
            println!("{}", Frame::from_wire(&buf).text());
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        writer.write_all(Frame::from_text(&line).as_bytes()).await?;
    }

    writer.shutdown().await?;
    read_task.abort();
    Ok(())
}
