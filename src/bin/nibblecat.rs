//! Demo feeder: pipes stdin through the nibble pipeline.
//!
//! Each input line becomes one logical file: every byte is split into its two
//! nibbles (high first) and submitted through the ingest handle, followed by
//! the terminator byte. Completed files are claimed and printed as they
//! arrive, so back-to-back lines exercise the multi-file drain path.

use anyhow::Result;
use clap::Parser;
use nibble_pipe::{Device, DeviceConfig, Error, SampleIntake};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nibblecat", about = "Feed stdin lines through the nibble pipeline")]
struct Args {
    /// Path to a TOML config file (NIBBLE_PIPE_* env vars override it).
    #[arg(long, default_value = "nibble-pipe.toml")]
    config: PathBuf,

    /// Print a device status snapshot after each completed file.
    #[arg(long)]
    status: bool,
}

fn feed_stdin(mut intake: SampleIntake, terminator: u8) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        for byte in line.as_bytes() {
            intake.submit_byte(*byte);
        }
        intake.submit_byte(terminator);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = DeviceConfig::load(&args.config)?;
    let terminator = config.terminator;

    let (device, intake) = Device::spawn(config)?;

    // Stdin is blocking I/O; feed from a blocking task and shut the device
    // down once the stream ends so the reader loop below unblocks.
    let feeder = tokio::task::spawn_blocking(move || feed_stdin(intake, terminator));
    let closer = device.clone();
    tokio::spawn(async move {
        let _ = feeder.await;
        // Let the final drain pass land before interrupting waiters.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        closer.shutdown();
    });

    let mut index = 0usize;
    loop {
        match device.open().await {
            Ok(mut session) => {
                let mut content = Vec::with_capacity(session.len() as usize);
                let mut buf = [0u8; 512];
                loop {
                    let n = session.read(&mut buf);
                    if n == 0 {
                        break;
                    }
                    content.extend_from_slice(&buf[..n]);
                }
                println!(
                    "file {index}: {} bytes: {}",
                    content.len(),
                    String::from_utf8_lossy(&content)
                );
                index += 1;
                if args.status {
                    println!("{}", device.status());
                }
            }
            Err(Error::Interrupted) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
