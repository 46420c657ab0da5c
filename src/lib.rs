//! `nibble-pipe`
//!
//! An ingestion pipeline for a hardware-style serial nibble stream: 4-bit
//! samples arrive one at a time, are reassembled into bytes, staged in a
//! fixed-size lock-free ring, drained into page-backed files split on an
//! in-band terminator byte, and served FIFO to a single blocking reader.
//!
//! ## Three execution contexts
//!
//! - **Notification** ([`SampleIntake::submit`]): non-blocking,
//!   non-allocating, bounded time. Touches only the assembler and the ring's
//!   push side.
//! - **Deferred work** (the drain worker): a coalescing single-instance tokio
//!   task that may allocate pages and enqueue completed files, but never
//!   sleeps on readers.
//! - **Session** ([`Device::open`] / [`ReaderSession::read`]): may block
//!   indefinitely waiting for a completed file; interruptible via
//!   [`Device::shutdown`].
//!
//! ## Example
//!
//! ```no_run
//! use nibble_pipe::{Device, DeviceConfig};
//!
//! # async fn example() -> nibble_pipe::Result<()> {
//! let (device, mut intake) = Device::spawn(DeviceConfig::default())?;
//!
//! // Notification context: two samples per byte, high nibble first.
//! intake.submit(0x4);
//! intake.submit(0x1); // byte 0x41
//! intake.submit(0x0);
//! intake.submit(0x0); // terminator: finalizes the file
//!
//! // Session context: claim and stream the completed file.
//! let mut session = device.open().await?;
//! let mut buf = [0u8; 64];
//! let n = session.read(&mut buf);
//! assert_eq!(&buf[..n], b"A");
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod config;
pub mod device;
pub mod error;
pub mod intake;
pub mod queue;
pub mod ring;
pub mod session;
pub mod store;

mod drain;

pub use assembler::NibbleAssembler;
pub use config::DeviceConfig;
pub use device::{Device, StatusSnapshot};
pub use error::{Error, Result};
pub use intake::SampleIntake;
pub use queue::CompletedQueue;
pub use ring::SampleRing;
pub use session::ReaderSession;
pub use store::{FileRecord, PagePool};
