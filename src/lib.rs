//! chatsnap
//!
//! Capture a rendered chat transcript as PNG images. A run picks a range of
//! messages, restyles each into a self-contained block (avatar, background,
//! highlighted quotes), measures and paginates the blocks under a height
//! threshold, rasterizes every segment and delivers one `<chat>.png` or a
//! `<chat>.zip` of numbered images.
//!
//! # Features
//!
//! - **Pure-Rust raster backend**: blocks are laid out and painted with
//!   `tiny-skia`, glyphs come from a system or configured font
//! - **Pluggable host**: interaction, output and settings storage sit behind
//!   traits so a terminal, a test harness or an embedding app can drive it
//! - **Cancellable**: every step checks a shared [`capture::CancelToken`]
//!
//! # Example
//!
//! ```no_run
//! use chatsnap::capture::{CancelToken, Capture};
//! use chatsnap::platform::{ConsoleInteraction, DirectorySurface};
//! use chatsnap::range::RangeRequest;
//! use chatsnap::rendering::BlockPainter;
//! use chatsnap::transcript::Transcript;
//! use chatsnap::SnapConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transcript = Transcript::load("chat.jsonl".as_ref())?;
//! let config = SnapConfig::default();
//! let painter = BlockPainter::from_config(&config, None)?;
//! let ui = ConsoleInteraction::new(true);
//! let out = DirectorySurface::new(".");
//! let outcome = Capture::new(&config, &painter, &ui, &out)
//!     .run(&transcript, &RangeRequest::default(), &CancelToken::new())
//!     .await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{SettingsEdit, SnapConfig};

// Persistence of the configuration record
pub mod settings;

// Host transcript snapshot and range selection
pub mod range;
pub mod transcript;

// Block model and restyling
pub mod block;
pub mod convert;
pub mod highlight;
pub mod normalize;

pub mod paginate;

// Layout and rasterization
pub mod rendering;

// Host surface: interaction, device metrics, output
pub mod platform;

pub mod capture;
pub mod package;

// Worker-backed async handle
pub mod service;
pub use service::CaptureService;
