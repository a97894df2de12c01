//! Incremental spectrogram rendering.
//!
//! A [`RenderSession`] pulls fixed-size blocks from a [`WaveformSource`],
//! mixes them down to mono, runs a windowed FFT over each block and paints
//! one log-skewed, HSV-coloured column per block into a scrolling
//! [`Canvas`]. Work happens one block per [`RenderSession::step`] so that a
//! cooperative scheduler can interleave rendering with other clients.

pub mod canvas;
pub mod config;
pub mod downmix;
pub mod error;
pub mod listener;
pub mod mapper;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod transform;

pub use canvas::{save_png, Canvas};
pub use config::{ImageConfig, RenderConfig};
pub use downmix::BlockReader;
pub use error::{Result, SpectrographError};
pub use listener::{CompletionListener, ListenerId, ListenerSet};
pub use mapper::{LevelRange, PixelMapper};
pub use scheduler::{TimeSliceClient, TimeSliceScheduler};
pub use session::{Progress, RenderSession, SharedSession};
pub use source::{MemorySource, SourceInfo, WavSource, WaveformSource};
pub use transform::{SpectralTransform, TRANSFORM_LENGTH};
