//! Console front end: typed input and the printed transcript.
//!
//! * [`ConsoleReader`]: stdin lines on a dedicated OS thread, delivered
//!   over an mpsc channel.
//! * [`TranscriptPrinter`]: user/model transcription with edge-triggered
//!   speaker labels, plus tool outcomes.

pub mod reader;
pub mod transcript;

pub use reader::ConsoleReader;
pub use transcript::TranscriptPrinter;
