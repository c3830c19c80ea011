//! Single-writer "assistant speaking" flag.
//!
//! The playback task owns the only [`SpeakingWriter`]; the capture task holds
//! a [`SpeakingReader`] and drops microphone frames while it reads `true`.
//! The writer is not `Clone`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Create a connected writer/reader pair, initially not speaking.
pub fn speaking_flag() -> (SpeakingWriter, SpeakingReader) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        SpeakingWriter {
            flag: Arc::clone(&flag),
        },
        SpeakingReader { flag },
    )
}

/// Exclusive write side of the flag.
#[derive(Debug)]
pub struct SpeakingWriter {
    flag: Arc<AtomicBool>,
}

impl SpeakingWriter {
    /// Mark the assistant as speaking until the returned guard is dropped.
    pub fn speak(&mut self) -> SpeakingGuard<'_> {
        self.flag.store(true, Ordering::Release);
        SpeakingGuard { writer: self }
    }

    /// A reader observing this writer.
    pub fn reader(&self) -> SpeakingReader {
        SpeakingReader {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Clears the flag on drop, including on error paths.
pub struct SpeakingGuard<'a> {
    writer: &'a mut SpeakingWriter,
}

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.writer.flag.store(false, Ordering::Release);
    }
}

/// Read side of the flag.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct SpeakingReader {
    flag: Arc<AtomicBool>,
}

impl SpeakingReader {
    pub fn is_speaking(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_silent() {
        let (_writer, reader) = speaking_flag();
        assert!(!reader.is_speaking());
    }

    #[test]
    fn guard_sets_and_clears() {
        let (mut writer, reader) = speaking_flag();
        {
            let _guard = writer.speak();
            assert!(reader.is_speaking());
        }
        assert!(!reader.is_speaking());
    }

    #[test]
    fn flag_cleared_when_write_fails() {
        let (mut writer, reader) = speaking_flag();
        let result: Result<(), &str> = (|| {
            let _guard = writer.speak();
            Err("device gone")
        })();
        assert!(result.is_err());
        assert!(!reader.is_speaking());
    }

    #[test]
    fn readers_share_state() {
        let (mut writer, reader) = speaking_flag();
        let other = writer.reader();
        let _guard = writer.speak();
        assert!(reader.is_speaking() && other.is_speaking());
    }
}
