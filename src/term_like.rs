use std::fmt::{self, Debug};
use std::io::{self, Write};

use console::Term;
use parking_lot::Mutex;

/// A trait for minimal terminal-like behavior.
///
/// Anything that implements this trait can be used as a draw target via
/// [`ProgressDrawTarget::term_like`].
///
/// [`ProgressDrawTarget::term_like`]: crate::ProgressDrawTarget::term_like
pub trait TermLike: Debug + Send + Sync {
    /// Return the terminal width, `None` if unknown
    fn width(&self) -> Option<u16>;
    /// Return the terminal height, `None` if unknown
    fn height(&self) -> Option<u16> {
        None
    }

    /// Whether a person is watching this output
    fn is_term(&self) -> bool {
        true
    }

    /// Move the cursor up by `n` lines
    ///
    /// Sinks that cannot move the cursor treat this as a no-op, which leaves
    /// nested bars appending lines instead of redrawing in place.
    fn move_cursor_up(&self, n: usize) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.write_str(&"\x1b[A".repeat(n))
    }

    /// Write a string
    fn write_str(&self, s: &str) -> io::Result<()>;
    /// Write a string and add a newline.
    fn write_line(&self, s: &str) -> io::Result<()> {
        self.write_str(s)?;
        self.write_str("\n")
    }

    fn flush(&self) -> io::Result<()>;
}

impl TermLike for Term {
    fn width(&self) -> Option<u16> {
        self.size_checked().map(|(_, cols)| cols)
    }

    fn height(&self) -> Option<u16> {
        self.size_checked().map(|(rows, _)| rows)
    }

    fn is_term(&self) -> bool {
        self.is_term()
    }

    fn move_cursor_up(&self, n: usize) -> io::Result<()> {
        // legacy Windows consoles without ANSI support
        if cfg!(windows) && !self.features().colors_supported() {
            return Ok(());
        }
        self.move_cursor_up(n)
    }

    fn write_str(&self, s: &str) -> io::Result<()> {
        self.write_str(s)
    }

    fn write_line(&self, s: &str) -> io::Result<()> {
        self.write_line(s)
    }

    fn flush(&self) -> io::Result<()> {
        self.flush()
    }
}

/// Adapts any [`io::Write`] into a [`TermLike`].
///
/// The width is unknown and the sink never counts as a terminal. Sinks that
/// do not support flushing are accepted.
pub struct WriterTerm {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl WriterTerm {
    pub fn new(writer: impl Write + Send + 'static) -> WriterTerm {
        WriterTerm {
            inner: Mutex::new(Box::new(writer)),
        }
    }
}

impl Debug for WriterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterTerm").finish_non_exhaustive()
    }
}

impl TermLike for WriterTerm {
    fn width(&self) -> Option<u16> {
        None
    }

    fn is_term(&self) -> bool {
        false
    }

    fn write_str(&self, s: &str) -> io::Result<()> {
        self.inner.lock().write_all(s.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        match self.inner.lock().flush() {
            Err(e) if e.kind() == io::ErrorKind::Unsupported => Ok(()),
            res => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no flush"))
        }
    }

    #[test]
    fn writer_term_forwards_bytes() {
        let sink = Sink::default();
        let term = WriterTerm::new(sink.clone());
        term.write_str("ab").unwrap();
        term.write_line("c").unwrap();
        term.move_cursor_up(2).unwrap();
        term.move_cursor_up(0).unwrap();
        assert!(term.flush().is_ok());
        assert_eq!(&*sink.0.lock(), b"abc\n\x1b[A\x1b[A");
        assert!(!term.is_term());
        assert_eq!(term.width(), None);
    }
}
