use std::fmt::Debug;
use std::io;
use std::thread::panicking;

use console::Term;
use portable_atomic::{AtomicBool, Ordering};

use crate::style::{format_meter, Meter};
use crate::term_like::WriterTerm;
use crate::utils::{measure, warn, Warning};
use crate::TermLike;

/// One rendered meter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub line: String,
    /// Display width of `line`, escape codes excluded.
    pub width: usize,
}

impl Frame {
    pub fn new(line: String) -> Frame {
        let width = measure(&line);
        Frame { line, width }
    }
}

/// Where a bar lives on screen and what was last painted there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Rows below the anchor row; 0 is the anchor.
    pub pos: usize,
    /// Width of the last line painted in this slot.
    pub last_width: usize,
    /// Whether anything was ever painted here.
    pub shown: bool,
}

impl Slot {
    pub fn at(pos: usize) -> Slot {
        Slot {
            pos,
            ..Slot::default()
        }
    }
}

/// The capability a bar needs from an output backend.
///
/// The engine decides *when* to paint. A renderer decides *what* a frame
/// looks like and how it reaches the screen. [`ProgressDrawTarget`] is the
/// text backend; other backends implement this trait and hand themselves to
/// a bar with [`BarConfig::renderer`](crate::BarConfig::renderer).
///
/// All methods run with the registry lock held, so a renderer never sees
/// two interleaved calls.
pub trait Renderer: Debug + Send + Sync {
    /// Lays out a frame for the given meter.
    fn render(&self, meter: &Meter<'_>) -> Frame {
        Frame::new(format_meter(meter))
    }

    /// Paints `frame` into `slot`, replacing whatever was there.
    fn present(&self, frame: &Frame, slot: &mut Slot) -> io::Result<()>;

    /// Blanks the slot without giving it up.
    fn clear(&self, slot: &mut Slot) -> io::Result<()>;

    /// Final paint when a bar closes.
    ///
    /// With `leave` the final frame stays on screen as a permanent line,
    /// otherwise the slot is blanked.
    fn teardown(&self, last: Option<&Frame>, leave: bool, slot: &mut Slot) -> io::Result<()>;

    /// Writes a whole line of text at the cursor.
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Columns available, `None` if unknown.
    fn width(&self) -> Option<usize> {
        None
    }

    /// Rows available, `None` if unknown.
    fn height(&self) -> Option<usize> {
        None
    }

    /// Whether someone is watching; bars created with `disable: None`
    /// switch themselves off when this is false.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Whether output goes nowhere.
    fn is_hidden(&self) -> bool {
        false
    }
}

/// Target for draw operations
///
/// This tells a progress bar where to paint to. Bars sharing a terminal
/// are stacked by their slot position: the anchor row is where the cursor
/// rests, and a bar at position `p` is painted `p` rows below it.
///
/// The first I/O error on the underlying sink is reported once through the
/// `progmeter::runtime` log target and turns the target into a hidden one.
#[derive(Debug)]
pub struct ProgressDrawTarget {
    kind: TargetKind,
    closed: AtomicBool,
}

impl ProgressDrawTarget {
    /// Draw to a buffered stdout terminal.
    pub fn stdout() -> Self {
        Self::term(Term::buffered_stdout())
    }

    /// Draw to a buffered stderr terminal.
    ///
    /// This is the default draw target for progress bars.
    pub fn stderr() -> Self {
        Self::term(Term::buffered_stderr())
    }

    /// Draw to a terminal.
    pub fn term(term: Term) -> Self {
        Self::term_like(Box::new(term))
    }

    /// Draw to a boxed object that implements the [`TermLike`] trait.
    pub fn term_like(term_like: Box<dyn TermLike>) -> Self {
        Self {
            kind: TargetKind::TermLike(term_like),
            closed: AtomicBool::new(false),
        }
    }

    /// Draw to any writer, such as a file or an in-memory buffer.
    ///
    /// Writers have no known width and never count as a terminal.
    pub fn writer(writer: impl io::Write + Send + 'static) -> Self {
        Self::term_like(Box::new(WriterTerm::new(writer)))
    }

    /// A hidden draw target.
    ///
    /// This forces a progress bar to be not rendered at all.
    pub fn hidden() -> Self {
        Self {
            kind: TargetKind::Hidden,
            closed: AtomicBool::new(false),
        }
    }

    fn term_ref(&self) -> Option<&dyn TermLike> {
        match &self.kind {
            TargetKind::TermLike(term) if !self.closed.load(Ordering::Relaxed) => Some(&**term),
            _ => None,
        }
    }

    /// Runs `f` against the sink unless it already failed once.
    fn guarded(&self, f: impl FnOnce(&dyn TermLike) -> io::Result<()>) -> io::Result<()> {
        let term = match self.term_ref() {
            Some(term) => term,
            None => return Ok(()),
        };

        let res = f(term);
        if let Err(err) = &res {
            if !self.closed.swap(true, Ordering::Relaxed) {
                warn(
                    Warning::Runtime,
                    format_args!("progress output disabled: {}", err),
                );
            }
        }
        res
    }

    fn paint(&self, term: &dyn TermLike, frame: &Frame, slot: &mut Slot) -> io::Result<()> {
        let mut buf = String::with_capacity(slot.pos + frame.line.len() + 2);
        buf.extend(std::iter::repeat('\n').take(slot.pos));
        buf.push('\r');
        buf.push_str(&frame.line);
        buf.extend(std::iter::repeat(' ').take(slot.last_width.saturating_sub(frame.width)));
        term.write_str(&buf)?;
        term.move_cursor_up(slot.pos)?;
        term.flush()?;

        slot.last_width = frame.width;
        slot.shown = true;
        Ok(())
    }

    fn blank(&self, term: &dyn TermLike, slot: &mut Slot) -> io::Result<()> {
        let mut buf = String::with_capacity(slot.pos + slot.last_width + 2);
        buf.extend(std::iter::repeat('\n').take(slot.pos));
        buf.push('\r');
        buf.extend(std::iter::repeat(' ').take(slot.last_width));
        buf.push('\r');
        term.write_str(&buf)?;
        term.move_cursor_up(slot.pos)?;
        term.flush()?;

        slot.last_width = 0;
        Ok(())
    }
}

impl Renderer for ProgressDrawTarget {
    fn present(&self, frame: &Frame, slot: &mut Slot) -> io::Result<()> {
        if panicking() {
            return Ok(());
        }
        self.guarded(|term| self.paint(term, frame, slot))
    }

    fn clear(&self, slot: &mut Slot) -> io::Result<()> {
        if panicking() || !slot.shown {
            return Ok(());
        }
        self.guarded(|term| self.blank(term, slot))
    }

    fn teardown(&self, last: Option<&Frame>, leave: bool, slot: &mut Slot) -> io::Result<()> {
        if panicking() || !slot.shown {
            return Ok(());
        }
        self.guarded(|term| match (leave, last) {
            (true, Some(frame)) => {
                // the permanent line always lands on the anchor row
                let mut anchor = Slot { pos: 0, ..*slot };
                self.paint(term, frame, &mut anchor)?;
                term.write_str("\n")?;
                term.flush()
            }
            (true, None) => {
                term.write_str("\n")?;
                term.flush()
            }
            (false, _) => {
                self.blank(term, slot)?;
                if slot.pos == 0 {
                    term.write_str("\r")?;
                    term.flush()?;
                }
                Ok(())
            }
        })
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        if panicking() {
            return Ok(());
        }
        self.guarded(|term| {
            term.write_line(line)?;
            term.flush()
        })
    }

    fn width(&self) -> Option<usize> {
        self.term_ref().and_then(|t| t.width()).map(usize::from)
    }

    fn height(&self) -> Option<usize> {
        self.term_ref().and_then(|t| t.height()).map(usize::from)
    }

    fn is_terminal(&self) -> bool {
        self.term_ref().map_or(false, |t| t.is_term())
    }

    fn is_hidden(&self) -> bool {
        self.term_ref().is_none()
    }
}

#[derive(Debug)]
enum TargetKind {
    TermLike(Box<dyn TermLike>),
    Hidden,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Sink {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock())).unwrap()
        }
    }

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl io::Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn present_moves_down_and_back() {
        let sink = Sink::default();
        let target = ProgressDrawTarget::writer(sink.clone());
        let mut slot = Slot::at(2);

        target.present(&Frame::new("abcd".into()), &mut slot).unwrap();
        assert_eq!(sink.take(), "\n\n\rabcd\x1b[A\x1b[A");
        assert_eq!(slot.last_width, 4);
        assert!(slot.shown);

        target.present(&Frame::new("ab".into()), &mut slot).unwrap();
        assert_eq!(sink.take(), "\n\n\rab  \x1b[A\x1b[A");
    }

    #[test]
    fn clear_blanks_previous_width() {
        let sink = Sink::default();
        let target = ProgressDrawTarget::writer(sink.clone());
        let mut slot = Slot::at(0);

        target.clear(&mut slot).unwrap();
        assert_eq!(sink.take(), "");

        target.present(&Frame::new("xyz".into()), &mut slot).unwrap();
        sink.take();
        target.clear(&mut slot).unwrap();
        assert_eq!(sink.take(), "\r   \r");
        assert_eq!(slot.last_width, 0);
    }

    #[test]
    fn teardown_leave_lands_on_anchor_row() {
        let sink = Sink::default();
        let target = ProgressDrawTarget::writer(sink.clone());
        let mut slot = Slot::at(1);
        target.present(&Frame::new("ab".into()), &mut slot).unwrap();
        sink.take();

        target
            .teardown(Some(&Frame::new("done".into())), true, &mut slot)
            .unwrap();
        assert_eq!(sink.take(), "\rdone\n");
    }

    #[test]
    fn teardown_without_leave_erases() {
        let sink = Sink::default();
        let target = ProgressDrawTarget::writer(sink.clone());
        let mut slot = Slot::at(0);
        target.present(&Frame::new("ab".into()), &mut slot).unwrap();
        sink.take();

        target.teardown(None, false, &mut slot).unwrap();
        assert_eq!(sink.take(), "\r  \r\r");
    }

    #[test]
    fn teardown_of_unshown_slot_is_silent() {
        let sink = Sink::default();
        let target = ProgressDrawTarget::writer(sink.clone());
        let mut slot = Slot::at(0);
        target
            .teardown(Some(&Frame::new("x".into())), true, &mut slot)
            .unwrap();
        assert_eq!(sink.take(), "");
    }

    #[test]
    fn broken_sink_disables_output() {
        let target = ProgressDrawTarget::writer(Broken);
        let mut slot = Slot::default();
        assert!(!target.is_hidden());
        assert!(target.present(&Frame::new("x".into()), &mut slot).is_err());
        assert!(target.is_hidden());
        assert!(target.present(&Frame::new("x".into()), &mut slot).is_ok());
        assert!(target.write_line("y").is_ok());
    }

    #[test]
    fn hidden_target() {
        let target = ProgressDrawTarget::hidden();
        assert!(target.is_hidden());
        assert!(!target.is_terminal());
        assert_eq!(target.width(), None);
        let mut slot = Slot::default();
        assert!(target.present(&Frame::new("x".into()), &mut slot).is_ok());
        assert!(!slot.shown);
    }
}
