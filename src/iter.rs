use std::io::{self, IoSliceMut};
use std::iter::FusedIterator;
#[cfg(feature = "tokio")]
use std::pin::Pin;
#[cfg(feature = "tokio")]
use std::task::{Context, Poll};

#[cfg(feature = "tokio")]
use tokio::io::ReadBuf;

use crate::config::{BarConfig, ConfigError};
use crate::progress_bar::ProgressBar;

/// Wraps an iterator to display its progress.
pub trait ProgressIterator
where
    Self: Sized + Iterator,
{
    /// Wrap an iterator with a default bar drawing to stderr. The total is
    /// taken from [`Iterator::size_hint()`] when it is exact and left
    /// unknown otherwise.
    fn progress(self) -> ProgressBarIter<Self> {
        let pb = match exact_len(&self) {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::unbounded(),
        };
        self.progress_with(pb)
    }

    /// Wrap an iterator with an explicit element count.
    fn progress_count(self, len: u64) -> ProgressBarIter<Self> {
        self.progress_with(ProgressBar::new(len))
    }

    /// Wrap an iterator with a custom progress bar.
    fn progress_with(self, progress: ProgressBar) -> ProgressBarIter<Self>;

    /// Wrap an iterator with a bar built from `config`, taking the total
    /// from the iterator when the config has none.
    fn progress_with_config(self, config: BarConfig) -> Result<ProgressBarIter<Self>, ConfigError> {
        let config = match config.total {
            Some(_) => config,
            None => {
                let total = exact_len(&self).map(|len| len as f64);
                config.total(total)
            }
        };
        Ok(self.progress_with(ProgressBar::with_config(config)?))
    }
}

fn exact_len<I: Iterator>(it: &I) -> Option<u64> {
    match it.size_hint() {
        (lower, Some(upper)) if lower == upper => u64::try_from(upper).ok(),
        _ => None,
    }
}

/// Wraps an iterator, reader, writer or stream to display its progress.
///
/// Iterators count an item as done when the next one is requested, so the
/// bar never runs ahead of the work done on the items. Exhausting the
/// iterator closes the bar.
#[derive(Debug)]
pub struct ProgressBarIter<T> {
    pub(crate) it: T,
    pub progress: ProgressBar,
    pending: bool,
}

impl<T> ProgressBarIter<T> {
    pub(crate) fn new(it: T, progress: ProgressBar) -> ProgressBarIter<T> {
        ProgressBarIter {
            it,
            progress,
            pending: false,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.it
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.it
    }

    pub fn into_inner(self) -> T {
        self.it
    }

    /// Books the previous item and closes the bar once `item` is `None`.
    fn step<S>(&mut self, item: &Option<S>) {
        if self.pending {
            self.progress.inc(1);
        }
        self.pending = item.is_some();
        if item.is_none() {
            self.progress.close();
        }
    }
}

impl<S, T: Iterator<Item = S>> Iterator for ProgressBarIter<T> {
    type Item = S;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.it.next();
        self.step(&item);
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<T: ExactSizeIterator> ExactSizeIterator for ProgressBarIter<T> {
    fn len(&self) -> usize {
        self.it.len()
    }
}

impl<T: DoubleEndedIterator> DoubleEndedIterator for ProgressBarIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let item = self.it.next_back();
        self.step(&item);
        item
    }
}

impl<T: FusedIterator> FusedIterator for ProgressBarIter<T> {}

impl<R: io::Read> io::Read for ProgressBarIter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inc = self.it.read(buf)?;
        self.progress.inc(inc as u64);
        Ok(inc)
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        let inc = self.it.read_vectored(bufs)?;
        self.progress.inc(inc as u64);
        Ok(inc)
    }

    fn read_to_string(&mut self, buf: &mut String) -> io::Result<usize> {
        let inc = self.it.read_to_string(buf)?;
        self.progress.inc(inc as u64);
        Ok(inc)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.it.read_exact(buf)?;
        self.progress.inc(buf.len() as u64);
        Ok(())
    }
}

impl<R: io::BufRead> io::BufRead for ProgressBarIter<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.it.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.it.consume(amt);
        self.progress.inc(amt as u64);
    }
}

impl<W: io::Write> io::Write for ProgressBarIter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.it.write(buf).map(|inc| {
            self.progress.inc(inc as u64);
            inc
        })
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice]) -> io::Result<usize> {
        self.it.write_vectored(bufs).map(|inc| {
            self.progress.inc(inc as u64);
            inc
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.it.flush()
    }

    // write_fmt goes through write_all, which lands in write
}

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
impl<W: tokio::io::AsyncWrite + Unpin> tokio::io::AsyncWrite for ProgressBarIter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.it).poll_write(cx, buf).map(|poll| {
            poll.map(|inc| {
                self.progress.inc(inc as u64);
                inc
            })
        })
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.it).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.it).poll_shutdown(cx)
    }
}

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
impl<R: tokio::io::AsyncRead + Unpin> tokio::io::AsyncRead for ProgressBarIter<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let prev_len = buf.filled().len();
        let poll = Pin::new(&mut self.it).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            self.progress.inc((buf.filled().len() - prev_len) as u64);
        }
        poll
    }
}

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
impl<R: tokio::io::AsyncBufRead + Unpin> tokio::io::AsyncBufRead for ProgressBarIter<R> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        Pin::new(&mut this.it).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.it).consume(amt);
        self.progress.inc(amt as u64);
    }
}

#[cfg(feature = "futures")]
#[cfg_attr(docsrs, doc(cfg(feature = "futures")))]
impl<S: futures_core::Stream + Unpin> futures_core::Stream for ProgressBarIter<S> {
    type Item = S::Item;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = std::pin::Pin::new(&mut this.it).poll_next(cx);
        if let std::task::Poll::Ready(item) = &item {
            this.step(item);
        }
        item
    }
}

impl<S, T: Iterator<Item = S>> ProgressIterator for T {
    fn progress_with(self, progress: ProgressBar) -> ProgressBarIter<Self> {
        ProgressBarIter::new(self, progress)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::config::BarConfig;
    use crate::draw_target::ProgressDrawTarget;
    use crate::iter::{ProgressBarIter, ProgressIterator};
    use crate::multi::Registry;
    use crate::progress_bar::ProgressBar;

    fn hidden_config() -> BarConfig {
        BarConfig::default()
            .target(ProgressDrawTarget::hidden())
            .registry(Registry::with_monitor_interval(Duration::ZERO))
    }

    #[test]
    fn it_can_wrap_an_iterator() {
        let v = [1, 2, 3];
        let wrap = |it: ProgressBarIter<_>| {
            assert_eq!(it.map(|x| x * 2).collect::<Vec<_>>(), vec![2, 4, 6]);
        };

        wrap(v.iter().progress_with(ProgressBar::hidden()));
        wrap(v.iter().progress_with_config(hidden_config()).unwrap());
    }

    #[test]
    fn items_count_when_the_next_is_requested() {
        let pb = ProgressBar::hidden();
        let mut it = (0..3).progress_with(pb.clone());
        it.next();
        assert_eq!(pb.n(), 0.0);
        it.next();
        assert_eq!(pb.n(), 1.0);
        it.next();
        it.next();
        assert_eq!(pb.n(), 3.0);
        assert!(pb.is_closed());
    }

    #[test]
    fn total_from_exact_size_hint() {
        let it = (0..7).progress_with_config(hidden_config()).unwrap();
        assert_eq!(it.progress.total(), Some(7.0));

        let it = (0..7)
            .filter(|x| x % 2 == 0)
            .progress_with_config(hidden_config())
            .unwrap();
        assert_eq!(it.progress.total(), None);

        let it = (0..7)
            .progress_with_config(hidden_config().total(3.0))
            .unwrap();
        assert_eq!(it.progress.total(), Some(3.0));
    }

    #[test]
    fn empty_iterator_closes_at_zero() {
        let pb = ProgressBar::hidden();
        assert_eq!(std::iter::empty::<u8>().progress_with(pb.clone()).count(), 0);
        assert_eq!(pb.n(), 0.0);
        assert!(pb.is_closed());
    }

    #[test]
    fn buf_read_counts_consumed_bytes() {
        use std::io::BufRead;

        let pb = ProgressBar::hidden();
        let mut reader = pb.wrap_read(&b"one\ntwo\n"[..]);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "one\n");
        assert_eq!(pb.n(), 4.0);
    }
}
