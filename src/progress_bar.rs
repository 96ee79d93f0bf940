use std::fmt;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::config::{BarConfig, ConfigError};
use crate::draw_target::ProgressDrawTarget;
use crate::format::format_num;
use crate::iter::ProgressBarIter;
use crate::state::{BarState, Phase};

/// A self-throttling progress meter
///
/// The progress bar is an [`Arc`] around its internal state. When the progress bar is cloned it
/// just increments the refcount (so the original and its clone share the same state). The bar
/// closes when the last clone is dropped, or earlier through [`ProgressBar::close()`].
///
/// Updates are cheap: a bar only repaints once enough items *and* enough time have passed since
/// the last repaint, and tunes the item threshold to the observed rate.
#[derive(Clone)]
pub struct ProgressBar {
    state: Arc<Mutex<BarState>>,
}

impl fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBar").finish()
    }
}

impl ProgressBar {
    /// Creates a new progress bar with a given total
    ///
    /// This progress bar by default draws directly to stderr.
    pub fn new(total: u64) -> ProgressBar {
        ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr())
    }

    /// Creates a counter without a known total
    pub fn unbounded() -> ProgressBar {
        ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
    }

    /// Creates a completely hidden progress bar
    ///
    /// This progress bar still counts but it does not render in any way.
    pub fn hidden() -> ProgressBar {
        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
    }

    /// Creates a new progress bar with a given total and draw target
    pub fn with_draw_target(total: Option<u64>, draw_target: ProgressDrawTarget) -> ProgressBar {
        let config = BarConfig::default()
            .total(total.map(|t| t as f64))
            .target(draw_target);
        let now = Instant::now();
        ProgressBar::from_state(BarState::new(config, None, now), now)
    }

    /// Creates a progress bar from a full set of options
    ///
    /// ```
    /// use progmeter::{BarConfig, ProgressBar, ProgressDrawTarget};
    ///
    /// let pb = ProgressBar::with_config(
    ///     BarConfig::default()
    ///         .desc("copy")
    ///         .total(3.0)
    ///         .target(ProgressDrawTarget::hidden()),
    /// )
    /// .unwrap();
    /// pb.inc(3);
    /// assert_eq!(pb.n(), 3.0);
    /// ```
    pub fn with_config(config: BarConfig) -> Result<ProgressBar, ConfigError> {
        ProgressBar::with_config_at(config, Instant::now())
    }

    pub(crate) fn with_config_at(
        config: BarConfig,
        now: Instant,
    ) -> Result<ProgressBar, ConfigError> {
        config.validate()?;
        let template = config.template()?;
        Ok(ProgressBar::from_state(BarState::new(config, template, now), now))
    }

    fn from_state(state: BarState, now: Instant) -> ProgressBar {
        let pb = ProgressBar {
            state: Arc::new(Mutex::new(state)),
        };
        pb.state().attach(Arc::downgrade(&pb.state), now);
        pb
    }

    /// Advances the count by `delta` items
    pub fn inc(&self, delta: u64) {
        self.update(delta as f64);
    }

    /// Advances the count by `delta`, which may be fractional or negative
    ///
    /// Returns whether the bar repainted.
    pub fn update(&self, delta: f64) -> bool {
        self.state().update(Instant::now, delta)
    }

    /// Repaints the bar now, regardless of the throttles
    pub fn refresh(&self) {
        self.state().refresh(Instant::now())
    }

    /// Restarts from zero, keeping the total unless a new one is given
    pub fn reset(&self, total: Option<f64>) {
        self.state().reset(Instant::now(), total)
    }

    /// Sets the total; `None` turns the bar into a counter
    pub fn set_total(&self, total: Option<f64>) {
        self.state().set_total(Instant::now(), total)
    }

    /// Sets the text shown before the meter and repaints
    pub fn set_description(&self, desc: impl Into<String>) {
        self.state().set_description(Instant::now(), desc.into(), true)
    }

    /// Sets the text shown before the meter, shown from the next repaint on
    pub fn set_description_str(&self, desc: impl Into<String>) {
        self.state().set_description(Instant::now(), desc.into(), false)
    }

    /// Sets the text shown after the meter and repaints
    pub fn set_postfix(&self, postfix: impl Into<String>) {
        self.state().set_postfix(Instant::now(), Some(postfix.into()), true)
    }

    /// Sets the postfix from key-value pairs, joined as `k=v, k=v`
    ///
    /// Numbers are formatted compactly, text is trimmed.
    ///
    /// ```
    /// use progmeter::{PostfixValue, ProgressBar};
    ///
    /// let pb = ProgressBar::hidden();
    /// pb.set_postfix_items([
    ///     ("loss", PostfixValue::from(0.00001234)),
    ///     ("stage", "warmup ".into()),
    /// ]);
    /// assert_eq!(pb.postfix().as_deref(), Some("loss=1.23e-5, stage=warmup"));
    /// ```
    pub fn set_postfix_items<K, V>(&self, items: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<PostfixValue>,
    {
        let postfix = items
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.into()))
            .collect::<Vec<_>>()
            .join(", ");
        self.state().set_postfix(Instant::now(), Some(postfix), true)
    }

    /// Blanks the bar until its next repaint
    pub fn clear(&self) {
        self.state().clear()
    }

    /// Paints `msg` in the bar's row instead of the meter
    pub fn display_message(&self, msg: &str) {
        self.state().display_message(msg)
    }

    /// Closes the bar
    ///
    /// With `leave` (the default) the final meter stays on screen, otherwise
    /// the row is erased. Later updates are ignored. Calling this more than
    /// once has no further effect.
    pub fn close(&self) {
        self.state().close(Instant::now())
    }

    /// Resumes timing after a pause, so the pause does not count as elapsed
    pub fn unpause(&self) {
        self.state().unpause(Instant::now())
    }

    /// Prints a line above the bars without breaking them
    ///
    /// Every bar sharing this bar's registry is cleared, the line written
    /// through this bar's output, then the bars are repainted.
    pub fn println(&self, msg: impl AsRef<str>) {
        let (registry, renderer) = {
            let state = self.state();
            (state.registry().clone(), state.renderer().clone())
        };
        registry.write_line(&*renderer, msg.as_ref()).ok();
    }

    /// Hides the bars of this bar's registry while `f` runs
    ///
    /// Useful for writing to the terminal without going through
    /// [`ProgressBar::println()`].
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        let registry = self.state().registry().clone();
        registry.suspend(f)
    }

    /// Wraps an iterator with the progress bar
    ///
    /// ```rust,no_run
    /// # use progmeter::ProgressBar;
    /// let v = vec![1, 2, 3];
    /// let pb = ProgressBar::new(3);
    /// for item in pb.wrap_iter(v.iter()) {
    ///     // ...
    /// }
    /// ```
    pub fn wrap_iter<It: Iterator>(&self, it: It) -> ProgressBarIter<It> {
        ProgressBarIter::new(it, self.clone())
    }

    /// Wraps an [`io::Read`] with the progress bar
    ///
    /// ```rust,no_run
    /// # use std::fs::File;
    /// # use std::io;
    /// # use progmeter::ProgressBar;
    /// # fn test () -> io::Result<()> {
    /// let source = File::open("work.txt")?;
    /// let mut target = File::create("done.txt")?;
    /// let pb = ProgressBar::new(source.metadata()?.len());
    /// io::copy(&mut pb.wrap_read(source), &mut target);
    /// # Ok(())
    /// # }
    /// ```
    pub fn wrap_read<R: io::Read>(&self, read: R) -> ProgressBarIter<R> {
        ProgressBarIter::new(read, self.clone())
    }

    /// Wraps an [`io::Write`] with the progress bar
    pub fn wrap_write<W: io::Write>(&self, write: W) -> ProgressBarIter<W> {
        ProgressBarIter::new(write, self.clone())
    }

    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    /// Wraps a [`tokio::io::AsyncWrite`] with the progress bar
    pub fn wrap_async_write<W: tokio::io::AsyncWrite + Unpin>(
        &self,
        write: W,
    ) -> ProgressBarIter<W> {
        ProgressBarIter::new(write, self.clone())
    }

    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    /// Wraps a [`tokio::io::AsyncRead`] with the progress bar
    pub fn wrap_async_read<R: tokio::io::AsyncRead + Unpin>(&self, read: R) -> ProgressBarIter<R> {
        ProgressBarIter::new(read, self.clone())
    }

    #[cfg(feature = "futures")]
    #[cfg_attr(docsrs, doc(cfg(feature = "futures")))]
    /// Wraps a [`futures_core::Stream`] with the progress bar
    pub fn wrap_stream<S: futures_core::Stream + Unpin>(&self, stream: S) -> ProgressBarIter<S> {
        ProgressBarIter::new(stream, self.clone())
    }

    /// Current count
    pub fn n(&self) -> f64 {
        self.state().state.n
    }

    /// Expected number of items, `None` if unknown
    pub fn total(&self) -> Option<f64> {
        self.state().state.total
    }

    pub fn description(&self) -> String {
        self.state().look.desc.clone()
    }

    pub fn postfix(&self) -> Option<String> {
        self.state().look.postfix.clone()
    }

    /// Row of the bar below the anchor row, `None` when it is not on screen
    pub fn position(&self) -> Option<usize> {
        self.state().position()
    }

    /// Time since the bar started, pauses excluded
    pub fn elapsed(&self) -> Duration {
        self.state().state.elapsed(Instant::now())
    }

    /// Smoothed items per second, `None` until the first repaint sampled it
    pub fn rate(&self) -> Option<f64> {
        self.state().state.rate()
    }

    /// Current item threshold between repaints
    pub fn miniters(&self) -> f64 {
        self.state().state.miniters
    }

    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    /// Whether the bar counts without ever drawing
    pub fn is_disabled(&self) -> bool {
        self.state().state.disabled
    }

    /// Creates a new weak reference to this `ProgressBar`
    pub fn downgrade(&self) -> WeakProgressBar {
        WeakProgressBar {
            state: Arc::downgrade(&self.state),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, BarState> {
        self.state.lock()
    }
}

/// Renders the meter line as it would be painted right now.
impl fmt::Display for ProgressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.state().line(Instant::now()))
    }
}

/// A value shown by [`ProgressBar::set_postfix_items()`].
#[derive(Debug, Clone, PartialEq)]
pub enum PostfixValue {
    Num(f64),
    Text(String),
}

impl fmt::Display for PostfixValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostfixValue::Num(n) => f.write_str(&format_num(*n)),
            PostfixValue::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl From<f64> for PostfixValue {
    fn from(n: f64) -> Self {
        PostfixValue::Num(n)
    }
}

impl From<i64> for PostfixValue {
    fn from(n: i64) -> Self {
        PostfixValue::Num(n as f64)
    }
}

impl From<u64> for PostfixValue {
    fn from(n: u64) -> Self {
        PostfixValue::Num(n as f64)
    }
}

impl From<&str> for PostfixValue {
    fn from(s: &str) -> Self {
        PostfixValue::Text(s.to_owned())
    }
}

impl From<String> for PostfixValue {
    fn from(s: String) -> Self {
        PostfixValue::Text(s)
    }
}

/// A weak reference to a `ProgressBar`.
///
/// Useful for handing a bar to code that should not keep it open
#[derive(Clone, Default)]
pub struct WeakProgressBar {
    state: Weak<Mutex<BarState>>,
}

impl WeakProgressBar {
    /// Create a new `WeakProgressBar` that returns `None` when [`upgrade`] is called.
    ///
    /// [`upgrade`]: WeakProgressBar::upgrade
    pub fn new() -> WeakProgressBar {
        Default::default()
    }

    /// Attempts to upgrade the Weak pointer to a [`ProgressBar`], delaying dropping of the inner
    /// value if successful. Returns `None` if the inner value has since been dropped.
    pub fn upgrade(&self) -> Option<ProgressBar> {
        self.state.upgrade().map(|state| ProgressBar { state })
    }
}
