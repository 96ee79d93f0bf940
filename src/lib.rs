//! progmeter is a library for adding self-throttling progress meters to
//! loops, counters and byte streams.
//!
//! A bar is cheap to update from a hot loop: it only repaints once enough
//! items *and* enough time have passed since its last repaint, and it tunes
//! the item threshold to the rate it observes. A background monitor makes
//! sure a bar whose threshold grew too large still repaints eventually.
//!
//! # Progress Bars
//!
//! The simplest way to get a bar is wrapping an iterator:
//!
//! ```rust,no_run
//! use progmeter::ProgressIterator;
//!
//! for _ in (0..1000).progress() {
//!     // ...
//! }
//! ```
//!
//! Or driving a bar by hand:
//!
//! ```rust,no_run
//! use progmeter::ProgressBar;
//!
//! let bar = ProgressBar::new(1000);
//! for _ in 0..1000 {
//!     bar.inc(1);
//!     // ...
//! }
//! bar.close();
//! ```
//!
//! A bar draws `{desc}: {percentage}|{bar}| {n}/{total} [{elapsed}<{remaining}, {rate}{postfix}]`
//! when its total is known and `{desc}: {n}{unit} [{elapsed}, {rate}{postfix}]` when it is not,
//! for example:
//!
//! ```text
//!  23%|██▎       | 231/1000 [06:32<21:44,  1.70s/it]
//! ```
//!
//! # Configuration
//!
//! Everything a bar can be told is in [`BarConfig`]. Options are resolved in
//! the order explicit setter, `PROGMETER_<OPTION>` environment variable,
//! default:
//!
//! ```rust,no_run
//! use progmeter::{BarConfig, ProgressBar};
//!
//! let config = BarConfig::from_env()?
//!     .desc("download")
//!     .total(4096.0)
//!     .unit("B")
//!     .unit_scale(true)
//!     .unit_divisor(1024);
//! let bar = ProgressBar::with_config(config)?;
//! # Ok::<(), progmeter::ConfigError>(())
//! ```
//!
//! The line layout can be replaced with a template (`bar_format`), see
//! [`Template`] for the fields it knows.
//!
//! # Stacked bars
//!
//! Bars share a [`Registry`] (the process-wide one unless told otherwise)
//! and each gets its own row: the lowest free one, or a fixed
//! [`BarConfig::position`]. Use [`ProgressBar::println()`] or
//! [`Registry::suspend()`] to print without tearing through them, or
//! [`LogWrapper`] to route a logger around them.
//!
//! # Iterators and I/O
//!
//! [`ProgressIterator`] wraps iterators. [`ProgressBar::wrap_read()`] and
//! [`ProgressBar::wrap_write()`] count bytes through [`std::io`] streams,
//! the `tokio` and `futures` features add the async counterparts.
//!
//! # Warnings
//!
//! Nothing in this crate panics or fails an update because of odd input or
//! a broken terminal. Such events are reported once through the [`log`]
//! crate, under the targets listed in [`Warning`].

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod draw_target;
mod format;
#[cfg(feature = "in_memory")]
mod in_memory;
mod iter;
mod logging;
mod monitor;
mod multi;
mod progress_bar;
mod state;
mod style;
mod term_like;
mod utils;

pub use crate::config::{BarConfig, ConfigError, ENV_PREFIX};
pub use crate::draw_target::{Frame, ProgressDrawTarget, Renderer, Slot};
pub use crate::format::{
    format_count, format_interval, format_num, format_percentage, format_rate, format_sizeof,
    scale_si, FormattedInterval, SizeOf,
};
#[cfg(feature = "in_memory")]
pub use crate::in_memory::InMemoryTerm;
pub use crate::iter::{ProgressBarIter, ProgressIterator};
pub use crate::logging::LogWrapper;
pub use crate::multi::{ExternalLock, Registry, DEFAULT_MONITOR_INTERVAL};
pub use crate::progress_bar::{PostfixValue, ProgressBar, WeakProgressBar};
pub use crate::state::Phase;
pub use crate::style::{
    format_meter, render_bar, Charset, Colour, Meter, Template, TemplateError, UnitScale,
};
pub use crate::term_like::{TermLike, WriterTerm};
pub use crate::utils::{locale_is_utf8, measure, truncate_to_width, Ema, Warning};
