use std::borrow::Cow;
use std::env;
use std::fmt;

use console::AnsiCodeIterator;
#[cfg(feature = "improved_unicode")]
use unicode_segmentation::UnicodeSegmentation;

const RESET: &str = "\x1b[0m";

/// Exponential moving average.
///
/// The first sample is taken as-is; every later sample `x` moves the average
/// to `alpha * x + (1 - alpha) * last`. With `alpha == 0` the average never
/// decays and instead ratchets up to the largest sample seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    alpha: f64,
    last: Option<f64>,
}

impl Ema {
    pub fn new(alpha: f64) -> Ema {
        Ema {
            alpha: alpha.clamp(0.0, 1.0),
            last: None,
        }
    }

    /// Feeds a sample and returns the new average.
    pub fn update(&mut self, x: f64) -> f64 {
        let y = match self.last {
            None => x,
            Some(last) if self.alpha == 0.0 => last.max(x),
            Some(last) => self.alpha * x + (1.0 - self.alpha) * last,
        };
        self.last = Some(y);
        y
    }

    /// The current average without sampling, `None` before the first sample.
    pub fn value(&self) -> Option<f64> {
        self.last
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Display width of `s` with ANSI escape codes stripped.
pub fn measure(s: &str) -> usize {
    console::measure_text_width(s)
}

/// Cuts `s` down to at most `width` display columns.
///
/// Escape codes before the cut are kept. If the string carried any escape
/// codes the result is terminated with a reset so that a cut inside a
/// coloured run does not bleed into the rest of the line.
pub fn truncate_to_width(s: &str, width: usize) -> Cow<'_, str> {
    if measure(s) <= width {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut used = 0;
    let mut saw_ansi = false;
    'outer: for (chunk, is_ansi) in AnsiCodeIterator::new(s) {
        if is_ansi {
            saw_ansi = true;
            out.push_str(chunk);
            continue;
        }
        for unit in display_units(chunk) {
            let w = unit_width(unit);
            if used + w > width {
                break 'outer;
            }
            used += w;
            out.push_str(unit);
        }
    }

    if saw_ansi && !out.ends_with(RESET) {
        out.push_str(RESET);
    }
    Cow::Owned(out)
}

/// Pads `s` with `fill` up to `width` display columns.
pub(crate) fn pad_str(s: &str, width: usize, align: Alignment, fill: char) -> Cow<'_, str> {
    let cols = measure(s);
    if cols >= width {
        return Cow::Borrowed(s);
    }

    let diff = width - cols;
    let (left, right) = match align {
        Alignment::Left => (0, diff),
        Alignment::Right => (diff, 0),
        Alignment::Center => (diff / 2, diff - diff / 2),
    };

    let mut rv = String::with_capacity(s.len() + diff * fill.len_utf8());
    rv.extend(std::iter::repeat(fill).take(left));
    rv.push_str(s);
    rv.extend(std::iter::repeat(fill).take(right));
    Cow::Owned(rv)
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub(crate) enum Alignment {
    Left,
    Center,
    Right,
}

#[cfg(feature = "improved_unicode")]
fn display_units(s: &str) -> impl Iterator<Item = &str> {
    s.graphemes(true)
}

#[cfg(not(feature = "improved_unicode"))]
fn display_units(s: &str) -> impl Iterator<Item = &str> {
    s.char_indices().map(move |(i, c)| &s[i..i + c.len_utf8()])
}

#[cfg(feature = "unicode-width")]
fn unit_width(unit: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(unit)
}

#[cfg(not(feature = "unicode-width"))]
fn unit_width(unit: &str) -> usize {
    unit.chars().count()
}

/// Whether the process locale asks for UTF-8 output.
///
/// Consults `LC_ALL`, `LC_CTYPE` and `LANG` in that order; the first one that
/// is set decides. Windows consoles are assumed to cope with UTF-8.
pub fn locale_is_utf8() -> bool {
    if cfg!(windows) {
        return true;
    }
    locale_vars_are_utf8(["LC_ALL", "LC_CTYPE", "LANG"].iter().map(|k| env::var(k).ok()))
}

fn locale_vars_are_utf8(vars: impl IntoIterator<Item = Option<String>>) -> bool {
    match vars.into_iter().flatten().find(|v| !v.is_empty()) {
        Some(value) => {
            let value = value.to_ascii_lowercase();
            value.contains("utf-8") || value.contains("utf8")
        }
        None => false,
    }
}

/// Categories of the non-fatal events the crate reports through `log`.
///
/// Each category logs under its own target so a host can filter them
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// A deprecated option was used.
    Deprecated,
    /// Something odd happened in the monitor thread.
    Monitor,
    /// A bar had to normalise its state or lost its output.
    Runtime,
}

impl Warning {
    pub fn target(self) -> &'static str {
        match self {
            Warning::Deprecated => "progmeter::deprecated",
            Warning::Monitor => "progmeter::monitor",
            Warning::Runtime => "progmeter::runtime",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Warning::Deprecated => "deprecated",
            Warning::Monitor => "monitor",
            Warning::Runtime => "runtime",
        })
    }
}

pub(crate) fn warn(kind: Warning, args: fmt::Arguments<'_>) {
    log::warn!(target: kind.target(), "{}", args);
}
