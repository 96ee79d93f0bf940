use std::fmt;
use std::str::FromStr;

use console::{Color, Style};
use thiserror::Error;

use crate::format::{
    format_count, format_interval, format_percentage, format_rate, format_rate_value,
    format_sizeof,
};
use crate::utils::{measure, pad_str, truncate_to_width, Alignment};

const UNICODE_SYMBOLS: &[char] = &[' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];
const ASCII_SYMBOLS: &[char] = &[' ', '1', '2', '3', '4', '5', '6', '7', '8', '9', '#'];
const BLANK_SYMBOLS: &[char] = &[' ', ' '];

/// Width of the bar when the column budget is unknown.
const FALLBACK_BAR_WIDTH: usize = 10;

static DEFAULT_CHARSET: Charset = Charset::Unicode;
static BLANK_CHARSET: Charset = Charset::Blank;

/// Glyphs used to fill the bar.
///
/// The first symbol is the empty cell, the last one a full cell, and the ones
/// in between are partial fills, so a bar advances in `symbols - 1` steps per
/// cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Charset {
    /// Unicode block elements, 8 steps per cell.
    #[default]
    Unicode,
    /// Digits `1`-`9` and `#`, 10 steps per cell.
    Ascii,
    /// Spaces only.
    Blank,
    /// Caller supplied symbols, at least two.
    Custom(Vec<char>),
}

impl Charset {
    /// Picks unicode blocks when the locale is UTF-8 and ASCII otherwise.
    pub fn detect() -> Charset {
        if crate::utils::locale_is_utf8() {
            Charset::Unicode
        } else {
            Charset::Ascii
        }
    }

    pub fn symbols(&self) -> &[char] {
        match self {
            Charset::Unicode => UNICODE_SYMBOLS,
            Charset::Ascii => ASCII_SYMBOLS,
            Charset::Blank => BLANK_SYMBOLS,
            Charset::Custom(symbols) if symbols.len() >= 2 => symbols,
            Charset::Custom(_) => ASCII_SYMBOLS,
        }
    }
}

/// Renders a bar `width` cells wide filled to `frac`.
pub fn render_bar(frac: f64, width: usize, charset: &Charset) -> String {
    let symbols = charset.symbols();
    let steps = symbols.len() - 1;
    let frac = if frac.is_nan() { 0.0 } else { frac.clamp(0.0, 1.0) };

    let units = (frac * width as f64 * steps as f64) as usize;
    let (full, partial) = (units / steps, units % steps);

    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat(symbols[steps]).take(full));
    if full < width {
        bar.push(symbols[partial]);
        bar.extend(std::iter::repeat(symbols[0]).take(width - full - 1));
    }
    bar
}

/// Colour of the bar glyphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Colour {
    Named(Color),
    Rgb(u8, u8, u8),
}

impl Colour {
    /// Parses one of the eight basic colour names (any case) or `#rrggbb`.
    pub fn parse(s: &str) -> Option<Colour> {
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            return Some(Colour::Rgb(channel(0)?, channel(2)?, channel(4)?));
        }

        let color = match s.to_ascii_lowercase().as_str() {
            "black" => Color::Black,
            "red" => Color::Red,
            "green" => Color::Green,
            "yellow" => Color::Yellow,
            "blue" => Color::Blue,
            "magenta" => Color::Magenta,
            "cyan" => Color::Cyan,
            "white" => Color::White,
            _ => return None,
        };
        Some(Colour::Named(color))
    }

    pub fn paint(&self, s: &str) -> String {
        match *self {
            Colour::Named(color) => Style::new()
                .fg(color)
                .force_styling(true)
                .apply_to(s)
                .to_string(),
            Colour::Rgb(r, g, b) => format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, s),
        }
    }
}

/// How counts and rates are scaled before display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UnitScale {
    /// Raw numbers.
    #[default]
    Off,
    /// SI prefixes (`1.23K`).
    On,
    /// Multiply counts and rates by a factor, no prefixes. A factor of 1
    /// behaves like [`UnitScale::On`].
    Factor(f64),
}

impl UnitScale {
    fn factor(self) -> Option<f64> {
        match self {
            UnitScale::Factor(f) if f != 1.0 => Some(f),
            _ => None,
        }
    }

    fn uses_prefixes(self) -> bool {
        matches!(self, UnitScale::On | UnitScale::Factor(_))
    }
}

impl From<bool> for UnitScale {
    fn from(on: bool) -> UnitScale {
        match on {
            true => UnitScale::On,
            false => UnitScale::Off,
        }
    }
}

/// Everything needed to lay out one meter line.
#[derive(Debug, Clone)]
pub struct Meter<'a> {
    pub n: f64,
    pub total: Option<f64>,
    /// Seconds since the bar started.
    pub elapsed: f64,
    /// Column budget; `None` for unknown, `Some(0)` for stats only.
    pub ncols: Option<usize>,
    pub nrows: Option<usize>,
    pub prefix: &'a str,
    pub charset: &'a Charset,
    pub unit: &'a str,
    pub unit_scale: UnitScale,
    pub unit_divisor: u32,
    /// Items per second. `None` falls back to the average over the run.
    pub rate: Option<f64>,
    pub template: Option<&'a Template>,
    pub postfix: Option<&'a str>,
    pub initial: f64,
    pub colour: Option<&'a Colour>,
}

impl Meter<'static> {
    pub fn new(n: f64, total: Option<f64>, elapsed: f64) -> Meter<'static> {
        Meter {
            n,
            total,
            elapsed,
            ncols: None,
            nrows: None,
            prefix: "",
            charset: &DEFAULT_CHARSET,
            unit: "it",
            unit_scale: UnitScale::Off,
            unit_divisor: 1000,
            rate: None,
            template: None,
            postfix: None,
            initial: 0.0,
            colour: None,
        }
    }
}

impl Meter<'_> {
    fn known_total(&self) -> Option<f64> {
        self.total.filter(|t| t.is_finite() && *t > 0.0)
    }

    /// True when `n` lies outside `[0, total]` but the meter still renders
    /// as a bar, so the fraction gets clamped.
    pub fn needs_clamp(&self) -> bool {
        match self.known_total() {
            Some(total) => self.n < 0.0 || (self.n > total && self.n < total + 0.5),
            None => false,
        }
    }
}

impl fmt::Display for Meter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_meter(self))
    }
}

/// Lays out the meter line.
///
/// With a known total this is `{desc}: {percentage}%|{bar}| {n}/{total}
/// [{elapsed}<{remaining}, {rate}{postfix}]`. An unknown total, or `n` at
/// least half a unit past the total, gives the counter form
/// `{desc}: {n}{unit} [{elapsed}, {rate}{postfix}]`.
pub fn format_meter(meter: &Meter<'_>) -> String {
    let mut n = meter.n;
    let mut total = meter.known_total();
    let mut initial = meter.initial;
    let mut rate = meter.rate;
    let mut prefixes = meter.unit_scale.uses_prefixes();
    if let Some(factor) = meter.unit_scale.factor() {
        n *= factor;
        initial *= factor;
        total = total.map(|t| t * factor);
        rate = rate.map(|r| r * factor);
        prefixes = false;
    }

    if rate.is_none() && meter.elapsed > 0.0 {
        rate = Some((n - initial) / meter.elapsed);
    }
    let rate = rate.filter(|r| r.is_finite() && *r != 0.0);
    let inv_rate = rate.map(|r| 1.0 / r);

    let unit = meter.unit;
    let elapsed_str = format_interval(meter.elapsed);
    let rate_fmt = format_rate(rate, unit, prefixes);
    let n_fmt = scaled(n, prefixes, meter.unit_divisor);
    let total_fmt = total.map_or_else(|| "?".to_owned(), |t| scaled(t, prefixes, meter.unit_divisor));
    let postfix = match meter.postfix {
        Some(p) if !p.is_empty() => format!(", {}", p),
        _ => String::new(),
    };

    let remaining = match (rate, total) {
        (Some(r), Some(t)) => Some((t - n) / r),
        (Some(_), None) => Some(0.0),
        _ => None,
    };
    let remaining_str = remaining.map_or_else(|| "?".to_owned(), format_interval);

    let mut l_bar = match meter.prefix {
        "" => String::new(),
        p if p.ends_with(": ") => p.to_owned(),
        p => format!("{}: ", p),
    };
    let r_bar = format!(
        "| {}/{} [{}<{}, {}{}]",
        n_fmt, total_fmt, elapsed_str, remaining_str, rate_fmt, postfix
    );

    if let Some(t) = total {
        if n >= t + 0.5 {
            total = None;
        }
    }

    let (frac, charset) = match total {
        Some(t) => {
            let frac = (n / t).clamp(0.0, 1.0);
            let frac = if frac.is_nan() { 0.0 } else { frac };
            l_bar.push_str(&format_percentage(frac, 0));
            l_bar.push('|');
            if meter.ncols == Some(0) {
                return format!("{}{}", &l_bar[..l_bar.len() - 1], &r_bar[1..]);
            }
            (frac, meter.charset)
        }
        None if meter.template.is_some() => {
            l_bar.push('|');
            (0.0, &BLANK_CHARSET)
        }
        None => {
            let counter = format!(
                "{}{}{} [{}, {}{}]",
                l_bar, n_fmt, unit, elapsed_str, rate_fmt, postfix
            );
            return trim(counter, meter.ncols);
        }
    };

    let template = match meter.template {
        Some(template) => template,
        None => {
            let width = bar_width(meter.ncols, measure(&l_bar) + measure(&r_bar));
            let bar = paint(render_bar(frac, width, charset), meter.colour);
            return trim(format!("{}{}{}", l_bar, bar, r_bar), meter.ncols);
        }
    };

    let fields = Fields {
        l_bar: &l_bar,
        r_bar: &r_bar,
        n,
        n_fmt: &n_fmt,
        total,
        total_fmt: &total_fmt,
        percentage: frac * 100.0,
        elapsed: meter.elapsed,
        elapsed_str: &elapsed_str,
        ncols: meter.ncols,
        nrows: meter.nrows,
        desc: meter.prefix,
        unit,
        rate,
        rate_fmt: &rate_fmt,
        inv_rate,
        rate_noinv_fmt: &match rate {
            Some(r) => format!("{}{}/s", format_rate_value(r, prefixes), unit),
            None => format!("?{}/s", unit),
        },
        rate_inv_fmt: &match inv_rate {
            Some(r) => format!("{}s/{}", format_rate_value(r, prefixes), unit),
            None => format!("?s/{}", unit),
        },
        postfix: &postfix,
        unit_divisor: meter.unit_divisor,
        remaining,
        remaining_str: &remaining_str,
    };

    let nobar = template.expand(&fields, |_| String::new());
    if !template.has_bar() {
        return nobar;
    }

    let auto_width = bar_width(meter.ncols, measure(&nobar));
    let line = template.expand(&fields, |spec| {
        let width = match spec.width {
            BarWidth::Auto => auto_width,
            BarWidth::Fixed(w) => w,
            BarWidth::Shrink(k) => auto_width.saturating_sub(k),
        };
        let charset = match (charset, &spec.charset) {
            (Charset::Blank, _) => &BLANK_CHARSET,
            (_, Some(overridden)) => overridden,
            (default, None) => default,
        };
        paint(render_bar(frac, width, charset), meter.colour)
    });
    trim(line, meter.ncols)
}

fn scaled(x: f64, prefixes: bool, divisor: u32) -> String {
    if prefixes {
        format_sizeof(x, divisor)
    } else {
        format_count(x)
    }
}

fn bar_width(ncols: Option<usize>, used: usize) -> usize {
    match ncols {
        Some(ncols) => ncols.saturating_sub(used).max(1),
        None => FALLBACK_BAR_WIDTH,
    }
}

fn paint(bar: String, colour: Option<&Colour>) -> String {
    match colour {
        Some(colour) => colour.paint(&bar),
        None => bar,
    }
}

fn trim(line: String, ncols: Option<usize>) -> String {
    match ncols {
        Some(ncols) if ncols > 0 => truncate_to_width(&line, ncols).into_owned(),
        _ => line,
    }
}

/// The values a template can refer to.
struct Fields<'a> {
    l_bar: &'a str,
    r_bar: &'a str,
    n: f64,
    n_fmt: &'a str,
    total: Option<f64>,
    total_fmt: &'a str,
    percentage: f64,
    elapsed: f64,
    elapsed_str: &'a str,
    ncols: Option<usize>,
    nrows: Option<usize>,
    desc: &'a str,
    unit: &'a str,
    rate: Option<f64>,
    rate_fmt: &'a str,
    inv_rate: Option<f64>,
    rate_noinv_fmt: &'a str,
    rate_inv_fmt: &'a str,
    postfix: &'a str,
    unit_divisor: u32,
    remaining: Option<f64>,
    remaining_str: &'a str,
}

enum Value<'a> {
    Text(&'a str),
    Number(Option<f64>),
}

impl Fields<'_> {
    fn get(&self, key: Key) -> Value<'_> {
        match key {
            Key::LBar => Value::Text(self.l_bar),
            Key::RBar => Value::Text(self.r_bar),
            Key::N => Value::Number(Some(self.n)),
            Key::NFmt => Value::Text(self.n_fmt),
            Key::Total => Value::Number(self.total),
            Key::TotalFmt => Value::Text(self.total_fmt),
            Key::Percentage => Value::Number(Some(self.percentage)),
            Key::Elapsed => Value::Text(self.elapsed_str),
            Key::ElapsedS => Value::Number(Some(self.elapsed)),
            Key::Ncols => Value::Number(self.ncols.map(|c| c as f64)),
            Key::Nrows => Value::Number(self.nrows.map(|r| r as f64)),
            Key::Desc => Value::Text(self.desc),
            Key::Unit => Value::Text(self.unit),
            Key::Rate | Key::RateNoinv => Value::Number(self.rate),
            Key::RateFmt => Value::Text(self.rate_fmt),
            Key::RateNoinvFmt => Value::Text(self.rate_noinv_fmt),
            Key::RateInv => Value::Number(self.inv_rate),
            Key::RateInvFmt => Value::Text(self.rate_inv_fmt),
            Key::Postfix => Value::Text(self.postfix),
            Key::UnitDivisor => Value::Number(Some(f64::from(self.unit_divisor))),
            Key::Remaining => Value::Text(self.remaining_str),
            Key::RemainingS => Value::Number(self.remaining),
            Key::Bar => Value::Text(""),
        }
    }
}

/// Errors found while parsing a `bar_format` template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template key `{0}`")]
    UnknownKey(String),
    #[error("unclosed `{{` at byte {0}")]
    Unclosed(usize),
    #[error("unmatched `}}` at byte {0}")]
    UnmatchedBrace(usize),
    #[error("invalid format spec `{spec}` for key `{key}`")]
    InvalidSpec { key: String, spec: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    LBar,
    Bar,
    RBar,
    N,
    NFmt,
    Total,
    TotalFmt,
    Percentage,
    Elapsed,
    ElapsedS,
    Ncols,
    Nrows,
    Desc,
    Unit,
    Rate,
    RateFmt,
    RateNoinv,
    RateNoinvFmt,
    RateInv,
    RateInvFmt,
    Postfix,
    UnitDivisor,
    Remaining,
    RemainingS,
}

impl Key {
    fn from_name(name: &str) -> Option<Key> {
        Some(match name {
            "l_bar" => Key::LBar,
            "bar" => Key::Bar,
            "r_bar" => Key::RBar,
            "n" => Key::N,
            "n_fmt" => Key::NFmt,
            "total" => Key::Total,
            "total_fmt" => Key::TotalFmt,
            "percentage" => Key::Percentage,
            "elapsed" => Key::Elapsed,
            "elapsed_s" => Key::ElapsedS,
            "ncols" => Key::Ncols,
            "nrows" => Key::Nrows,
            "desc" => Key::Desc,
            "unit" => Key::Unit,
            "rate" => Key::Rate,
            "rate_fmt" => Key::RateFmt,
            "rate_noinv" => Key::RateNoinv,
            "rate_noinv_fmt" => Key::RateNoinvFmt,
            "rate_inv" => Key::RateInv,
            "rate_inv_fmt" => Key::RateInvFmt,
            "postfix" => Key::Postfix,
            "unit_divisor" => Key::UnitDivisor,
            "remaining" => Key::Remaining,
            "remaining_s" => Key::RemainingS,
            _ => return None,
        })
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            Key::N
                | Key::Total
                | Key::Percentage
                | Key::ElapsedS
                | Key::Ncols
                | Key::Nrows
                | Key::Rate
                | Key::RateNoinv
                | Key::RateInv
                | Key::UnitDivisor
                | Key::RemainingS
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    fill: char,
    align: Option<Alignment>,
    width: Option<usize>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FieldSpec {
    fn parse(key: &str, spec: &str, numeric: bool) -> Result<FieldSpec, TemplateError> {
        let invalid = || TemplateError::InvalidSpec {
            key: key.to_owned(),
            spec: spec.to_owned(),
        };

        let mut rest = spec;
        let mut fill = ' ';
        let mut align = None;
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(f), Some(a)) if alignment(a).is_some() => {
                fill = f;
                align = alignment(a);
                rest = &rest[f.len_utf8() + 1..];
            }
            (Some(a), _) if alignment(a).is_some() => {
                align = alignment(a);
                rest = &rest[1..];
            }
            _ => {}
        }

        let (width, after) = leading_number(rest);
        rest = after;
        let mut precision = None;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let (digits, after) = leading_number(after_dot);
            precision = Some(digits.ok_or_else(invalid)?);
            rest = after;
        }

        let kind = match rest {
            "" => None,
            "s" => Some('s'),
            "f" | "d" if numeric => rest.chars().next(),
            _ => return Err(invalid()),
        };

        Ok(FieldSpec {
            fill,
            align,
            width,
            precision,
            kind,
        })
    }

    fn apply(&self, value: Value<'_>) -> String {
        let (body, default_align) = match value {
            Value::Number(Some(x)) => {
                let body = match (self.precision, self.kind) {
                    (Some(p), _) => format!("{:.*}", p, x),
                    (None, Some('d')) => format!("{}", x.round() as i64),
                    (None, Some('f')) => format!("{:.6}", x),
                    _ => format_count(x),
                };
                (body, Alignment::Right)
            }
            Value::Number(None) => ("?".to_owned(), Alignment::Right),
            Value::Text(s) => {
                let body = match self.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s.to_owned(),
                };
                (body, Alignment::Left)
            }
        };

        match self.width {
            Some(width) => {
                pad_str(&body, width, self.align.unwrap_or(default_align), self.fill).into_owned()
            }
            None => body,
        }
    }
}

fn alignment(c: char) -> Option<Alignment> {
    match c {
        '<' => Some(Alignment::Left),
        '^' => Some(Alignment::Center),
        '>' => Some(Alignment::Right),
        _ => None,
    }
}

fn leading_number(s: &str) -> (Option<usize>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (s[..end].parse().ok(), &s[end..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarWidth {
    Auto,
    Fixed(usize),
    Shrink(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct BarSpec {
    width: BarWidth,
    charset: Option<Charset>,
}

impl BarSpec {
    fn parse(spec: &str) -> Result<BarSpec, TemplateError> {
        let invalid = || TemplateError::InvalidSpec {
            key: "bar".to_owned(),
            spec: spec.to_owned(),
        };

        let (rest, charset) = match spec.chars().last() {
            Some('a') => (&spec[..spec.len() - 1], Some(Charset::Ascii)),
            Some('u') => (&spec[..spec.len() - 1], Some(Charset::Unicode)),
            Some('b') => (&spec[..spec.len() - 1], Some(Charset::Blank)),
            _ => (spec, None),
        };

        let width = match rest.strip_prefix('-') {
            _ if rest.is_empty() => BarWidth::Auto,
            Some(digits) => BarWidth::Shrink(digits.parse().map_err(|_| invalid())?),
            None => BarWidth::Fixed(rest.parse().map_err(|_| invalid())?),
        };
        Ok(BarSpec { width, charset })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Field(Key, FieldSpec),
    Bar(BarSpec),
}

/// A parsed `bar_format` template.
///
/// Fields are written `{key}` or `{key:spec}` with `spec` being
/// `[[fill]align][width][.precision][type]`, `align` one of `<`, `^`, `>` and
/// `type` one of `s`, `f`, `d`. `{{` and `}}` are literal braces. The `bar`
/// field takes its own spec: `{bar:N}` is a fixed width, `{bar:-N}` shrinks
/// the automatic width by `N`, and a trailing `a`, `u` or `b` forces the
/// ASCII, unicode or blank glyphs.
///
/// When the description is empty, a `": "` directly after `{desc}` is
/// dropped as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Template, TemplateError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let start = idx + 1;
                    let end = loop {
                        match chars.next() {
                            Some((end, '}')) => break end,
                            Some(_) => {}
                            None => return Err(TemplateError::Unclosed(idx)),
                        }
                    };
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(parse_field(&source[start..end])?);
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace(idx)),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(Template {
            source: source.to_owned(),
            pieces,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_bar(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p, Piece::Bar(_)))
    }

    fn expand(&self, fields: &Fields<'_>, mut bar: impl FnMut(&BarSpec) -> String) -> String {
        let mut out = String::new();
        let mut skip_colon = false;
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => {
                    let text = match skip_colon {
                        true => text.strip_prefix(": ").unwrap_or(text),
                        false => text,
                    };
                    out.push_str(text);
                }
                Piece::Field(key, spec) => out.push_str(&spec.apply(fields.get(*key))),
                Piece::Bar(spec) => out.push_str(&bar(spec)),
            }
            skip_colon = matches!(piece, Piece::Field(Key::Desc, _)) && fields.desc.is_empty();
        }
        out
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Template, TemplateError> {
        Template::parse(s)
    }
}

fn parse_field(field: &str) -> Result<Piece, TemplateError> {
    let (name, spec) = field.split_once(':').unwrap_or((field, ""));
    let key = Key::from_name(name).ok_or_else(|| TemplateError::UnknownKey(name.to_owned()))?;
    match key {
        Key::Bar => Ok(Piece::Bar(BarSpec::parse(spec)?)),
        key => Ok(Piece::Field(
            key,
            FieldSpec::parse(name, spec, key.is_numeric())?,
        )),
    }
}
