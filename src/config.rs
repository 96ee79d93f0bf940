use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::draw_target::{ProgressDrawTarget, Renderer};
use crate::multi::Registry;
use crate::style::{Charset, Template, TemplateError, UnitScale};
use crate::utils::{warn, Warning};

/// Prefix of the environment variables read by [`BarConfig::from_env`].
pub const ENV_PREFIX: &str = "PROGMETER_";

/// Errors raised while building a bar. Every variant names the option at
/// fault.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("invalid value `{value}` for option `{option}`, expected {expected}")]
    InvalidValue {
        option: String,
        value: String,
        expected: &'static str,
    },
    #[error("option `{option}` out of range: {reason}")]
    OutOfRange { option: String, reason: String },
    #[error("option `bar_format`: {0}")]
    Template(#[from] TemplateError),
}

/// Construction options of a progress bar.
///
/// Values are resolved in the order explicit setter, environment variable,
/// default: start from [`BarConfig::from_env`] (or [`BarConfig::default`]
/// to ignore the environment) and chain setters on top.
///
/// ```
/// use progmeter::BarConfig;
///
/// let config = BarConfig::default()
///     .desc("download")
///     .total(1024.0)
///     .unit("B")
///     .unit_scale(true);
/// assert_eq!(config.unit, "B");
/// ```
#[derive(Debug, Clone)]
pub struct BarConfig {
    /// Prefix shown before the meter.
    pub desc: String,
    /// Expected number of items; `None` or a non-finite value means unknown.
    pub total: Option<f64>,
    /// Keep the final line on screen after closing.
    pub leave: bool,
    /// Output backend, stderr when unset.
    pub renderer: Option<Arc<dyn Renderer>>,
    /// Fixed column budget; queried from the output when unset.
    pub ncols: Option<usize>,
    /// Rows available for stacked bars; queried from the output when unset.
    pub nrows: Option<usize>,
    pub mininterval: Duration,
    pub maxinterval: Duration,
    /// Pins the iteration throttle; unset lets it tune itself.
    pub miniters: Option<f64>,
    /// Bar glyphs; detected from the locale when unset.
    pub ascii: Option<Charset>,
    pub unit: String,
    pub unit_scale: UnitScale,
    pub unit_divisor: u32,
    /// Re-query the output width on every repaint.
    pub dynamic_ncols: bool,
    /// Weight of the newest sample in the rate average, 0 for the plain
    /// average over the whole run.
    pub smoothing: f64,
    pub initial: f64,
    /// Fixed row; assigned automatically when unset.
    pub position: Option<usize>,
    pub postfix: Option<String>,
    pub bar_format: Option<String>,
    /// Bar colour, a basic colour name or `#rrggbb`.
    pub colour: Option<String>,
    /// Stay silent until the bar has been running this long.
    pub delay: Duration,
    /// `Some(true)` counts silently, `None` disables output when it does not
    /// go to a terminal.
    pub disable: Option<bool>,
    /// Registry the bar joins, the process-wide one when unset.
    pub registry: Option<Arc<Registry>>,
}

impl Default for BarConfig {
    fn default() -> BarConfig {
        BarConfig {
            desc: String::new(),
            total: None,
            leave: true,
            renderer: None,
            ncols: None,
            nrows: None,
            mininterval: Duration::from_millis(100),
            maxinterval: Duration::from_secs(10),
            miniters: None,
            ascii: None,
            unit: "it".to_owned(),
            unit_scale: UnitScale::Off,
            unit_divisor: 1000,
            dynamic_ncols: false,
            smoothing: 0.3,
            initial: 0.0,
            position: None,
            postfix: None,
            bar_format: None,
            colour: None,
            delay: Duration::ZERO,
            disable: Some(false),
            registry: None,
        }
    }
}

impl BarConfig {
    /// Defaults overridden by `PROGMETER_<OPTION>` environment variables.
    pub fn from_env() -> Result<BarConfig, ConfigError> {
        BarConfig::from_vars(std::env::vars())
    }

    /// Defaults overridden by `PROGMETER_<OPTION>` entries of `vars`.
    ///
    /// Variables without the prefix are skipped, unknown options after the
    /// prefix are logged and skipped, malformed values are errors.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Result<BarConfig, ConfigError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = BarConfig::default();
        for (key, value) in vars {
            let key = key.as_ref();
            let option = match key.strip_prefix(ENV_PREFIX) {
                Some(option) => option.to_ascii_lowercase(),
                None => continue,
            };
            match config.set(&option, value.as_ref()) {
                Err(ConfigError::UnknownOption(_)) => {
                    log::debug!("ignoring unrecognised variable {}", key)
                }
                res => res?,
            }
        }
        Ok(config)
    }

    /// Sets an option from its textual form.
    ///
    /// Optional values accept `none` (or an empty string) to unset them.
    /// Durations are seconds, booleans accept `true`/`false`, `yes`/`no`,
    /// `on`/`off` and `1`/`0`.
    pub fn set(&mut self, option: &str, value: &str) -> Result<(), ConfigError> {
        let option = option.trim().to_ascii_lowercase();
        let v = value.trim();
        match option.as_str() {
            "desc" => self.desc = value.to_owned(),
            "total" => self.total = optional(v, |v| parse_f64("total", v))?,
            "leave" => self.leave = parse_bool("leave", v)?,
            "file" | "target" => {
                let target = match v.to_ascii_lowercase().as_str() {
                    "stderr" => ProgressDrawTarget::stderr(),
                    "stdout" => ProgressDrawTarget::stdout(),
                    "hidden" | "null" => ProgressDrawTarget::hidden(),
                    _ => return Err(invalid(&option, v, "`stderr`, `stdout` or `hidden`")),
                };
                self.renderer = Some(Arc::new(target));
            }
            "ncols" => self.ncols = optional(v, |v| parse_usize("ncols", v))?,
            "nrows" => self.nrows = optional(v, |v| parse_usize("nrows", v))?,
            "mininterval" => self.mininterval = parse_secs("mininterval", v)?,
            "maxinterval" => self.maxinterval = parse_secs("maxinterval", v)?,
            "miniters" => self.miniters = optional(v, |v| parse_f64("miniters", v))?,
            "ascii" => {
                self.ascii = optional(v, |v| {
                    Ok(match parse_bool("ascii", v) {
                        Ok(true) => Charset::Ascii,
                        Ok(false) => Charset::Unicode,
                        // a leading space is the empty-cell glyph
                        Err(_) => Charset::Custom(value.chars().collect()),
                    })
                })?
            }
            "unit" => self.unit = value.to_owned(),
            "unit_scale" => {
                self.unit_scale = match parse_bool("unit_scale", v) {
                    Ok(on) => UnitScale::from(on),
                    Err(_) => UnitScale::Factor(
                        parse_f64("unit_scale", v)
                            .map_err(|_| invalid("unit_scale", v, "a boolean or a number"))?,
                    ),
                }
            }
            "unit_divisor" => {
                self.unit_divisor = v
                    .parse()
                    .map_err(|_| invalid("unit_divisor", v, "1000 or 1024"))?
            }
            "dynamic_ncols" => self.dynamic_ncols = parse_bool("dynamic_ncols", v)?,
            "smoothing" => self.smoothing = parse_f64("smoothing", v)?,
            "initial" => self.initial = parse_f64("initial", v)?,
            "position" => self.position = optional(v, |v| parse_usize("position", v))?,
            "postfix" => self.postfix = optional(value, |v| Ok(v.to_owned()))?,
            "bar_format" => self.bar_format = optional(value, |v| Ok(v.to_owned()))?,
            "colour" | "color" => self.colour = optional(v, |v| Ok(v.to_owned()))?,
            "delay" => self.delay = parse_secs("delay", v)?,
            "disable" => {
                self.disable = optional(v, |v| parse_bool("disable", v))?;
            }
            "nested" => {
                parse_bool("nested", v)?;
                warn_nested();
            }
            _ => return Err(ConfigError::UnknownOption(option)),
        }
        Ok(())
    }

    /// Checks value ranges and parses the template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(out_of_range("smoothing", "must lie in [0, 1]"));
        }
        if self.unit_divisor != 1000 && self.unit_divisor != 1024 {
            return Err(out_of_range("unit_divisor", "must be 1000 or 1024"));
        }
        if let Some(miniters) = self.miniters {
            if !miniters.is_finite() || miniters < 0.0 {
                return Err(out_of_range("miniters", "must be a non-negative number"));
            }
        }
        if let UnitScale::Factor(factor) = self.unit_scale {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(out_of_range("unit_scale", "factor must be positive"));
            }
        }
        if matches!(self.total, Some(total) if total < 0.0) {
            return Err(out_of_range("total", "must not be negative"));
        }
        if !self.initial.is_finite() {
            return Err(out_of_range("initial", "must be finite"));
        }
        if matches!(&self.ascii, Some(Charset::Custom(symbols)) if symbols.len() < 2) {
            return Err(out_of_range("ascii", "needs at least two symbols"));
        }
        self.template()?;
        Ok(())
    }

    pub(crate) fn template(&self) -> Result<Option<Template>, ConfigError> {
        match &self.bar_format {
            Some(source) => Ok(Some(Template::parse(source)?)),
            None => Ok(None),
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn total(mut self, total: impl Into<Option<f64>>) -> Self {
        self.total = total.into();
        self
    }

    pub fn leave(mut self, leave: bool) -> Self {
        self.leave = leave;
        self
    }

    /// Draw to the given target.
    pub fn target(mut self, target: ProgressDrawTarget) -> Self {
        self.renderer = Some(Arc::new(target));
        self
    }

    /// Draw through a custom backend.
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn ncols(mut self, ncols: impl Into<Option<usize>>) -> Self {
        self.ncols = ncols.into();
        self
    }

    pub fn nrows(mut self, nrows: impl Into<Option<usize>>) -> Self {
        self.nrows = nrows.into();
        self
    }

    pub fn mininterval(mut self, interval: Duration) -> Self {
        self.mininterval = interval;
        self
    }

    pub fn maxinterval(mut self, interval: Duration) -> Self {
        self.maxinterval = interval;
        self
    }

    pub fn miniters(mut self, miniters: impl Into<Option<f64>>) -> Self {
        self.miniters = miniters.into();
        self
    }

    pub fn ascii(mut self, charset: impl Into<Option<Charset>>) -> Self {
        self.ascii = charset.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn unit_scale(mut self, scale: impl Into<UnitScale>) -> Self {
        self.unit_scale = scale.into();
        self
    }

    pub fn unit_divisor(mut self, divisor: u32) -> Self {
        self.unit_divisor = divisor;
        self
    }

    pub fn dynamic_ncols(mut self, dynamic: bool) -> Self {
        self.dynamic_ncols = dynamic;
        self
    }

    pub fn smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn initial(mut self, initial: f64) -> Self {
        self.initial = initial;
        self
    }

    pub fn position(mut self, position: impl Into<Option<usize>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = Some(postfix.into());
        self
    }

    pub fn bar_format(mut self, template: impl Into<String>) -> Self {
        self.bar_format = Some(template.into());
        self
    }

    pub fn colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn disable(mut self, disable: impl Into<Option<bool>>) -> Self {
        self.disable = disable.into();
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Nested bars are positioned automatically; this has no effect.
    #[deprecated(note = "positions are assigned automatically")]
    pub fn nested(self, _nested: bool) -> Self {
        warn_nested();
        self
    }
}

fn warn_nested() {
    warn(
        Warning::Deprecated,
        format_args!("the `nested` option is ignored, positions are assigned automatically"),
    );
}

fn optional<T>(
    v: &str,
    parse: impl FnOnce(&str) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    if v.is_empty() || v.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse(v).map(Some)
    }
}

fn invalid(option: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        option: option.to_owned(),
        value: value.to_owned(),
        expected,
    }
}

fn out_of_range(option: &str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        option: option.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_bool(option: &str, v: &str) -> Result<bool, ConfigError> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(option, v, "a boolean")),
    }
}

fn parse_f64(option: &str, v: &str) -> Result<f64, ConfigError> {
    match v.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(invalid(option, v, "a finite number")),
    }
}

fn parse_usize(option: &str, v: &str) -> Result<usize, ConfigError> {
    v.parse().map_err(|_| invalid(option, v, "a non-negative integer"))
}

fn parse_secs(option: &str, v: &str) -> Result<Duration, ConfigError> {
    parse_f64(option, v)
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(option, v, "a non-negative number of seconds"))
}
