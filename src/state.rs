use std::sync::{Arc, Weak};
use std::thread::panicking;
use std::time::Duration;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use parking_lot::Mutex;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::config::BarConfig;
use crate::draw_target::{Frame, ProgressDrawTarget, Renderer};
use crate::multi::{MemberId, Registry};
use crate::style::{format_meter, Charset, Colour, Meter, Template, UnitScale};
use crate::utils::{warn, Ema, Warning};

/// Rows assumed for stacking when neither the config nor the output knows.
const DEFAULT_NROWS: usize = 20;

/// Where a bar is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The screen shows the latest count.
    Idle,
    /// Updates arrived that were not painted yet.
    Sampling,
    /// The monitor dropped the throttle to repaint a stalled bar.
    ForcedByMonitor,
    /// Closed for good.
    Closed,
}

/// Counters and throttling state of a bar.
#[derive(Debug, Clone)]
pub(crate) struct ProgressState {
    pub(crate) n: f64,
    pub(crate) total: Option<f64>,
    pub(crate) initial: f64,
    pub(crate) start_t: Instant,
    pub(crate) last_print_t: Instant,
    pub(crate) last_print_n: f64,
    pub(crate) miniters: f64,
    pub(crate) dynamic_miniters: bool,
    pub(crate) mininterval: Duration,
    pub(crate) maxinterval: Duration,
    pub(crate) delay: Duration,
    pub(crate) smoothing: f64,
    /// Seconds per item.
    pub(crate) avg_time: Ema,
    pub(crate) ema_miniters: Ema,
    pub(crate) disabled: bool,
    pub(crate) leave: bool,
}

impl ProgressState {
    fn new(config: &BarConfig, disabled: bool, now: Instant) -> ProgressState {
        ProgressState {
            n: config.initial,
            total: config.total.filter(|t| t.is_finite()),
            initial: config.initial,
            start_t: now,
            last_print_t: now,
            last_print_n: config.initial,
            miniters: config.miniters.unwrap_or(0.0),
            dynamic_miniters: config.miniters.is_none(),
            mininterval: config.mininterval,
            maxinterval: config.maxinterval,
            delay: config.delay,
            smoothing: config.smoothing,
            avg_time: Ema::new(config.smoothing),
            ema_miniters: Ema::new(config.smoothing),
            disabled,
            leave: config.leave,
        }
    }

    /// Smoothed items per second, `None` before the first sample or when
    /// smoothing is off.
    pub(crate) fn rate(&self) -> Option<f64> {
        if self.smoothing <= 0.0 {
            return None;
        }
        self.avg_time.value().filter(|t| *t > 0.0).map(|t| 1.0 / t)
    }

    pub(crate) fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_t)
    }

    fn tune_miniters(&mut self, dn: f64, dt: f64) {
        let mininterval = self.mininterval.as_secs_f64();
        let maxinterval = self.maxinterval.as_secs_f64();
        if maxinterval > 0.0 && dt >= maxinterval {
            let interval = if mininterval > 0.0 {
                mininterval
            } else {
                maxinterval
            };
            self.miniters = dn * interval / dt;
        } else if self.smoothing > 0.0 {
            let target = if mininterval > 0.0 && dt > 0.0 {
                dn * mininterval / dt
            } else {
                dn
            };
            self.miniters = self.ema_miniters.update(target);
        } else {
            self.miniters = self.miniters.max(dn);
        }
    }
}

/// What a bar looks like, as opposed to where it stands.
#[derive(Debug, Clone)]
pub(crate) struct Appearance {
    pub(crate) desc: String,
    pub(crate) postfix: Option<String>,
    pub(crate) unit: String,
    pub(crate) unit_scale: UnitScale,
    pub(crate) unit_divisor: u32,
    pub(crate) charset: Charset,
    pub(crate) ncols: Option<usize>,
    pub(crate) dynamic_ncols: bool,
    pub(crate) nrows: usize,
    pub(crate) template: Option<Template>,
    pub(crate) colour: Option<Colour>,
}

pub(crate) struct BarState {
    pub(crate) state: ProgressState,
    pub(crate) look: Appearance,
    renderer: Arc<dyn Renderer>,
    registry: Arc<Registry>,
    requested_position: Option<usize>,
    member: Option<MemberId>,
    phase: Phase,
    clamp_warned: bool,
}

impl BarState {
    /// Resolves `config` against its output. `config` must have been
    /// validated and `template` parsed from it.
    pub(crate) fn new(config: BarConfig, template: Option<Template>, now: Instant) -> BarState {
        let renderer = match &config.renderer {
            Some(renderer) => renderer.clone(),
            None => Arc::new(ProgressDrawTarget::stderr()),
        };
        let registry = match &config.registry {
            Some(registry) => registry.clone(),
            None => Registry::global(),
        };
        let disabled = renderer.is_hidden()
            || config.disable.unwrap_or_else(|| !renderer.is_terminal());

        let colour = match &config.colour {
            Some(name) => {
                let colour = Colour::parse(name);
                if colour.is_none() {
                    warn(
                        Warning::Runtime,
                        format_args!("unknown colour `{}`, drawing without colour", name),
                    );
                }
                colour
            }
            None => None,
        };

        let look = Appearance {
            desc: config.desc.clone(),
            postfix: config.postfix.clone(),
            unit: config.unit.clone(),
            unit_scale: config.unit_scale,
            unit_divisor: config.unit_divisor,
            charset: config.ascii.clone().unwrap_or_else(Charset::detect),
            ncols: config.ncols.or_else(|| renderer.width()),
            dynamic_ncols: config.dynamic_ncols,
            nrows: config
                .nrows
                .or_else(|| renderer.height())
                .unwrap_or(DEFAULT_NROWS)
                .max(1),
            template,
            colour,
        };

        BarState {
            state: ProgressState::new(&config, disabled, now),
            look,
            renderer,
            registry,
            requested_position: config.position,
            member: None,
            phase: Phase::Idle,
            clamp_warned: false,
        }
    }

    /// Joins the registry and paints the first frame.
    pub(crate) fn attach(&mut self, bar: Weak<Mutex<BarState>>, now: Instant) {
        if self.state.disabled || self.member.is_some() {
            return;
        }
        let (id, _) = self.registry.register(
            self.requested_position,
            self.renderer.clone(),
            bar,
            self.look.nrows,
        );
        self.member = Some(id);
        if self.state.delay.is_zero() {
            self.refresh(now);
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn position(&self) -> Option<usize> {
        self.member.and_then(|id| self.registry.position(id))
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Adds `delta` to the count and repaints if both throttles allow it.
    ///
    /// `now` is only called once the iteration throttle has passed, so a
    /// sampled update never reads the clock. Returns whether a frame was
    /// painted.
    pub(crate) fn update(&mut self, now: impl FnOnce() -> Instant, delta: f64) -> bool {
        if self.phase == Phase::Closed {
            return false;
        }
        let state = &mut self.state;
        if delta < 0.0 {
            state.last_print_n += delta;
        }
        let prev = state.n;
        state.n += delta;
        if state.disabled {
            return false;
        }

        let delta_it = state.n - state.last_print_n;
        // reaching the total always gets past the iteration throttle
        let finishing = matches!(state.total, Some(total) if prev < total && state.n >= total);
        if delta_it < state.miniters && !finishing {
            self.phase = Phase::Sampling;
            return false;
        }

        let now = now();
        let delta_t = now.saturating_duration_since(state.last_print_t);
        if delta_t < state.mininterval || state.elapsed(now) < state.delay {
            self.phase = Phase::Sampling;
            return false;
        }

        let dt = delta_t.as_secs_f64();
        if state.smoothing > 0.0 && dt > 0.0 && delta_it > 0.0 {
            state.avg_time.update(dt / delta_it);
        }
        if state.dynamic_miniters {
            state.tune_miniters(delta_it, dt);
        }

        self.refresh(now);
        self.state.last_print_n = self.state.n;
        self.state.last_print_t = now;
        self.phase = Phase::Idle;
        true
    }

    /// Repaints unconditionally, leaving the throttles alone.
    pub(crate) fn refresh(&mut self, now: Instant) {
        let rate = self.state.rate();
        self.draw(now, rate);
    }

    fn draw(&mut self, now: Instant, rate: Option<f64>) {
        let id = match self.member {
            Some(id) => id,
            None => return,
        };
        if self.state.elapsed(now) < self.state.delay {
            return;
        }
        let frame = self.frame(now, rate);
        self.registry.draw(id, frame).ok();
    }

    fn frame(&mut self, now: Instant, rate: Option<f64>) -> Frame {
        let meter = self.meter(now, rate);
        let clamped = meter.needs_clamp();
        let frame = self.renderer.render(&meter);

        if !clamped {
            self.clamp_warned = false;
        } else if !self.clamp_warned {
            self.clamp_warned = true;
            warn(
                Warning::Runtime,
                format_args!(
                    "count {} is outside 0..={}, clamping the bar",
                    self.state.n,
                    self.state.total.unwrap_or_default()
                ),
            );
        }
        frame
    }

    pub(crate) fn meter(&self, now: Instant, rate: Option<f64>) -> Meter<'_> {
        let look = &self.look;
        let ncols = if look.dynamic_ncols {
            self.renderer.width().or(look.ncols)
        } else {
            look.ncols
        };
        Meter {
            n: self.state.n,
            total: self.state.total,
            elapsed: self.state.elapsed(now).as_secs_f64(),
            ncols,
            nrows: Some(look.nrows),
            prefix: &look.desc,
            charset: &look.charset,
            unit: &look.unit,
            unit_scale: look.unit_scale,
            unit_divisor: look.unit_divisor,
            rate,
            template: look.template.as_ref(),
            postfix: look.postfix.as_deref(),
            initial: self.state.initial,
            colour: look.colour.as_ref(),
        }
    }

    /// The line the bar would paint right now.
    pub(crate) fn line(&self, now: Instant) -> String {
        format_meter(&self.meter(now, self.state.rate()))
    }

    /// Drops the iteration throttle if the bar has not painted for longer
    /// than `maxinterval`. Returns whether it repainted.
    pub(crate) fn force_if_stalled(&mut self, now: Instant) -> bool {
        if self.phase == Phase::Closed || self.state.disabled || self.member.is_none() {
            return false;
        }
        let state = &mut self.state;
        if state.maxinterval.is_zero() || state.miniters <= 1.0 {
            return false;
        }
        if now.saturating_duration_since(state.last_print_t) < state.maxinterval {
            return false;
        }
        state.miniters = 1.0;
        self.phase = Phase::ForcedByMonitor;
        self.refresh(now);
        true
    }

    /// Final paint and release of the row. Safe to call repeatedly.
    pub(crate) fn close(&mut self, now: Instant) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;
        let id = match self.member.take() {
            Some(id) => id,
            None => return,
        };

        let leave = self.state.leave;
        // the final frame reports the average over the whole run
        let mut last = None;
        if leave && !panicking() && self.state.elapsed(now) >= self.state.delay {
            last = Some(self.frame(now, None));
        }
        self.registry.unregister(id, last, leave).ok();
        self.state.last_print_n = self.state.n;
        self.state.last_print_t = now;
    }

    /// Starts counting again from zero, optionally with a new total.
    pub(crate) fn reset(&mut self, now: Instant, total: Option<f64>) {
        if self.phase == Phase::Closed {
            return;
        }
        let state = &mut self.state;
        state.n = 0.0;
        state.initial = 0.0;
        state.last_print_n = 0.0;
        state.start_t = now;
        state.last_print_t = now;
        state.avg_time = Ema::new(state.smoothing);
        state.ema_miniters = Ema::new(state.smoothing);
        if state.dynamic_miniters {
            state.miniters = 0.0;
        }
        if let Some(total) = total {
            state.total = Some(total).filter(|t| t.is_finite());
        }
        self.phase = Phase::Idle;
        self.refresh(now);
    }

    pub(crate) fn set_total(&mut self, now: Instant, total: Option<f64>) {
        self.state.total = total.filter(|t| t.is_finite());
        self.refresh_open(now);
    }

    pub(crate) fn set_description(&mut self, now: Instant, desc: String, refresh: bool) {
        self.look.desc = desc;
        if refresh {
            self.refresh_open(now);
        }
    }

    pub(crate) fn set_postfix(&mut self, now: Instant, postfix: Option<String>, refresh: bool) {
        self.look.postfix = postfix;
        if refresh {
            self.refresh_open(now);
        }
    }

    fn refresh_open(&mut self, now: Instant) {
        if self.phase != Phase::Closed {
            self.refresh(now);
        }
    }

    /// Shifts the start time so the time since the last paint does not
    /// count as elapsed.
    pub(crate) fn unpause(&mut self, now: Instant) {
        if self.phase == Phase::Closed || self.state.disabled {
            return;
        }
        let paused = now.saturating_duration_since(self.state.last_print_t);
        self.state.start_t += paused;
        self.state.last_print_t = now;
    }

    /// Blanks the bar's row until the next repaint.
    pub(crate) fn clear(&mut self) {
        if let Some(id) = self.member {
            self.registry.clear(id).ok();
        }
    }

    /// Paints `msg` in the bar's row instead of the meter.
    pub(crate) fn display_message(&mut self, msg: &str) {
        if let Some(id) = self.member {
            self.registry.draw(id, Frame::new(msg.to_owned())).ok();
        }
    }
}

impl Drop for BarState {
    fn drop(&mut self) {
        self.close(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::draw_target::Slot;
    use crate::ProgressBar;

    #[derive(Debug, Default)]
    struct Frames {
        lines: Mutex<Vec<String>>,
    }

    impl Frames {
        fn count(&self) -> usize {
            self.lines.lock().len()
        }

        fn last(&self) -> String {
            self.lines.lock().last().cloned().unwrap_or_default()
        }
    }

    impl Renderer for Frames {
        fn present(&self, frame: &Frame, slot: &mut Slot) -> io::Result<()> {
            self.lines.lock().push(frame.line.clone());
            slot.shown = true;
            Ok(())
        }

        fn clear(&self, _: &mut Slot) -> io::Result<()> {
            Ok(())
        }

        fn teardown(&self, last: Option<&Frame>, _: bool, _: &mut Slot) -> io::Result<()> {
            if let Some(frame) = last {
                self.lines.lock().push(frame.line.clone());
            }
            Ok(())
        }

        fn write_line(&self, _: &str) -> io::Result<()> {
            Ok(())
        }
    }

    fn bar(config: BarConfig, t0: Instant) -> (ProgressBar, Arc<Frames>) {
        let frames = Arc::new(Frames::default());
        let config = config
            .renderer(frames.clone())
            .registry(Registry::with_monitor_interval(Duration::ZERO))
            .ascii(Charset::Ascii);
        (ProgressBar::with_config_at(config, t0).unwrap(), frames)
    }

    fn secs(t: f64) -> Duration {
        Duration::from_secs_f64(t)
    }

    #[test]
    fn first_frame_painted_on_creation() {
        let t0 = Instant::now();
        let (_pb, frames) = bar(BarConfig::default().total(10.0), t0);
        assert_eq!(frames.count(), 1);
        assert!(frames.last().starts_with("  0%|"));
    }

    #[test]
    fn delay_postpones_first_frame() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().delay(secs(1.0)), t0);
        assert_eq!(frames.count(), 0);
        assert!(!pb.state().update(|| t0 + secs(0.5), 1.0));
        assert!(pb.state().update(|| t0 + secs(1.5), 1.0));
        assert_eq!(frames.count(), 1);
    }

    #[test]
    fn mininterval_throttles_repaints() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().total(100.0).miniters(0.0), t0);
        let mut state = pb.state();
        assert!(!state.update(|| t0 + secs(0.05), 1.0));
        assert_eq!(state.phase(), Phase::Sampling);
        assert!(state.update(|| t0 + secs(0.2), 1.0));
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.state.last_print_n, 2.0);
        drop(state);
        assert_eq!(frames.count(), 2);
    }

    #[test]
    fn fixed_miniters_paint_every_other_update() {
        let t0 = Instant::now();
        let (pb, frames) = bar(
            BarConfig::default().miniters(2.0).mininterval(Duration::ZERO),
            t0,
        );
        let mut state = pb.state();
        let painted = (1..=6)
            .map(|i| state.update(|| t0 + secs(i as f64), 1.0))
            .collect::<Vec<_>>();
        assert_eq!(painted, vec![false, true, false, true, false, true]);
        assert_eq!(state.state.miniters, 2.0);
        drop(state);
        assert_eq!(frames.count(), 4);
    }

    #[test]
    fn sampled_updates_never_read_the_clock() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(
            BarConfig::default()
                .total(5000.0)
                .miniters(1000.0)
                .mininterval(Duration::ZERO),
            t0,
        );
        let reads = std::cell::Cell::new(0);
        let clock = || {
            reads.set(reads.get() + 1);
            t0 + secs(1.0)
        };

        let mut state = pb.state();
        for _ in 0..999 {
            assert!(!state.update(clock, 1.0));
        }
        assert_eq!(reads.get(), 0);
        assert_eq!(state.phase(), Phase::Sampling);

        assert!(state.update(clock, 1.0));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn reaching_total_passes_iteration_throttle() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(
            BarConfig::default()
                .total(3.0)
                .miniters(100.0)
                .mininterval(Duration::ZERO),
            t0,
        );
        let mut state = pb.state();
        assert!(!state.update(|| t0 + secs(1.0), 1.0));
        assert!(!state.update(|| t0 + secs(2.0), 1.0));
        assert!(state.update(|| t0 + secs(3.0), 1.0));
    }

    #[test]
    fn dynamic_miniters_tracks_rate() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default().smoothing(1.0), t0);
        let mut state = pb.state();
        // 50 items in half a second at mininterval 0.1s: 10 items per repaint
        assert!(state.update(|| t0 + secs(0.5), 50.0));
        assert!((state.state.miniters - 10.0).abs() < 1e-9);
        assert!(!state.update(|| t0 + secs(0.55), 5.0));
        assert!(state.update(|| t0 + secs(0.7), 5.0));
    }

    #[test]
    fn long_gap_rescales_miniters() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default(), t0);
        let mut state = pb.state();
        assert!(state.update(|| t0 + secs(20.0), 40.0));
        // 40 items in 20s scaled to one mininterval
        assert!((state.state.miniters - 0.2).abs() < 1e-9);
    }

    #[test]
    fn zero_smoothing_ratchets_miniters() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default().smoothing(0.0), t0);
        let mut state = pb.state();
        assert!(state.update(|| t0 + secs(1.0), 7.0));
        assert_eq!(state.state.miniters, 7.0);
        assert!(state.update(|| t0 + secs(2.0), 9.0));
        assert_eq!(state.state.miniters, 9.0);
        assert!(!state.update(|| t0 + secs(3.0), 3.0));
        assert_eq!(state.state.rate(), None);
    }

    #[test]
    fn smoothed_rate_follows_samples() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default().miniters(0.0), t0);
        let mut state = pb.state();
        state.update(|| t0 + secs(1.0), 10.0);
        assert_eq!(state.state.rate(), Some(10.0));
        // second sample at 20 it/s: 0.3 * 0.05 + 0.7 * 0.1 = 0.085 s/it
        state.update(|| t0 + secs(2.0), 20.0);
        let rate = state.state.rate().unwrap();
        assert!((rate - 1.0 / 0.085).abs() < 1e-9);
    }

    #[test]
    fn negative_delta_moves_last_print() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default().miniters(5.0), t0);
        let mut state = pb.state();
        state.update(|| t0 + secs(1.0), -3.0);
        assert_eq!(state.state.n, -3.0);
        assert_eq!(state.state.last_print_n, -3.0);
    }

    #[test]
    fn disabled_bar_counts_silently() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().disable(true), t0);
        assert!(!pb.state().update(|| t0 + secs(1.0), 4.0));
        assert_eq!(pb.n(), 4.0);
        assert_eq!(frames.count(), 0);
        assert_eq!(pb.position(), None);
    }

    #[test]
    fn monitor_forces_stalled_bar() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().miniters(1000.0).total(5000.0), t0);
        pb.state().update(|| t0 + secs(1.0), 5.0);
        assert_eq!(frames.count(), 1);

        let registry = pb.state().registry().clone();
        assert_eq!(registry.poll_stalled(t0 + secs(5.0)), 0);
        assert_eq!(registry.poll_stalled(t0 + secs(10.0)), 1);
        assert_eq!(pb.phase(), Phase::ForcedByMonitor);
        assert_eq!(pb.state().state.miniters, 1.0);
        assert_eq!(frames.count(), 2);
        assert!(frames.last().contains("5/5000"));

        // the throttle is down, so nothing to force any more
        assert_eq!(registry.poll_stalled(t0 + secs(30.0)), 0);
        assert!(pb.state().update(|| t0 + secs(31.0), 1.0));
        assert_eq!(pb.phase(), Phase::Idle);
    }

    #[test]
    fn close_paints_run_average_once() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().total(4.0).miniters(0.0), t0);
        pb.state().update(|| t0 + secs(1.0), 2.0);
        pb.state().update(|| t0 + secs(4.0), 2.0);
        pb.state().close(t0 + secs(4.0));
        assert!(frames.last().ends_with(" 1.00it/s]"), "{}", frames.last());
        let count = frames.count();
        pb.state().close(t0 + secs(5.0));
        assert_eq!(frames.count(), count);
        assert!(!pb.state().update(|| t0 + secs(6.0), 1.0));
        assert_eq!(pb.phase(), Phase::Closed);
    }

    #[test]
    fn reset_restarts_counting() {
        let t0 = Instant::now();
        let (pb, frames) = bar(BarConfig::default().total(10.0).initial(3.0), t0);
        pb.state().update(|| t0 + secs(1.0), 2.0);
        pb.state().reset(t0 + secs(2.0), Some(20.0));
        let state = pb.state();
        assert_eq!(state.state.n, 0.0);
        assert_eq!(state.state.initial, 0.0);
        assert_eq!(state.state.total, Some(20.0));
        assert_eq!(state.state.start_t, t0 + secs(2.0));
        assert_eq!(state.state.avg_time.value(), None);
        drop(state);
        assert!(frames.last().contains("0/20"));
    }

    #[test]
    fn unpause_discounts_idle_time() {
        let t0 = Instant::now();
        let (pb, _frames) = bar(BarConfig::default().miniters(0.0), t0);
        pb.state().update(|| t0 + secs(1.0), 1.0);
        pb.state().unpause(t0 + secs(61.0));
        let state = pb.state();
        assert_eq!(state.state.start_t, t0 + secs(60.0));
        assert_eq!(state.state.elapsed(t0 + secs(61.0)), secs(1.0));
    }

    #[test]
    fn dynamic_ncols_requeries_width() {
        #[derive(Debug)]
        struct Narrow(Frames);

        impl Renderer for Narrow {
            fn present(&self, frame: &Frame, slot: &mut Slot) -> io::Result<()> {
                self.0.present(frame, slot)
            }
            fn clear(&self, slot: &mut Slot) -> io::Result<()> {
                self.0.clear(slot)
            }
            fn teardown(
                &self,
                last: Option<&Frame>,
                leave: bool,
                slot: &mut Slot,
            ) -> io::Result<()> {
                self.0.teardown(last, leave, slot)
            }
            fn write_line(&self, line: &str) -> io::Result<()> {
                self.0.write_line(line)
            }
            fn width(&self) -> Option<usize> {
                Some(30)
            }
        }

        let narrow = Arc::new(Narrow(Frames::default()));
        let config = BarConfig::default()
            .total(10.0)
            .dynamic_ncols(true)
            .ascii(Charset::Ascii)
            .renderer(narrow.clone())
            .registry(Registry::with_monitor_interval(Duration::ZERO));
        let _pb = ProgressBar::with_config_at(config, Instant::now()).unwrap();
        assert_eq!(crate::utils::measure(&narrow.0.last()), 30);
    }
}
