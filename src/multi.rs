use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::draw_target::{Frame, Renderer, Slot};
use crate::monitor::Monitor;
use crate::state::BarState;
use crate::utils::{warn, Warning};

/// Line painted in the last visible row when more bars exist than fit.
const MORE_HIDDEN: &str = " ... (more hidden) ...";

/// How often the monitor looks for stalled bars unless configured otherwise.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

/// A lock shared with code outside this process, such as a file lock taken
/// by several processes writing to the same terminal.
///
/// The registry acquires it on entry to its outermost critical section and
/// releases it on exit.
pub trait ExternalLock: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemberId(u64);

/// The set of live bars sharing an output.
///
/// Each bar occupies a row, its position. Bars created without an explicit
/// position take the lowest free row. When a bar closes, its row is freed
/// and nothing else moves, except that a bar parked below the visible rows
/// is promoted into the freed row.
///
/// All terminal writes of registered bars happen under the registry lock,
/// which is reentrant and may be combined with an [`ExternalLock`]. The
/// registry also owns the background monitor that unsticks bars whose
/// iteration throttle has grown too large.
pub struct Registry {
    shared: ReentrantMutex<Shared>,
    external: Mutex<Option<Arc<dyn ExternalLock>>>,
    monitor: Mutex<Option<Monitor>>,
    monitor_interval: Mutex<Duration>,
    me: Weak<Registry>,
}

struct Shared {
    depth: Cell<usize>,
    state: RefCell<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    members: Vec<Member>,
    next_id: u64,
    /// Bumped whenever a member joins or leaves.
    generation: u64,
}

struct Member {
    id: MemberId,
    slot: Slot,
    explicit: bool,
    nrows: usize,
    frame: Option<Frame>,
    renderer: Arc<dyn Renderer>,
    bar: Weak<Mutex<BarState>>,
}

impl RegistryState {
    fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Lowest row no member occupies.
    fn free_position(&self) -> usize {
        let mut taken = self.members.iter().map(|m| m.slot.pos).collect::<Vec<_>>();
        taken.sort_unstable();
        taken.dedup();
        taken
            .iter()
            .enumerate()
            .find(|(i, pos)| i != *pos)
            .map_or(taken.len(), |(i, _)| i)
    }
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Creates an empty registry with its own lock.
    pub fn new() -> Arc<Registry> {
        Registry::with_monitor_interval(DEFAULT_MONITOR_INTERVAL)
    }

    /// Creates an empty registry whose monitor wakes every `interval`.
    ///
    /// A zero interval disables the monitor.
    pub fn with_monitor_interval(interval: Duration) -> Arc<Registry> {
        Arc::new_cyclic(|me| Registry {
            shared: ReentrantMutex::new(Shared {
                depth: Cell::new(0),
                state: RefCell::new(RegistryState::default()),
            }),
            external: Mutex::new(None),
            monitor: Mutex::new(None),
            monitor_interval: Mutex::new(interval),
            me: me.clone(),
        })
    }

    /// The process-wide registry used by bars that do not name one.
    pub fn global() -> Arc<Registry> {
        GLOBAL.get_or_init(Registry::new).clone()
    }

    /// Installs (or removes) a lock shared with other processes.
    ///
    /// Swapping only excludes other threads of this process; the lock being
    /// replaced is not taken. A section already holding the old lock
    /// releases that one when it ends.
    pub fn set_lock(&self, lock: Option<Arc<dyn ExternalLock>>) {
        let _shared = self.shared.lock();
        *self.external.lock() = lock;
    }

    /// Runs `f` holding the registry lock.
    ///
    /// Bars of this registry cannot paint while `f` runs; the lock is
    /// reentrant, so `f` may still use them from the same thread.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    fn lock(&self) -> RegistryGuard<'_> {
        let guard = self.shared.lock();
        let depth = guard.depth.get();
        let external = match depth {
            0 => self.external.lock().clone(),
            _ => None,
        };
        if let Some(lock) = &external {
            lock.acquire();
        }
        guard.depth.set(depth + 1);
        RegistryGuard { guard, external }
    }

    /// Number of registered bars.
    pub fn len(&self) -> usize {
        self.lock().state.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows taken by registered bars, in ascending order.
    pub fn positions(&self) -> Vec<usize> {
        let guard = self.lock();
        let mut positions = guard
            .state
            .borrow()
            .members
            .iter()
            .map(|m| m.slot.pos)
            .collect::<Vec<_>>();
        positions.sort_unstable();
        positions
    }

    pub fn monitor_interval(&self) -> Duration {
        *self.monitor_interval.lock()
    }

    /// Changes how often the monitor wakes. A zero interval stops it.
    pub fn set_monitor_interval(&self, interval: Duration) {
        *self.monitor_interval.lock() = interval;
        if interval.is_zero() {
            if let Some(monitor) = self.monitor.lock().take() {
                monitor.stop();
            }
        } else if !self.is_empty() {
            self.ensure_monitor();
        }
    }

    /// Whether a monitor thread is currently attached.
    pub fn monitor_running(&self) -> bool {
        self.monitor.lock().is_some()
    }

    /// Stops the monitor and waits for its thread to finish.
    ///
    /// The monitor is started again by the next bar that registers.
    pub fn exit_monitor(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.exit();
        }
    }

    /// Clears every bar, runs `f`, then repaints the bars.
    ///
    /// Use this to write to the terminal without tearing through the bars.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        let guard = self.lock();
        let ids = guard
            .state
            .borrow()
            .members
            .iter()
            .map(|m| m.id)
            .collect::<Vec<_>>();

        for &id in &ids {
            with_slot(&guard, id, |renderer, slot, _| renderer.clear(slot))
                .unwrap_or(Ok(()))
                .ok();
        }
        let ret = f();
        for &id in &ids {
            redraw(&guard, id).ok();
        }
        ret
    }

    /// Writes `line` through `renderer` above the bars.
    pub(crate) fn write_line(&self, renderer: &dyn Renderer, line: &str) -> io::Result<()> {
        self.suspend(|| renderer.write_line(line))
    }

    /// Adds a bar and returns its id and row.
    pub(crate) fn register(
        &self,
        requested: Option<usize>,
        renderer: Arc<dyn Renderer>,
        bar: Weak<Mutex<BarState>>,
        nrows: usize,
    ) -> (MemberId, usize) {
        let registered = {
            let guard = self.lock();
            let mut state = guard.state.borrow_mut();
            let pos = requested.unwrap_or_else(|| state.free_position());
            let id = MemberId(state.next_id);
            state.next_id += 1;
            state.generation += 1;
            state.members.push(Member {
                id,
                slot: Slot::at(pos),
                explicit: requested.is_some(),
                nrows: nrows.max(1),
                frame: None,
                renderer,
                bar,
            });
            (id, pos)
        };
        self.ensure_monitor();
        registered
    }

    pub(crate) fn position(&self, id: MemberId) -> Option<usize> {
        let guard = self.lock();
        let state = guard.state.borrow();
        state.member(id).map(|m| m.slot.pos)
    }

    /// Paints `frame` in the member's row and remembers it for repaints.
    pub(crate) fn draw(&self, id: MemberId, frame: Frame) -> io::Result<()> {
        let guard = self.lock();
        let res = with_slot(&guard, id, |renderer, slot, nrows| {
            match visible(&frame, slot.pos, nrows) {
                Some(shown) => renderer.present(&shown, slot),
                None => Ok(()),
            }
        });
        if let Some(member) = guard.state.borrow_mut().member_mut(id) {
            member.frame = Some(frame);
        }
        res.unwrap_or(Ok(()))
    }

    /// Blanks the member's row.
    pub(crate) fn clear(&self, id: MemberId) -> io::Result<()> {
        let guard = self.lock();
        with_slot(&guard, id, |renderer, slot, _| renderer.clear(slot)).unwrap_or(Ok(()))
    }

    /// Removes a member, leaving `last` on screen or erasing its row.
    pub(crate) fn unregister(
        &self,
        id: MemberId,
        last: Option<Frame>,
        leave: bool,
    ) -> io::Result<()> {
        let (res, now_empty) = {
            let guard = self.lock();
            let removed = {
                let mut state = guard.state.borrow_mut();
                match state.members.iter().position(|m| m.id == id) {
                    Some(idx) => {
                        state.generation += 1;
                        state.members.remove(idx)
                    }
                    None => return Ok(()),
                }
            };

            let mut slot = removed.slot;
            let mut res = Ok(());
            if slot.pos < removed.nrows {
                res = removed.renderer.teardown(last.as_ref(), leave, &mut slot);
                promote(&guard, removed.slot.pos, removed.nrows);
            } else if leave && last.is_some() {
                res = leave_parked(&guard, &*removed.renderer, last.as_ref());
            }
            let now_empty = guard.state.borrow().members.is_empty();
            (res, now_empty)
        };

        if now_empty {
            if let Some(monitor) = self.monitor.lock().take() {
                monitor.stop();
            }
        }
        res
    }

    /// Lets every bar that stalled behind its iteration throttle repaint.
    ///
    /// Returns how many bars were forced.
    pub(crate) fn poll_stalled(&self, now: Instant) -> usize {
        let guard = self.lock();
        let (generation, bars) = {
            let state = guard.state.borrow();
            let bars = state.members.iter().map(|m| m.bar.clone()).collect::<Vec<_>>();
            (state.generation, bars)
        };

        let mut forced = 0;
        // the last handle to a bar may be one of these; dropping it closes
        // the bar, so they are released only after the generation check
        let mut held = Vec::with_capacity(bars.len());
        for bar in bars {
            let bar = match bar.upgrade() {
                Some(bar) => bar,
                None => continue,
            };
            // a bar locked elsewhere is busy updating and needs no help
            if let Some(mut state) = bar.try_lock() {
                if state.force_if_stalled(now) {
                    forced += 1;
                }
            }
            held.push(bar);
        }

        if guard.state.borrow().generation != generation {
            warn(
                Warning::Monitor,
                format_args!("set of bars changed while looking for stalled bars"),
            );
        }
        drop(held);
        forced
    }

    fn ensure_monitor(&self) {
        let interval = self.monitor_interval();
        if interval.is_zero() {
            return;
        }
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }
        match Monitor::spawn(self.me.clone()) {
            Ok(spawned) => *monitor = Some(spawned),
            Err(err) => warn(
                Warning::Monitor,
                format_args!("could not start the monitor thread: {}", err),
            ),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("positions", &self.positions())
            .field("monitor_interval", &self.monitor_interval())
            .finish()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.get_mut().take() {
            monitor.stop();
        }
    }
}

struct RegistryGuard<'a> {
    guard: ReentrantMutexGuard<'a, Shared>,
    external: Option<Arc<dyn ExternalLock>>,
}

impl Deref for RegistryGuard<'_> {
    type Target = Shared;

    fn deref(&self) -> &Shared {
        &self.guard
    }
}

impl Drop for RegistryGuard<'_> {
    fn drop(&mut self) {
        self.guard.depth.set(self.guard.depth.get() - 1);
        if let Some(lock) = self.external.take() {
            lock.release();
        }
    }
}

/// Runs `f` on a copy of the member's slot with no borrow of the registry
/// state outstanding, then stores the slot back. `None` if the member is
/// gone.
fn with_slot<R>(
    shared: &Shared,
    id: MemberId,
    f: impl FnOnce(&dyn Renderer, &mut Slot, usize) -> R,
) -> Option<R> {
    let (renderer, mut slot, nrows) = {
        let state = shared.state.borrow();
        let member = state.member(id)?;
        (member.renderer.clone(), member.slot, member.nrows)
    };
    let ret = f(&*renderer, &mut slot, nrows);
    if let Some(member) = shared.state.borrow_mut().member_mut(id) {
        // a member moved by a reentrant call keeps its new row
        if member.slot.pos == slot.pos {
            member.slot = slot;
        }
    }
    Some(ret)
}

/// Repaints a member from its last frame.
fn redraw(shared: &Shared, id: MemberId) -> io::Result<()> {
    let frame = match shared.state.borrow().member(id) {
        Some(member) => member.frame.clone(),
        None => return Ok(()),
    };
    let frame = match frame {
        Some(frame) => frame,
        None => return Ok(()),
    };
    with_slot(shared, id, |renderer, slot, nrows| {
        match visible(&frame, slot.pos, nrows) {
            Some(shown) => renderer.present(&shown, slot),
            None => Ok(()),
        }
    })
    .unwrap_or(Ok(()))
}

/// Prints the final line of a bar that never had a visible row, on the
/// anchor row like any other bar left behind, then repaints the others.
fn leave_parked(shared: &Shared, renderer: &dyn Renderer, last: Option<&Frame>) -> io::Result<()> {
    let (anchor_width, ids) = {
        let state = shared.state.borrow();
        let anchor_width = state
            .members
            .iter()
            .filter(|m| m.slot.pos == 0)
            .map(|m| m.slot.last_width)
            .max()
            .unwrap_or(0);
        (anchor_width, state.members.iter().map(|m| m.id).collect::<Vec<_>>())
    };
    let mut anchor = Slot {
        pos: 0,
        last_width: anchor_width,
        shown: true,
    };
    let res = renderer.teardown(last, true, &mut anchor);
    for id in ids {
        redraw(shared, id).ok();
    }
    res
}

/// Moves the highest parked automatic bar into the freed row.
fn promote(shared: &Shared, freed: usize, nrows: usize) {
    let candidate = {
        let mut state = shared.state.borrow_mut();
        let candidate = state
            .members
            .iter_mut()
            .filter(|m| !m.explicit && m.slot.pos >= nrows && m.slot.pos > freed)
            .min_by_key(|m| m.slot.pos);
        match candidate {
            Some(member) => {
                member.slot = Slot::at(freed);
                member.id
            }
            None => return,
        }
    };
    redraw(shared, candidate).ok();
}

/// What actually gets painted for a member at `pos`: its own frame, the
/// overflow marker in the last visible row, or nothing below that.
fn visible(frame: &Frame, pos: usize, nrows: usize) -> Option<Frame> {
    if pos >= nrows {
        None
    } else if pos + 1 == nrows && nrows > 1 {
        Some(Frame::new(MORE_HIDDEN.to_owned()))
    } else {
        Some(frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use portable_atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl Renderer for Recorder {
        fn present(&self, frame: &Frame, slot: &mut Slot) -> io::Result<()> {
            self.calls
                .lock()
                .push(format!("present {} {}", slot.pos, frame.line));
            slot.shown = true;
            Ok(())
        }

        fn clear(&self, slot: &mut Slot) -> io::Result<()> {
            self.calls.lock().push(format!("clear {}", slot.pos));
            Ok(())
        }

        fn teardown(&self, last: Option<&Frame>, leave: bool, slot: &mut Slot) -> io::Result<()> {
            let line = last.map_or("-", |f| f.line.as_str());
            self.calls
                .lock()
                .push(format!("teardown {} {} {}", slot.pos, leave, line));
            Ok(())
        }

        fn write_line(&self, line: &str) -> io::Result<()> {
            self.calls.lock().push(format!("line {}", line));
            Ok(())
        }
    }

    fn quiet() -> Arc<Registry> {
        Registry::with_monitor_interval(Duration::ZERO)
    }

    fn join(
        registry: &Registry,
        renderer: &Arc<Recorder>,
        pos: Option<usize>,
        nrows: usize,
    ) -> MemberId {
        registry.register(pos, renderer.clone(), Weak::new(), nrows).0
    }

    #[test]
    fn automatic_positions_fill_lowest_gap() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let a = join(&registry, &renderer, None, 20);
        let b = join(&registry, &renderer, None, 20);
        let c = join(&registry, &renderer, None, 20);
        assert_eq!(registry.positions(), vec![0, 1, 2]);

        registry.unregister(b, None, false).unwrap();
        assert_eq!(registry.positions(), vec![0, 2]);
        assert_eq!(registry.position(c), Some(2));

        let d = join(&registry, &renderer, None, 20);
        assert_eq!(registry.position(d), Some(1));
        assert_eq!(registry.position(a), Some(0));
    }

    #[test]
    fn explicit_positions_are_kept() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let fixed = join(&registry, &renderer, Some(3), 20);
        let auto = join(&registry, &renderer, None, 20);
        assert_eq!(registry.position(fixed), Some(3));
        assert_eq!(registry.position(auto), Some(0));
    }

    #[test]
    fn rows_past_the_screen_are_hidden() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let ids = (0..4)
            .map(|_| join(&registry, &renderer, None, 3))
            .collect::<Vec<_>>();
        for (i, id) in ids.iter().enumerate() {
            registry.draw(*id, Frame::new(format!("bar{}", i))).unwrap();
        }
        assert_eq!(
            renderer.take(),
            vec![
                "present 0 bar0".to_owned(),
                "present 1 bar1".to_owned(),
                format!("present 2 {}", MORE_HIDDEN),
            ]
        );
    }

    #[test]
    fn closing_promotes_a_parked_bar() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let ids = (0..4)
            .map(|_| join(&registry, &renderer, None, 3))
            .collect::<Vec<_>>();
        registry.draw(ids[3], Frame::new("parked".into())).unwrap();
        renderer.take();

        registry.unregister(ids[1], None, false).unwrap();
        assert_eq!(
            renderer.take(),
            vec!["teardown 1 false -".to_owned(), "present 1 parked".to_owned()]
        );
        assert_eq!(registry.position(ids[3]), Some(1));
        assert_eq!(registry.positions(), vec![0, 1, 2]);
    }

    #[test]
    fn parked_bar_left_behind_prints_on_the_anchor_row() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let ids = (0..4)
            .map(|_| join(&registry, &renderer, None, 3))
            .collect::<Vec<_>>();
        registry.draw(ids[0], Frame::new("bar0".into())).unwrap();
        renderer.take();

        registry
            .unregister(ids[3], Some(Frame::new("done".into())), true)
            .unwrap();
        assert_eq!(
            renderer.take(),
            vec!["teardown 0 true done".to_owned(), "present 0 bar0".to_owned()]
        );
        assert_eq!(registry.positions(), vec![0, 1, 2]);

        // nothing to leave behind
        registry.unregister(ids[2], None, true).unwrap();
        assert_eq!(renderer.take(), vec!["teardown 2 true -".to_owned()]);
    }

    #[test]
    fn suspend_clears_and_repaints() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        let a = join(&registry, &renderer, None, 20);
        let b = join(&registry, &renderer, None, 20);
        registry.draw(a, Frame::new("a".into())).unwrap();
        registry.draw(b, Frame::new("b".into())).unwrap();
        renderer.take();

        registry.write_line(&*renderer, "hello").unwrap();
        assert_eq!(
            renderer.take(),
            vec![
                "clear 0",
                "clear 1",
                "line hello",
                "present 0 a",
                "present 1 b",
            ]
        );
    }

    #[derive(Default)]
    struct CountingLock {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl ExternalLock for CountingLock {
        fn acquire(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn external_lock_taken_once_per_outer_section() {
        let registry = quiet();
        let lock = Arc::new(CountingLock::default());
        registry.set_lock(Some(lock.clone()));

        registry.with_lock(|| {
            registry.with_lock(|| registry.positions());
            assert_eq!(lock.acquired.load(Ordering::SeqCst), 1);
            assert_eq!(lock.released.load(Ordering::SeqCst), 0);
        });
        assert_eq!(lock.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(lock.released.load(Ordering::SeqCst), 1);

        registry.set_lock(None);
        registry.positions();
        assert_eq!(lock.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(lock.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn swapping_locks_mid_section_releases_the_held_one() {
        let registry = quiet();
        let old = Arc::new(CountingLock::default());
        let new = Arc::new(CountingLock::default());
        registry.set_lock(Some(old.clone()));

        registry.with_lock(|| {
            registry.set_lock(Some(new.clone()));
            registry.positions();
        });
        assert_eq!(old.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(old.released.load(Ordering::SeqCst), 1);
        assert_eq!(new.acquired.load(Ordering::SeqCst), 0);

        registry.positions();
        assert_eq!(new.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(new.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn monitor_follows_membership() {
        let registry = Registry::with_monitor_interval(Duration::from_secs(60));
        let renderer = Arc::new(Recorder::default());
        assert!(!registry.monitor_running());

        let id = join(&registry, &renderer, None, 20);
        assert!(registry.monitor_running());

        registry.unregister(id, None, false).unwrap();
        assert!(!registry.monitor_running());

        join(&registry, &renderer, None, 20);
        assert!(registry.monitor_running());
        registry.exit_monitor();
        assert!(!registry.monitor_running());
    }

    #[test]
    fn disabled_monitor_never_starts() {
        let registry = quiet();
        let renderer = Arc::new(Recorder::default());
        join(&registry, &renderer, None, 20);
        assert!(!registry.monitor_running());
    }
}
