/*
 *  scheduler.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  One shared timer that redraws every registered cell in lockstep
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! Synchronized display scheduler.
//!
//! The timer moves through `Stopped -> Starting -> Running -> Stopped`.
//! Starting waits for the next whole second so every cell flips at the same
//! instant; a start request made while Starting or Running is a no-op.
//! Only removal events stop the timer, the tick itself never does.
//!
//! Each qualifying cell is rendered in its own task. A slow or failing host
//! call therefore only holds up that cell, and stopping the timer never
//! cancels renders already issued.

use chrono::{Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::glyph::{resolve_for, BlinkPolicy};
use crate::registry::{CellEntry, CellRegistry};
use crate::render::Renderer;

/// Wall clock source. Injected so tests and demo runs can pin the time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that starts at a fixed time and advances with tokio's clock,
/// so it follows paused/advanced time under `tokio::time::pause`.
#[derive(Debug, Clone)]
pub struct OffsetClock {
    start: NaiveDateTime,
    origin: tokio::time::Instant,
}

impl OffsetClock {
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self { start, origin: tokio::time::Instant::now() }
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self.origin.elapsed();
        self.start + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }
}

/// Time left until the next whole second; a full second when exactly on one.
pub fn delay_to_next_second(now: &NaiveDateTime) -> Duration {
    delay_to_next_tick(now, Duration::from_secs(1))
}

/// Time left until the next wall clock multiple of `period` within the
/// second. `period` must divide one second.
pub fn delay_to_next_tick(now: &NaiveDateTime, period: Duration) -> Duration {
    let period = (period.as_nanos() as u64).clamp(1, 1_000_000_000);
    let nanos = (now.nanosecond() % 1_000_000_000) as u64;
    Duration::from_nanos(period - nanos % period)
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub blink_policy: BlinkPolicy,
    /// Delay of the one-shot self-healing check after each registration
    pub supervise_delay: Duration,
    /// Wait before honouring a stop request; zero stops at once
    pub stop_grace: Duration,
    /// Read settings through the handle before each tick render
    pub refresh_settings: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            blink_policy: BlinkPolicy::default(),
            supervise_delay: Duration::from_millis(2000),
            stop_grace: Duration::ZERO,
            refresh_settings: false,
        }
    }
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Stopped,
    Starting,
    Running,
}

enum TimerState {
    Stopped,
    Starting { attempt: u64, task: JoinHandle<()> },
    Running { attempt: u64, task: JoinHandle<()> },
}

impl TimerState {
    fn phase(&self) -> SchedulerPhase {
        match self {
            TimerState::Stopped => SchedulerPhase::Stopped,
            TimerState::Starting { .. } => SchedulerPhase::Starting,
            TimerState::Running { .. } => SchedulerPhase::Running,
        }
    }
}

struct Shared {
    registry: Arc<CellRegistry>,
    renderer: Arc<Renderer>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    timer: Mutex<TimerState>,
    next_attempt: AtomicU64,
    timers_started: AtomicUsize,
    closed: AtomicBool,
    // (id, serial) of renders still awaiting the host
    in_flight: Mutex<HashSet<(String, u64)>>,
}

/// Owner of the single shared timer. Cheap to clone; clones share the timer.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Build a stopped scheduler. The timer starts on the first `ensure_started`.
    pub fn init(
        registry: Arc<CellRegistry>,
        renderer: Arc<Renderer>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        info!(
            "scheduler initialised: {:?} blink, {:?} tick",
            options.blink_policy,
            options.blink_policy.tick_period()
        );
        Self {
            shared: Arc::new(Shared {
                registry,
                renderer,
                clock,
                options,
                timer: Mutex::new(TimerState::Stopped),
                next_attempt: AtomicU64::new(1),
                timers_started: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.shared.timer.lock().phase()
    }

    /// Number of recurring timers installed over the scheduler's lifetime.
    pub fn timers_started(&self) -> usize {
        self.shared.timers_started.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.shared.options
    }

    /// `Stopped -> Starting`. Returns false when a timer already exists or is
    /// being set up, when no cells are registered, or after shutdown.
    pub fn ensure_started(&self) -> bool {
        if self.shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut timer = self.shared.timer.lock();
        if !matches!(*timer, TimerState::Stopped) {
            debug!("timer already exists or is being set up, skipping");
            return false;
        }
        // the cell that asked may have been hidden while its caller was suspended
        if self.shared.registry.is_empty() {
            debug!("no cells registered, not starting timer");
            return false;
        }

        let attempt = self.shared.next_attempt.fetch_add(1, Ordering::SeqCst);
        let delay = delay_to_next_second(&self.shared.clock.now());
        info!(
            "setting up timer for {} cells, first tick in {:?}",
            self.shared.registry.size(),
            delay
        );

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Shared::finish_start(&shared, attempt);
        });
        *timer = TimerState::Starting { attempt, task };
        true
    }

    /// `Running -> Stopped` (or cancels a pending start) if no cells remain.
    /// Emptiness is checked under the timer lock so a registration racing
    /// this call either sees the old timer or starts a new one.
    pub fn stop_if_idle(&self) -> bool {
        let mut timer = self.shared.timer.lock();
        if !self.shared.registry.is_empty() {
            return false;
        }
        match std::mem::replace(&mut *timer, TimerState::Stopped) {
            TimerState::Running { task, .. } => {
                task.abort();
                info!("cleaning up timer - no active cells");
                true
            }
            TimerState::Starting { task, .. } => {
                task.abort();
                info!("cancelled pending timer setup - no active cells");
                true
            }
            TimerState::Stopped => false,
        }
    }

    /// Stop request from a removal event, honouring the configured grace period.
    pub fn request_stop(&self) {
        let grace = self.shared.options.stop_grace;
        if grace.is_zero() {
            self.stop_if_idle();
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            this.stop_if_idle();
        });
    }

    /// One-shot self-healing check: restart the timer if cells are registered
    /// but no timer is running or starting once `supervise_delay` has passed.
    pub fn supervise(&self) -> JoinHandle<()> {
        let this = self.clone();
        let delay = self.shared.options.supervise_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !this.shared.registry.is_empty() && this.phase() == SchedulerPhase::Stopped {
                info!("timer was missing - restarting");
                this.ensure_started();
            }
        })
    }

    /// Stop the timer for good. Later start requests are ignored.
    pub fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let mut timer = self.shared.timer.lock();
        match std::mem::replace(&mut *timer, TimerState::Stopped) {
            TimerState::Running { task, .. } | TimerState::Starting { task, .. } => {
                task.abort();
                info!("scheduler shut down");
            }
            TimerState::Stopped => {}
        }
    }
}

impl Shared {
    /// `Starting -> Running`, unless this attempt was cancelled or superseded
    /// while waiting, or every cell left in the meantime.
    fn finish_start(shared: &Arc<Shared>, attempt: u64) {
        let mut timer = shared.timer.lock();
        match &*timer {
            TimerState::Starting { attempt: pending, .. } if *pending == attempt => {}
            TimerState::Stopped => {
                info!("timer setup was cancelled while waiting");
                return;
            }
            _ => {
                info!("timer was created while waiting, aborting setup");
                return;
            }
        }
        if shared.registry.is_empty() {
            // replacing drops our own Starting handle, which only detaches it
            *timer = TimerState::Stopped;
            info!("no cells left when timer setup finished, staying stopped");
            return;
        }
        let ticker = tokio::spawn(run_ticker(shared.clone()));
        // replacing drops our own Starting handle, which only detaches it
        *timer = TimerState::Running { attempt, task: ticker };
        shared.timers_started.fetch_add(1, Ordering::SeqCst);
        info!("timer started successfully");
    }

    fn begin_render(&self, cell: &CellEntry) -> bool {
        self.in_flight.lock().insert((cell.id.clone(), cell.serial))
    }

    fn end_render(&self, cell: &CellEntry) {
        self.in_flight.lock().remove(&(cell.id.clone(), cell.serial));
    }
}

// Each wait is measured from the wall clock, not from the previous tick,
// so drift between tokio's monotonic clock and the wall clock never
// accumulates onto the second boundary.
async fn run_ticker(shared: Arc<Shared>) {
    let period = shared.options.blink_policy.tick_period();
    let clock = shared.clock.clone();
    let mut ticker = Ticker::new(shared);
    loop {
        ticker.tick();
        tokio::time::sleep(delay_to_next_tick(&clock.now(), period)).await;
    }
}

/// Per-timer tick state. The watermark starts empty for every new timer so
/// the first tick after a start redraws everything.
struct Ticker {
    shared: Arc<Shared>,
    watermark: Option<i64>,
}

impl Ticker {
    fn new(shared: Arc<Shared>) -> Self {
        Self { shared, watermark: None }
    }

    /// Dispatch renders for cells due this tick. Returns how many were issued.
    fn tick(&mut self) -> usize {
        let now = self.shared.clock.now();
        let second = now.and_utc().timestamp();
        // inequality rather than ordering so a wall clock stepped backwards still redraws
        let second_changed = self.watermark != Some(second);

        let cells = self.shared.registry.snapshot();
        if cells.is_empty() {
            return 0;
        }

        let between_seconds = self.shared.options.blink_policy.redraws_between_seconds();
        let mut issued = 0;
        for cell in cells {
            if !(second_changed || (between_seconds && cell.settings.blinks())) {
                continue;
            }
            if !self.shared.begin_render(&cell) {
                debug!("cell {} still rendering, skipped this tick", cell.id);
                continue;
            }
            issued += 1;
            tokio::spawn(render_cell(self.shared.clone(), cell, now));
        }

        if second_changed {
            self.watermark = Some(second);
        }
        issued
    }
}

async fn render_cell(shared: Arc<Shared>, cell: CellEntry, now: NaiveDateTime) {
    let mut settings = cell.settings.clone();
    if shared.options.refresh_settings {
        match cell.handle.read_settings().await {
            Ok(raw) => {
                settings = settings.overlay(raw);
                shared.registry.update_settings(&cell.id, cell.serial, settings.clone());
            }
            Err(e) => warn!("settings refresh failed for {}, using cached: {}", cell.id, e),
        }
    }

    let glyph = resolve_for(&now, &settings, shared.options.blink_policy);
    let result = shared.renderer.render(cell.handle.as_ref(), &glyph, &settings).await;
    shared.end_render(&cell);

    if let Err(e) = result {
        warn!("error updating cell {}: {}", cell.id, e);
        // eager eviction: a handle the host rejected will keep failing every tick
        if shared.registry.remove_registration(&cell.id, cell.serial) {
            warn!("evicted cell {}, {} cells remaining", cell.id, shared.registry.size());
            Scheduler { shared: shared.clone() }.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHandle;
    use crate::settings::{CellKind, CellSettings};
    use chrono::NaiveDate;

    fn start_time(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap().and_hms_milli_opt(h, m, s, ms).unwrap()
    }

    fn scheduler_at(start: NaiveDateTime, options: SchedulerOptions) -> (Scheduler, Arc<CellRegistry>) {
        let registry = Arc::new(CellRegistry::new());
        let scheduler = Scheduler::init(
            registry.clone(),
            Arc::new(Renderer::default()),
            Arc::new(OffsetClock::starting_at(start)),
            options,
        );
        (scheduler, registry)
    }

    fn kind(k: &str) -> CellSettings {
        CellSettings { kind: CellKind::from(k), ..Default::default() }
    }

    #[test]
    fn test_delay_to_next_second() {
        assert_eq!(delay_to_next_second(&start_time(1, 2, 3, 250)), Duration::from_millis(750));
        assert_eq!(delay_to_next_second(&start_time(1, 2, 3, 0)), Duration::from_secs(1));
        assert_eq!(delay_to_next_second(&start_time(1, 2, 3, 999)), Duration::from_millis(1));
    }

    #[test]
    fn test_delay_to_next_tick() {
        let blink = Duration::from_millis(100);
        assert_eq!(delay_to_next_tick(&start_time(1, 2, 3, 250), blink), Duration::from_millis(50));
        assert_eq!(delay_to_next_tick(&start_time(1, 2, 3, 300), blink), blink);
        assert_eq!(delay_to_next_tick(&start_time(1, 2, 3, 999), blink), Duration::from_millis(1));
        assert_eq!(delay_to_next_tick(&start_time(1, 2, 3, 400), Duration::from_secs(1)), Duration::from_millis(600));
    }

    /// Wall clock that can be stepped relative to tokio's clock.
    struct SteppedClock {
        base: OffsetClock,
        step: Mutex<chrono::Duration>,
    }

    impl Clock for SteppedClock {
        fn now(&self) -> NaiveDateTime {
            self.base.now() + *self.step.lock()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_realign_to_wall_clock() {
        let clock = Arc::new(SteppedClock {
            base: OffsetClock::starting_at(start_time(10, 0, 0, 0)),
            step: Mutex::new(chrono::Duration::zero()),
        });
        let registry = Arc::new(CellRegistry::new());
        let options = SchedulerOptions { blink_policy: BlinkPolicy::EvenSecondParity, ..Default::default() };
        let scheduler = Scheduler::init(registry.clone(), Arc::new(Renderer::default()), clock.clone(), options);
        let handle = RecordingHandle::shared();
        registry.upsert("a", handle.clone(), kind("second2"));
        scheduler.ensure_started();

        // ticks at 01.000, then wall clock jumps 600 ms ahead
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(handle.image_count(), 1);
        *clock.step.lock() = chrono::Duration::milliseconds(600);

        // tick at wall 02.600, then the next one lands on wall 03.000
        tokio::time::sleep(Duration::from_millis(950)).await;
        assert_eq!(handle.image_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_clock_follows_tokio_time() {
        let clock = OffsetClock::starting_at(start_time(9, 0, 0, 0));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(clock.now(), start_time(9, 0, 1, 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_for_second_boundary() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 400), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));

        assert!(scheduler.ensure_started());
        assert_eq!(scheduler.phase(), SchedulerPhase::Starting);

        tokio::time::sleep(Duration::from_millis(599)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Starting);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);
        assert_eq!(scheduler.timers_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_starts_are_ignored() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 100), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));

        assert!(scheduler.ensure_started());
        for _ in 0..10 {
            assert!(!scheduler.ensure_started());
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!scheduler.ensure_started());
        assert_eq!(scheduler.timers_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_attempt_aborts() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();

        // another attempt already won: the pending one must not install a second timer
        *scheduler.shared.timer.lock() = TimerState::Running {
            attempt: 0,
            task: tokio::spawn(async {}),
        };
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(scheduler.timers_started(), 0);
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refused_without_cells() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        assert!(!scheduler.ensure_started());
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);

        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        assert!(scheduler.ensure_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_over_emptied_registry_stays_stopped() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 500), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        // removed without a stop request reaching the timer
        registry.remove("a");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert_eq!(scheduler.timers_started(), 0);
        assert!(!scheduler.ensure_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_setup_is_not_installed() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();

        // a stop won the lock but its abort did not reach the pending task
        *scheduler.shared.timer.lock() = TimerState::Stopped;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert_eq!(scheduler.timers_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_requires_empty_registry() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        tokio::time::sleep(Duration::from_millis(1010)).await;

        assert!(!scheduler.stop_if_idle());
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);

        registry.remove("a");
        assert!(scheduler.stop_if_idle());
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_start() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 500), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        registry.remove("a");
        assert!(scheduler.stop_if_idle());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert_eq!(scheduler.timers_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_grace_rechecks_emptiness() {
        let options = SchedulerOptions { stop_grace: Duration::from_secs(2), ..Default::default() };
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), options);
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        tokio::time::sleep(Duration::from_millis(1010)).await;

        // key moved: hidden, then shown again inside the grace window
        registry.remove("a");
        scheduler.request_stop();
        tokio::time::sleep(Duration::from_millis(500)).await;
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);

        registry.remove("a");
        scheduler.request_stop();
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);
        tokio::time::sleep(Duration::from_millis(2010)).await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_restarts_missing_timer() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));

        let check = scheduler.supervise();
        check.await.unwrap();
        assert_eq!(scheduler.phase(), SchedulerPhase::Starting);
        tokio::time::sleep(Duration::from_millis(1010)).await;
        assert_eq!(scheduler.timers_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_leaves_running_timer_alone() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        scheduler.supervise().await.unwrap();
        assert_eq!(scheduler.timers_started(), 1);
        assert_eq!(scheduler.phase(), SchedulerPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_cadence() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        let digit = RecordingHandle::shared();
        let colon = RecordingHandle::shared();
        let steady = RecordingHandle::shared();
        registry.upsert("digit", digit.clone(), kind("minute2"));
        registry.upsert("colon", colon.clone(), kind("colon1"));
        let mut no_blink = kind("colon2");
        no_blink.blink_colons = false;
        registry.upsert("steady", steady.clone(), no_blink);

        let mut ticker = Ticker::new(scheduler.shared.clone());
        assert_eq!(ticker.tick(), 3);
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticker.tick(), 1);
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(ticker.tick(), 3);
        tokio::task::yield_now().await;

        assert_eq!(digit.image_count(), 2);
        assert_eq!(colon.image_count(), 3);
        assert_eq!(steady.image_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parity_policy_skips_between_seconds() {
        let options = SchedulerOptions { blink_policy: BlinkPolicy::EvenSecondParity, ..Default::default() };
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), options);
        registry.upsert("colon", RecordingHandle::shared(), kind("colon1"));

        let mut ticker = Ticker::new(scheduler.shared.clone());
        assert_eq!(ticker.tick(), 1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(ticker.tick(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tick_keeps_watermark() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        let mut ticker = Ticker::new(scheduler.shared.clone());
        assert_eq!(ticker.tick(), 0);
        assert_eq!(ticker.watermark, None);

        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        assert_eq!(ticker.tick(), 1);
        assert!(ticker.watermark.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_render_evicts_only_that_cell() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        let good = RecordingHandle::shared();
        let bad = RecordingHandle::shared();
        bad.fail_pushes(true);
        registry.upsert("good", good.clone(), kind("hour1"));
        registry.upsert("bad", bad.clone(), kind("hour2"));

        let mut ticker = Ticker::new(scheduler.shared.clone());
        assert_eq!(ticker.tick(), 2);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(registry.get("bad").is_none());
        assert!(registry.get("good").is_some());
        assert_eq!(good.image_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_settings_overlay() {
        let options = SchedulerOptions { refresh_settings: true, ..Default::default() };
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), options);
        let handle = RecordingHandle::shared();
        handle.calls.lock().stored.font_size = Some(50.0);
        registry.upsert("a", handle.clone(), kind("hour1"));

        let mut ticker = Ticker::new(scheduler.shared.clone());
        ticker.tick();
        tokio::task::yield_now().await;
        assert_eq!(registry.get("a").unwrap().settings.font_size, 50.0);
        assert_eq!(handle.calls.lock().reads, 1);

        // a failing read keeps the cached copy and still renders
        handle.calls.lock().fail_reads = true;
        tokio::time::sleep(Duration::from_secs(1)).await;
        ticker.tick();
        tokio::task::yield_now().await;
        assert_eq!(registry.get("a").unwrap().settings.font_size, 50.0);
        assert_eq!(handle.image_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_blocks_restart() {
        let (scheduler, registry) = scheduler_at(start_time(10, 0, 0, 0), SchedulerOptions::default());
        registry.upsert("a", RecordingHandle::shared(), kind("hour1"));
        scheduler.ensure_started();
        scheduler.shutdown();
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        assert!(!scheduler.ensure_started());
    }
}
