//! Cooperative service loop.
//!
//! A fixed period timer interrupt calls [`Scheduler::tick`], which runs the `service` step of
//! every registered service once, in registration order. There is no preemption between
//! services and no suspension: a service that has nothing to do this period returns, and one
//! that needs a slower rate keeps its own timestamp. No service may block, or the whole loop
//! stalls.

use crate::platform::OsTimer;
use crate::sync::AtomicAccess;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Number of loop durations kept by [`LoopTimes`].
pub const LOOP_TRACKER_COUNT: usize = 16;

/// Lifecycle every subsystem of the firmware implements.
pub trait Service {
    fn init(&mut self, now_ms: u32);

    /// One non-blocking step, called every loop period.
    fn service(&mut self, now_ms: u32);

    /// Prepares for low power stop mode.
    fn shutdown(&mut self) {}

    /// Re-initializes after waking from low power stop mode.
    fn restart(&mut self, now_ms: u32) {
        self.init(now_ms)
    }
}

impl<T: Service + ?Sized> Service for &mut T {
    fn init(&mut self, now_ms: u32) {
        (**self).init(now_ms)
    }

    fn service(&mut self, now_ms: u32) {
        (**self).service(now_ms)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }

    fn restart(&mut self, now_ms: u32) {
        (**self).restart(now_ms)
    }
}

/// A fixed, ordered list of services.
pub trait ServiceList {
    /// Visits every service in registration order.
    fn for_each(&mut self, f: impl FnMut(&mut dyn Service));
}

impl<S: Service, const N: usize> ServiceList for [S; N] {
    fn for_each(&mut self, mut f: impl FnMut(&mut dyn Service)) {
        for service in self.iter_mut() {
            f(service);
        }
    }
}

macro_rules! service_tuple {
    ($($index:tt: $service:ident),+) => {
        impl<$($service: Service),+> ServiceList for ($($service,)+) {
            fn for_each(&mut self, mut f: impl FnMut(&mut dyn Service)) {
                $(f(&mut self.$index);)+
            }
        }
    };
}

service_tuple!(0: A);
service_tuple!(0: A, 1: B);
service_tuple!(0: A, 1: B, 2: C);
service_tuple!(0: A, 1: B, 2: C, 3: D);
service_tuple!(0: A, 1: B, 2: C, 3: D, 4: E);
service_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F);
service_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G);
service_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F, 6: G, 7: H);

/// Ring of the most recent loop durations in timer counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopTimes {
    samples: [u32; LOOP_TRACKER_COUNT],
    next: usize,
    recorded: u32,
    max: u32,
    overruns: u32,
}

impl LoopTimes {
    pub const fn new() -> Self {
        Self {
            samples: [0; LOOP_TRACKER_COUNT],
            next: 0,
            recorded: 0,
            max: 0,
            overruns: 0,
        }
    }

    pub fn record(&mut self, elapsed: u32) {
        self.samples[self.next] = elapsed;
        self.next = (self.next + 1) % LOOP_TRACKER_COUNT;
        self.recorded = self.recorded.saturating_add(1);
        self.max = self.max.max(elapsed);
    }

    pub(crate) fn record_overrun(&mut self) {
        self.overruns = self.overruns.saturating_add(1);
    }

    /// The raw ring, in slot order rather than time order.
    pub fn samples(&self) -> &[u32; LOOP_TRACKER_COUNT] {
        &self.samples
    }

    pub fn latest(&self) -> Option<u32> {
        if self.recorded == 0 {
            return None;
        }
        Some(self.samples[(self.next + LOOP_TRACKER_COUNT - 1) % LOOP_TRACKER_COUNT])
    }

    /// Average over the samples currently held in the ring.
    pub fn average(&self) -> Option<u32> {
        let filled = (self.recorded as usize).min(LOOP_TRACKER_COUNT);
        if filled == 0 {
            return None;
        }
        let sum: u64 = self.samples[..filled].iter().map(|&it| it as u64).sum();
        Some((sum / filled as u64) as u32)
    }

    /// Longest loop since boot.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Loops recorded since boot.
    pub fn count(&self) -> u32 {
        self.recorded
    }

    /// Loops that took at least one full period.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl Default for LoopTimes {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerConfig {
    /// Loop period in timer counts. Loops taking this long or longer are counted as overruns.
    pub period_counts: Option<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerState {
    Idle,
    Running,
    /// Shut down for low power stop mode.
    Stopped,
}

pub struct Scheduler<T: OsTimer, L: ServiceList> {
    timer: T,
    services: L,
    config: SchedulerConfig,
    state: SchedulerState,
    loop_times: LoopTimes,
}

impl<T: OsTimer, L: ServiceList> Scheduler<T, L> {
    pub fn new(timer: T, services: L) -> Self {
        Self::with_config(timer, services, SchedulerConfig::default())
    }

    pub fn with_config(timer: T, services: L, config: SchedulerConfig) -> Self {
        Self {
            timer,
            services,
            config,
            state: SchedulerState::Idle,
            loop_times: LoopTimes::new(),
        }
    }

    /// Initializes every service with a common timestamp, then starts the loop timer.
    pub fn init(&mut self) {
        let now = self.timer.system_time_ms();
        self.services.for_each(|service| service.init(now));
        self.start();
    }

    /// Body of the loop timer interrupt.
    pub fn tick(&mut self) {
        if self.state != SchedulerState::Running {
            self.timer.clear_update_flag();
            return;
        }

        let now = self.timer.system_time_ms();
        let time_in = self.timer.counter();

        self.services.for_each(|service| service.service(now));

        // counter is free running, a single wrap between the reads is accounted for
        let elapsed = self.timer.counter().wrapping_sub(time_in);
        self.loop_times.record(elapsed);

        if let Some(period) = self.config.period_counts {
            if elapsed >= period {
                #[cfg(feature = "defmt")]
                warn!("loop overrun: {} of {} counts", elapsed, period);

                #[cfg(feature = "debug-logs")]
                println!("Scheduler: loop overrun {elapsed} of {period} counts");

                self.loop_times.record_overrun();
            }
        }

        self.timer.clear_update_flag();
    }

    /// Stops the loop and shuts every service down for low power stop mode.
    pub fn shutdown(&mut self) {
        self.timer.mask_tick();
        self.services.for_each(|service| service.shutdown());
        self.state = SchedulerState::Stopped;
    }

    /// Re-initializes every service after waking up and starts the loop again.
    pub fn restart(&mut self) {
        let now = self.timer.system_time_ms();
        self.services.for_each(|service| service.restart(now));
        self.start();
    }

    fn start(&mut self) {
        self.timer.start();
        self.timer.unmask_tick();
        self.state = SchedulerState::Running;
    }

    /// Runs `f` with the loop interrupt masked and exclusive access to the services.
    ///
    /// Delays the whole schedule, avoid unless there is no other way.
    pub fn with_atomic_access<R>(&mut self, f: impl FnOnce(&mut L) -> R) -> R {
        let _guard = AtomicAccess::acquire(&self.timer);
        f(&mut self.services)
    }

    /// Masks the loop interrupt until the guard is dropped.
    pub fn atomic_access(&self) -> AtomicAccess<'_, T> {
        AtomicAccess::acquire(&self.timer)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn loop_times(&self) -> &LoopTimes {
        &self.loop_times
    }

    pub fn services(&self) -> &L {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut L {
        &mut self.services
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn release(self) -> (T, L) {
        (self.timer, self.services)
    }
}
