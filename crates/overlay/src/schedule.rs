//! Cooperative tasks resumed from the render callback.
//!
//! A task is a closure resumed once per [`Scheduler::tick`] while it is ready.
//! Each resume returns the [`Step`] telling when to resume it again.

use core::sync::atomic::{AtomicU64, Ordering};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Event tasks can wait for.
#[derive(Debug, Clone, Default)]
pub struct Signal(Arc<AtomicU64>);

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every task waiting on this signal.
    pub fn raise(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn generation(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    /// Resume on the next tick.
    Yield,

    /// Resume after the scheduler clock advanced by the duration.
    Wait(Duration),

    /// Resume after the signal is raised.
    WaitFor(Signal),

    /// Task is finished.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u32);

/// Execution statistics of a task.
#[derive(Debug, Clone)]
pub struct TaskStats {
    pub name: String,
    pub resumes: u64,
    pub busy: Duration,
}

impl TaskStats {
    pub fn average(&self) -> Duration {
        match u32::try_from(self.resumes) {
            Ok(0) => Duration::ZERO,
            Ok(resumes) => self.busy / resumes,
            Err(_) => Duration::ZERO,
        }
    }
}

enum Wake {
    Now,
    At(Duration),
    Signal(Signal, u64),
}

struct Task {
    id: TaskId,
    body: Box<dyn FnMut() -> Step + Send>,
    wake: Wake,
    stats: TaskStats,
}

#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
    clock: Duration,
    next_id: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. It is first resumed on the next tick.
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        body: impl FnMut() -> Step + Send + 'static,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        self.tasks.push(Task {
            id,
            body: Box::new(body),
            wake: Wake::Now,
            stats: TaskStats {
                name: name.into(),
                resumes: 0,
                busy: Duration::ZERO,
            },
        });
        id
    }

    /// Advance the clock by `delta` and resume every ready task once.
    pub fn tick(&mut self, delta: Duration) {
        self.clock += delta;
        let clock = self.clock;

        self.tasks.retain_mut(|task| {
            let ready = match task.wake {
                Wake::Now => true,
                Wake::At(at) => clock >= at,
                Wake::Signal(ref signal, generation) => signal.generation() != generation,
            };
            if !ready {
                return true;
            }

            let start = Instant::now();
            let step = (task.body)();
            task.stats.busy += start.elapsed();
            task.stats.resumes += 1;

            task.wake = match step {
                Step::Yield => Wake::Now,
                Step::Wait(duration) => Wake::At(clock + duration),
                Step::WaitFor(signal) => {
                    let generation = signal.generation();
                    Wake::Signal(signal, generation)
                }
                Step::Done => return false,
            };
            true
        });
    }

    pub fn stats(&self, id: TaskId) -> Option<&TaskStats> {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .map(|task| &task.stats)
    }

    /// Number of tasks waiting on time.
    pub fn ticking_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| !matches!(task.wake, Wake::Signal(..)))
            .count()
    }

    /// Number of tasks waiting on a signal.
    pub fn signal_count(&self) -> usize {
        self.tasks.len() - self.ticking_count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn counter() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn wait_resumes_after_duration() {
        let mut scheduler = Scheduler::new();
        let (count, task_count) = counter();
        scheduler.spawn("tick", move || {
            task_count.fetch_add(1, Ordering::Relaxed);
            Step::Wait(Duration::from_secs(3))
        });

        scheduler.tick(Duration::ZERO);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        scheduler.tick(Duration::from_secs(2));
        assert_eq!(count.load(Ordering::Relaxed), 1);

        scheduler.tick(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn wait_for_signal() {
        let mut scheduler = Scheduler::new();
        let signal = Signal::new();
        let (count, task_count) = counter();
        let task_signal = signal.clone();
        let id = scheduler.spawn("event", move || {
            task_count.fetch_add(1, Ordering::Relaxed);
            Step::WaitFor(task_signal.clone())
        });

        scheduler.tick(Duration::from_secs(10));
        scheduler.tick(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(scheduler.signal_count(), 1);

        signal.raise();
        scheduler.tick(Duration::ZERO);
        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert_eq!(scheduler.stats(id).map(|stats| stats.resumes), Some(2));
    }

    #[test]
    fn done_task_is_removed() {
        let mut scheduler = Scheduler::new();
        let mut remaining = 2;
        scheduler.spawn("finite", move || {
            remaining -= 1;
            if remaining == 0 { Step::Done } else { Step::Yield }
        });

        scheduler.tick(Duration::ZERO);
        assert_eq!(scheduler.len(), 1);
        scheduler.tick(Duration::ZERO);
        assert!(scheduler.is_empty());
    }
}
