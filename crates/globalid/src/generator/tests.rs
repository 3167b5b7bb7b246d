use crate::{
    Error, FixedNodeId, GlobalId, GlobalIdGenerator, ONE_SECOND_MILLIS, Result, SleepProvider,
    SystemClock, TimeSource,
};
use core::time::Duration;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread::scope;
use std::time::Instant;

/// A clock the test moves by hand.
#[derive(Clone, Default)]
struct MockTime {
    millis: Arc<AtomicU64>,
}

impl MockTime {
    fn at(millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Records every wait and moves the mock clock forward instead of blocking.
#[derive(Clone)]
struct MockSleep {
    time: MockTime,
    waits: Arc<Mutex<Vec<(u64, &'static str)>>>,
    interrupt: Arc<AtomicBool>,
}

impl MockSleep {
    fn new(time: &MockTime) -> Self {
        Self {
            time: time.clone(),
            waits: Arc::default(),
            interrupt: Arc::default(),
        }
    }

    fn waits(&self) -> Vec<(u64, &'static str)> {
        self.waits.lock().unwrap().clone()
    }

    fn interrupt_next(&self, yes: bool) {
        self.interrupt.store(yes, Ordering::SeqCst);
    }
}

impl SleepProvider for MockSleep {
    fn sleep_for(&self, dur: Duration, context: &'static str) -> Result<()> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(Error::Interrupted { context });
        }
        let millis = dur.as_millis() as u64;
        self.waits.lock().unwrap().push((millis, context));
        self.time.advance(millis);
        Ok(())
    }
}

type MockGenerator = GlobalIdGenerator<MockTime, MockSleep>;

fn mock_generator(start: u64) -> (MockGenerator, MockTime, MockSleep) {
    let time = MockTime::at(start);
    let sleep = MockSleep::new(&time);
    let generator = GlobalIdGenerator::new(time.clone(), sleep.clone());
    (generator, time, sleep)
}

/// Initializes, then rewinds the clock to `now` so the startup delay does not
/// leak into the test's timeline.
fn initialized_mock(node_id: u16, now: u64) -> (MockGenerator, MockTime, MockSleep) {
    let (generator, time, sleep) = mock_generator(now);
    generator.initialize(&FixedNodeId(node_id)).unwrap();
    time.set(now);
    (generator, time, sleep)
}

#[test]
fn issuing_before_initialize_fails() {
    let (generator, _, _) = mock_generator(1_000);
    assert_eq!(generator.try_next_id(), Err(Error::NotInitialized));
    assert_eq!(generator.node_id(), Err(Error::NotInitialized));
    assert!(!generator.is_initialized());
}

#[test]
fn initialize_assigns_node_id_after_one_second_delay() {
    let (generator, time, sleep) = mock_generator(1_000);
    generator.initialize(&FixedNodeId(512)).unwrap();

    assert_eq!(sleep.waits(), vec![(1_000, "initial startup")]);
    assert_eq!(time.current_millis(), 2_000);
    assert_eq!(generator.node_id(), Ok(512));
    assert!(generator.is_initialized());
}

#[test]
fn second_initialize_is_rejected_and_keeps_first_node_id() {
    let (generator, _, sleep) = mock_generator(1_000);
    generator.initialize(&FixedNodeId(3)).unwrap();

    assert_eq!(
        generator.initialize(&FixedNodeId(4)),
        Err(Error::AlreadyInitialized)
    );
    assert_eq!(generator.node_id(), Ok(3));
    assert_eq!(sleep.waits().len(), 1);
}

#[test]
fn out_of_range_node_id_is_rejected() {
    let (generator, _, sleep) = mock_generator(1_000);
    assert_eq!(
        generator.initialize(&FixedNodeId(1024)),
        Err(Error::NodeIdOutOfRange {
            node_id: 1024,
            max: 1023
        })
    );
    assert!(!generator.is_initialized());
    assert!(sleep.waits().is_empty());
}

#[test]
fn node_id_source_errors_propagate() {
    let (generator, _, _) = mock_generator(1_000);
    let source = || -> Result<u16> { Err(Error::Interrupted { context: "claim" }) };
    assert_eq!(
        generator.initialize(&source),
        Err(Error::Interrupted { context: "claim" })
    );
    assert!(!generator.is_initialized());
}

#[test]
fn interrupted_startup_leaves_generator_uninitialized() {
    let (generator, _, sleep) = mock_generator(1_000);
    sleep.interrupt_next(true);

    assert_eq!(
        generator.initialize(&FixedNodeId(1)),
        Err(Error::Interrupted {
            context: "initial startup"
        })
    );
    assert_eq!(generator.try_next_id(), Err(Error::NotInitialized));

    sleep.interrupt_next(false);
    generator.initialize(&FixedNodeId(1)).unwrap();
    assert_eq!(generator.node_id(), Ok(1));
}

#[test]
fn serial_increments_within_a_window() {
    let (generator, _, _) = initialized_mock(9, 42_500);

    let ids: Vec<GlobalId> = (0..3).map(|_| generator.try_next_id().unwrap()).collect();
    for (expected, id) in ids.iter().enumerate() {
        assert_eq!(id.node_id(), 9);
        assert_eq!(id.seconds(), 42);
        assert_eq!(id.serial(), expected as u64);
    }
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

#[test]
fn window_keeps_its_second_while_the_clock_stays_in_it() {
    let (generator, time, sleep) = initialized_mock(1, 42_000);

    for step in 0..10 {
        time.set(42_000 + step * 100);
        let id = generator.try_next_id().unwrap();
        assert_eq!(id.seconds(), 42);
        assert_eq!(id.serial(), step);
    }
    assert_eq!(sleep.waits().len(), 1);
}

#[test]
fn window_rolls_over_when_the_epoch_second_changes() {
    let (generator, time, sleep) = initialized_mock(1, 42_999);

    let first = generator.try_next_id().unwrap();
    assert_eq!(first.seconds(), 42);

    time.set(43_998);
    let second = generator.try_next_id().unwrap();
    assert_eq!(second.seconds(), 43);
    assert_eq!(second.serial(), 0);
    assert!(43_998 - second.timestamp_millis() < ONE_SECOND_MILLIS);

    time.set(44_000);
    let third = generator.try_next_id().unwrap();
    assert_eq!(third.seconds(), 44);
    assert_eq!(third.serial(), 0);
    // Only the startup delay.
    assert_eq!(sleep.waits().len(), 1);
}

#[test]
fn idle_window_restarts_without_blocking() {
    let (generator, time, sleep) = initialized_mock(1, 10_000);

    generator.try_next_id().unwrap();
    generator.try_next_id().unwrap();

    time.set(11_001);
    let id = generator.try_next_id().unwrap();
    assert_eq!(id.seconds(), 11);
    assert_eq!(id.serial(), 0);
    // Only the startup delay.
    assert_eq!(sleep.waits().len(), 1);
}

#[test]
fn exhausted_window_blocks_for_the_remainder_of_the_second() {
    let (generator, time, sleep) = initialized_mock(7, 5_250);

    let mut seen = HashSet::new();
    for expected in 0..GlobalId::max_serial() {
        let id = generator.try_next_id().unwrap();
        assert_eq!(id.serial(), expected);
        assert_eq!(id.seconds(), 5);
        assert!(seen.insert(id));
    }

    time.set(5_600);
    let id = generator.try_next_id().unwrap();

    assert_eq!(sleep.waits()[1], (650, "overflow"));
    assert_eq!(id.seconds(), 6);
    assert_eq!(id.serial(), 0);
    assert!(seen.insert(id));
}

#[test]
fn top_serial_is_never_issued() {
    let (generator, _, _) = initialized_mock(7, 5_000);

    for _ in 0..GlobalId::max_serial() {
        let id = generator.try_next_id().unwrap();
        assert!(id.serial() < GlobalId::max_serial());
    }
    let id = generator.try_next_id().unwrap();
    assert_eq!(id.serial(), 0);
}

#[test]
fn exhausted_window_past_its_second_does_not_sleep() {
    let (generator, time, sleep) = initialized_mock(7, 5_000);

    for _ in 0..GlobalId::max_serial() {
        generator.try_next_id().unwrap();
    }

    time.set(7_000);
    let id = generator.try_next_id().unwrap();
    assert_eq!(id.seconds(), 7);
    assert_eq!(id.serial(), 0);
    assert_eq!(sleep.waits().len(), 1);
}

#[test]
fn interrupted_overflow_wait_issues_nothing() {
    let (generator, _, sleep) = initialized_mock(7, 5_000);

    let mut last = None;
    for _ in 0..GlobalId::max_serial() {
        last = Some(generator.try_next_id().unwrap());
    }

    sleep.interrupt_next(true);
    assert_eq!(
        generator.try_next_id(),
        Err(Error::Interrupted {
            context: "overflow"
        })
    );

    sleep.interrupt_next(false);
    let id = generator.try_next_id().unwrap();
    assert_eq!(id.serial(), 0);
    assert_eq!(id.seconds(), 6);
    assert_ne!(Some(id), last);
}

#[test]
fn backward_clock_is_not_masked() {
    let (generator, time, _) = initialized_mock(1, 50_000);

    let before = generator.try_next_id().unwrap();
    time.set(49_000);
    let after = generator.try_next_id().unwrap();

    // Still inside the same window, so the serial keeps the pair unique.
    assert_eq!(after.seconds(), before.seconds());
    assert_eq!(after.serial(), before.serial() + 1);
}

#[test]
fn clones_share_state() {
    let (generator, _, _) = initialized_mock(2, 9_000);
    let other = generator.clone();

    let a = generator.try_next_id().unwrap();
    let b = other.try_next_id().unwrap();
    assert_eq!(b.serial(), a.serial() + 1);
    assert_eq!(other.node_id(), Ok(2));
}

#[test]
fn initialize_blocks_for_at_least_one_second() {
    let generator = GlobalIdGenerator::default();
    let start = Instant::now();
    generator.initialize(&FixedNodeId::default()).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(1_000));
    assert_eq!(generator.node_id(), Ok(1023));
}

#[test]
fn issuing_during_initialize_waits_for_it_to_finish() {
    let generator = GlobalIdGenerator::default();
    let claimed = Barrier::new(2);
    // Runs with the state lock already held.
    let source = || -> Result<u16> {
        claimed.wait();
        Ok(3)
    };

    let start = Instant::now();
    scope(|s| {
        let init = s.spawn(|| generator.initialize(&source));

        claimed.wait();
        std::thread::sleep(Duration::from_millis(100));
        let id = generator.try_next_id().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(ONE_SECOND_MILLIS));
        assert_eq!(id.node_id(), 3);
        assert_eq!(id.serial(), 0);
        assert_eq!(init.join().unwrap(), Ok(()));
    });
    assert_eq!(generator.node_id(), Ok(3));
}

#[test]
fn unique_ids_single_thread() {
    const COUNT: usize = 500_000;

    let generator = GlobalIdGenerator::default();
    generator.initialize(&FixedNodeId(1023)).unwrap();

    let mut seen = HashSet::with_capacity(COUNT);
    let mut previous: Option<GlobalId> = None;
    for i in 0..COUNT {
        let id = generator.try_next_id().unwrap();
        assert!(seen.insert(id), "duplicate id {id} ({id:?}) at i={i}");
        assert!(i64::from(id) >= 0);
        assert_eq!(id.to_raw() >> 63, 0);
        assert_eq!(id.node_id(), 1023);

        if let Some(prev) = previous {
            if id.serial() != 0 {
                assert_eq!(id.serial(), prev.serial() + 1);
                assert_eq!(id.seconds(), prev.seconds());
            }
        }
        previous = Some(id);
    }
}

#[test]
fn unique_ids_across_threads() {
    const THREADS: usize = 4;
    const IDS_PER_THREAD: usize = 50_000;

    let generator = GlobalIdGenerator::default();
    generator.initialize(&FixedNodeId(5)).unwrap();

    let batches: Vec<Vec<GlobalId>> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..IDS_PER_THREAD)
                        .map(|_| generator.try_next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let all: HashSet<GlobalId> = batches.into_iter().flatten().collect();
    assert_eq!(all.len(), THREADS * IDS_PER_THREAD);
    assert!(all.iter().all(|id| id.node_id() == 5));
}

#[test]
fn fields_track_the_wall_clock() {
    let generator = GlobalIdGenerator::default();
    generator.initialize(&FixedNodeId(77)).unwrap();

    for _ in 0..200_000 {
        let before = SystemClock.current_millis();
        let id = generator.try_next_id().unwrap();
        let after = SystemClock.current_millis();

        assert_eq!(id.node_id(), 77);
        assert!(id.serial() <= GlobalId::max_serial());
        assert!(id.timestamp_millis() <= after);
        // The packed second is never older than the second `before` falls in.
        assert!(before.saturating_sub(id.timestamp_millis()) < ONE_SECOND_MILLIS);
    }
}

#[test]
fn sustains_at_least_100k_ids_per_second() {
    const COUNT: u64 = 750_000;

    let generator = GlobalIdGenerator::default();
    generator.initialize(&FixedNodeId::default()).unwrap();

    let start = Instant::now();
    let mut total = 0_u64;
    for _ in 0..COUNT {
        total = total.wrapping_add(generator.try_next_id().unwrap().to_raw());
    }
    let elapsed = start.elapsed();
    core::hint::black_box(total);

    let rate = COUNT as f64 / elapsed.as_secs_f64();
    assert!(rate > 100_000.0, "rate was {rate:.0} ids/sec");
}
