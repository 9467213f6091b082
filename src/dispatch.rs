//! Classification-and-fan-out dispatch: one FIFO queue and one worker thread
//! per lane, a shared shutdown flag, drain-everything-on-stop semantics.
//!
//! Each queue is guarded by its own mutex/condvar pair, so lanes never
//! contend with each other, only with the single submitting thread. The
//! shutdown flag is written once and read in every wait predicate.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::classify::{LANE_COUNT, LaneId, classify};
use crate::error::{Error, Result};
use crate::packet::PacketRecord;
use crate::pcap::{GlobalHeader, PcapWriter};
use crate::policy::{ContentTruncate, CountingFilter, LanePolicy, TimedAdmission, Verdict};

#[derive(Default)]
struct LaneQueue {
    items: Mutex<VecDeque<PacketRecord>>,
    not_empty: Condvar,
}

/// Everything a worker takes ownership of when its thread starts.
struct LaneRuntime<W: Write> {
    policy: Box<dyn LanePolicy<W>>,
    sink: PcapWriter<W>,
}

/// Per-lane counters reported once the lane has fully drained.
#[derive(Debug, Default, Clone, Copy)]
pub struct LaneStats {
    pub seen: u64,
    pub written: u64,
    pub dropped: u64,
}

/// Owns the lane queues, the shutdown signal and the worker lifecycle.
///
/// `start` must be called exactly once before packets are submitted; `stop`
/// signals shutdown and blocks until every lane has drained its queue.
pub struct Dispatcher<W: Write + Send + 'static> {
    queues: [Arc<LaneQueue>; LANE_COUNT],
    shutdown: Arc<AtomicBool>,
    runtimes: [Option<LaneRuntime<W>>; LANE_COUNT],
    workers: Vec<(LaneId, JoinHandle<Result<LaneStats>>)>,
}

impl Dispatcher<BufWriter<File>> {
    /// Opens one result file per lane in `out_dir`, writes the capture's
    /// global header to each and wires the fixed lane policies. Any open
    /// failure is fatal before a single worker starts.
    pub fn open(global: &GlobalHeader, out_dir: &Path) -> Result<Self> {
        let mut lanes = Vec::with_capacity(LANE_COUNT);
        for lane in LaneId::ALL {
            let path = out_dir.join(lane.result_file());
            let file = File::create(&path).map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
            let sink = PcapWriter::new(BufWriter::new(file), global)?;
            debug!("lane {lane}: writing to {}", path.display());
            lanes.push((policy_for(lane), sink));
        }

        // Vec built in LaneId::ALL order above.
        let Ok(lanes) = <[_; LANE_COUNT]>::try_from(lanes) else {
            unreachable!("one sink per lane")
        };
        Ok(Self::new(lanes))
    }
}

fn policy_for<W: Write>(lane: LaneId) -> Box<dyn LanePolicy<W>> {
    match lane {
        LaneId::A => Box::new(CountingFilter::default()),
        LaneId::B => Box::new(ContentTruncate),
        LaneId::C => Box::new(TimedAdmission),
    }
}

impl<W: Write + Send + 'static> Dispatcher<W> {
    /// Builds a dispatcher from pre-opened sinks and policies, one pair per
    /// lane in `LaneId::ALL` order.
    pub fn new(lanes: [(Box<dyn LanePolicy<W>>, PcapWriter<W>); LANE_COUNT]) -> Self {
        Self {
            queues: std::array::from_fn(|_| Arc::new(LaneQueue::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            runtimes: lanes.map(|(policy, sink)| Some(LaneRuntime { policy, sink })),
            workers: Vec::with_capacity(LANE_COUNT),
        }
    }

    /// Classifies `packet` and appends it to its lane's queue, waking that
    /// lane's worker. Never blocks on lane processing.
    pub fn submit(&self, packet: PacketRecord) {
        let lane = classify(&packet);
        let queue = &self.queues[lane.index()];

        let mut items = queue.items.lock();
        items.push_back(packet);
        queue.not_empty.notify_one();
    }

    /// Spawns one worker thread per lane. Call exactly once.
    pub fn start(&mut self) -> Result<()> {
        for lane in LaneId::ALL {
            let Some(runtime) = self.runtimes[lane.index()].take() else {
                continue;
            };
            let queue = Arc::clone(&self.queues[lane.index()]);
            let shutdown = Arc::clone(&self.shutdown);

            let handle = std::thread::Builder::new()
                .name(format!("lane-{lane}"))
                .spawn(move || drain_loop(lane, &queue, &shutdown, runtime))?;
            self.workers.push((lane, handle));
        }
        Ok(())
    }

    /// Sets the shutdown signal, wakes every lane and waits for all workers
    /// to drain their queues and terminate. Safe to call when `start` was
    /// never called. Returns the per-lane counters, or the first lane
    /// failure.
    pub fn stop(&mut self) -> Result<[LaneStats; LANE_COUNT]> {
        self.shutdown.store(true, Ordering::Release);
        for queue in &self.queues {
            // Hold the lock so a worker between its predicate check and its
            // wait cannot miss the wake-up.
            let _items = queue.items.lock();
            queue.not_empty.notify_all();
        }

        let mut stats = [LaneStats::default(); LANE_COUNT];
        let mut first_err = None;
        for (lane, handle) in self.workers.drain(..) {
            match handle.join().unwrap_or(Err(Error::WorkerPanic)) {
                Ok(lane_stats) => stats[lane.index()] = lane_stats,
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

impl<W: Write + Send + 'static> Drop for Dispatcher<W> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.stop();
        }
    }
}

/// Worker drain loop. Waits while the queue is empty and shutdown is not
/// signalled; pops in FIFO order and runs the policy with the queue lock
/// released; terminates once shutdown is signalled and the queue is empty.
fn drain_loop<W: Write>(
    lane: LaneId,
    queue: &LaneQueue,
    shutdown: &AtomicBool,
    mut runtime: LaneRuntime<W>,
) -> Result<LaneStats> {
    debug!("lane {lane}: worker started");
    let mut stats = LaneStats::default();

    loop {
        let packet = {
            let mut items = queue.items.lock();
            while items.is_empty() && !shutdown.load(Ordering::Acquire) {
                queue.not_empty.wait(&mut items);
            }
            match items.pop_front() {
                Some(packet) => packet,
                // Shutdown signalled and nothing left to drain.
                None => break,
            }
        };

        stats.seen += 1;
        match runtime.policy.process(packet, &mut runtime.sink) {
            Ok(Verdict::Written) => stats.written += 1,
            Ok(Verdict::Dropped) => stats.dropped += 1,
            Err(err) => {
                error!("lane {lane}: processing failed: {err}");
                return Err(err);
            }
        }
    }

    runtime.sink.flush()?;
    info!(
        "lane {lane}: drained, {} seen, {} written, {} dropped",
        stats.seen, stats.written, stats.dropped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{record, tcp_frame, udp_frame};

    /// Records the destination port of everything it sees; never writes.
    struct Recording {
        log: Arc<Mutex<Vec<u16>>>,
    }

    impl<W: Write> LanePolicy<W> for Recording {
        fn process(&mut self, packet: PacketRecord, _sink: &mut PcapWriter<W>) -> Result<Verdict> {
            self.log.lock().push(packet.transport.dst_port());
            Ok(Verdict::Dropped)
        }
    }

    fn recording_dispatcher() -> (Dispatcher<Vec<u8>>, [Arc<Mutex<Vec<u16>>>; LANE_COUNT]) {
        let logs: [Arc<Mutex<Vec<u16>>>; LANE_COUNT] = std::array::from_fn(|_| Arc::default());
        let lanes = std::array::from_fn(|i| {
            let policy: Box<dyn LanePolicy<Vec<u8>>> = Box::new(Recording {
                log: Arc::clone(&logs[i]),
            });
            let sink = PcapWriter::new(Vec::new(), &GlobalHeader::default()).unwrap();
            (policy, sink)
        });
        (Dispatcher::new(lanes), logs)
    }

    #[test]
    fn routes_each_packet_to_exactly_one_lane() {
        let (mut dispatcher, logs) = recording_dispatcher();
        dispatcher.start().unwrap();

        dispatcher.submit(record(tcp_frame([11, 0, 0, 10], 1, 100, &[])));
        dispatcher.submit(record(udp_frame([12, 0, 0, 10], 1, 8080, &[])));
        dispatcher.submit(record(tcp_frame([13, 0, 0, 1], 1, 300, &[])));

        dispatcher.stop().unwrap();
        assert_eq!(*logs[0].lock(), vec![100]);
        assert_eq!(*logs[1].lock(), vec![8080]);
        assert_eq!(*logs[2].lock(), vec![300]);
    }

    #[test]
    fn lane_preserves_fifo_order() {
        let (mut dispatcher, logs) = recording_dispatcher();
        dispatcher.start().unwrap();

        for port in [10u16, 20, 30, 40, 50] {
            dispatcher.submit(record(tcp_frame([11, 0, 0, 10], 1, port, &[])));
        }

        dispatcher.stop().unwrap();
        assert_eq!(*logs[0].lock(), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn stop_drains_a_burst_completely() {
        let (mut dispatcher, logs) = recording_dispatcher();
        dispatcher.start().unwrap();

        let n = 500u16;
        for port in 0..n {
            dispatcher.submit(record(udp_frame([13, 0, 0, 1], 1, port, &[])));
        }
        let stats = dispatcher.stop().unwrap();

        assert_eq!(logs[2].lock().len(), n as usize);
        assert_eq!(stats[LaneId::C.index()].seen, n as u64);
        assert_eq!(stats[LaneId::C.index()].dropped, n as u64);
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let (mut dispatcher, _logs) = recording_dispatcher();
        let stats = dispatcher.stop().unwrap();
        assert_eq!(stats[0].seen, 0);
    }

    #[test]
    fn worker_error_propagates_from_stop() {
        struct Failing;
        impl<W: Write> LanePolicy<W> for Failing {
            fn process(
                &mut self,
                _packet: PacketRecord,
                _sink: &mut PcapWriter<W>,
            ) -> Result<Verdict> {
                Err(Error::Io(std::io::Error::other("sink gone")))
            }
        }

        let lanes = std::array::from_fn(|_| {
            let policy: Box<dyn LanePolicy<Vec<u8>>> = Box::new(Failing);
            let sink = PcapWriter::new(Vec::new(), &GlobalHeader::default()).unwrap();
            (policy, sink)
        });
        let mut dispatcher = Dispatcher::new(lanes);
        dispatcher.start().unwrap();
        dispatcher.submit(record(tcp_frame([11, 0, 0, 10], 1, 100, &[])));

        assert!(dispatcher.stop().is_err());
    }
}
