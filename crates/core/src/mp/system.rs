//! Multiprocessor system.
//!
//! Owns the cores, the directory, and the interconnect, and runs one
//! worker thread per core. Workers interact only through the directory and
//! the fabric; there is no global clock, and the run's length is the
//! longest per-core cycle accumulator.

use std::sync::{Arc, Condvar, Mutex};

use tracing::info;

use crate::cache::{Cache, CacheSnapshot, WriteCombiningBuffer};
use crate::coherence::{CoherenceDirectory, CoreSlot};
use crate::common::ConfigError;
use crate::config::SimConfig;
use crate::interconnect::Interconnect;
use crate::mp::ProcessorCore;
use crate::stats::{CacheStats, SimulationReport};
use crate::trace::TraceAccess;

/// Generation-counted barrier: every party blocks until all have arrived.
#[derive(Debug)]
pub struct GlobalBarrier {
    state: Mutex<BarrierState>,
    cvar: Condvar,
    parties: usize,
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

impl GlobalBarrier {
    /// Creates a barrier for `parties` workers.
    pub fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
            parties: parties.max(1),
        }
    }

    /// Blocks until every party has entered; then all are released.
    pub fn wait(&self) {
        let mut state = self.state.lock().expect("barrier poisoned");
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return;
        }
        while state.generation == generation {
            state = self.cvar.wait(state).expect("barrier poisoned");
        }
    }
}

/// N cores, one directory, one fabric.
#[derive(Debug)]
pub struct MultiProcessorSystem {
    cores: Vec<ProcessorCore>,
    directory: Arc<CoherenceDirectory>,
    fabric: Arc<Interconnect>,
    barrier: Arc<GlobalBarrier>,
}

impl MultiProcessorSystem {
    /// Builds the system from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] the configuration violates.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mp = &config.multiprocessor;
        let n = mp.num_processors;

        // Node n is the directory's home.
        let fabric = Arc::new(Interconnect::new(
            mp.interconnect,
            n + 1,
            mp.interconnect_latency,
        ));
        let slots: Vec<Arc<CoreSlot>> = (0..n)
            .map(|i| Arc::new(CoreSlot::new(Cache::new(format!("core{i}.L1"), &config.l1))))
            .collect();
        let directory = Arc::new(CoherenceDirectory::new(
            slots.clone(),
            Arc::clone(&fabric),
            config.l1.block_size,
        ));
        let cores = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                let write_buffer = config.write_combining.enabled.then(|| {
                    WriteCombiningBuffer::new(
                        config.write_combining.buffer_size,
                        config.write_combining.timeout,
                    )
                });
                ProcessorCore::new(
                    i,
                    slot,
                    Arc::clone(&directory),
                    Arc::clone(&fabric),
                    write_buffer,
                )
            })
            .collect();
        info!(
            cores = n,
            interconnect = ?mp.interconnect,
            latency = mp.interconnect_latency,
            "multiprocessor system built"
        );
        Ok(Self {
            cores,
            directory,
            fabric,
            barrier: Arc::new(GlobalBarrier::new(n)),
        })
    }

    /// Splits a merged trace into per-core streams by `core_id`, preserving
    /// order within each core.
    pub fn split_by_core(accesses: &[TraceAccess], num_cores: usize) -> Vec<Vec<TraceAccess>> {
        let mut per_core = vec![Vec::new(); num_cores];
        for access in accesses {
            let core = (access.core_id as usize) % num_cores;
            per_core[core].push(*access);
        }
        per_core
    }

    /// Runs one worker per core over its trace; returns the run length
    /// (the longest per-core cycle count).
    ///
    /// Traces beyond the core count are ignored; cores without a trace run
    /// nothing.
    pub fn simulate_parallel_traces(&mut self, traces: &[Vec<TraceAccess>]) -> u64 {
        std::thread::scope(|scope| {
            for (core, trace) in self.cores.iter_mut().zip(traces.iter()) {
                let _handle = scope.spawn(move || {
                    for access in trace {
                        let _ = core.access(access.address, access.is_write);
                    }
                });
            }
        });
        self.cores
            .iter()
            .map(|c| c.stats().cycles)
            .max()
            .unwrap_or(0)
    }

    /// The barrier shared by all workers.
    pub fn barrier(&self) -> Arc<GlobalBarrier> {
        Arc::clone(&self.barrier)
    }

    /// Blocks the calling worker until all workers have arrived.
    pub fn global_barrier(&self) {
        self.barrier.wait();
    }

    /// The coherence directory.
    pub fn directory(&self) -> &Arc<CoherenceDirectory> {
        &self.directory
    }

    /// The interconnect fabric.
    pub fn fabric(&self) -> &Arc<Interconnect> {
        &self.fabric
    }

    /// The cores, for direct driving in tests.
    pub fn cores_mut(&mut self) -> &mut [ProcessorCore] {
        &mut self.cores
    }

    /// Occupancy snapshots of every core's L1.
    pub fn snapshots(&self) -> Vec<CacheSnapshot> {
        self.cores
            .iter()
            .map(|c| c.slot().l1.lock().expect("core L1 poisoned").snapshot())
            .collect()
    }

    /// Rolls per-core and shared counters into a report. L1 and
    /// write-combining counters are summed across cores.
    pub fn report(&self) -> SimulationReport {
        let mut l1 = CacheStats::default();
        for core in &self.cores {
            let guard = core.slot().l1.lock().expect("core L1 poisoned");
            l1.merge(guard.stats());
        }
        let write_combining = self
            .cores
            .iter()
            .filter_map(ProcessorCore::write_combining_stats)
            .reduce(|mut sum, wc| {
                sum.merge(&wc);
                sum
            });
        let cores: Vec<_> = self.cores.iter().map(ProcessorCore::stats).collect();
        let cycles = cores.iter().map(|c| c.cycles).max().unwrap_or(0);
        SimulationReport {
            l1,
            l2: None,
            victim: None,
            prefetch: None,
            write_combining,
            cores,
            directory: Some(self.directory.stats()),
            interconnect: Some(self.fabric.stats()),
            trace: Default::default(),
            cycles,
            host_seconds: 0.0,
        }
    }
}
