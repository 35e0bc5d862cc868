//! Simulation statistics collection and reporting.
//!
//! This module defines the counter structures owned by each component and
//! the [`SimulationReport`] roll-up the front ends consume. It provides:
//! 1. **Per-level cache counters:** hits, misses, reads, writes, writebacks,
//!    prefetch hits.
//! 2. **Subsystem counters:** victim cache, prefetcher, write combining,
//!    directory, interconnect, per-core tallies.
//! 3. **Derived metrics:** hit/miss rates, prefetch accuracy, average hops.
//! 4. **Reporting:** section-based pretty printing and flat key/value rows
//!    for CSV export.
//!
//! Counters are plain monotone `u64`s updated by their owner; shared
//! components (directory, interconnect) keep atomics internally and
//! snapshot into these structs. Snapshots are taken without locks and may
//! observe mildly inconsistent cross-counter state.

use serde::Serialize;

/// Counters for one cache level.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CacheStats {
    /// Demand accesses that found their block resident.
    pub hits: u64,
    /// Demand accesses that missed.
    pub misses: u64,
    /// Demand read accesses.
    pub reads: u64,
    /// Demand write accesses.
    pub writes: u64,
    /// Dirty blocks pushed to the next level on eviction or flush.
    pub writebacks: u64,
    /// Writes forwarded immediately under write-through.
    pub write_throughs: u64,
    /// Valid blocks displaced by installs.
    pub evictions: u64,
    /// Demand hits whose block was installed by a prefetcher.
    pub prefetch_hits: u64,
    /// Blocks installed by prefetch (not counted as demand traffic).
    pub prefetch_installs: u64,
}

impl CacheStats {
    /// Total demand accesses.
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Folds another level's counters into this one (per-core roll-ups).
    pub fn merge(&mut self, other: &Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.reads += other.reads;
        self.writes += other.writes;
        self.writebacks += other.writebacks;
        self.write_throughs += other.write_throughs;
        self.evictions += other.evictions;
        self.prefetch_hits += other.prefetch_hits;
        self.prefetch_installs += other.prefetch_installs;
    }

    /// Fraction of demand accesses that hit, or 0 when idle.
    pub fn hit_rate(&self) -> f64 {
        let total = self.accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// `1 - hit_rate`, or 0 when idle.
    pub fn miss_rate(&self) -> f64 {
        let total = self.accesses();
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }
}

/// Victim cache counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct VictimStats {
    /// Lookups that found (and consumed) an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries appended.
    pub insertions: u64,
    /// Entries dropped by FIFO overflow.
    pub evictions: u64,
    /// Dirty entries whose overflow forced a writeback.
    pub writebacks: u64,
}

/// Prefetcher counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PrefetchStats {
    /// Prefetch addresses issued (stream and stride combined).
    pub issued: u64,
    /// Issued addresses later demand-referenced before eviction.
    pub confirmed: u64,
    /// Stream-buffer probe hits.
    pub stream_hits: u64,
    /// Stream-buffer probes.
    pub stream_accesses: u64,
    /// Current (possibly adapted) prefetch distance.
    pub distance: u64,
    /// Times the adaptive controller changed the distance.
    pub adjustments: u64,
}

impl PrefetchStats {
    /// Fraction of issued prefetches that proved useful, or 0 when idle.
    pub fn accuracy(&self) -> f64 {
        if self.issued == 0 {
            0.0
        } else {
            self.confirmed as f64 / self.issued as f64
        }
    }
}

/// Write-combining buffer counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct WriteCombiningStats {
    /// Writes absorbed into an existing pending entry.
    pub coalesced: u64,
    /// Buffer flushes (overflow, timeout, or read intersection).
    pub flushes: u64,
    /// Writes forwarded to the next level by flushes.
    pub flushed_writes: u64,
}

impl WriteCombiningStats {
    /// Folds another buffer's counters into this one (per-core roll-ups).
    pub fn merge(&mut self, other: &Self) {
        self.coalesced += other.coalesced;
        self.flushes += other.flushes;
        self.flushed_writes += other.flushed_writes;
    }
}

/// Coherence directory counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct DirectoryStats {
    /// Read-permission requests processed.
    pub read_requests: u64,
    /// Write-permission requests processed.
    pub write_requests: u64,
    /// Peer copies invalidated.
    pub invalidations: u64,
    /// Writebacks forced by downgrades and invalidations.
    pub writebacks: u64,
    /// Directory entry state changes.
    pub state_transitions: u64,
    /// Coherence messages placed on the interconnect.
    pub coherence_messages: u64,
}

/// Interconnect fabric counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct InterconnectStats {
    /// Messages accepted by the fabric.
    pub total_messages: u64,
    /// Cycles accumulated across all sends.
    pub total_latency: u64,
    /// Contended sends (bus arbitration, port conflicts, hot routers).
    pub congestion_events: u64,
    /// Router/link hops traversed across all messages.
    pub total_hops: u64,
    /// Cycles spent moving payload (excludes arbitration overhead).
    pub busy_cycles: u64,
}

impl InterconnectStats {
    /// Mean hops per message, or 0 when idle.
    pub fn avg_hops(&self) -> f64 {
        if self.total_messages == 0 {
            0.0
        } else {
            self.total_hops as f64 / self.total_messages as f64
        }
    }

    /// Share of accumulated cycles spent moving payload.
    pub fn utilization(&self) -> f64 {
        if self.total_latency == 0 {
            0.0
        } else {
            self.busy_cycles as f64 / self.total_latency as f64
        }
    }
}

/// Per-core tallies for multiprocessor runs.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CoreStats {
    /// Accesses issued by this core.
    pub accesses: u64,
    /// Read accesses.
    pub reads: u64,
    /// Write accesses.
    pub writes: u64,
    /// L1 hits.
    pub hits: u64,
    /// L1 misses.
    pub misses: u64,
    /// Accesses that needed a coherence grant before proceeding.
    pub coherence_misses: u64,
    /// Invalidations received from peers via the directory.
    pub invalidations_received: u64,
    /// Local cycle accumulator (saturating).
    pub cycles: u64,
}

/// Trace-reader tallies.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct TraceStats {
    /// Lines consumed (including comments and blanks).
    pub lines: u64,
    /// Malformed lines skipped in lenient mode.
    pub invalid_lines: u64,
}

/// Full roll-up of one simulation run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimulationReport {
    /// L1 counters. In multiprocessor mode this is the sum over cores.
    pub l1: CacheStats,
    /// L2 counters, when an L2 is configured.
    pub l2: Option<CacheStats>,
    /// Victim cache counters, when enabled.
    pub victim: Option<VictimStats>,
    /// Prefetcher counters, when enabled.
    pub prefetch: Option<PrefetchStats>,
    /// Write-combining counters, when enabled.
    pub write_combining: Option<WriteCombiningStats>,
    /// Per-core tallies (empty in single-core mode).
    pub cores: Vec<CoreStats>,
    /// Directory counters, in multiprocessor mode.
    pub directory: Option<DirectoryStats>,
    /// Interconnect counters, in multiprocessor mode.
    pub interconnect: Option<InterconnectStats>,
    /// Trace-reader tallies.
    pub trace: TraceStats,
    /// Run length: the longest per-core cycle count (multiprocessor) or the
    /// demand access count (single core).
    pub cycles: u64,
    /// Host wall-clock seconds (benchmark mode).
    pub host_seconds: f64,
}

impl SimulationReport {
    /// Hit rate across all demand accesses at L1.
    pub fn overall_hit_rate(&self) -> f64 {
        self.l1.hit_rate()
    }

    /// Prints the report to stdout in fixed-width sections.
    pub fn print(&self) {
        println!("\n==========================================================");
        println!("CACHE HIERARCHY SIMULATION STATISTICS");
        println!("==========================================================");
        println!("accesses                 {}", self.l1.accesses());
        println!("cycles                   {}", self.cycles);
        if self.host_seconds > 0.0 {
            let rate = self.l1.accesses() as f64 / self.host_seconds;
            println!("host_seconds             {:.4} s", self.host_seconds);
            println!("throughput               {:.0} accesses/s", rate);
        }
        println!("----------------------------------------------------------");
        Self::print_cache("L1", &self.l1);
        if let Some(l2) = &self.l2 {
            Self::print_cache("L2", l2);
        }
        if let Some(v) = &self.victim {
            println!("VICTIM CACHE");
            println!("  hits                   {}", v.hits);
            println!("  misses                 {}", v.misses);
            println!("  insertions             {}", v.insertions);
            println!("  evictions              {}", v.evictions);
            println!("  writebacks             {}", v.writebacks);
            println!("----------------------------------------------------------");
        }
        if let Some(p) = &self.prefetch {
            println!("PREFETCH");
            println!("  issued                 {}", p.issued);
            println!("  confirmed              {}", p.confirmed);
            println!("  accuracy               {:.2}%", p.accuracy() * 100.0);
            println!("  distance               {}", p.distance);
            println!("  adjustments            {}", p.adjustments);
            println!("----------------------------------------------------------");
        }
        if let Some(w) = &self.write_combining {
            println!("WRITE COMBINING");
            println!("  coalesced              {}", w.coalesced);
            println!("  flushes                {}", w.flushes);
            println!("  flushed_writes         {}", w.flushed_writes);
            println!("----------------------------------------------------------");
        }
        if !self.cores.is_empty() {
            println!("CORES");
            for (id, c) in self.cores.iter().enumerate() {
                println!(
                    "  core{:<2} accesses: {:<9} hits: {:<9} coh_misses: {:<7} cycles: {}",
                    id, c.accesses, c.hits, c.coherence_misses, c.cycles
                );
            }
            println!("----------------------------------------------------------");
        }
        if let Some(d) = &self.directory {
            println!("COHERENCE DIRECTORY");
            println!("  read_requests          {}", d.read_requests);
            println!("  write_requests         {}", d.write_requests);
            println!("  invalidations          {}", d.invalidations);
            println!("  writebacks             {}", d.writebacks);
            println!("  state_transitions      {}", d.state_transitions);
            println!("  coherence_messages     {}", d.coherence_messages);
            println!("----------------------------------------------------------");
        }
        if let Some(i) = &self.interconnect {
            println!("INTERCONNECT");
            println!("  total_messages         {}", i.total_messages);
            println!("  total_latency          {}", i.total_latency);
            println!("  congestion_events      {}", i.congestion_events);
            println!("  avg_hops               {:.2}", i.avg_hops());
            println!("  utilization            {:.2}%", i.utilization() * 100.0);
            println!("----------------------------------------------------------");
        }
        if self.trace.invalid_lines > 0 {
            println!(
                "trace: {} invalid line(s) skipped of {}",
                self.trace.invalid_lines, self.trace.lines
            );
            println!("----------------------------------------------------------");
        }
        println!("==========================================================");
    }

    fn print_cache(name: &str, c: &CacheStats) {
        println!("{name} CACHE");
        println!("  hits                   {}", c.hits);
        println!("  misses                 {}", c.misses);
        println!("  reads                  {}", c.reads);
        println!("  writes                 {}", c.writes);
        println!("  hit_rate               {:.2}%", c.hit_rate() * 100.0);
        println!("  miss_rate              {:.2}%", c.miss_rate() * 100.0);
        println!("  writebacks             {}", c.writebacks);
        if c.write_throughs > 0 {
            println!("  write_throughs         {}", c.write_throughs);
        }
        if c.prefetch_installs > 0 {
            println!("  prefetch_hits          {}", c.prefetch_hits);
            println!("  prefetch_installs      {}", c.prefetch_installs);
        }
        println!("----------------------------------------------------------");
    }

    /// Flattens the report into `(key, value)` rows for CSV export.
    ///
    /// Keys are dotted paths (`l1.hits`, `interconnect.avg_hops`, …) in a
    /// stable order.
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = Vec::new();
        let cache_rows = |rows: &mut Vec<(String, String)>, name: &str, c: &CacheStats| {
            rows.push((format!("{name}.hits"), c.hits.to_string()));
            rows.push((format!("{name}.misses"), c.misses.to_string()));
            rows.push((format!("{name}.reads"), c.reads.to_string()));
            rows.push((format!("{name}.writes"), c.writes.to_string()));
            rows.push((format!("{name}.writebacks"), c.writebacks.to_string()));
            rows.push((format!("{name}.hit_rate"), format!("{:.6}", c.hit_rate())));
            rows.push((format!("{name}.miss_rate"), format!("{:.6}", c.miss_rate())));
            rows.push((
                format!("{name}.prefetch_hits"),
                c.prefetch_hits.to_string(),
            ));
        };
        rows.push(("accesses".into(), self.l1.accesses().to_string()));
        rows.push(("cycles".into(), self.cycles.to_string()));
        cache_rows(&mut rows, "l1", &self.l1);
        if let Some(l2) = &self.l2 {
            cache_rows(&mut rows, "l2", l2);
        }
        if let Some(v) = &self.victim {
            rows.push(("victim.hits".into(), v.hits.to_string()));
            rows.push(("victim.misses".into(), v.misses.to_string()));
            rows.push(("victim.evictions".into(), v.evictions.to_string()));
        }
        if let Some(p) = &self.prefetch {
            rows.push(("prefetch.issued".into(), p.issued.to_string()));
            rows.push(("prefetch.confirmed".into(), p.confirmed.to_string()));
            rows.push(("prefetch.accuracy".into(), format!("{:.6}", p.accuracy())));
            rows.push(("prefetch.distance".into(), p.distance.to_string()));
        }
        if let Some(w) = &self.write_combining {
            rows.push(("write_combining.coalesced".into(), w.coalesced.to_string()));
            rows.push(("write_combining.flushes".into(), w.flushes.to_string()));
        }
        for (id, c) in self.cores.iter().enumerate() {
            rows.push((format!("core{id}.accesses"), c.accesses.to_string()));
            rows.push((format!("core{id}.hits"), c.hits.to_string()));
            rows.push((format!("core{id}.misses"), c.misses.to_string()));
            rows.push((
                format!("core{id}.coherence_misses"),
                c.coherence_misses.to_string(),
            ));
            rows.push((format!("core{id}.cycles"), c.cycles.to_string()));
        }
        if let Some(d) = &self.directory {
            rows.push(("directory.read_requests".into(), d.read_requests.to_string()));
            rows.push((
                "directory.write_requests".into(),
                d.write_requests.to_string(),
            ));
            rows.push(("directory.invalidations".into(), d.invalidations.to_string()));
            rows.push(("directory.writebacks".into(), d.writebacks.to_string()));
            rows.push((
                "directory.state_transitions".into(),
                d.state_transitions.to_string(),
            ));
        }
        if let Some(i) = &self.interconnect {
            rows.push((
                "interconnect.total_messages".into(),
                i.total_messages.to_string(),
            ));
            rows.push((
                "interconnect.total_latency".into(),
                i.total_latency.to_string(),
            ));
            rows.push((
                "interconnect.congestion_events".into(),
                i.congestion_events.to_string(),
            ));
            rows.push(("interconnect.avg_hops".into(), format!("{:.6}", i.avg_hops())));
            rows.push((
                "interconnect.utilization".into(),
                format!("{:.6}", i.utilization()),
            ));
        }
        rows.push(("trace.lines".into(), self.trace.lines.to_string()));
        rows.push((
            "trace.invalid_lines".into(),
            self.trace.invalid_lines.to_string(),
        ));
        rows
    }
}
