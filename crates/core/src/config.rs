//! Configuration system for the cache simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize a simulation run. It provides:
//! 1. **Defaults:** Baseline hardware constants (cache geometry, prefetch
//!    distances, interconnect latency).
//! 2. **Structures:** Hierarchical config for L1/L2 geometry, prefetching,
//!    victim cache, write combining, and the multiprocessor system.
//! 3. **Validation:** `SimConfig::validate` rejects impossible geometries
//!    before any state is built, naming the offending JSON key.
//!
//! Configuration is supplied as JSON (`SimConfig::from_json` /
//! `SimConfig::from_file`) or via `SimConfig::default()` for the CLI.

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden in a JSON configuration file.
pub mod defaults {
    /// Default L1 cache size in bytes (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;

    /// Default L1 associativity (4 ways).
    pub const L1_ASSOCIATIVITY: usize = 4;

    /// Default cache block size in bytes (64 bytes).
    ///
    /// Matches typical modern processor line sizes.
    pub const BLOCK_SIZE: usize = 64;

    /// Default victim cache capacity in entries.
    pub const VICTIM_CACHE_SIZE: usize = 4;

    /// Default prefetch distance (blocks fetched ahead per trigger).
    pub const PREFETCH_DISTANCE: usize = 4;

    /// Minimum prefetch distance the adaptive prefetcher will shrink to.
    pub const PREFETCH_DISTANCE_MIN: usize = 1;

    /// Maximum prefetch distance the adaptive prefetcher will grow to.
    pub const PREFETCH_DISTANCE_MAX: usize = 32;

    /// Stride predictor table size (entries; must be a power of two).
    pub const STRIDE_TABLE_SIZE: usize = 64;

    /// Sliding window, in accesses, over which prefetch effectiveness is
    /// evaluated before the distance is adjusted.
    pub const PREFETCH_WINDOW: usize = 1024;

    /// Effectiveness at or above which the prefetch distance doubles.
    pub const PREFETCH_HIGH_THRESHOLD: f64 = 0.60;

    /// Effectiveness below which the prefetch distance halves.
    pub const PREFETCH_LOW_THRESHOLD: f64 = 0.20;

    /// Default number of simulated processors in multiprocessor mode.
    pub const NUM_PROCESSORS: usize = 2;

    /// Largest supported multiprocessor configuration.
    pub const MAX_PROCESSORS: usize = 64;

    /// Default base interconnect latency in cycles.
    pub const INTERCONNECT_LATENCY: u64 = 2;

    /// Interconnect transfer width in bytes (payload cycles = ⌈payload/width⌉).
    pub const INTERCONNECT_WIDTH: u64 = 8;

    /// Mesh router congestion threshold before the hop penalty applies.
    pub const MESH_CONGESTION_THRESHOLD: u64 = 4;

    /// Default write-combining buffer capacity in blocks.
    pub const WRITE_COMBINING_SIZE: usize = 8;

    /// Default write-combining flush timeout, in processed accesses since
    /// the buffer last changed.
    pub const WRITE_COMBINING_TIMEOUT: u64 = 64;

    /// Cycles charged for an L1 hit in the per-core latency model.
    pub const HIT_CYCLES: u64 = 1;

    /// Cycles charged for a miss that terminates at memory.
    pub const MISS_PENALTY: u64 = 100;
}

/// Cache replacement policy algorithms.
///
/// Selects which way to evict when a set is full. All variants share the
/// invalid-way-first rule: an invalid way is always preferred over evicting
/// a valid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicyKind {
    /// Least Recently Used: evict the way untouched for longest.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// First In First Out: evict the way installed earliest.
    #[serde(alias = "Fifo")]
    Fifo,
    /// Random: evict a uniformly random valid way (xorshift LFSR).
    #[serde(alias = "Random")]
    Random,
    /// Tree-based Pseudo-LRU: W-1 bits pointing away from recent use.
    #[serde(alias = "Plru")]
    Plru,
    /// Not Recently Used: one reference bit per way, cleared globally when
    /// every valid way is referenced.
    #[serde(alias = "Nru")]
    Nru,
    /// Most Recently Used: evict the way touched last. Effective for cyclic
    /// scans larger than the cache.
    #[serde(alias = "Mru")]
    Mru,
}

/// Write policy for a cache level.
///
/// The allocate side defaults to the conventional pairing (write-back ⇒
/// write-allocate, write-through ⇒ no-write-allocate) unless `writeAllocate`
/// overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WritePolicyKind {
    /// Write-back: dirty blocks are forwarded to the next level on eviction.
    #[default]
    WriteBack,
    /// Write-through: every write is forwarded to the next level.
    WriteThrough,
}

/// Cache coherence protocol for multiprocessor simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoherenceProtocolKind {
    /// Modified / Exclusive / Shared / Invalid.
    #[default]
    Mesi,
}

/// Interconnect topology between cores and the coherence directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InterconnectKind {
    /// Single shared bus; messages serialize.
    #[default]
    Bus,
    /// Per-destination ports; conflicting sends stall.
    Crossbar,
    /// 2D mesh with XY routing and per-router congestion tracking.
    Mesh,
}

/// Root configuration for a simulation run.
///
/// # Examples
///
/// ```
/// use cachesim_core::config::SimConfig;
///
/// let json = r#"{
///     "l1": {
///         "size": 256,
///         "associativity": 2,
///         "blockSize": 64,
///         "replacementPolicy": "LRU",
///         "writePolicy": "WriteBack"
///     },
///     "victimCache": { "enabled": true, "size": 4 }
/// }"#;
///
/// let config = SimConfig::from_json(json).unwrap();
/// assert_eq!(config.l1.size, 256);
/// assert_eq!(config.l1.num_sets(), 2);
/// assert!(config.victim_cache.enabled);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimConfig {
    /// L1 cache geometry and policies.
    #[serde(default)]
    pub l1: CacheLevelConfig,

    /// Optional L2 cache; present iff the object is given.
    #[serde(default)]
    pub l2: Option<CacheLevelConfig>,

    /// Victim cache attached to L1.
    #[serde(default)]
    pub victim_cache: VictimCacheConfig,

    /// Multiprocessor system configuration.
    #[serde(default)]
    pub multiprocessor: MultiprocessorConfig,

    /// Write-combining buffer on the L1 → next-level write path.
    #[serde(default)]
    pub write_combining: WriteCombiningConfig,

    /// When true, the first malformed trace line aborts the run instead of
    /// being counted and skipped.
    #[serde(default)]
    pub strict: bool,
}

/// Geometry and policies for one cache level.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheLevelConfig {
    /// Total capacity in bytes.
    #[serde(default = "CacheLevelConfig::default_size")]
    pub size: usize,

    /// Number of ways per set.
    #[serde(default = "CacheLevelConfig::default_associativity")]
    pub associativity: usize,

    /// Block (line) size in bytes.
    #[serde(default = "CacheLevelConfig::default_block_size")]
    pub block_size: usize,

    /// Victim selection algorithm.
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyKind,

    /// Write-back or write-through.
    #[serde(default)]
    pub write_policy: WritePolicyKind,

    /// Explicit allocate-on-write-miss override. `None` pairs allocate with
    /// the write policy (back ⇒ allocate, through ⇒ no-allocate).
    #[serde(default)]
    pub write_allocate: Option<bool>,

    /// Prefetch configuration for this level.
    #[serde(default)]
    pub prefetching: PrefetchConfig,
}

impl CacheLevelConfig {
    fn default_size() -> usize {
        defaults::L1_SIZE
    }

    fn default_associativity() -> usize {
        defaults::L1_ASSOCIATIVITY
    }

    fn default_block_size() -> usize {
        defaults::BLOCK_SIZE
    }

    /// Number of sets implied by the geometry (`size / (associativity · block)`).
    pub fn num_sets(&self) -> usize {
        self.size / (self.associativity * self.block_size)
    }

    /// Whether write misses allocate a block at this level.
    pub fn allocates_on_write(&self) -> bool {
        self.write_allocate
            .unwrap_or(self.write_policy == WritePolicyKind::WriteBack)
    }

    /// Validates this level's geometry, reporting errors under `prefix`
    /// (e.g. `l1` or `l2`).
    pub fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        let pow2 = |key: &str, value: usize| -> Result<(), ConfigError> {
            if value == 0 || !value.is_power_of_two() {
                Err(ConfigError::new(
                    format!("{prefix}.{key}"),
                    format!("{value} is not a positive power of two"),
                ))
            } else {
                Ok(())
            }
        };
        pow2("size", self.size)?;
        pow2("associativity", self.associativity)?;
        pow2("blockSize", self.block_size)?;

        let blocks = self.size / self.block_size;
        if self.associativity > blocks {
            return Err(ConfigError::new(
                format!("{prefix}.associativity"),
                format!(
                    "associativity {} exceeds the {} blocks the cache holds",
                    self.associativity, blocks
                ),
            ));
        }
        if self.size % (self.associativity * self.block_size) != 0 {
            return Err(ConfigError::new(
                format!("{prefix}.size"),
                "size must equal associativity × blockSize × sets".to_string(),
            ));
        }
        if self.prefetching.enabled && self.prefetching.distance == 0 {
            return Err(ConfigError::new(
                format!("{prefix}.prefetching.distance"),
                "prefetch distance must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheLevelConfig {
    fn default() -> Self {
        Self {
            size: defaults::L1_SIZE,
            associativity: defaults::L1_ASSOCIATIVITY,
            block_size: defaults::BLOCK_SIZE,
            replacement_policy: ReplacementPolicyKind::default(),
            write_policy: WritePolicyKind::default(),
            write_allocate: None,
            prefetching: PrefetchConfig::default(),
        }
    }
}

/// Prefetch configuration for one cache level.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrefetchConfig {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,

    /// Stream-buffer depth (blocks fetched ahead per trigger).
    #[serde(default = "PrefetchConfig::default_distance")]
    pub distance: usize,

    /// When true, the distance adapts to observed usefulness.
    #[serde(default)]
    pub adaptive: bool,

    /// When true, a stride predictor runs alongside the stream buffer.
    #[serde(default)]
    pub stride_prediction: bool,
}

impl PrefetchConfig {
    fn default_distance() -> usize {
        defaults::PREFETCH_DISTANCE
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            distance: defaults::PREFETCH_DISTANCE,
            adaptive: false,
            stride_prediction: false,
        }
    }
}

/// Victim cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VictimCacheConfig {
    /// Master switch. A disabled victim cache is never queried.
    #[serde(default)]
    pub enabled: bool,

    /// Capacity in entries.
    #[serde(default = "VictimCacheConfig::default_size")]
    pub size: usize,

    /// Replacement within the victim cache. Only FIFO is modeled.
    #[serde(default = "VictimCacheConfig::default_policy")]
    pub replacement_policy: ReplacementPolicyKind,
}

impl VictimCacheConfig {
    fn default_size() -> usize {
        defaults::VICTIM_CACHE_SIZE
    }

    fn default_policy() -> ReplacementPolicyKind {
        ReplacementPolicyKind::Fifo
    }
}

impl Default for VictimCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: defaults::VICTIM_CACHE_SIZE,
            replacement_policy: ReplacementPolicyKind::Fifo,
        }
    }
}

/// Multiprocessor system configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MultiprocessorConfig {
    /// Master switch; when false the simulator runs the single-core path.
    #[serde(default)]
    pub enabled: bool,

    /// Number of simulated cores.
    #[serde(default = "MultiprocessorConfig::default_processors")]
    pub num_processors: usize,

    /// Coherence protocol (MESI).
    #[serde(default)]
    pub coherence_protocol: CoherenceProtocolKind,

    /// Interconnect topology.
    #[serde(default)]
    pub interconnect: InterconnectKind,

    /// Base interconnect latency in cycles.
    #[serde(default = "MultiprocessorConfig::default_latency")]
    pub interconnect_latency: u64,
}

impl MultiprocessorConfig {
    fn default_processors() -> usize {
        defaults::NUM_PROCESSORS
    }

    fn default_latency() -> u64 {
        defaults::INTERCONNECT_LATENCY
    }
}

impl Default for MultiprocessorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            num_processors: defaults::NUM_PROCESSORS,
            coherence_protocol: CoherenceProtocolKind::Mesi,
            interconnect: InterconnectKind::Bus,
            interconnect_latency: defaults::INTERCONNECT_LATENCY,
        }
    }
}

/// Write-combining buffer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WriteCombiningConfig {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,

    /// Capacity in pending blocks.
    #[serde(default = "WriteCombiningConfig::default_buffer_size")]
    pub buffer_size: usize,

    /// Flush timeout, in processed accesses since last buffer activity.
    #[serde(default = "WriteCombiningConfig::default_timeout")]
    pub timeout: u64,
}

impl WriteCombiningConfig {
    fn default_buffer_size() -> usize {
        defaults::WRITE_COMBINING_SIZE
    }

    fn default_timeout() -> u64 {
        defaults::WRITE_COMBINING_TIMEOUT
    }
}

impl Default for WriteCombiningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: defaults::WRITE_COMBINING_SIZE,
            timeout: defaults::WRITE_COMBINING_TIMEOUT,
        }
    }
}

impl SimConfig {
    /// Parses a configuration from a JSON string and validates it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the JSON is malformed, contains unknown
    /// keys, or fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::new("<json>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or the contents
    /// fail [`from_json`](Self::from_json).
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::new(path.display().to_string(), e.to_string()))?;
        Self::from_json(&text)
    }

    /// Checks every validation rule, returning the first violation.
    ///
    /// Rules: all sizes are powers of two; `associativity ≤ size/blockSize`;
    /// `prefetching.distance ≥ 1`; victim cache size ≥ 1 when enabled;
    /// `1 ≤ numProcessors ≤ 64`; write-combining buffer size and timeout ≥ 1
    /// when enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.l1.validate("l1")?;
        if let Some(l2) = &self.l2 {
            l2.validate("l2")?;
        }

        if self.victim_cache.enabled && self.victim_cache.size == 0 {
            return Err(ConfigError::new(
                "victimCache.size",
                "an enabled victim cache needs at least one entry",
            ));
        }

        let n = self.multiprocessor.num_processors;
        if self.multiprocessor.enabled && !(1..=defaults::MAX_PROCESSORS).contains(&n) {
            return Err(ConfigError::new(
                "multiprocessor.numProcessors",
                format!("{n} is outside the supported range 1..={}", defaults::MAX_PROCESSORS),
            ));
        }
        if self.multiprocessor.enabled && self.multiprocessor.interconnect_latency == 0 {
            return Err(ConfigError::new(
                "multiprocessor.interconnectLatency",
                "interconnect latency must be at least 1 cycle",
            ));
        }

        if self.write_combining.enabled {
            if self.write_combining.buffer_size == 0 {
                return Err(ConfigError::new(
                    "writeCombining.bufferSize",
                    "an enabled write-combining buffer needs at least one slot",
                ));
            }
            if self.write_combining.timeout == 0 {
                return Err(ConfigError::new(
                    "writeCombining.timeout",
                    "timeout must be at least one access",
                ));
            }
        }
        Ok(())
    }
}
