use crate::loader::InputFormat;
use crate::models::Afi;

/// What a pipeline run computes and how many threads it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of worker threads, at least 1.
    pub workers: usize,
    /// Address families to compute statistics and diffs for.
    pub afis: Vec<Afi>,
    pub stats: bool,
    pub diffs: bool,
    pub origins: bool,
    /// Include per origin AS distributions in statistics.
    pub as_distribution: bool,
    /// Snapshots each worker keeps loaded for reuse.
    pub cache_size: usize,
    pub input_format: InputFormat,
    /// Items dispatched but not yet written, at least 1. Bounds the writer's re-order buffer.
    pub reorder_window: usize,
}

/// Half the available hardware parallelism, at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workers: default_workers(),
            afis: Afi::all().to_vec(),
            stats: true,
            diffs: true,
            origins: false,
            as_distribution: false,
            cache_size: 3,
            input_format: InputFormat::Mrt,
            reorder_window: 64,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_afis(mut self, afis: &[Afi]) -> Self {
        self.afis = afis.to_vec();
        self
    }

    pub fn with_products(mut self, stats: bool, diffs: bool, origins: bool) -> Self {
        self.stats = stats;
        self.diffs = diffs;
        self.origins = origins;
        self
    }

    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_as_distribution(mut self, enabled: bool) -> Self {
        self.as_distribution = enabled;
        self
    }

    pub fn with_reorder_window(mut self, window: usize) -> Self {
        self.reorder_window = window.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.afis, vec![Afi::Ipv4, Afi::Ipv6]);
        assert!(config.stats && config.diffs && !config.origins);
        assert_eq!(PipelineConfig::default().with_workers(0).workers, 1);
        assert_eq!(
            PipelineConfig::default().with_reorder_window(0).reorder_window,
            1
        );
    }
}
