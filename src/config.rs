use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::Weights;

/// Everything that can go wrong before the engine runs. All of these are
/// fatal at the CLI. Infeasible placements are not errors and never appear
/// here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Malformed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("gpu.number must be at least 1")]
    NoGpus,

    #[error("gpu.capacity must not be empty")]
    EmptyCapacity,

    #[error("gpu.capacity entries must be positive, dimension {dimension} is 0")]
    ZeroCapacity { dimension: usize },

    #[error("mapping for pod type '{pod_type}' has {got} dimensions, capacity has {expected}")]
    DimensionMismatch {
        pod_type: String,
        got: usize,
        expected: usize,
    },

    #[error("no mapping found for pod type '{pod_type}'")]
    UnknownPodType { pod_type: String },

    #[error("initial state references GPU {gpu}, valid indices are 0..{gpus}")]
    BadGpuIndex { gpu: usize, gpus: usize },

    #[error("unknown pod type '{pod_type}' in initial state for GPU {gpu}")]
    UnknownInitialPodType { pod_type: String, gpu: usize },

    #[error(
        "initial state for GPU {gpu} exceeds capacity in dimension {dimension} ({used} > {capacity})"
    )]
    InitialOverflow {
        gpu: usize,
        dimension: usize,
        used: u32,
        capacity: u32,
    },
}

/// The `gpu:` block: the pool every workload is packed onto.
#[derive(Debug, Clone, Deserialize)]
pub struct GpuPool {
    /// Number of identical GPUs.
    pub number: usize,
    /// Capacity of each GPU, one entry per resource dimension.
    pub capacity: Weights,
    /// Pod type to demand vector.
    pub mappings: BTreeMap<String, Weights>,
    /// Optional per-type cap on how many placements a type may consume.
    #[serde(default)]
    pub quota: Option<BTreeMap<String, u32>>,
    /// Pods already sitting on specific GPUs before this run.
    #[serde(default, rename = "initialState")]
    pub initial_state: Option<BTreeMap<usize, Vec<String>>>,
}

/// One pod lifetime in the timeline form of `pods:`.
#[derive(Debug, Clone, Deserialize)]
pub struct PodSpec {
    #[serde(rename = "type")]
    pub pod_type: String,
    #[serde(rename = "addTime")]
    pub add_time: i64,
    #[serde(default, rename = "removeTime")]
    pub remove_time: Option<i64>,
}

/// The two accepted shapes of `pods:`. The mapping form asks for a static
/// placement (plus the slack enumeration), the sequence form for a timeline
/// replay.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PodRequest {
    Counts(BTreeMap<String, u32>),
    Timeline(Vec<PodSpec>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub gpu: GpuPool,
    pub pods: PodRequest,
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let cfg: Config =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check everything that must hold before the engine sees the input:
    /// a usable pool, consistent dimensions, known pod types, and an
    /// initial state that actually fits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gpu.number == 0 {
            return Err(ConfigError::NoGpus);
        }
        if self.gpu.capacity.is_empty() {
            return Err(ConfigError::EmptyCapacity);
        }
        if let Some(dimension) = self.gpu.capacity.iter().position(|&c| c == 0) {
            return Err(ConfigError::ZeroCapacity { dimension });
        }

        let dims = self.gpu.capacity.len();
        for (pod_type, weights) in &self.gpu.mappings {
            if weights.len() != dims {
                return Err(ConfigError::DimensionMismatch {
                    pod_type: pod_type.clone(),
                    got: weights.len(),
                    expected: dims,
                });
            }
        }

        match &self.pods {
            PodRequest::Counts(counts) => {
                for pod_type in counts.keys() {
                    self.known_type(pod_type)?;
                }
            }
            PodRequest::Timeline(specs) => {
                for spec in specs {
                    self.known_type(&spec.pod_type)?;
                }
            }
        }

        self.validate_initial_state()
    }

    fn known_type(&self, pod_type: &str) -> Result<(), ConfigError> {
        if self.gpu.mappings.contains_key(pod_type) {
            Ok(())
        } else {
            Err(ConfigError::UnknownPodType {
                pod_type: pod_type.to_string(),
            })
        }
    }

    fn validate_initial_state(&self) -> Result<(), ConfigError> {
        let Some(state) = &self.gpu.initial_state else {
            return Ok(());
        };
        for (&gpu, pods) in state {
            if gpu >= self.gpu.number {
                return Err(ConfigError::BadGpuIndex {
                    gpu,
                    gpus: self.gpu.number,
                });
            }
            let mut used = vec![0u32; self.gpu.capacity.len()];
            for pod_type in pods {
                let Some(weights) = self.gpu.mappings.get(pod_type) else {
                    return Err(ConfigError::UnknownInitialPodType {
                        pod_type: pod_type.clone(),
                        gpu,
                    });
                };
                for (dimension, w) in weights.iter().enumerate() {
                    used[dimension] += w;
                    if used[dimension] > self.gpu.capacity[dimension] {
                        return Err(ConfigError::InitialOverflow {
                            gpu,
                            dimension,
                            used: used[dimension],
                            capacity: self.gpu.capacity[dimension],
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The K x D matrix of pre-existing usage, consumed by the solver and
    /// the simulator. Call only on a validated configuration.
    pub fn initial_usage(&self) -> Vec<Weights> {
        let mut usage = vec![vec![0u32; self.gpu.capacity.len()]; self.gpu.number];
        if let Some(state) = &self.gpu.initial_state {
            for (&gpu, pods) in state {
                for pod_type in pods {
                    let weights = &self.gpu.mappings[pod_type.as_str()];
                    for (dimension, w) in weights.iter().enumerate() {
                        usage[gpu][dimension] += w;
                    }
                }
            }
        }
        usage
    }
}
