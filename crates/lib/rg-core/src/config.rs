//! Engine-level configuration, deserialized from an optional TOML file.
//! Every field has a sane default so a missing config file is not an
//! error; this mirrors how the rest of the ambient stack treats absent
//! configuration as "use defaults" rather than a hard failure.

use serde::Deserialize;

use crate::thread_pool::worker_count_default;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub frames_in_flight: u32,
    pub worker_threads: usize,
    pub require_synchronization2: bool,
    pub require_timeline_semaphore: bool,
    pub deletion_queue: DeletionQueueConfig,
    pub command_arena: CommandArenaConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            worker_threads: worker_count_default(),
            require_synchronization2: false,
            require_timeline_semaphore: false,
            deletion_queue: DeletionQueueConfig::default(),
            command_arena: CommandArenaConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct DeletionQueueConfig {
    pub max_retries: u32,
    pub max_frame_age: u64,
    pub base_retry_backoff_frames: u64,
    pub hard_fail_in_debug: bool,
}

impl Default for DeletionQueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            max_frame_age: 512,
            base_retry_backoff_frames: 1,
            hard_fail_in_debug: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CommandArenaConfig {
    pub reserved_primary_buffers_per_worker: u32,
    pub reserved_secondary_buffers_per_worker: u32,
}

impl Default for CommandArenaConfig {
    fn default() -> Self {
        Self {
            reserved_primary_buffers_per_worker: 4,
            reserved_secondary_buffers_per_worker: 2,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file; falls back to defaults (with a warning) if
    /// the file does not exist at all, but surfaces malformed TOML as an
    /// error since that is almost certainly a typo, not an absent file.
    pub fn load_or_default(path: &std::path::Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("no config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
