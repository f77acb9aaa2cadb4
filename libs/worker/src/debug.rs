//! Optional on-disk capture of intermediate artifacts.
//!
//! When enabled, every saved artifact lands in `{dir}/responses/` as
//! `{n}-{name}` with a per-name sequence number. Failures to write are
//! logged and never fatal; a disabled sink is a no-op.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

pub enum DebugSink {
    Enabled(EnabledDebug),
    Disabled,
}

impl DebugSink {
    /// Build a sink from the runtime flags.
    pub fn new(enabled: bool, dir: &str) -> io::Result<Self> {
        if enabled {
            info!(dir, "Creating debug storage");
            Ok(Self::Enabled(EnabledDebug::create(dir)?))
        } else {
            info!("Debug storage disabled");
            Ok(Self::Disabled)
        }
    }

    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Save one artifact. Write failures are logged, never propagated.
    pub fn save(&self, name: &str, bytes: &[u8]) {
        match self {
            Self::Enabled(sink) => {
                if let Err(e) = sink.save(name, bytes) {
                    warn!(name, error = %e, "Failed to write debug artifact");
                }
            }
            Self::Disabled => {}
        }
    }
}

pub struct EnabledDebug {
    response_dir: PathBuf,
    saved: Mutex<HashMap<String, u32>>,
}

impl EnabledDebug {
    fn create(dir: &str) -> io::Result<Self> {
        let response_dir = PathBuf::from(dir).join("responses");
        // Clear leftovers from a previous run.
        if response_dir.exists() {
            fs::remove_dir_all(&response_dir)?;
        }
        fs::create_dir_all(&response_dir)?;
        Ok(Self {
            response_dir,
            saved: Mutex::new(HashMap::new()),
        })
    }

    fn next_filename(&self, name: &str) -> String {
        let mut saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        let count = saved.entry(name.to_string()).or_insert(0);
        *count += 1;
        format!("{count}-{name}")
    }

    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let filename = self.next_filename(name);
        let path = self.response_dir.join(&filename);
        info!(file = %path.display(), "Writing debug artifact");
        fs::write(path, bytes)
    }
}
