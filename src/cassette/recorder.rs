//! Records interactions into a cassette file.

use std::path::PathBuf;

use chrono::Utc;

use super::format::{Cassette, Interaction};

/// Records interactions and writes them as a YAML cassette file.
///
/// Calls are numbered when they start, so interactions that finish out of
/// order (concurrent scene requests) are still stored in call order.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    commit: String,
    interactions: Vec<Interaction>,
}

impl CassetteRecorder {
    /// Create a new recorder that will write to the given path.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self { path: path.into(), name: name.into(), commit: commit.into(), interactions: Vec::new() }
    }

    /// Open an interaction and return its sequence number.
    pub fn begin(
        &mut self,
        port: impl Into<String>,
        method: impl Into<String>,
        input: serde_json::Value,
    ) -> u64 {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.into(),
            method: method.into(),
            input,
            output: serde_json::Value::Null,
        });
        seq
    }

    /// Store the outcome of an interaction opened with [`CassetteRecorder::begin`].
    pub fn complete(&mut self, seq: u64, output: serde_json::Value) {
        if let Some(interaction) = usize::try_from(seq).ok().and_then(|i| self.interactions.get_mut(i)) {
            interaction.output = output;
        }
    }

    /// Interactions recorded so far.
    #[cfg(test)]
    pub(crate) fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Finish recording and write the cassette YAML file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        let cassette = Cassette {
            name: self.name,
            recorded_at: Utc::now(),
            commit: self.commit,
            interactions: self.interactions,
        };
        let yaml = serde_yaml::to_string(&cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(self.path)
    }
}
