//! Replays recorded interactions from a cassette.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use super::format::{Cassette, Interaction};

/// `(port, method)`
type Channel = (String, String);

/// Serves a cassette's interactions in call order, one queue per port/method
/// pair, so the planner and image calls never steal each other's answers.
pub struct CassetteReplayer {
    name: String,
    queues: HashMap<Channel, VecDeque<Interaction>>,
    served: HashMap<Channel, usize>,
}

impl CassetteReplayer {
    /// Index a cassette by channel, ordered by `seq`.
    #[must_use]
    pub fn new(cassette: Cassette) -> Self {
        let mut interactions = cassette.interactions;
        interactions.sort_by_key(|interaction| interaction.seq);

        let mut queues: HashMap<Channel, VecDeque<Interaction>> = HashMap::new();
        for interaction in interactions {
            let channel = (interaction.port.clone(), interaction.method.clone());
            queues.entry(channel).or_default().push_back(interaction);
        }
        Self { name: cassette.name, queues, served: HashMap::new() }
    }

    /// Read a YAML cassette from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette: Cassette = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            name = %cassette.name,
            interactions = cassette.interactions.len(),
            "cassette loaded"
        );
        Ok(Self::new(cassette))
    }

    /// Name the cassette was recorded under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the next interaction recorded for `port`/`method`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the available channels when nothing was
    /// recorded for this one, or the count when it has been used up.
    pub fn next_interaction(&mut self, port: &str, method: &str) -> Result<Interaction, String> {
        let channel = (port.to_string(), method.to_string());
        let Some(queue) = self.queues.get_mut(&channel) else {
            let mut available: Vec<String> =
                self.queues.keys().map(|(p, m)| format!("{p}::{m}")).collect();
            available.sort();
            return Err(format!(
                "Cassette exhausted: no interactions recorded for port={port:?} method={method:?}. \
                 Available port::method pairs: [{}]",
                available.join(", ")
            ));
        };

        let served = self.served.entry(channel).or_insert(0);
        let interaction = queue.pop_front().ok_or_else(|| {
            format!(
                "Cassette exhausted: all {served} interactions for port={port:?} method={method:?} \
                 have been consumed."
            )
        })?;
        *served += 1;
        Ok(interaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn make_cassette(interactions: Vec<Interaction>) -> Cassette {
        Cassette { name: "test".into(), recorded_at: Utc::now(), commit: "abc".into(), interactions }
    }

    fn interaction(seq: u64, port: &str, prompt: &str) -> Interaction {
        Interaction {
            seq,
            port: port.into(),
            method: if port == "text_generator" { "complete" } else { "generate" }.into(),
            input: json!({"prompt": prompt}),
            output: json!({"Ok": {"url": prompt}}),
        }
    }

    #[test]
    fn replays_by_seq_not_file_order() {
        let mut replayer = CassetteReplayer::new(make_cassette(vec![
            interaction(1, "image_generator", "second"),
            interaction(0, "image_generator", "first"),
        ]));

        assert_eq!(replayer.next_interaction("image_generator", "generate").unwrap().seq, 0);
        assert_eq!(replayer.next_interaction("image_generator", "generate").unwrap().seq, 1);
    }

    #[test]
    fn ports_are_served_independently() {
        let mut replayer = CassetteReplayer::new(make_cassette(vec![
            interaction(1, "image_generator", "scene"),
            interaction(0, "text_generator", "plan"),
        ]));

        let image = replayer.next_interaction("image_generator", "generate").unwrap();
        assert_eq!(image.input["prompt"], "scene");
        let text = replayer.next_interaction("text_generator", "complete").unwrap();
        assert_eq!(text.input["prompt"], "plan");
    }

    #[test]
    fn exhausted_replayer_errors() {
        let mut replayer =
            CassetteReplayer::new(make_cassette(vec![interaction(0, "image_generator", "only")]));
        assert!(replayer.next_interaction("image_generator", "generate").is_ok());
        let err = replayer.next_interaction("image_generator", "generate").unwrap_err();
        assert!(err.contains("all 1 interactions"), "{err}");
    }

    #[test]
    fn unknown_port_lists_what_was_recorded() {
        let mut replayer =
            CassetteReplayer::new(make_cassette(vec![interaction(0, "text_generator", "plan")]));
        let err = replayer.next_interaction("image_generator", "generate").unwrap_err();
        assert!(err.contains("no interactions recorded"));
        assert!(err.contains("text_generator::complete"));
    }

    #[test]
    fn load_from_yaml() {
        let dir = std::env::temp_dir().join("cardnews_cassette_load_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.cassette.yaml");
        let cassette = make_cassette(vec![interaction(0, "image_generator", "a.png")]);
        std::fs::write(&path, serde_yaml::to_string(&cassette).unwrap()).unwrap();

        let mut replayer = CassetteReplayer::load(&path).unwrap();
        assert_eq!(replayer.name(), "test");
        let next = replayer.next_interaction("image_generator", "generate").unwrap();
        assert_eq!(next.output["Ok"]["url"], "a.png");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_nonexistent_fails() {
        let err = CassetteReplayer::load(Path::new("/nonexistent/cassette.yaml")).err().unwrap();
        assert!(err.contains("Failed to read cassette file"));
    }
}
