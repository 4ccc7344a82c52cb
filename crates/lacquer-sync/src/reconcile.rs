//! What the remote is known to hold, per collection.

use std::collections::HashMap;

use lacquer_shared::Record;

/// Per record: the last version known to match the remote (pushed or
/// received) and the contents of the last snapshot.
#[derive(Debug, Clone)]
pub struct Baseline<T> {
    known: HashMap<String, T>,
    seen: HashMap<String, T>,
}

impl<T> Default for Baseline<T> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            seen: HashMap::new(),
        }
    }
}

impl<T: Record> Baseline<T> {
    /// True when `record` differs from what the remote is known to hold.
    pub fn is_dirty(&self, record: &T) -> bool {
        self.known
            .get(record.id())
            .map_or(true, |synced| !synced.content_eq(record))
    }

    pub fn mark_synced(&mut self, record: &T) {
        self.known.insert(record.id().to_string(), record.clone());
    }

    /// Adopt a remote snapshot and return the previous one, which the merge
    /// uses to tell local edits from remote ones.
    ///
    /// Pushed records that no snapshot has shown yet stay known, so a
    /// snapshot taken before the push does not queue them again.
    pub fn advance(&mut self, remote: &[T]) -> HashMap<String, T> {
        let next: HashMap<String, T> = remote
            .iter()
            .map(|r| (r.id().to_string(), r.clone()))
            .collect();
        let unechoed: Vec<(String, T)> = self
            .known
            .drain()
            .filter(|(id, _)| !self.seen.contains_key(id) && !next.contains_key(id))
            .collect();
        self.known = next.clone();
        self.known.extend(unechoed);
        std::mem::replace(&mut self.seen, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacquer_shared::{Tool, ToolKind};

    fn tool(id: &str, name: &str) -> Tool {
        Tool {
            id: id.into(),
            name: name.into(),
            kind: ToolKind::Brush,
            ..Tool::default()
        }
    }

    #[test]
    fn unknown_and_edited_records_are_dirty() {
        let mut baseline = Baseline::default();
        assert!(baseline.is_dirty(&tool("a", "A")));

        baseline.mark_synced(&tool("a", "A"));
        assert!(!baseline.is_dirty(&tool("a", "A")));
        assert!(baseline.is_dirty(&tool("a", "renamed")));
    }

    #[test]
    fn server_stamp_does_not_make_a_record_dirty() {
        let mut baseline = Baseline::default();
        baseline.mark_synced(&tool("a", "A"));
        let mut echoed = tool("a", "A");
        echoed.updated_at = Some(42);
        assert!(!baseline.is_dirty(&echoed));
    }

    #[test]
    fn advance_returns_previous_snapshot() {
        let mut baseline = Baseline::default();
        assert!(baseline.advance(&[tool("a", "A")]).is_empty());

        let previous = baseline.advance(&[tool("b", "B"), tool("c", "C")]);
        assert_eq!(previous.len(), 1);
        assert!(previous.contains_key("a"));
        assert!(baseline.is_dirty(&tool("a", "A")));
        assert!(!baseline.is_dirty(&tool("c", "C")));
    }

    #[test]
    fn pushed_records_stay_known_until_echoed() {
        let mut baseline = Baseline::default();
        baseline.advance(&[tool("a", "A")]);
        baseline.mark_synced(&tool("new", "N"));

        // Snapshot taken before the push landed.
        let previous = baseline.advance(&[tool("a", "A")]);
        assert!(!previous.contains_key("new"));
        assert!(!baseline.is_dirty(&tool("new", "N")));

        // Once echoed and then removed remotely, it is gone.
        baseline.advance(&[tool("a", "A"), tool("new", "N")]);
        baseline.advance(&[tool("a", "A")]);
        assert!(baseline.is_dirty(&tool("new", "N")));
    }
}
