use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::path::{SEPARATOR, container_variants, join, leaf_variants, normalize};
use crate::processor::{RotationResult, Substitution, WriteErrorAttribution, process_secret};
use crate::store::SecretStore;

/// Traversal limits and write-failure policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Sub-containers nested deeper than this below the base are not entered.
    pub max_depth: Option<usize>,
    pub attribution: WriteErrorAttribution,
}

/// Depth-first expansion of a base path into every secret below it.
///
/// The traversal keeps its own frame stack instead of recursing, so arbitrarily
/// deep hierarchies cannot exhaust the thread stack. Records are deduplicated
/// by `path:key` across the whole walk.
pub struct TreeWalker<'a, S: ?Sized> {
    store: &'a S,
    options: WalkOptions,
}

struct Frame {
    base: String,
    depth: usize,
    candidates: VecDeque<String>,
    listing: Option<(String, VecDeque<String>)>,
}

enum Step {
    Descend(String, usize),
    Leaf(String),
    Done(String),
}

impl Frame {
    fn new(base: String, depth: usize) -> Self {
        Self {
            candidates: container_variants(&base).into(),
            base,
            depth,
            listing: None,
        }
    }

    fn next_step(&mut self, mut list: impl FnMut(&str) -> Option<Vec<String>>) -> Step {
        loop {
            if let Some((container, entries)) = self.listing.as_mut() {
                if let Some(name) = entries.pop_front() {
                    return if name.ends_with(SEPARATOR) {
                        Step::Descend(normalize(&join(container, &name)), self.depth + 1)
                    } else {
                        Step::Leaf(join(container, &name))
                    };
                }
                self.listing = None;
            }
            match self.candidates.pop_front() {
                Some(candidate) => {
                    if let Some(entries) = list(&candidate) {
                        self.listing = Some((candidate, entries.into()));
                    }
                }
                None => return Step::Done(self.base.clone()),
            }
        }
    }
}

#[derive(Default)]
struct Accumulator {
    seen: HashSet<String>,
    results: Vec<RotationResult>,
}

impl Accumulator {
    fn admit(&mut self, batch: Vec<RotationResult>) {
        for result in batch {
            if self.seen.insert(result.identity()) {
                self.results.push(result);
            }
        }
    }
}

impl<'a, S> TreeWalker<'a, S>
where
    S: SecretStore + ?Sized,
{
    pub fn new(store: &'a S, options: WalkOptions) -> Self {
        Self { store, options }
    }

    /// Collect every matching field reachable from `base_path`.
    pub fn walk(&self, base_path: &str, substitution: &Substitution<'_>) -> Vec<RotationResult> {
        let mut accumulator = Accumulator::default();
        let mut listed = HashSet::new();
        let mut stack = vec![Frame::new(normalize(base_path), 0)];

        while let Some(frame) = stack.last_mut() {
            match frame.next_step(|candidate| self.list_container(candidate, &mut listed)) {
                Step::Descend(child, depth) => {
                    if self.options.max_depth.is_some_and(|max| depth > max) {
                        warn!(container = %child, depth, "max depth reached; not descending");
                        continue;
                    }
                    debug!(container = %child, depth, "exploring subdirectory");
                    stack.push(Frame::new(child, depth));
                }
                Step::Leaf(path) => {
                    debug!(secret = %path, "checking secret");
                    accumulator.admit(self.first_match(&path, substitution));
                }
                Step::Done(base) => {
                    stack.pop();
                    // the base itself may name a leaf secret
                    accumulator.admit(self.first_match(&base, substitution));
                }
            }
        }

        accumulator.results
    }

    /// Process the leaf variants of `path` in order; the first non-empty result wins.
    fn first_match(&self, path: &str, substitution: &Substitution<'_>) -> Vec<RotationResult> {
        for variant in leaf_variants(path) {
            let results = process_secret(self.store, &variant, substitution, self.options.attribution);
            if !results.is_empty() {
                return results;
            }
        }
        Vec::new()
    }

    /// A container enters `listed` only once it has been expanded, so a failed
    /// or empty listing still falls through to the next equivalent address.
    fn list_container(&self, candidate: &str, listed: &mut HashSet<String>) -> Option<Vec<String>> {
        let key = normalize(candidate);
        if listed.contains(&key) {
            debug!(container = %candidate, "container already expanded");
            return None;
        }
        match self.store.list(candidate) {
            Ok(Some(entries)) if !entries.is_empty() => {
                debug!(container = %candidate, entries = entries.len(), "listed container");
                listed.insert(key);
                Some(entries)
            }
            Ok(_) => None,
            Err(err) => {
                debug!(container = %candidate, error = %err, "listing failed; skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::rotate::OperationMode;
    use crate::store::SecretPayload;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LIST: Substitution<'static> = Substitution {
        old_value: "pw",
        new_value: "",
        mode: OperationMode::List,
    };

    /// Lists the same entries at every plain container; only `*/s` holds a secret.
    struct EchoStore {
        lists: AtomicUsize,
        entries: Vec<String>,
    }

    impl EchoStore {
        fn new(entries: &[&str]) -> Self {
            Self {
                lists: AtomicUsize::new(0),
                entries: entries.iter().map(|e| e.to_string()).collect(),
            }
        }
    }

    impl SecretStore for EchoStore {
        fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
            if path.contains("/metadata") {
                return Ok(None);
            }
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.entries.clone()))
        }

        fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
            if path.ends_with("/s") {
                let mut payload = SecretPayload::new();
                payload.insert("PASSWORD".into(), json!("pw"));
                Ok(Some(payload))
            } else {
                Ok(None)
            }
        }

        fn write(&self, _path: &str, _payload: SecretPayload) -> StoreResult<()> {
            Ok(())
        }

        fn delete(&self, _path: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn self_referencing_listing_terminates() {
        let store = EchoStore::new(&["/", "s"]);
        let walker = TreeWalker::new(&store, WalkOptions::default());
        let results = walker.walk("kv", &LIST);
        assert_eq!(results, vec![RotationResult::new("kv/s", "PASSWORD")]);
        // once `kv` is expanded, `kv/` and the `/` entry are not listed again
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
    }

    /// Plain container paths are rejected; only the trailing-slash form lists.
    struct SlashOnlyStore {
        attempts: parking_lot::Mutex<Vec<String>>,
    }

    impl SecretStore for SlashOnlyStore {
        fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
            self.attempts.lock().push(path.to_string());
            match path {
                "kv/app/" => Ok(Some(vec!["db".into()])),
                "kv/app" => Err(StoreError::Status {
                    status: 405,
                    body: "unsupported operation".into(),
                }),
                _ => Ok(None),
            }
        }

        fn read(&self, path: &str) -> StoreResult<Option<SecretPayload>> {
            if path == "kv/app/db" {
                let mut payload = SecretPayload::new();
                payload.insert("PASSWORD".into(), json!("pw"));
                Ok(Some(payload))
            } else {
                Ok(None)
            }
        }

        fn write(&self, _path: &str, _payload: SecretPayload) -> StoreResult<()> {
            Ok(())
        }

        fn delete(&self, _path: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_listing_falls_through_to_trailing_slash_variant() {
        let store = SlashOnlyStore {
            attempts: parking_lot::Mutex::new(Vec::new()),
        };
        let results = TreeWalker::new(&store, WalkOptions::default()).walk("kv/app", &LIST);
        assert_eq!(results, vec![RotationResult::new("kv/app/db", "PASSWORD")]);
        let attempts = store.attempts.lock().clone();
        assert_eq!(&attempts[..2], ["kv/app", "kv/app/"]);
    }

    #[test]
    fn depth_limit_stops_endless_nesting() {
        let store = EchoStore::new(&["loop/", "s"]);
        let options = WalkOptions {
            max_depth: Some(2),
            ..WalkOptions::default()
        };
        let results = TreeWalker::new(&store, options).walk("kv", &LIST);
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["kv/loop/loop/s", "kv/loop/s", "kv/s"]);
    }
}
