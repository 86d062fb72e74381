use std::sync::Arc;

use keysweep_core::{Rotator, SecretStore, WalkOptions};

pub type SharedStore = Arc<dyn SecretStore>;
pub type SharedRotator = Arc<Rotator<SharedStore>>;

#[derive(Clone)]
pub struct AppState {
    pub rotator: SharedRotator,
}

impl AppState {
    pub fn new(store: SharedStore, root: &str, options: WalkOptions) -> Self {
        let rotator = Rotator::new(store).with_root(root).with_options(options);
        Self {
            rotator: Arc::new(rotator),
        }
    }

    pub fn store(&self) -> &SharedStore {
        self.rotator.store()
    }

    /// Container used for requests that do not name one.
    pub fn root(&self) -> &str {
        self.rotator.root()
    }
}
