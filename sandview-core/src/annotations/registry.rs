use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use sandview_model::MachineId;

use crate::annotations::AnnotationStore;
use crate::platform::DataPlatform;

/// Session-scoped registry of [`AnnotationStore`]s, one per machine.
///
/// Reusing a store keeps its blob cache warm, so repeated reads within a
/// session do not refetch. Create the registry when the session starts and
/// drop it when the session ends; the caches go with it.
pub struct AnnotationRegistry {
    platform: Arc<dyn DataPlatform>,
    stores: DashMap<MachineId, Arc<AnnotationStore>>,
}

impl std::fmt::Debug for AnnotationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationRegistry")
            .field("stores", &self.stores.len())
            .finish()
    }
}

impl AnnotationRegistry {
    pub fn new(platform: Arc<dyn DataPlatform>) -> Self {
        Self {
            platform,
            stores: DashMap::new(),
        }
    }

    /// The store for a machine, created on first use.
    pub fn store_for(&self, machine_id: &MachineId) -> Arc<AnnotationStore> {
        self.stores
            .entry(machine_id.clone())
            .or_insert_with(|| {
                debug!(machine = %machine_id, "creating annotation store");
                Arc::new(AnnotationStore::new(
                    Arc::clone(&self.platform),
                    machine_id.clone(),
                ))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::InMemoryPlatform;

    #[test]
    fn same_machine_reuses_one_store() {
        let registry =
            AnnotationRegistry::new(Arc::new(InMemoryPlatform::new()));
        let machine = MachineId::new("machine-1");

        let first = registry.store_for(&machine);
        let second = registry.store_for(&machine);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        registry.store_for(&MachineId::new("machine-2"));
        assert_eq!(registry.len(), 2);
    }
}
