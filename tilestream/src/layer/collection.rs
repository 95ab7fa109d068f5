//! Priority arbitration between layers of one channel.
//!
//! The current layer is the highest priority layer among the base layer and
//! the active added layers. Ties keep the earlier registered layer, with the
//! base layer first. The choice is recomputed whenever a layer is added,
//! removed or changes activity, and observers hear about it only when the
//! winning layer actually changes.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::events::{Observers, SubscriptionId};

use super::{CollectionError, Layer, LayerHandle, LayerId};

struct Entry<D> {
    layer: Arc<dyn Layer<D>>,
    subscription: SubscriptionId,
}

struct State<D> {
    added: Vec<Entry<D>>,
    current: Arc<dyn Layer<D>>,
}

struct CollectionInner<D> {
    base: Arc<dyn Layer<D>>,
    state: Mutex<State<D>>,
    observers: Observers<Arc<dyn Layer<D>>>,
}

impl<D: 'static> CollectionInner<D> {
    fn recompute(&self) {
        let changed = {
            let mut state = self.state.lock();
            let winner = select_current(&self.base, &state.added);
            if winner.id() == state.current.id() {
                None
            } else {
                state.current = Arc::clone(&winner);
                Some(winner)
            }
        };

        if let Some(current) = changed {
            info!(
                layer = %current.name(),
                priority = current.priority(),
                channel = %current.channel(),
                "Current layer changed"
            );
            self.observers.notify(&current);
        }
    }
}

impl<D> Drop for CollectionInner<D> {
    fn drop(&mut self) {
        for entry in &self.state.get_mut().added {
            entry.layer.unsubscribe(entry.subscription);
        }
    }
}

fn select_current<D>(base: &Arc<dyn Layer<D>>, added: &[Entry<D>]) -> Arc<dyn Layer<D>> {
    let mut best = base;
    for entry in added {
        if entry.layer.is_active() && entry.layer.priority() > best.priority() {
            best = &entry.layer;
        }
    }
    Arc::clone(best)
}

/// Layers of one data type with a base fallback.
pub struct LayerCollection<D> {
    inner: Arc<CollectionInner<D>>,
}

impl<D> Clone for LayerCollection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: 'static> LayerCollection<D> {
    /// Creates a collection whose current layer is `base`.
    pub fn new(base: Arc<dyn Layer<D>>) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                state: Mutex::new(State {
                    added: Vec::new(),
                    current: Arc::clone(&base),
                }),
                base,
                observers: Observers::new(),
            }),
        }
    }

    pub fn base(&self) -> Arc<dyn Layer<D>> {
        Arc::clone(&self.inner.base)
    }

    pub fn current(&self) -> Arc<dyn Layer<D>> {
        Arc::clone(&self.inner.state.lock().current)
    }

    /// The base layer followed by the added layers in registration order.
    pub fn layers(&self) -> Vec<Arc<dyn Layer<D>>> {
        let state = self.inner.state.lock();
        std::iter::once(Arc::clone(&self.inner.base))
            .chain(state.added.iter().map(|e| Arc::clone(&e.layer)))
            .collect()
    }

    pub fn get(&self, id: LayerId) -> Option<Arc<dyn Layer<D>>> {
        if self.inner.base.id() == id {
            return Some(self.base());
        }
        self.inner
            .state
            .lock()
            .added
            .iter()
            .find(|e| e.layer.id() == id)
            .map(|e| Arc::clone(&e.layer))
    }

    pub fn add(&self, layer: Arc<dyn Layer<D>>) -> Result<(), CollectionError> {
        let id = layer.id();
        if self.get(id).is_some() {
            return Err(CollectionError::DuplicateLayer(id));
        }

        let weak: Weak<CollectionInner<D>> = Arc::downgrade(&self.inner);
        let subscription = layer.on_active_changed(Box::new(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.recompute();
            }
        }));
        debug!(layer = %layer.name(), priority = layer.priority(), "Layer added");
        self.inner.state.lock().added.push(Entry {
            layer,
            subscription,
        });
        self.inner.recompute();
        Ok(())
    }

    /// Removes an added layer. Returns `Ok(false)` if it was not present.
    pub fn remove(&self, id: LayerId) -> Result<bool, CollectionError> {
        if self.inner.base.id() == id {
            return Err(CollectionError::BaseLayerRemoval);
        }
        let removed = {
            let mut state = self.inner.state.lock();
            let position = state.added.iter().position(|e| e.layer.id() == id);
            position.map(|i| state.added.remove(i))
        };
        let Some(entry) = removed else {
            return Ok(false);
        };
        entry.layer.unsubscribe(entry.subscription);
        debug!(layer = %entry.layer.name(), "Layer removed");
        self.inner.recompute();
        Ok(true)
    }

    /// Activates or deactivates a layer. The base layer cannot be
    /// deactivated.
    pub fn set_layer_active(&self, id: LayerId, active: bool) -> Result<(), CollectionError> {
        if self.inner.base.id() == id {
            if !active {
                return Err(CollectionError::BaseLayerDeactivation);
            }
            self.inner.base.set_active(true);
            return Ok(());
        }
        let layer = self.get(id).ok_or(CollectionError::UnknownLayer(id))?;
        layer.set_active(active);
        Ok(())
    }

    /// Registers an observer for current-layer changes.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Arc<dyn Layer<D>>) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Drops every cached result of every layer.
    pub fn clear_caches(&self) {
        for layer in self.layers() {
            layer.clear_cache();
        }
    }
}

impl<D: 'static> std::fmt::Debug for LayerCollection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.layers().iter().map(|l| l.name().to_string()).collect();
        f.debug_struct("LayerCollection")
            .field("layers", &names)
            .field("current", &self.current().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::BoundedArea;
    use crate::layer::{BoxFuture, DataLayer, LayerSettings, LayerSource, SourceError};
    use crate::render::Texture;
    use crate::tile::TileAddress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Blank;

    impl LayerSource for Blank {
        type Data = Texture;

        fn fetch<'a>(
            &'a self,
            _tile: TileAddress,
            _area: &'a BoundedArea,
        ) -> BoxFuture<'a, Result<Texture, SourceError>> {
            Box::pin(async { Ok(Texture::solid(1, 1, [0; 4])) })
        }
    }

    fn layer(name: &str, priority: i32) -> Arc<DataLayer<Blank>> {
        Arc::new(DataLayer::new(LayerSettings::new(name, priority), Blank).unwrap())
    }

    fn collection() -> (LayerCollection<Texture>, Arc<DataLayer<Blank>>) {
        let base = layer("base", i32::MIN);
        (LayerCollection::new(base.clone()), base)
    }

    #[test]
    fn test_highest_priority_active_layer_wins() {
        let (layers, base) = collection();
        assert_eq!(layers.current().id(), base.id());

        let low = layer("low", 1);
        let high = layer("high", 10);
        layers.add(low.clone()).unwrap();
        layers.add(high.clone()).unwrap();
        assert_eq!(layers.current().id(), high.id());

        high.set_active(false);
        assert_eq!(layers.current().id(), low.id());
        low.set_active(false);
        assert_eq!(layers.current().id(), base.id());
        high.set_active(true);
        assert_eq!(layers.current().id(), high.id());
    }

    #[test]
    fn test_ties_keep_earlier_layer() {
        let (layers, _base) = collection();
        let first = layer("first", 5);
        let second = layer("second", 5);
        layers.add(first.clone()).unwrap();
        layers.add(second).unwrap();
        assert_eq!(layers.current().id(), first.id());
    }

    #[test]
    fn test_notifies_only_on_change() {
        let (layers, _base) = collection();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        layers.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let high = layer("high", 10);
        layers.add(high.clone()).unwrap();
        layers.add(layer("lower", 3)).unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        high.set_active(false);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
        high.set_active(false);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove() {
        let (layers, base) = collection();
        let high = layer("high", 10);
        layers.add(high.clone()).unwrap();

        assert_eq!(layers.remove(high.id()), Ok(true));
        assert_eq!(layers.remove(high.id()), Ok(false));
        assert_eq!(layers.current().id(), base.id());
        assert_eq!(layers.remove(base.id()), Err(CollectionError::BaseLayerRemoval));

        // removed layers no longer drive recomputation
        high.set_active(false);
        high.set_active(true);
        assert_eq!(layers.current().id(), base.id());
    }

    #[test]
    fn test_set_layer_active() {
        let (layers, base) = collection();
        let high = layer("high", 10);
        layers.add(high.clone()).unwrap();

        layers.set_layer_active(high.id(), false).unwrap();
        assert_eq!(layers.current().id(), base.id());
        assert_eq!(
            layers.set_layer_active(base.id(), false),
            Err(CollectionError::BaseLayerDeactivation)
        );
        let stranger = layer("stranger", 1);
        assert_eq!(
            layers.set_layer_active(stranger.id(), true),
            Err(CollectionError::UnknownLayer(stranger.id()))
        );
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let (layers, base) = collection();
        let high = layer("high", 10);
        layers.add(high.clone()).unwrap();
        assert_eq!(
            layers.add(high.clone()),
            Err(CollectionError::DuplicateLayer(high.id()))
        );
        assert_eq!(
            layers.add(base.clone()),
            Err(CollectionError::DuplicateLayer(base.id()))
        );
        assert_eq!(layers.layers().len(), 2);
    }

    #[test]
    fn test_base_stays_current_when_inactive() {
        let (layers, base) = collection();
        base.set_active(false);
        assert_eq!(layers.current().id(), base.id());
    }
}
