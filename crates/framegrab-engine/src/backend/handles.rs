use slotmap::{Key, SlotMap};

use crate::{CaptureError, Result};

slotmap::new_key_type! {
    pub struct TextureHandle;
    pub struct FrameBufferHandle;
    pub struct VertexBufferHandle;
    pub struct IndexBufferHandle;
    pub struct ProgramHandle;
}

/// Any resource handle, for `RenderBackend::destroy`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
    Texture(TextureHandle),
    FrameBuffer(FrameBufferHandle),
    VertexBuffer(VertexBufferHandle),
    IndexBuffer(IndexBufferHandle),
    Program(ProgramHandle),
}

macro_rules! impl_from_handle {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Handle {
                fn from(h: $ty) -> Self {
                    Handle::$variant(h)
                }
            }
        )*
    };
}

impl_from_handle! {
    TextureHandle => Texture,
    FrameBufferHandle => FrameBuffer,
    VertexBufferHandle => VertexBuffer,
    IndexBufferHandle => IndexBuffer,
    ProgramHandle => Program,
}

struct Entry<V> {
    value: V,
    destroyed: bool,
}

/// Bounded handle table with deferred destruction.
///
/// `destroy` retires a handle immediately: it no longer counts as live and API
/// calls reject it. The resource itself stays reachable through `get_retired`
/// until `collect` runs after the next frame, so work encoded before the
/// destroy still executes.
pub(crate) struct HandleTable<K: Key, V> {
    kind: &'static str,
    limit: usize,
    slots: SlotMap<K, Entry<V>>,
    live: usize,
}

impl<K: Key, V> HandleTable<K, V> {
    pub(crate) fn new(kind: &'static str, limit: usize) -> Self {
        Self {
            kind,
            limit,
            slots: SlotMap::with_key(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: V) -> Result<K> {
        if self.live >= self.limit {
            return Err(CaptureError::ResourceExhausted {
                kind: self.kind,
                limit: self.limit,
            });
        }
        self.live += 1;
        Ok(self.slots.insert(Entry { value, destroyed: false }))
    }

    /// Live (not destroyed) resource.
    pub(crate) fn get(&self, key: K) -> Result<&V> {
        match self.slots.get(key) {
            Some(e) if !e.destroyed => Ok(&e.value),
            _ => Err(CaptureError::InvalidHandle(self.kind)),
        }
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Result<&mut V> {
        match self.slots.get_mut(key) {
            Some(e) if !e.destroyed => Ok(&mut e.value),
            _ => Err(CaptureError::InvalidHandle(self.kind)),
        }
    }

    /// Resource that is live or destroyed but not yet collected.
    pub(crate) fn get_retired(&self, key: K) -> Option<&V> {
        self.slots.get(key).map(|e| &e.value)
    }

    pub(crate) fn get_retired_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key).map(|e| &mut e.value)
    }

    /// Retires `key`. Returns `false` for unknown or already destroyed handles.
    pub(crate) fn destroy(&mut self, key: K) -> bool {
        match self.slots.get_mut(key) {
            Some(e) if !e.destroyed => {
                e.destroyed = true;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Frees retired resources and returns their handles.
    pub(crate) fn collect(&mut self) -> Vec<K> {
        let freed: Vec<K> = self
            .slots
            .iter()
            .filter(|(_, e)| e.destroyed)
            .map(|(k, _)| k)
            .collect();
        for &k in &freed {
            self.slots.remove(k);
        }
        freed
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_respects_limit() {
        let mut table: HandleTable<TextureHandle, u32> = HandleTable::new("texture", 2);
        table.insert(1).unwrap();
        let b = table.insert(2).unwrap();
        assert!(matches!(
            table.insert(3),
            Err(CaptureError::ResourceExhausted { kind: "texture", limit: 2 })
        ));

        // Destroying frees the slot for accounting purposes right away.
        assert!(table.destroy(b));
        table.insert(3).unwrap();
    }

    #[test]
    fn destroyed_handle_stays_reachable_until_collect() {
        let mut table: HandleTable<TextureHandle, &str> = HandleTable::new("texture", 8);
        let h = table.insert("rt").unwrap();
        assert!(table.destroy(h));

        assert!(table.get(h).is_err());
        assert_eq!(table.get_retired(h), Some(&"rt"));
        assert_eq!(table.live(), 0);

        assert_eq!(table.collect(), vec![h]);
        assert_eq!(table.get_retired(h), None);
    }

    #[test]
    fn double_destroy_is_rejected() {
        let mut table: HandleTable<ProgramHandle, ()> = HandleTable::new("program", 8);
        let h = table.insert(()).unwrap();
        assert!(table.destroy(h));
        assert!(!table.destroy(h));
        assert_eq!(table.live(), 0);
    }
}
