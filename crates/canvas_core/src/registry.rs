//! Ordered, observable item collection with Z-order and hit-testing.
//!
//! The registry owns insertion and removal. Attaching an item to the surface
//! and detaching it happen inside the same call that inserts or removes it,
//! so an item can never believe it belongs to a surface that dropped it.

use crate::geometry::{Point, Rect};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;

/// Stable identifier of an item within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of the surface a registry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u64);

/// Where an item lives in virtual space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemAddress {
    /// Grid cell, resolved through the layout descriptor.
    Cell { col: i32, row: i32 },
    /// Explicit virtual pixel position.
    Free { x: i32, y: i32 },
    /// Not placed yet. Never laid out, never hit.
    #[default]
    Unplaced,
}

impl ItemAddress {
    /// Only non-negative addresses receive bounds.
    pub fn is_valid(&self) -> bool {
        match *self {
            ItemAddress::Cell { col, row } => col >= 0 && row >= 0,
            ItemAddress::Free { x, y } => x >= 0 && y >= 0,
            ItemAddress::Unplaced => false,
        }
    }
}

/// Size of an item along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extent {
    /// Use the layout descriptor's cell size.
    #[default]
    Auto,
    /// Explicit size in pixels.
    Fixed(i32),
    /// Stretch to the content edge.
    Spring,
}

impl Extent {
    /// Decode the legacy integer form: negative means spring.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Extent::Spring
        } else {
            Extent::Fixed(raw)
        }
    }
}

/// Per-axis size request of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSize {
    pub width: Extent,
    pub height: Extent,
}

impl ItemSize {
    pub fn fixed(width: i32, height: i32) -> Self {
        Self {
            width: Extent::Fixed(width),
            height: Extent::Fixed(height),
        }
    }
}

/// Capabilities the engine needs from an item type.
///
/// Content (labels, icons, payload) stays on the implementing type. Bounds,
/// hover/press state and selection are tracked by the engine.
pub trait CanvasItem {
    /// Logical address. Re-read on every layout pass.
    fn address(&self) -> ItemAddress;

    fn size(&self) -> ItemSize {
        ItemSize::default()
    }

    fn is_visible(&self) -> bool {
        true
    }

    /// Disabled items are still hit (they absorb the pointer) but never
    /// produce clicks or selection changes.
    fn is_enabled(&self) -> bool {
        true
    }

    fn is_interactive(&self) -> bool {
        true
    }

    /// Z-order hint; higher paints later and wins hit-tests.
    fn z_order(&self) -> i32 {
        0
    }

    /// Called when the item is inserted into a surface's registry.
    fn attach(&mut self, _surface: SurfaceId) {}

    /// Called when the item is removed from its registry.
    fn detach(&mut self) {}
}

/// Structural change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    Added(ItemId),
    Removed(ItemId),
    /// Content changed through [`ItemRegistry::modify`]; address or size may differ.
    Modified(ItemId),
    Reordered(ItemId),
    Cleared,
}

type Listener = Box<dyn FnMut(&RegistryChange)>;

struct Entry<T> {
    item: T,
    bounds: Option<Rect>,
    /// Tie-breaker among equal Z hints; larger is on top.
    sequence: i64,
}

/// The item collection of one canvas.
pub struct ItemRegistry<T> {
    surface: SurfaceId,
    entries: IndexMap<ItemId, Entry<T>>,
    /// Paint order, bottom to top. Emptied on every change, sorted on first read.
    z_order: OnceCell<Vec<ItemId>>,
    next_id: u64,
    front_sequence: i64,
    back_sequence: i64,
    revision: u64,
    listeners: Vec<Listener>,
}

impl<T: CanvasItem> ItemRegistry<T> {
    pub fn new(surface: SurfaceId) -> Self {
        Self {
            surface,
            entries: IndexMap::new(),
            z_order: OnceCell::new(),
            next_id: 1,
            front_sequence: 0,
            back_sequence: 0,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Bumped on every structural change. Caches compare against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Register a listener for structural changes.
    pub fn subscribe(&mut self, listener: impl FnMut(&RegistryChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Insert an item on top of its Z hint group and attach it to this surface.
    pub fn insert(&mut self, mut item: T) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.front_sequence += 1;

        item.attach(self.surface);
        self.entries.insert(
            id,
            Entry {
                item,
                bounds: None,
                sequence: self.front_sequence,
            },
        );
        self.changed(RegistryChange::Added(id));
        id
    }

    /// Remove an item, detaching it before handing it back.
    pub fn remove(&mut self, id: ItemId) -> Option<T> {
        let mut entry = self.entries.shift_remove(&id)?;
        entry.item.detach();
        self.changed(RegistryChange::Removed(id));
        Some(entry.item)
    }

    /// Remove every item, detaching each.
    pub fn clear(&mut self) -> Vec<T> {
        let items: Vec<T> = self
            .entries
            .drain(..)
            .map(|(_, mut entry)| {
                entry.item.detach();
                entry.item
            })
            .collect();
        self.changed(RegistryChange::Cleared);
        items
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.entries.get(&id).map(|e| &e.item)
    }

    /// Mutate an item's content. Always treated as a structural change since
    /// the address, size or Z hint may have moved.
    pub fn modify<R>(&mut self, id: ItemId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let entry = self.entries.get_mut(&id)?;
        let result = f(&mut entry.item);
        self.changed(RegistryChange::Modified(id));
        Some(result)
    }

    /// Virtual bounds from the last layout pass.
    pub fn bounds(&self, id: ItemId) -> Option<Rect> {
        self.entries.get(&id).and_then(|e| e.bounds)
    }

    pub(crate) fn set_bounds(&mut self, id: ItemId, bounds: Option<Rect>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.bounds = bounds;
        }
    }

    /// Move an item above every other item with the same Z hint.
    pub fn bring_to_front(&mut self, id: ItemId) -> bool {
        self.front_sequence += 1;
        let sequence = self.front_sequence;
        self.reorder(id, sequence)
    }

    /// Move an item below every other item with the same Z hint.
    pub fn send_to_back(&mut self, id: ItemId) -> bool {
        self.back_sequence -= 1;
        let sequence = self.back_sequence;
        self.reorder(id, sequence)
    }

    fn reorder(&mut self, id: ItemId, sequence: i64) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.sequence = sequence;
        self.changed(RegistryChange::Reordered(id));
        true
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &T)> {
        self.entries.iter().map(|(&id, e)| (id, &e.item))
    }

    /// Ids in paint order, bottom to top.
    pub fn z_order(&self) -> &[ItemId] {
        self.z_order.get_or_init(|| self.sorted_z_order())
    }

    /// Items with their bounds in paint order, bottom to top.
    pub fn iter_z(&self) -> impl Iterator<Item = (ItemId, &T, Option<Rect>)> {
        self.z_order().iter().filter_map(move |id| {
            self.entries
                .get(id)
                .map(|entry| (*id, &entry.item, entry.bounds))
        })
    }

    /// Whether `id` is visible, interactive, laid out and contains `point`.
    pub fn is_hit_candidate(&self, id: ItemId, point: Point) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return false;
        };
        entry.item.is_visible()
            && entry.item.is_interactive()
            && entry.bounds.is_some_and(|b| b.contains(point))
    }

    /// All candidates under a virtual point, topmost first.
    pub fn candidates_at(&self, point: Point) -> Vec<ItemId> {
        self.z_order()
            .iter()
            .rev()
            .copied()
            .filter(|&id| self.is_hit_candidate(id, point))
            .collect()
    }

    /// Topmost candidate under a virtual point.
    ///
    /// If `sticky` (normally the currently hovered item) is still a
    /// candidate it is returned even when a higher item also matches, so
    /// overlapping items do not flap while the pointer moves inside both.
    pub fn hit_test(&self, point: Point, sticky: Option<ItemId>) -> Option<ItemId> {
        if let Some(id) = sticky {
            if self.is_hit_candidate(id, point) {
                return Some(id);
            }
        }
        self.z_order()
            .iter()
            .rev()
            .copied()
            .find(|&id| self.is_hit_candidate(id, point))
    }

    fn changed(&mut self, change: RegistryChange) {
        self.revision += 1;
        self.z_order.take();
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    fn sorted_z_order(&self) -> Vec<ItemId> {
        let mut order: Vec<(i32, i64, ItemId)> = self
            .entries
            .iter()
            .map(|(&id, e)| (e.item.z_order(), e.sequence, id))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, _, id)| id).collect()
    }
}

impl<T> fmt::Debug for ItemRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRegistry")
            .field("surface", &self.surface)
            .field("len", &self.entries.len())
            .field("revision", &self.revision)
            .finish()
    }
}
