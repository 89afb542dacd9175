use std::any::TypeId;
use std::collections::HashMap;

use super::storage::{AnyStorage, Storage};
use super::Entity;

/// A gameplay system: one pass over the registry per fixed tick.
pub trait System {
    fn update(&mut self, registry: &mut Registry, dt: f32);
}

/// Entity allocator plus typed component storages plus the system schedule.
///
/// Slots are recycled through a free list with a bumped generation, so a
/// destroyed handle goes dead immediately and ids handed out within one tick
/// are always distinct. `destroy` is idempotent and purges every component;
/// component access on a dead or stale handle is a no-op.
pub struct Registry {
    generations: Vec<u8>,
    alive: Vec<bool>,
    free: Vec<u32>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
    systems: Vec<Box<dyn System>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: Vec::new(),
            storages: HashMap::new(),
            systems: Vec::new(),
        }
    }

    pub fn create(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            self.alive[index as usize] = true;
            Entity::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Entity::new(index, 0)
        }
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        self.alive.get(index).copied().unwrap_or(false)
            && self.generations[index] == entity.generation()
    }

    /// Destroys the entity and purges all of its components. Stale or
    /// already-destroyed handles are ignored.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.is_alive(entity) {
            return;
        }
        for storage in self.storages.values_mut() {
            storage.purge(entity);
        }
        let index = entity.index() as usize;
        self.alive[index] = false;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(index as u32);
    }

    pub fn emplace<C: 'static>(&mut self, entity: Entity, value: C) {
        if !self.is_alive(entity) {
            return;
        }
        self.storage_mut::<C>().insert(entity, value);
    }

    pub fn get<C: 'static>(&self, entity: Entity) -> Option<&C> {
        self.storage::<C>()?.get(entity)
    }

    pub fn get_mut<C: 'static>(&mut self, entity: Entity) -> Option<&mut C> {
        self.storages
            .get_mut(&TypeId::of::<C>())?
            .as_any_mut()
            .downcast_mut::<Storage<C>>()?
            .get_mut(entity)
    }

    pub fn remove<C: 'static>(&mut self, entity: Entity) -> Option<C> {
        self.storages
            .get_mut(&TypeId::of::<C>())?
            .as_any_mut()
            .downcast_mut::<Storage<C>>()?
            .remove(entity)
    }

    pub fn storage<C: 'static>(&self) -> Option<&Storage<C>> {
        self.storages
            .get(&TypeId::of::<C>())?
            .as_any()
            .downcast_ref::<Storage<C>>()
    }

    pub fn storage_mut<C: 'static>(&mut self) -> &mut Storage<C> {
        self.storages
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(Storage::<C>::new()))
            .as_any_mut()
            .downcast_mut::<Storage<C>>()
            .expect("storage type registered under its own TypeId")
    }

    /// Iterates `(entity, &C)` pairs; empty when no storage exists yet.
    pub fn iter<C: 'static>(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.storage::<C>().into_iter().flat_map(|s| s.iter())
    }

    /// Collected ids of entities holding `C` — the scan idiom systems use
    /// so they may spawn and destroy freely while walking the list.
    pub fn entities_with<C: 'static>(&self) -> Vec<Entity> {
        self.storage::<C>().map(|s| s.entities()).unwrap_or_default()
    }

    pub fn count<C: 'static>(&self) -> usize {
        self.storage::<C>().map(|s| s.len()).unwrap_or(0)
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    pub fn clear_systems(&mut self) {
        self.systems.clear();
    }

    /// Runs every system once, in registration order.
    pub fn update(&mut self, dt: f32) {
        let mut systems = std::mem::take(&mut self.systems);
        for system in &mut systems {
            system.update(self, dt);
        }
        // Systems may have registered more systems while running.
        systems.append(&mut self.systems);
        self.systems = systems;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    #[derive(Debug, PartialEq)]
    struct Tag;

    #[test]
    fn create_destroy_lifecycle() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(5));
        reg.emplace(e, Tag);

        assert!(reg.is_alive(e));
        assert_eq!(reg.get::<Health>(e), Some(&Health(5)));

        reg.destroy(e);
        assert!(!reg.is_alive(e));
        assert_eq!(reg.get::<Health>(e), None);
        assert_eq!(reg.get::<Tag>(e), None);

        // Idempotent.
        reg.destroy(e);
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut reg = Registry::new();
        let old = reg.create();
        reg.emplace(old, Health(1));
        reg.destroy(old);

        let new = reg.create();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.id(), old.id());

        reg.emplace(new, Health(2));
        assert_eq!(reg.get::<Health>(old), None);
        assert_eq!(reg.get::<Health>(new), Some(&Health(2)));
    }

    #[test]
    fn emplace_on_dead_entity_is_noop() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.destroy(e);
        reg.emplace(e, Health(9));
        assert_eq!(reg.count::<Health>(), 0);
    }

    #[test]
    fn ids_created_same_tick_are_distinct() {
        let mut reg = Registry::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let e = reg.create();
            assert!(seen.insert(e.id()));
            reg.destroy(e);
        }
    }

    #[test]
    fn iteration_over_missing_storage_is_noop() {
        let reg = Registry::new();
        assert_eq!(reg.iter::<Health>().count(), 0);
        assert!(reg.entities_with::<Health>().is_empty());
    }

    struct Doubler;
    impl System for Doubler {
        fn update(&mut self, reg: &mut Registry, _dt: f32) {
            for e in reg.entities_with::<Health>() {
                if let Some(h) = reg.get_mut::<Health>(e) {
                    h.0 *= 2;
                }
            }
        }
    }

    struct AddOne;
    impl System for AddOne {
        fn update(&mut self, reg: &mut Registry, _dt: f32) {
            for e in reg.entities_with::<Health>() {
                if let Some(h) = reg.get_mut::<Health>(e) {
                    h.0 += 1;
                }
            }
        }
    }

    #[test]
    fn systems_run_in_registration_order() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.emplace(e, Health(3));

        reg.add_system(Box::new(Doubler));
        reg.add_system(Box::new(AddOne));
        reg.update(1.0 / 60.0);

        // (3 * 2) + 1, not (3 + 1) * 2.
        assert_eq!(reg.get::<Health>(e), Some(&Health(7)));
    }
}
