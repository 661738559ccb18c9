use super::behavior::{Behavior, Contact, Game};
use super::entity::{Body, EntityId, Rect, Role};

pub(crate) struct Entity<G: Game> {
    pub(crate) id: EntityId,
    pub(crate) body: Body,
    pub(crate) behavior: Box<dyn Behavior<G>>,
}

impl<G: Game> Entity<G> {
    pub(crate) fn new(id: EntityId, body: Body, behavior: Box<dyn Behavior<G>>) -> Self {
        Self { id, body, behavior }
    }

    pub(crate) fn contact(&self) -> Contact<G::Tag> {
        Contact {
            id: self.id,
            tag: self.behavior.tag(),
            role: self.body.role(),
            rect: self.body.rect(),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CleanupReport {
    /// Spliced out of the list, or dropped while still pending.
    pub(crate) removed: Vec<EntityId>,
    pub(crate) added: Vec<EntityId>,
    /// Second players refused at commit time.
    pub(crate) rejected: Vec<EntityId>,
}

/// Ordered entity list split into three contiguous zones:
/// `[0, first_moving)` static, `[first_moving, player_index)` moving,
/// `[player_index, len)` the player.
///
/// Additions wait in `pending` and deletions only flip the lifecycle until
/// [`EntityRegistry::cleanup`] commits both.
pub(crate) struct EntityRegistry<G: Game> {
    entries: Vec<Entity<G>>,
    pending: Vec<Entity<G>>,
    first_moving: usize,
    player_index: usize,
}

impl<G: Game> Default for EntityRegistry<G> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            pending: Vec::new(),
            first_moving: 0,
            player_index: 0,
        }
    }
}

impl<G: Game> EntityRegistry<G> {
    pub(crate) fn stage(&mut self, mut entity: Entity<G>) {
        entity.body.mark_active();
        self.pending.push(entity);
    }

    pub(crate) fn mark_deleted(&mut self, id: EntityId) -> bool {
        match self
            .entries
            .iter_mut()
            .chain(self.pending.iter_mut())
            .find(|entity| entity.id == id)
        {
            Some(entity) => {
                entity.body.mark_deleted();
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_all_deleted(&mut self) {
        for entity in &mut self.entries {
            entity.body.mark_deleted();
        }
    }

    pub(crate) fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].body.is_active() {
                index += 1;
                continue;
            }
            let removed = self.entries.remove(index);
            if index < self.first_moving {
                self.first_moving -= 1;
            }
            if index < self.player_index {
                self.player_index -= 1;
            }
            report.removed.push(removed.id);
        }

        for entity in std::mem::take(&mut self.pending) {
            if !entity.body.is_active() {
                report.removed.push(entity.id);
                continue;
            }
            let id = entity.id;
            match entity.body.role() {
                Role::Player => {
                    if self.player_index < self.entries.len() {
                        report.rejected.push(id);
                        continue;
                    }
                    self.entries.push(entity);
                }
                Role::Moving => {
                    self.entries.insert(self.player_index, entity);
                    self.player_index += 1;
                }
                Role::Static => {
                    self.entries.insert(self.first_moving, entity);
                    self.first_moving += 1;
                    self.player_index += 1;
                }
            }
            report.added.push(id);
        }

        debug_assert!(self.partition_holds());
        report
    }

    pub(crate) fn partition_holds(&self) -> bool {
        if self.first_moving > self.player_index || self.player_index > self.entries.len() {
            return false;
        }
        let statics_ok = self.entries[..self.first_moving]
            .iter()
            .all(|entity| entity.body.role() == Role::Static);
        let movers_ok = self.entries[self.first_moving..self.player_index]
            .iter()
            .all(|entity| entity.body.role() == Role::Moving);
        let players = &self.entries[self.player_index..];
        let player_ok =
            players.len() <= 1 && players.iter().all(|entity| entity.body.role() == Role::Player);
        statics_ok && movers_ok && player_ok
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn first_moving(&self) -> usize {
        self.first_moving
    }

    pub(crate) fn player_index(&self) -> usize {
        self.player_index
    }

    pub(crate) fn entries(&self) -> &[Entity<G>] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entity<G>] {
        &mut self.entries
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut Entity<G>> {
        self.entries.get_mut(index)
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Entity<G>> {
        self.entries
            .iter()
            .chain(self.pending.iter())
            .find(|entity| entity.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity<G>> {
        self.entries
            .iter_mut()
            .chain(self.pending.iter_mut())
            .find(|entity| entity.id == id)
    }

    pub(crate) fn player(&self) -> Option<&Entity<G>> {
        self.entries.get(self.player_index)
    }

    /// A live player is either committed or waiting in the pending queue.
    pub(crate) fn has_live_player(&self) -> bool {
        self.entries[self.player_index..]
            .iter()
            .chain(self.pending.iter())
            .any(|entity| entity.body.role() == Role::Player && entity.body.is_active())
    }

    pub(crate) fn query_by_tag(&self, tag: G::Tag) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|entity| entity.body.is_active() && entity.behavior.tag() == tag)
            .map(|entity| entity.id)
            .collect()
    }

    pub(crate) fn exists_by_tag(&self, tag: G::Tag) -> bool {
        self.entries
            .iter()
            .any(|entity| entity.body.is_active() && entity.behavior.tag() == tag)
    }

    pub(crate) fn find_at(&self, area: Rect) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|entity| entity.body.is_active() && entity.body.rect().overlaps(&area))
            .map(|entity| entity.id)
    }

    pub(crate) fn ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|entity| entity.id).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::app::entity::EntityIdAllocator;

    pub(crate) struct TestGame;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Kind {
        Wall,
        Mover,
        Hero,
    }

    impl Game for TestGame {
        type Tag = Kind;
    }

    struct Tagged(Kind);

    impl Behavior<TestGame> for Tagged {
        fn tag(&self) -> Kind {
            self.0
        }
    }

    fn entity(ids: &mut EntityIdAllocator, role: Role) -> Entity<TestGame> {
        let (body, kind) = match role {
            Role::Static => (Body::fixed(4, 4), Kind::Wall),
            Role::Moving => (Body::moving(4, 4), Kind::Mover),
            Role::Player => (Body::player(4, 4), Kind::Hero),
        };
        Entity::new(ids.allocate(), body, Box::new(Tagged(kind)))
    }

    fn roles(registry: &EntityRegistry<TestGame>) -> Vec<Role> {
        registry
            .entries()
            .iter()
            .map(|entity| entity.body.role())
            .collect()
    }

    #[test]
    fn staged_entities_are_invisible_until_cleanup() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        registry.stage(entity(&mut ids, Role::Moving));

        assert_eq!(registry.len(), 0);
        assert_eq!(registry.pending_len(), 1);

        let report = registry.cleanup();
        assert_eq!(report.added.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn commit_places_each_role_in_its_zone() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        for role in [
            Role::Player,
            Role::Moving,
            Role::Static,
            Role::Moving,
            Role::Static,
        ] {
            registry.stage(entity(&mut ids, role));
        }
        registry.cleanup();

        assert_eq!(
            roles(&registry),
            vec![
                Role::Static,
                Role::Static,
                Role::Moving,
                Role::Moving,
                Role::Player
            ]
        );
        assert_eq!(registry.first_moving(), 2);
        assert_eq!(registry.player_index(), 4);
        let order: Vec<u64> = registry.ids().iter().map(|id| id.0).collect();
        assert_eq!(order, vec![2, 4, 1, 3, 0]);
    }

    #[test]
    fn deleted_entities_stay_in_place_until_cleanup() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        registry.stage(entity(&mut ids, Role::Static));
        registry.stage(entity(&mut ids, Role::Moving));
        registry.stage(entity(&mut ids, Role::Player));
        registry.cleanup();

        assert!(registry.mark_deleted(EntityId(0)));
        assert_eq!(registry.len(), 3);
        assert!(!registry.entries()[0].body.is_active());

        let report = registry.cleanup();
        assert_eq!(report.removed, vec![EntityId(0)]);
        assert_eq!(registry.first_moving(), 0);
        assert_eq!(registry.player_index(), 1);
        assert!(registry.partition_holds());
    }

    #[test]
    fn removing_the_player_keeps_zone_indices_valid() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        registry.stage(entity(&mut ids, Role::Moving));
        let player = entity(&mut ids, Role::Player);
        let player_id = player.id;
        registry.stage(player);
        registry.cleanup();

        registry.mark_deleted(player_id);
        registry.cleanup();

        assert_eq!(registry.player_index(), 1);
        assert!(registry.player().is_none());
        assert!(!registry.has_live_player());
    }

    #[test]
    fn second_player_is_rejected_at_commit() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        registry.stage(entity(&mut ids, Role::Player));
        registry.cleanup();
        let second = entity(&mut ids, Role::Player);
        let second_id = second.id;
        registry.stage(second);

        let report = registry.cleanup();
        assert_eq!(report.rejected, vec![second_id]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn pending_entity_deleted_before_commit_is_dropped() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        let doomed = entity(&mut ids, Role::Moving);
        let doomed_id = doomed.id;
        registry.stage(doomed);
        registry.mark_deleted(doomed_id);

        let report = registry.cleanup();
        assert_eq!(report.removed, vec![doomed_id]);
        assert!(report.added.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn tag_queries_skip_deleted_entities() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        registry.stage(entity(&mut ids, Role::Moving));
        registry.stage(entity(&mut ids, Role::Moving));
        registry.stage(entity(&mut ids, Role::Static));
        registry.cleanup();
        registry.mark_deleted(EntityId(0));

        assert_eq!(registry.query_by_tag(Kind::Mover), vec![EntityId(1)]);
        assert!(registry.exists_by_tag(Kind::Wall));
        assert!(!registry.exists_by_tag(Kind::Hero));
    }

    #[test]
    fn find_at_returns_first_overlap_in_list_order() {
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();
        let mut wall = entity(&mut ids, Role::Static);
        wall.body.set_position(10, 10);
        let mut mover = entity(&mut ids, Role::Moving);
        mover.body.set_position(12, 12);
        registry.stage(mover);
        registry.stage(wall);
        registry.cleanup();

        // the wall sorts first, so it wins where both overlap
        assert_eq!(registry.find_at(Rect::new(13, 13, 1, 1)), Some(EntityId(0)));
        assert_eq!(registry.find_at(Rect::new(15, 15, 2, 2)), Some(EntityId(1)));
        assert_eq!(registry.find_at(Rect::new(40, 40, 2, 2)), None);
    }

    #[test]
    fn partition_survives_random_add_remove_sequences() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut ids = EntityIdAllocator::default();
        let mut registry = EntityRegistry::<TestGame>::default();

        for _cycle in 0..200 {
            for _ in 0..rng.gen_range(0..4) {
                let role = match rng.gen_range(0..10) {
                    0 => Role::Player,
                    1..=4 => Role::Static,
                    _ => Role::Moving,
                };
                registry.stage(entity(&mut ids, role));
            }
            let live = registry.ids();
            for id in live {
                if rng.gen_bool(0.2) {
                    registry.mark_deleted(id);
                }
            }
            registry.cleanup();
            assert!(registry.partition_holds());
        }
    }
}
