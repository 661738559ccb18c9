use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_engine::app::{
    AlarmListener, Behavior, BehaviorError, Body, CallbackResult, CollisionReceiver, Contact,
    Context, Controller, EntityId, Game, GameAction, GameError, InputReceiver, ListenerId,
    Positioning, Role, TileGeometry, TileHit, TileMap, World, WorldBounds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Wall,
    Mover,
    Hero,
}

#[derive(Default)]
struct Log {
    contacts: Vec<(ListenerId, EntityId)>,
    alarms: Vec<(u64, u32)>,
    steps: Vec<u64>,
    tile_hits: Vec<TileHit>,
    outside: Vec<ListenerId>,
}

impl Game for Log {
    type Tag = Kind;
}

struct Plain(Kind);

impl Behavior<Log> for Plain {
    fn tag(&self) -> Kind {
        self.0
    }
}

/// Records collisions and alarms; bounces off tiles.
struct Recorder(Kind);

impl Behavior<Log> for Recorder {
    fn tag(&self) -> Kind {
        self.0
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<Log>> {
        Some(self)
    }

    fn as_alarm_listener(&mut self) -> Option<&mut dyn AlarmListener<Log>> {
        Some(self)
    }
}

impl CollisionReceiver<Log> for Recorder {
    fn on_entity_collision(
        &mut self,
        _body: &mut Body,
        other: &Contact<Kind>,
        ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        let me = ctx.listener();
        ctx.game().contacts.push((me, other.id));
        Ok(())
    }

    fn on_tile_collision(
        &mut self,
        body: &mut Body,
        hit: TileHit,
        ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        ctx.game().tile_hits.push(hit);
        body.bounce(hit.axis, hit.position);
        Ok(())
    }

    fn on_outside_world(
        &mut self,
        _body: &mut Body,
        ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        let me = ctx.listener();
        ctx.game().outside.push(me);
        Ok(())
    }
}

/// Deletes `target` the first time it drifts out of the world.
struct Sentry {
    target: EntityId,
}

impl Behavior<Log> for Sentry {
    fn tag(&self) -> Kind {
        Kind::Mover
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<Log>> {
        Some(self)
    }
}

impl CollisionReceiver<Log> for Sentry {
    fn on_outside_world(
        &mut self,
        _body: &mut Body,
        ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        ctx.delete(self.target);
        Ok(())
    }
}

impl AlarmListener<Log> for Recorder {
    fn on_alarm(
        &mut self,
        _body: &mut Body,
        timer_id: u32,
        ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        let cycle = ctx.cycle();
        ctx.game().alarms.push((cycle, timer_id));
        Ok(())
    }
}

/// Player that moves eight pixels per key.
struct Walker;

impl Behavior<Log> for Walker {
    fn tag(&self) -> Kind {
        Kind::Hero
    }

    fn as_input_receiver(&mut self) -> Option<&mut dyn InputReceiver<Log>> {
        Some(self)
    }
}

impl InputReceiver<Log> for Walker {
    fn on_action(
        &mut self,
        body: &mut Body,
        action: GameAction,
        _ctx: &mut Context<'_, Log>,
    ) -> CallbackResult {
        let (dx, dy) = match action {
            GameAction::Left => (-8, 0),
            GameAction::Right => (8, 0),
            GameAction::Up => (0, -8),
            GameAction::Down => (0, 8),
            _ => (0, 0),
        };
        body.move_player(body.x() + dx, body.y() + dy);
        Ok(())
    }
}

struct AlarmClock;

impl Controller<Log> for AlarmClock {
    fn on_alarm(&mut self, timer_id: u32, ctx: &mut Context<'_, Log>) -> CallbackResult {
        let cycle = ctx.cycle();
        ctx.game().alarms.push((cycle, timer_id));
        Ok(())
    }
}

struct StepCounter;

impl Controller<Log> for StepCounter {
    fn on_step(&mut self, cycle: u64, ctx: &mut Context<'_, Log>) -> CallbackResult {
        ctx.game().steps.push(cycle);
        Ok(())
    }
}

struct Broken;

impl Controller<Log> for Broken {
    fn on_step(&mut self, _cycle: u64, _ctx: &mut Context<'_, Log>) -> CallbackResult {
        Err(BehaviorError::msg("step handler exploded"))
    }
}

/// Adds one fast mover on the first step it sees.
struct Spawner {
    spawned: Option<EntityId>,
}

impl Controller<Log> for Spawner {
    fn on_step(&mut self, _cycle: u64, ctx: &mut Context<'_, Log>) -> CallbackResult {
        if self.spawned.is_none() {
            let body = Body::moving(4, 4)
                .with_position(10, 10)
                .with_direction_speed(0, 5.0)
                .with_moving(true);
            self.spawned = Some(ctx.add(body, Plain(Kind::Mover)));
        }
        Ok(())
    }
}

fn world() -> World<Log> {
    World::new(Log::default(), WorldBounds::new(0, 0, 400, 300), 100, 80)
}

fn roles(world: &World<Log>) -> Vec<Role> {
    world
        .entity_ids()
        .into_iter()
        .filter_map(|id| world.body(id).map(Body::role))
        .collect()
}

#[test]
fn zones_stay_contiguous_under_random_adds_and_deletes() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut world = world();

    for _ in 0..200 {
        for _ in 0..rng.gen_range(0..4) {
            let body = match rng.gen_range(0..5) {
                0 => Body::player(4, 4),
                1 | 2 => Body::moving(4, 4),
                _ => Body::fixed(4, 4),
            };
            let _ = world.add(body, Plain(Kind::Wall));
        }
        let ids = world.entity_ids();
        for _ in 0..rng.gen_range(0..3) {
            if ids.is_empty() {
                break;
            }
            let id = ids[rng.gen_range(0..ids.len())];
            world.delete(id).expect("committed entity is known");
        }
        world.cleanup();

        let roles = roles(&world);
        let statics = roles.iter().filter(|role| **role == Role::Static).count();
        let movers = roles.iter().filter(|role| **role == Role::Moving).count();
        let players = roles.iter().filter(|role| **role == Role::Player).count();
        assert!(players <= 1);
        assert_eq!(world.zones(), (statics, statics + movers));
        assert!(roles[..statics].iter().all(|role| *role == Role::Static));
        assert!(roles[statics..statics + movers]
            .iter()
            .all(|role| *role == Role::Moving));
    }
}

#[test]
fn entity_added_during_a_cycle_does_not_move_until_the_next() {
    let mut world = world();
    let spawner = world.add_controller(Spawner { spawned: None });
    world.add_step_listener(ListenerId::Controller(spawner));
    world.setup();

    world.run_cycle();
    let ids = world.query_by_tag(Kind::Mover);
    assert_eq!(ids.len(), 1);
    assert_eq!(world.body(ids[0]).map(Body::x), Some(10));

    world.run_cycle();
    assert_eq!(world.body(ids[0]).map(Body::x), Some(15));
}

#[test]
fn deleted_entity_keeps_its_slot_until_cleanup() {
    let mut world = world();
    let wall = world.add(Body::fixed(4, 4), Plain(Kind::Wall)).expect("add");
    let mover = world.add(Body::moving(4, 4), Plain(Kind::Mover)).expect("add");
    world.setup();

    world.delete(wall).expect("delete");

    assert_eq!(world.entity_count(), 2);
    assert_eq!(world.zones(), (1, 2));
    assert_eq!(world.body(wall).map(Body::is_active), Some(false));
    assert!(world.query_by_tag(Kind::Wall).is_empty());

    world.cleanup();
    assert_eq!(world.entity_ids(), vec![mover]);
    assert_eq!(world.zones(), (0, 1));
}

#[test]
fn entity_deleted_during_the_move_phase_is_not_moved() {
    let mut world = world();
    let target = EntityId(1);
    world
        .add(
            Body::moving(4, 4)
                .with_position(398, 100)
                .with_direction_speed(0, 5.0)
                .with_moving(true),
            Sentry { target },
        )
        .expect("add");
    let mover = world
        .add(
            Body::moving(4, 4)
                .with_position(396, 200)
                .with_direction_speed(0, 5.0)
                .with_moving(true),
            Recorder(Kind::Mover),
        )
        .expect("add");
    world
        .add(Body::fixed(4, 4).with_position(399, 200), Recorder(Kind::Wall))
        .expect("add");
    world.setup();
    assert_eq!(mover, target);

    world.run_cycle();

    assert!(world.game().outside.is_empty());
    assert!(world.game().contacts.is_empty());
    assert!(world.body(mover).is_none());
    assert_eq!(world.entity_count(), 2);
}

#[test]
fn deleting_unknown_entity_is_an_error() {
    let mut world = world();

    assert!(matches!(
        world.delete(EntityId(99)),
        Err(GameError::UnknownEntity(EntityId(99)))
    ));
}

#[test]
fn alarm_fires_once_on_its_target_cycle() {
    let mut world = world();
    let clock = world.add_controller(AlarmClock);
    world.setup();
    world.set_timer(ListenerId::Controller(clock), 3, 7);

    for _ in 0..6 {
        world.run_cycle();
    }

    assert_eq!(world.game().alarms, vec![(3, 7)]);
    assert_eq!(world.pending_alarms(), 0);
}

#[test]
fn deleting_an_entity_drops_its_alarms_and_steps() {
    let mut world = world();
    let id = world
        .add(Body::moving(4, 4), Recorder(Kind::Mover))
        .expect("add");
    world.setup();
    world.set_timer(ListenerId::Entity(id), 5, 1);
    world.add_step_listener(ListenerId::Entity(id));
    assert_eq!(world.pending_alarms(), 1);

    world.delete(id).expect("delete");
    world.cleanup();

    assert_eq!(world.pending_alarms(), 0);
    assert!(!world.is_step_listener(ListenerId::Entity(id)));
    for _ in 0..6 {
        world.run_cycle();
    }
    assert!(world.game().alarms.is_empty());
}

#[test]
fn static_and_moving_pair_collides_once() {
    let mut world = world();
    let wall = world
        .add(Body::fixed(10, 10), Recorder(Kind::Wall))
        .expect("add");
    let mover = world
        .add(Body::moving(10, 10).with_position(5, 5), Recorder(Kind::Mover))
        .expect("add");
    world.setup();

    world.run_cycle();

    assert_eq!(
        world.game().contacts,
        vec![(ListenerId::Entity(mover), wall)]
    );
}

#[test]
fn only_the_overlapping_mover_and_static_pair_collides() {
    let mut world = world();
    let s0 = world
        .add(Body::fixed(10, 10), Recorder(Kind::Wall))
        .expect("add");
    world
        .add(Body::fixed(10, 10).with_position(100, 0), Recorder(Kind::Wall))
        .expect("add");
    world
        .add(Body::moving(10, 10).with_position(200, 0), Recorder(Kind::Mover))
        .expect("add");
    let m1 = world
        .add(Body::moving(10, 10).with_position(5, 5), Recorder(Kind::Mover))
        .expect("add");
    world
        .add(Body::player(10, 10).with_position(300, 200), Recorder(Kind::Hero))
        .expect("add");
    world.setup();
    assert_eq!(world.zones(), (2, 4));

    world.run_cycle();

    assert_eq!(world.game().contacts, vec![(ListenerId::Entity(m1), s0)]);
}

#[test]
fn two_movers_are_both_notified() {
    let mut world = world();
    let first = world
        .add(Body::moving(10, 10), Recorder(Kind::Mover))
        .expect("add");
    let second = world
        .add(Body::moving(10, 10).with_position(9, 0), Recorder(Kind::Mover))
        .expect("add");
    world
        .add(Body::fixed(4, 4).with_position(200, 200), Recorder(Kind::Wall))
        .expect("add");
    world.setup();

    world.run_cycle();

    assert_eq!(
        world.game().contacts,
        vec![
            (ListenerId::Entity(second), first),
            (ListenerId::Entity(first), second),
        ]
    );
}

#[test]
fn touching_edges_do_not_collide() {
    let mut world = world();
    world
        .add(Body::fixed(10, 10), Recorder(Kind::Wall))
        .expect("add");
    world
        .add(Body::moving(10, 10).with_position(10, 0), Recorder(Kind::Mover))
        .expect("add");
    world.setup();

    world.run_cycle();

    assert!(world.game().contacts.is_empty());
}

#[test]
fn mover_bounces_off_a_wall_of_tiles() {
    let rows: Vec<Vec<u8>> = (0..10).map(|_| vec![0, 0, 0, 0, 0, 1, 0, 0]).collect();
    let tiles = TileMap::from_rows(
        &rows,
        TileGeometry {
            cell_width: 10,
            cell_height: 10,
            origin_x: 0,
            origin_y: 0,
        },
        1,
    )
    .expect("tile map");
    let mut world = World::new(Log::default(), WorldBounds::new(0, 0, 200, 200), 80, 80)
        .with_tiles(tiles);
    let mover = world
        .add(
            Body::moving(10, 10)
                .with_position(30, 20)
                .with_direction_speed(0, 5.0)
                .with_moving(true),
            Recorder(Kind::Mover),
        )
        .expect("add");
    world.setup();

    for _ in 0..6 {
        world.run_cycle();
        let right = world.body(mover).map(|body| body.rect().right());
        assert!(right.is_some_and(|right| right <= 50), "entered the wall: {right:?}");
    }

    let body = world.body(mover).expect("mover");
    assert!(body.moves_left());
    assert!(body.x() < 40);
    assert_eq!(world.game().tile_hits.len(), 1);
    assert!(world.game().tile_hits[0].contains_kind(1));
}

#[test]
fn viewport_never_leaves_the_world() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut world = world();
    world.set_positioning(Positioning::CENTER);
    world.set_tolerance(0.3, 0.3);
    world
        .add(Body::player(10, 10).with_position(200, 150), Walker)
        .expect("add");
    world.setup();

    let bounds = world.bounds();
    for _ in 0..500 {
        let action = match rng.gen_range(0..4) {
            0 => GameAction::Left,
            1 => GameAction::Right,
            2 => GameAction::Up,
            _ => GameAction::Down,
        };
        world.press_key(action);
        world.release_key(action);
        world.run_cycle();

        let view = world.viewport().rect();
        assert!(view.x >= bounds.min_x && view.right() <= bounds.max_x, "{view:?}");
        assert!(view.y >= bounds.min_y && view.bottom() <= bounds.max_y, "{view:?}");
    }
}

#[test]
fn viewport_follows_player_within_tolerance() {
    let mut world = world();
    world.set_positioning(Positioning::CENTER);
    world.set_tolerance(0.3, 0.3);
    let player = world
        .add(Body::player(10, 10).with_position(200, 150), Walker)
        .expect("add");
    world.setup();

    for _ in 0..10 {
        world.press_key(GameAction::Right);
        world.release_key(GameAction::Right);
        world.run_cycle();
    }

    let body = world.body(player).expect("player");
    assert_eq!(body.x(), 280);
    assert!(world.viewport().is_in_view(body.rect()));
}

#[test]
fn camera_follows_player_through_plain_cycles() {
    let mut world = world();
    world.set_positioning(Positioning::CENTER);
    world.set_tolerance(0.0, 0.0);
    let player = world
        .add(Body::player(10, 10).with_position(150, 150), Walker)
        .expect("add");
    world.setup();
    assert_eq!(world.viewport().rect().x, 105);

    for _ in 0..10 {
        world.press_key(GameAction::Right);
        world.release_key(GameAction::Right);
        world.run_cycle();
    }

    assert_eq!(world.body(player).map(Body::x), Some(230));
    assert_eq!(world.viewport().rect().x, 185);
}

#[test]
fn failing_callback_does_not_abort_the_cycle() {
    let mut world = world();
    let broken = world.add_controller(Broken);
    let counter = world.add_controller(StepCounter);
    world.add_step_listener(ListenerId::Controller(broken));
    world.add_step_listener(ListenerId::Controller(counter));
    world.setup();

    let first = world.run_cycle();
    let second = world.run_cycle();

    assert_eq!(first.callback_failures, 1);
    assert_eq!(second.callback_failures, 1);
    assert_eq!(world.game().steps, vec![0, 1]);
    assert_eq!(world.cycle(), 2);
}

#[test]
fn key_without_player_reports_error_and_cycle_continues() {
    let mut world = world();
    let counter = world.add_controller(StepCounter);
    world.add_step_listener(ListenerId::Controller(counter));
    world.setup();

    world.press_key(GameAction::Fire);
    let report = world.run_cycle();

    assert!(matches!(
        report.errors.as_slice(),
        [GameError::NoPlayer { .. }]
    ));
    assert_eq!(world.game().steps, vec![0]);
}

#[test]
fn second_player_is_rejected() {
    let mut world = world();
    world.add(Body::player(4, 4), Walker).expect("first player");

    assert!(matches!(
        world.add(Body::player(4, 4), Walker),
        Err(GameError::DuplicatePlayer(_))
    ));
}

#[test]
fn reset_game_time_clears_alarms_and_cycle() {
    let mut world = world();
    let clock = world.add_controller(AlarmClock);
    world.setup();
    world.set_timer(ListenerId::Controller(clock), 5, 1);
    world.run_cycle();
    world.run_cycle();

    world.reset_game_time();

    assert_eq!(world.cycle(), 0);
    assert_eq!(world.pending_alarms(), 0);
    for _ in 0..8 {
        world.run_cycle();
    }
    assert!(world.game().alarms.is_empty());
}
