use rand::rngs::StdRng;
use rand::Rng;
use tile_engine::{
    Behavior, Body, CallbackResult, CollisionReceiver, Contact, Context, Controller, GameAction,
    InputReceiver, Rect, StepListener, TileHit,
};
use tracing::{debug, warn};

use super::{Aquarium, Tag, SPAWN_TIMER, STRAWBERRY_POINTS};

const FISH_WIDTH: i32 = 36;
const FISH_HEIGHT: i32 = 22;
const FISH_STEP: i32 = 8;
const FISH_START: (i32, i32) = (250, 250);

const MONSTER_WIDTH: i32 = 20;
const MONSTER_HEIGHT: i32 = 31;
const MONSTER_SPEED: f64 = 5.0;
const MONSTER_START: (i32, i32) = (328, 149);
const MONSTER_RESPAWN: (i32, i32) = (340, 240);
/// The monster turns towards the fish on every fourth cycle.
const MONSTER_TURN_PERIOD: u64 = 4;

const BULLET_WIDTH: i32 = 9;
const BULLET_HEIGHT: i32 = 20;
const BULLET_SPEED: f64 = 4.0;

const STRAWBERRY_WIDTH: i32 = 15;
const STRAWBERRY_HEIGHT: i32 = 17;

const MAX_PLACEMENT_ATTEMPTS: usize = 1000;
const RESPAWN_DELAY_RANGE: u64 = 50;

/// The player. Moves one step per key and eats strawberries.
pub(crate) struct Fish;

impl Fish {
    pub(crate) fn body() -> Body {
        Body::player(FISH_WIDTH, FISH_HEIGHT).with_position(FISH_START.0, FISH_START.1)
    }
}

impl Behavior<Aquarium> for Fish {
    fn tag(&self) -> Tag {
        Tag::Fish
    }

    fn animate(&mut self, _body: &mut Body) {}

    fn as_input_receiver(&mut self) -> Option<&mut dyn InputReceiver<Aquarium>> {
        Some(self)
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<Aquarium>> {
        Some(self)
    }
}

impl InputReceiver<Aquarium> for Fish {
    fn on_action(
        &mut self,
        body: &mut Body,
        action: GameAction,
        ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        let (x, y) = (body.x(), body.y());
        match action {
            GameAction::Up => body.move_player(x, y - FISH_STEP),
            GameAction::Down => body.move_player(x, y + FISH_STEP),
            // only the left edge of the world is guarded
            GameAction::Left if x - FISH_STEP >= ctx.bounds().min_x => {
                body.move_player(x - FISH_STEP, y);
            }
            GameAction::Left => {}
            GameAction::Right => body.move_player(x + FISH_STEP, y),
            GameAction::Fire => {
                let id = ctx.add(Bullet::body(x + FISH_WIDTH, y), Bullet);
                debug!(bullet = id.0, x = x + FISH_WIDTH, y, "bullet_fired");
            }
            GameAction::ButtonA
            | GameAction::ButtonB
            | GameAction::ButtonC
            | GameAction::ButtonD => {}
        }
        Ok(())
    }
}

impl CollisionReceiver<Aquarium> for Fish {
    fn on_entity_collision(
        &mut self,
        _body: &mut Body,
        other: &Contact<Tag>,
        ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        if other.tag == Tag::Strawberry {
            ctx.game().add_points(STRAWBERRY_POINTS);
            ctx.delete(other.id);
        }
        Ok(())
    }
}

/// Swims around, bounces off tiles and keeps turning towards the fish.
pub(crate) struct Monster;

impl Monster {
    pub(crate) fn body() -> Body {
        Body::moving(MONSTER_WIDTH, MONSTER_HEIGHT)
            .with_position(MONSTER_START.0, MONSTER_START.1)
            .with_direction_speed(0, MONSTER_SPEED)
            .with_moving(true)
    }
}

impl Behavior<Aquarium> for Monster {
    fn tag(&self) -> Tag {
        Tag::Monster
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<Aquarium>> {
        Some(self)
    }

    fn as_step_listener(&mut self) -> Option<&mut dyn StepListener<Aquarium>> {
        Some(self)
    }
}

impl StepListener<Aquarium> for Monster {
    fn on_step(
        &mut self,
        body: &mut Body,
        cycle: u64,
        ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        if cycle % MONSTER_TURN_PERIOD != 1 {
            return Ok(());
        }
        if let Some(fish) = ctx.player() {
            body.move_towards(fish.rect.x, fish.rect.y);
        }
        Ok(())
    }
}

impl CollisionReceiver<Aquarium> for Monster {
    fn on_tile_collision(
        &mut self,
        body: &mut Body,
        hit: TileHit,
        _ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        body.bounce(hit.axis, hit.position);
        Ok(())
    }

    fn on_outside_world(
        &mut self,
        body: &mut Body,
        _ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        body.set_position(MONSTER_RESPAWN.0, MONSTER_RESPAWN.1);
        Ok(())
    }
}

pub(crate) struct Bullet;

impl Bullet {
    pub(crate) fn body(x: i32, y: i32) -> Body {
        Body::moving(BULLET_WIDTH, BULLET_HEIGHT)
            .with_position(x, y)
            .with_direction_speed(0, BULLET_SPEED)
            .with_moving(true)
    }
}

impl Behavior<Aquarium> for Bullet {
    fn tag(&self) -> Tag {
        Tag::Bullet
    }

    fn as_collision_receiver(&mut self) -> Option<&mut dyn CollisionReceiver<Aquarium>> {
        Some(self)
    }
}

impl CollisionReceiver<Aquarium> for Bullet {
    fn on_outside_world(
        &mut self,
        _body: &mut Body,
        ctx: &mut Context<'_, Aquarium>,
    ) -> CallbackResult {
        ctx.delete_self();
        Ok(())
    }
}

pub(crate) struct Strawberry;

impl Strawberry {
    pub(crate) fn body(x: i32, y: i32) -> Body {
        Body::fixed(STRAWBERRY_WIDTH, STRAWBERRY_HEIGHT).with_position(x, y)
    }
}

impl Behavior<Aquarium> for Strawberry {
    fn tag(&self) -> Tag {
        Tag::Strawberry
    }

    fn animate(&mut self, _body: &mut Body) {}
}

/// Drops a strawberry on a free spot whenever its alarm goes off, then
/// schedules the next one at a random delay.
pub(crate) struct Spawner {
    rng: StdRng,
}

impl Spawner {
    pub(crate) fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    fn free_spot(&mut self, ctx: &Context<'_, Aquarium>) -> Option<Rect> {
        let bounds = ctx.bounds();
        (0..MAX_PLACEMENT_ATTEMPTS)
            .map(|_| {
                Rect::new(
                    bounds.random_x(STRAWBERRY_WIDTH, &mut self.rng),
                    bounds.random_y(STRAWBERRY_HEIGHT, &mut self.rng),
                    STRAWBERRY_WIDTH,
                    STRAWBERRY_HEIGHT,
                )
            })
            .find(|area| ctx.find_tiles_at(*area) == 0)
    }
}

impl Controller<Aquarium> for Spawner {
    fn on_alarm(&mut self, timer_id: u32, ctx: &mut Context<'_, Aquarium>) -> CallbackResult {
        if timer_id != SPAWN_TIMER {
            return Ok(());
        }
        match self.free_spot(ctx) {
            Some(spot) => {
                let id = ctx.add(Strawberry::body(spot.x, spot.y), Strawberry);
                debug!(strawberry = id.0, x = spot.x, y = spot.y, "strawberry_spawned");
            }
            None => warn!(attempts = MAX_PLACEMENT_ATTEMPTS, "strawberry_placement_failed"),
        }
        let delay = self.rng.gen_range(0..RESPAWN_DELAY_RANGE);
        ctx.set_timer(delay, SPAWN_TIMER);
        Ok(())
    }
}
