use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tile_engine::{Game, GameError, ListenerId, SaveSlot, World};
use tracing::{info, warn};

mod actors;

use actors::{Fish, Monster, Spawner};

pub(crate) const STRAWBERRY_POINTS: u32 = 50;
/// Timer id the spawner uses for its strawberry alarm.
pub(crate) const SPAWN_TIMER: u32 = 1;
const FIRST_SPAWN_DELAY: u64 = 2;

const BACKGROUND: [u8; 4] = [34, 204, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Tag {
    Fish,
    Monster,
    Bullet,
    Strawberry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SavedScore {
    pub(crate) high_score: u32,
    pub(crate) last_score: u32,
}

/// Shared game state: the running score and where it is kept between runs.
#[derive(Debug, Default)]
pub(crate) struct Aquarium {
    score: u32,
    high_score: u32,
    save_slot: Option<SaveSlot>,
}

impl Aquarium {
    pub(crate) fn with_save_slot(slot: SaveSlot) -> Self {
        let saved = load_saved_score(&slot);
        info!(high_score = saved.high_score, "high_score_loaded");
        Self {
            score: 0,
            high_score: saved.high_score,
            save_slot: Some(slot),
        }
    }

    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    pub(crate) fn add_points(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
        info!(score = self.score, "score_changed");
    }

    fn save_score(&mut self) {
        self.high_score = self.high_score.max(self.score);
        let Some(slot) = &self.save_slot else {
            return;
        };
        let saved = SavedScore {
            high_score: self.high_score,
            last_score: self.score,
        };
        let bytes = match serde_json::to_vec_pretty(&saved) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(error = %error, "score_encode_failed");
                return;
            }
        };
        if let Err(error) = slot.save(&bytes) {
            warn!(error = %error, "score_save_failed");
        }
    }
}

fn load_saved_score(slot: &SaveSlot) -> SavedScore {
    let bytes = match slot.load() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return SavedScore::default(),
        Err(error) => {
            warn!(error = %error, "score_load_failed");
            return SavedScore::default();
        }
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|error| {
        warn!(path = %slot.path().display(), error = %error, "score_parse_failed");
        SavedScore::default()
    })
}

impl Game for Aquarium {
    type Tag = Tag;

    fn background_color(&self) -> [u8; 4] {
        BACKGROUND
    }

    fn tile_color(&self, kind: u8) -> [u8; 4] {
        match kind {
            1 => [236, 206, 128, 255],
            _ => [96, 104, 118, 255],
        }
    }

    fn sprite_color(&self, tag: Tag, _frame: u32) -> [u8; 4] {
        match tag {
            Tag::Fish => [255, 140, 0, 255],
            Tag::Monster => [120, 40, 160, 255],
            Tag::Bullet => [250, 250, 210, 255],
            Tag::Strawberry => [220, 20, 60, 255],
        }
    }

    fn on_exit(&mut self, cycle: u64) {
        info!(cycle, score = self.score, high_score = self.high_score, "game_over");
        self.save_score();
    }
}

/// Adds the monster, the spawner and the fish. The spawner rng is seeded from
/// `seed` when given, from entropy otherwise.
pub(crate) fn populate(world: &mut World<Aquarium>, seed: Option<u64>) -> Result<(), GameError> {
    let monster = world.add(Monster::body(), Monster)?;
    world.add_step_listener(ListenerId::Entity(monster));

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let spawner = world.add_controller(Spawner::new(rng));
    world.set_timer(ListenerId::Controller(spawner), FIRST_SPAWN_DELAY, SPAWN_TIMER);

    world.add(Fish::body(), Fish)?;
    Ok(())
}
