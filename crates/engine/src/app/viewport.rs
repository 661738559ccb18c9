use rand::Rng;
use serde::Deserialize;

use super::entity::Rect;

pub const DEFAULT_TOLERANCE: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorldBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl WorldBounds {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// True when no part of `rect` lies inside the world.
    pub fn is_outside(&self, rect: Rect) -> bool {
        rect.x >= self.max_x
            || rect.right() <= self.min_x
            || rect.y >= self.max_y
            || rect.bottom() <= self.min_y
    }

    /// Random x where a frame of `width` still fits inside the world.
    pub fn random_x(&self, width: i32, rng: &mut impl Rng) -> i32 {
        self.min_x + rng.gen_range(0..(self.max_x - self.min_x - width).max(1))
    }

    pub fn random_y(&self, height: i32, rng: &mut impl Rng) -> i32 {
        self.min_y + rng.gen_range(0..(self.max_y - self.min_y - height).max(1))
    }
}

/// Bitmask describing where the player sits on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Positioning(u8);

impl Positioning {
    pub const HCENTER: Self = Self(1);
    pub const VCENTER: Self = Self(2);
    pub const LEFT: Self = Self(4);
    pub const RIGHT: Self = Self(8);
    pub const TOP: Self = Self(16);
    pub const BOTTOM: Self = Self(32);
    pub const FIXED: Self = Self(64);
    pub const CENTER: Self = Self(1 | 2);

    const HORIZONTAL: u8 = 1 | 4 | 8;
    const VERTICAL: u8 = 2 | 16 | 32;

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_fixed(self) -> bool {
        self.contains(Self::FIXED)
    }

    pub fn controls_horizontal(self) -> bool {
        !self.is_fixed() && self.0 & Self::HORIZONTAL != 0
    }

    pub fn controls_vertical(self) -> bool {
        !self.is_fixed() && self.0 & Self::VERTICAL != 0
    }
}

impl std::ops::BitOr for Positioning {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Offsets from the player position that bound the camera origin.
/// `top`/`left` cap the origin from above, `bottom`/`right` from below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewportLimits {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    x: i32,
    y: i32,
    screen_width: i32,
    screen_height: i32,
    positioning: Positioning,
    h_tolerance: f64,
    v_tolerance: f64,
    limits: ViewportLimits,
    player_size: Option<(i32, i32)>,
    dirty: bool,
}

impl Viewport {
    pub fn new(screen_width: i32, screen_height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            screen_width,
            screen_height,
            positioning: Positioning::FIXED,
            h_tolerance: DEFAULT_TOLERANCE,
            v_tolerance: DEFAULT_TOLERANCE,
            limits: ViewportLimits::default(),
            player_size: None,
            dirty: false,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn screen_width(&self) -> i32 {
        self.screen_width
    }

    pub fn screen_height(&self) -> i32 {
        self.screen_height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.screen_width, self.screen_height)
    }

    pub fn positioning(&self) -> Positioning {
        self.positioning
    }

    pub fn tolerance(&self) -> (f64, f64) {
        (self.h_tolerance, self.v_tolerance)
    }

    pub fn limits(&self) -> ViewportLimits {
        self.limits
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Manual placement; world clamping still applies on the next update.
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
        self.dirty = true;
    }

    pub fn set_positioning(&mut self, positioning: Positioning) {
        self.positioning = positioning;
        self.recompute_limits();
    }

    pub fn set_tolerance(&mut self, horizontal: f64, vertical: f64) {
        self.h_tolerance = horizontal.clamp(0.0, 1.0);
        self.v_tolerance = vertical.clamp(0.0, 1.0);
        self.recompute_limits();
    }

    pub fn attach_player(&mut self, width: i32, height: i32) {
        self.player_size = Some((width, height));
        self.recompute_limits();
    }

    pub fn detach_player(&mut self) {
        self.player_size = None;
    }

    fn recompute_limits(&mut self) {
        let Some((player_width, player_height)) = self.player_size else {
            return;
        };
        let positioning = self.positioning;

        let dist = (1.0 - self.v_tolerance) * f64::from(self.screen_height - player_height);
        let (full, half) = (dist as i32, (dist / 2.0) as i32);
        if positioning.contains(Positioning::TOP) {
            self.limits.top = 0;
            self.limits.bottom = player_height + full - self.screen_height;
        } else if positioning.contains(Positioning::VCENTER) {
            self.limits.top = -half;
            self.limits.bottom = player_height + half - self.screen_height;
        } else if positioning.contains(Positioning::BOTTOM) {
            self.limits.top = -full;
            self.limits.bottom = player_height - self.screen_height;
        }

        let dist = (1.0 - self.h_tolerance) * f64::from(self.screen_width - player_width);
        let (full, half) = (dist as i32, (dist / 2.0) as i32);
        if positioning.contains(Positioning::LEFT) {
            self.limits.left = 0;
            self.limits.right = player_width + full - self.screen_width;
        } else if positioning.contains(Positioning::HCENTER) {
            self.limits.left = -half;
            self.limits.right = player_width + half - self.screen_width;
        } else if positioning.contains(Positioning::RIGHT) {
            self.limits.left = -full;
            self.limits.right = player_width - self.screen_width;
        }
    }

    /// Exact placement relative to the player, used before the first cycle.
    pub fn place_on_player(&mut self, player: Rect) {
        let positioning = self.positioning;
        if positioning.is_fixed() {
            return;
        }
        if positioning.contains(Positioning::TOP) {
            self.y = player.y;
        } else if positioning.contains(Positioning::VCENTER) {
            self.y = player.y - (self.screen_height - player.h) / 2;
        } else if positioning.contains(Positioning::BOTTOM) {
            self.y = player.y - (self.screen_height - player.h);
        }
        if positioning.contains(Positioning::LEFT) {
            self.x = player.x;
        } else if positioning.contains(Positioning::HCENTER) {
            self.x = player.x - (self.screen_width - player.w) / 2;
        } else if positioning.contains(Positioning::RIGHT) {
            self.x = player.x - (self.screen_width - player.w);
        }
        self.dirty = true;
    }

    /// Applies the tolerance limits and world clamp if something moved.
    pub fn update(&mut self, player: Option<Rect>, bounds: WorldBounds) {
        if !self.dirty {
            return;
        }
        if let Some(player) = player {
            if self.positioning.controls_vertical() {
                self.y = self
                    .y
                    .min(player.y + self.limits.top)
                    .max(player.y + self.limits.bottom);
            }
            if self.positioning.controls_horizontal() {
                self.x = self
                    .x
                    .min(player.x + self.limits.left)
                    .max(player.x + self.limits.right);
            }
        }
        self.clamp_to_world(bounds);
        self.dirty = false;
    }

    fn clamp_to_world(&mut self, bounds: WorldBounds) {
        // min-then-max so a world smaller than the screen pins to min
        self.x = bounds.min_x.max(self.x.min(bounds.max_x - self.screen_width));
        self.y = bounds.min_y.max(self.y.min(bounds.max_y - self.screen_height));
    }

    pub fn is_in_view(&self, rect: Rect) -> bool {
        rect.right() > self.x
            && rect.bottom() > self.y
            && rect.x < self.x + self.screen_width
            && rect.y < self.y + self.screen_height
    }
}
