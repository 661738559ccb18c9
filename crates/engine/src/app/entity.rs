use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Which zone of the registry an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Static,
    Moving,
    Player,
}

impl Role {
    pub fn is_moving(self) -> bool {
        !matches!(self, Role::Static)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Edges that only touch do not count as overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(other.bottom() <= self.y
            || other.y >= self.bottom()
            || other.right() <= self.x
            || other.x >= self.right())
    }
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    speed: f64,
    sin_dir: f64,
    cos_dir: f64,
    friction: f64,
    moving: bool,
    collision_detection: bool,
    prev_x: i32,
    prev_y: i32,
    start: Option<(i32, i32)>,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            speed: 0.0,
            sin_dir: 0.0,
            cos_dir: 1.0,
            friction: 1.0,
            moving: false,
            collision_detection: true,
            prev_x: 0,
            prev_y: 0,
            start: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KeyState {
    has_key: bool,
    is_repeat: bool,
    moved: bool,
}

/// Position, frame and motion state of one entity.
///
/// Game code mutates a body through the setters below. Lifecycle, the move step
/// and the per-cycle key flags are owned by the engine.
#[derive(Debug, Clone)]
pub struct Body {
    role: Role,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    visible: bool,
    frame: u32,
    frame_count: u32,
    lifecycle: Lifecycle,
    motion: Motion,
    keys: KeyState,
}

impl Body {
    fn new(role: Role, width: i32, height: i32) -> Self {
        Self {
            role,
            x: 0,
            y: 0,
            width: width.max(0),
            height: height.max(0),
            visible: true,
            frame: 0,
            frame_count: 1,
            lifecycle: Lifecycle::Active,
            motion: Motion::default(),
            keys: KeyState::default(),
        }
    }

    pub fn fixed(width: i32, height: i32) -> Self {
        Self::new(Role::Static, width, height)
    }

    pub fn moving(width: i32, height: i32) -> Self {
        Self::new(Role::Moving, width, height)
    }

    pub fn player(width: i32, height: i32) -> Self {
        Self::new(Role::Player, width, height)
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.set_position(x, y);
        self
    }

    pub fn with_frames(mut self, frame_count: u32) -> Self {
        self.frame_count = frame_count.max(1);
        self.frame = 0;
        self
    }

    pub fn with_direction_speed(mut self, degrees: i32, speed: f64) -> Self {
        self.set_direction_speed(degrees, speed);
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.set_friction(friction);
        self
    }

    pub fn with_moving(mut self, moving: bool) -> Self {
        self.motion.moving = moving;
        self
    }

    pub fn with_collision_detection(mut self, enabled: bool) -> Self {
        self.motion.collision_detection = enabled;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.lifecycle = Lifecycle::Deleted;
    }

    pub(crate) fn mark_active(&mut self) {
        self.lifecycle = Lifecycle::Active;
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn set_frame(&mut self, frame: u32) {
        if frame < self.frame_count {
            self.frame = frame;
        }
    }

    pub fn next_frame(&mut self) {
        self.frame = (self.frame + 1) % self.frame_count.max(1);
    }

    pub fn prev_frame(&mut self) {
        let count = self.frame_count.max(1);
        self.frame = (self.frame + count - 1) % count;
    }

    /// Places the body and forgets the previous position, so a sweep in
    /// progress sees no remaining displacement. The first call also records
    /// the start position.
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
        self.motion.prev_x = x;
        self.motion.prev_y = y;
        if self.motion.start.is_none() {
            self.motion.start = Some((x, y));
        }
    }

    pub fn jump_to_start(&mut self) {
        if let Some((x, y)) = self.motion.start {
            self.set_position(x, y);
        }
    }

    pub fn start_position(&self) -> Option<(i32, i32)> {
        self.motion.start
    }

    pub fn undo_move(&mut self) {
        self.set_position(self.motion.prev_x, self.motion.prev_y);
    }

    pub fn prev_x(&self) -> i32 {
        self.motion.prev_x
    }

    pub fn prev_y(&self) -> i32 {
        self.motion.prev_y
    }

    pub fn moves_left(&self) -> bool {
        self.x < self.motion.prev_x
    }

    pub fn moves_up(&self) -> bool {
        self.y < self.motion.prev_y
    }

    pub fn speed(&self) -> f64 {
        self.motion.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.motion.speed = speed;
    }

    pub fn friction(&self) -> f64 {
        self.motion.friction
    }

    /// Fraction of speed kept each cycle; 1.0 means no slowdown.
    pub fn set_friction(&mut self, friction: f64) {
        self.motion.friction = friction.clamp(0.0, 1.0);
    }

    pub fn is_moving(&self) -> bool {
        self.motion.moving
    }

    pub fn start_moving(&mut self) {
        self.motion.moving = true;
    }

    pub fn stop_moving(&mut self) {
        self.motion.moving = false;
    }

    pub fn has_collision_detection(&self) -> bool {
        self.motion.collision_detection
    }

    pub fn set_collision_detection(&mut self, enabled: bool) {
        self.motion.collision_detection = enabled;
    }

    pub fn set_direction_radians(&mut self, radians: f64) {
        // screen y grows downwards
        self.motion.sin_dir = -radians.sin();
        self.motion.cos_dir = radians.cos();
    }

    pub fn set_direction_degrees(&mut self, degrees: i32) {
        self.set_direction_radians(f64::from(degrees % 360).to_radians());
    }

    pub fn set_direction_speed(&mut self, degrees: i32, speed: f64) {
        self.set_direction_degrees(degrees);
        self.set_speed(speed);
    }

    pub fn direction_radians(&self) -> f64 {
        (-self.motion.sin_dir)
            .atan2(self.motion.cos_dir)
            .rem_euclid(TAU)
    }

    pub fn direction_degrees(&self) -> i32 {
        let degrees = self.direction_radians().to_degrees().round() as i32;
        (360 + degrees) % 360
    }

    pub fn x_speed(&self) -> f64 {
        self.motion.speed * self.motion.cos_dir
    }

    pub fn y_speed(&self) -> f64 {
        self.motion.speed * self.motion.sin_dir
    }

    pub fn set_x_speed(&mut self, x_speed: f64) {
        self.set_xy_speed(x_speed, self.y_speed());
    }

    pub fn set_y_speed(&mut self, y_speed: f64) {
        self.set_xy_speed(self.x_speed(), y_speed);
    }

    fn set_xy_speed(&mut self, x_speed: f64, y_speed: f64) {
        self.motion.speed = x_speed.hypot(y_speed);
        if self.motion.speed > 0.0 {
            self.motion.sin_dir = y_speed / self.motion.speed;
            self.motion.cos_dir = x_speed / self.motion.speed;
        }
    }

    /// Turns towards a point without changing speed.
    pub fn move_towards(&mut self, x: i32, y: i32) {
        let dx = f64::from(x - self.x);
        let dy = f64::from(y - self.y);
        let distance = dx.hypot(dy);
        if distance > 0.0 {
            self.motion.sin_dir = dy / distance;
            self.motion.cos_dir = dx / distance;
        }
    }

    pub fn reverse_horizontal(&mut self) {
        self.motion.cos_dir = -self.motion.cos_dir;
    }

    pub fn reverse_vertical(&mut self) {
        self.motion.sin_dir = -self.motion.sin_dir;
    }

    /// Moves back along the last move until the given axis coordinate is
    /// reached; the other axis is interpolated.
    pub fn move_up_to(&mut self, axis: Axis, position: i32) {
        match axis {
            Axis::Horizontal => {
                let y = self.matching_y(self.x_factor(position));
                self.set_position(position, y);
            }
            Axis::Vertical => {
                let x = self.matching_x(self.y_factor(position));
                self.set_position(x, position);
            }
        }
    }

    pub fn bounce(&mut self, axis: Axis, position: i32) {
        self.move_up_to(axis, position);
        match axis {
            Axis::Horizontal => self.reverse_horizontal(),
            Axis::Vertical => self.reverse_vertical(),
        }
    }

    /// Player-style displacement: keeps the previous position so the tile
    /// sweep can follow the move.
    pub fn move_player(&mut self, x: i32, y: i32) {
        self.motion.prev_x = self.x;
        self.motion.prev_y = self.y;
        self.x = x;
        self.y = y;
        self.keys.moved = true;
    }

    pub fn key_pressed(&self) -> bool {
        self.keys.has_key
    }

    pub fn key_repeat(&self) -> bool {
        self.keys.is_repeat
    }

    pub(crate) fn set_key_state(&mut self, has_key: bool, is_repeat: bool) {
        self.keys.has_key = has_key;
        self.keys.is_repeat = is_repeat;
    }

    pub(crate) fn take_player_moved(&mut self) -> bool {
        std::mem::take(&mut self.keys.moved)
    }

    /// One cycle of motion. Returns whether the body was displaced.
    pub(crate) fn advance(&mut self) -> bool {
        if !self.motion.moving {
            return false;
        }
        self.motion.prev_x = self.x;
        self.motion.prev_y = self.y;
        if self.motion.speed > 0.0 {
            self.motion.speed *= self.motion.friction;
        }
        self.x += (self.motion.cos_dir * self.motion.speed).round() as i32;
        self.y += (self.motion.sin_dir * self.motion.speed).round() as i32;
        true
    }

    pub(crate) fn x_factor(&self, x_at_crossing: i32) -> f64 {
        if self.x == self.motion.prev_x {
            1.0
        } else {
            f64::from(x_at_crossing - self.motion.prev_x) / f64::from(self.x - self.motion.prev_x)
        }
    }

    pub(crate) fn y_factor(&self, y_at_crossing: i32) -> f64 {
        if self.y == self.motion.prev_y {
            1.0
        } else {
            f64::from(y_at_crossing - self.motion.prev_y) / f64::from(self.y - self.motion.prev_y)
        }
    }

    pub(crate) fn matching_y(&self, x_factor: f64) -> i32 {
        self.motion.prev_y + (x_factor * f64::from(self.y - self.motion.prev_y)).round() as i32
    }

    pub(crate) fn matching_x(&self, y_factor: f64) -> i32 {
        self.motion.prev_x + (y_factor * f64::from(self.x - self.motion.prev_x)).round() as i32
    }
}
