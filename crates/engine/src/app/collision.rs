use tracing::warn;

use super::behavior::{Context, Game, TileHit};
use super::entity::{Axis, Body};
use super::registry::Entity;
use super::tilemap::TileMap;
use super::timers::ListenerId;
use super::world::{Locator, Phase, World};

/// Upper bound on boundary crossings examined for one move.
const MAX_SWEEP_STEPS: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    pub(crate) hits: usize,
    pub(crate) capped: bool,
}

/// Walks the tile boundaries crossed between the body's previous and current
/// position, nearest crossing first, and reports every crossing that meets a
/// non-empty tile.
///
/// The callback may reposition the body; crossings are recomputed after each
/// one, so resetting the previous position ends the walk.
pub(crate) fn sweep_tiles(
    body: &mut Body,
    map: &TileMap,
    mut on_hit: impl FnMut(&mut Body, TileHit),
) -> SweepOutcome {
    let moves_left = body.moves_left();
    let moves_up = body.moves_up();
    let (width, height) = (body.width(), body.height());

    let mut column = if moves_left {
        map.column_of(body.prev_x()) - 1
    } else {
        map.column_of(body.prev_x() + width - 1) + 1
    };
    let mut row = if moves_up {
        map.row_of(body.prev_y()) - 1
    } else {
        map.row_of(body.prev_y() + height - 1) + 1
    };

    let crossing_x = |column: i32| {
        if moves_left {
            map.column_left(column + 1)
        } else {
            map.column_left(column) - width
        }
    };
    let crossing_y = |row: i32| {
        if moves_up {
            map.row_top(row + 1)
        } else {
            map.row_top(row) - height
        }
    };
    let column_step = if moves_left { -1 } else { 1 };
    let row_step = if moves_up { -1 } else { 1 };

    let mut outcome = SweepOutcome::default();
    let mut x_factor = body.x_factor(crossing_x(column));
    let mut y_factor = body.y_factor(crossing_y(row));
    let mut steps = 0;

    while x_factor < 1.0 || y_factor < 1.0 {
        if steps == MAX_SWEEP_STEPS {
            outcome.capped = true;
            break;
        }
        steps += 1;

        if x_factor <= y_factor {
            let position = crossing_x(column);
            let pattern = map.pattern_in_column(column, body.matching_y(x_factor), height);
            if pattern != 0 {
                outcome.hits += 1;
                on_hit(
                    body,
                    TileHit {
                        pattern,
                        axis: Axis::Horizontal,
                        position,
                    },
                );
            }
            column += column_step;
        } else {
            let position = crossing_y(row);
            let pattern = map.pattern_in_row(row, body.matching_x(y_factor), width);
            if pattern != 0 {
                outcome.hits += 1;
                on_hit(
                    body,
                    TileHit {
                        pattern,
                        axis: Axis::Vertical,
                        position,
                    },
                );
            }
            row += row_step;
        }

        x_factor = body.x_factor(crossing_x(column));
        y_factor = body.y_factor(crossing_y(row));
    }

    outcome
}

impl<G: Game> World<G> {
    /// Tile sweep for the entity at `index`. Commands queued by the tile
    /// callbacks are applied once the whole sweep is done. Returns whether
    /// the sweep hit the step cap.
    pub(super) fn sweep_entity(&mut self, index: usize, phase: Phase) -> bool {
        let player = self.player_contact();
        let World {
            game,
            registry,
            tiles,
            ids,
            commands,
            cycle,
            bounds,
            ..
        } = self;
        let Some(map) = tiles.as_ref().filter(|map| !map.is_empty()) else {
            return false;
        };
        let Some(entity) = registry.entry_mut(index) else {
            return false;
        };
        let Entity { id, body, behavior } = entity;
        let id = *id;
        let listener = ListenerId::Entity(id);
        let mut ctx = Context::new(
            game,
            commands,
            ids,
            Some(map),
            *cycle,
            *bounds,
            player,
            listener,
        );

        let mut failures = Vec::new();
        let outcome = sweep_tiles(body, map, |body, hit| {
            if let Some(receiver) = behavior.as_collision_receiver() {
                if let Err(err) = receiver.on_tile_collision(body, hit, &mut ctx) {
                    failures.push(err);
                }
            }
        });

        for err in &failures {
            self.record_failure(phase, listener, err);
        }
        if outcome.capped {
            warn!(entity = id.0, steps = MAX_SWEEP_STEPS, "tile_sweep_capped");
        }
        self.flush_commands();
        outcome.capped
    }

    /// Pairwise overlap test between every moving entity and everything
    /// before it in the list. Two static entities are never compared.
    pub(super) fn collision_phase(&mut self) {
        let len = self.registry.len();
        for index in (self.registry.first_moving()..len).rev() {
            let detects = self.registry.entries().get(index).is_some_and(|entity| {
                entity.body.is_active() && entity.body.has_collision_detection()
            });
            if !detects {
                continue;
            }

            for other in 0..index {
                let entries = self.registry.entries();
                let (Some(current), Some(candidate)) = (entries.get(index), entries.get(other))
                else {
                    break;
                };
                if !current.body.is_active() {
                    break;
                }
                if !candidate.body.is_active()
                    || !current.body.rect().overlaps(&candidate.body.rect())
                {
                    continue;
                }
                let other_contact = candidate.contact();
                let notify_other = candidate.body.role().is_moving();

                self.dispatch_entity(Locator::Index(index), Phase::Collide, |entity, ctx| {
                    let Entity { body, behavior, .. } = entity;
                    behavior
                        .as_collision_receiver()
                        .map(|receiver| receiver.on_entity_collision(body, &other_contact, ctx))
                });

                if notify_other {
                    let Some(current_contact) =
                        self.registry.entries().get(index).map(Entity::contact)
                    else {
                        break;
                    };
                    self.dispatch_entity(Locator::Index(other), Phase::Collide, |entity, ctx| {
                        let Entity { body, behavior, .. } = entity;
                        behavior.as_collision_receiver().map(|receiver| {
                            receiver.on_entity_collision(body, &current_contact, ctx)
                        })
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tilemap::TileGeometry;

    fn map(rows: &[&[u8]]) -> TileMap {
        let rows: Vec<Vec<u8>> = rows.iter().map(|row| row.to_vec()).collect();
        TileMap::from_rows(
            &rows,
            TileGeometry {
                cell_width: 10,
                cell_height: 10,
                origin_x: 0,
                origin_y: 0,
            },
            2,
        )
        .expect("valid map")
    }

    fn moved(width: i32, height: i32, from: (i32, i32), to: (i32, i32)) -> Body {
        let mut body = Body::moving(width, height).with_position(from.0, from.1);
        body.move_player(to.0, to.1);
        body
    }

    #[test]
    fn single_boundary_crossing_reports_once() {
        let tiles = map(&[
            &[0, 0, 1, 0, 0],
            &[0, 0, 1, 0, 0],
            &[0, 0, 1, 0, 0],
        ]);
        let mut body = moved(10, 10, (5, 10), (15, 10));
        let mut hits = Vec::new();

        let outcome = sweep_tiles(&mut body, &tiles, |_, hit| hits.push(hit));

        assert_eq!(outcome.hits, 1);
        assert_eq!(
            hits,
            vec![TileHit {
                pattern: 0b01,
                axis: Axis::Horizontal,
                position: 10,
            }]
        );
    }

    #[test]
    fn diagonal_move_reports_nearest_crossing_first() {
        let tiles = map(&[
            &[0, 0, 0, 0, 0, 0],
            &[0, 0, 1, 0, 0, 0],
            &[2, 2, 1, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0],
        ]);
        let mut body = moved(10, 10, (4, 4), (16, 22));
        let mut hits = Vec::new();

        sweep_tiles(&mut body, &tiles, |_, hit| hits.push(hit));

        assert_eq!(
            hits,
            vec![
                TileHit {
                    pattern: 0b10,
                    axis: Axis::Vertical,
                    position: 10,
                },
                TileHit {
                    pattern: 0b01,
                    axis: Axis::Horizontal,
                    position: 10,
                },
            ]
        );
    }

    #[test]
    fn fast_move_does_not_tunnel_through_walls() {
        let tiles = map(&[&[0, 0, 1, 0, 2, 0, 0, 0]]);
        let mut body = moved(10, 10, (0, 0), (60, 0));
        let mut hits = Vec::new();

        sweep_tiles(&mut body, &tiles, |_, hit| hits.push((hit.pattern, hit.position)));

        assert_eq!(hits, vec![(0b01, 10), (0b10, 30)]);
    }

    #[test]
    fn leftward_move_reports_far_edge_of_tile() {
        let tiles = map(&[&[1, 0, 0, 0]]);
        let mut body = moved(10, 10, (25, 0), (3, 0));
        let mut hits = Vec::new();

        sweep_tiles(&mut body, &tiles, |_, hit| hits.push((hit.axis, hit.position)));

        assert_eq!(hits, vec![(Axis::Horizontal, 10)]);
    }

    #[test]
    fn bounce_in_callback_ends_the_sweep() {
        let tiles = map(&[&[0, 0, 1, 0, 1, 0, 0, 0]]);
        let mut body = moved(10, 10, (0, 0), (60, 0)).with_direction_speed(0, 60.0);

        let outcome = sweep_tiles(&mut body, &tiles, |body, hit| {
            body.bounce(hit.axis, hit.position)
        });

        assert_eq!(outcome.hits, 1);
        assert_eq!(body.x(), 10);
        assert!(body.x_speed() < 0.0);
    }

    #[test]
    fn no_displacement_means_no_crossings() {
        let tiles = map(&[&[1, 1, 1]]);
        let mut body = Body::moving(10, 10).with_position(0, 0);

        let outcome = sweep_tiles(&mut body, &tiles, |_, _| panic!("no crossing expected"));

        assert_eq!(outcome, SweepOutcome::default());
    }

    #[test]
    fn reversing_inside_callback_is_capped() {
        let tiles = map(&[&[0, 0, 1, 0]]);
        let mut body = moved(10, 10, (5, 0), (15, 0));

        let outcome = sweep_tiles(&mut body, &tiles, |body, _| {
            let (x, y) = (body.x(), body.y());
            body.move_player(x - 50, y);
        });

        assert!(outcome.capped);
        assert_eq!(outcome.hits, 1);
    }
}
