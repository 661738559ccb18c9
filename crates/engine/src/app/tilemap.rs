use thiserror::Error;

use super::entity::Rect;

pub const NO_TILE: u8 = 0;
/// Collision patterns are `u32` bitmasks, one bit per tile kind.
pub const MAX_TILE_KINDS: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub cell_width: i32,
    pub cell_height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileMapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("row {row} has {actual} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("tile cell size must be positive, got {width}x{height}")]
    InvalidCellSize { width: i32, height: i32 },
    #[error("tile kind count {count} exceeds the supported maximum of {max}")]
    TooManyKinds { count: u8, max: u8 },
    #[error("tile kind {kind} is outside 0..={max}")]
    KindOutOfRange { kind: u8, max: u8 },
    #[error("tile index ({column}, {row}) is outside the {columns}x{rows} map")]
    IndexOutOfBounds {
        column: i32,
        row: i32,
        columns: usize,
        rows: usize,
    },
}

/// Tile map layout:
/// - tiles are stored row-major, `0` is empty and `n > 0` is tile kind `n`.
/// - `origin` is the world position of the top-left corner of tile (0,0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    columns: usize,
    rows: usize,
    geometry: TileGeometry,
    kind_count: u8,
    tiles: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleTile {
    pub column: usize,
    pub row: usize,
    pub kind: u8,
    pub screen_x: i32,
    pub screen_y: i32,
}

impl TileMap {
    pub fn new(
        columns: usize,
        rows: usize,
        geometry: TileGeometry,
        kind_count: u8,
        tiles: Vec<u8>,
    ) -> Result<Self, TileMapError> {
        if geometry.cell_width <= 0 || geometry.cell_height <= 0 {
            return Err(TileMapError::InvalidCellSize {
                width: geometry.cell_width,
                height: geometry.cell_height,
            });
        }
        if kind_count > MAX_TILE_KINDS {
            return Err(TileMapError::TooManyKinds {
                count: kind_count,
                max: MAX_TILE_KINDS,
            });
        }
        let expected = columns * rows;
        if tiles.len() != expected {
            return Err(TileMapError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        if let Some(&kind) = tiles.iter().find(|&&kind| kind > kind_count) {
            return Err(TileMapError::KindOutOfRange {
                kind,
                max: kind_count,
            });
        }

        Ok(Self {
            columns,
            rows,
            geometry,
            kind_count,
            tiles,
        })
    }

    pub fn from_rows(
        rows: &[Vec<u8>],
        geometry: TileGeometry,
        kind_count: u8,
    ) -> Result<Self, TileMapError> {
        let columns = rows.first().map_or(0, Vec::len);
        if let Some((row, actual)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != columns)
        {
            return Err(TileMapError::RaggedRow {
                row,
                expected: columns,
                actual,
            });
        }
        let tiles = rows.iter().flatten().copied().collect();
        Self::new(columns, rows.len(), geometry, kind_count, tiles)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    pub fn kind_count(&self) -> u8 {
        self.kind_count
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    fn index_of(&self, column: i32, row: i32) -> Option<usize> {
        if column < 0 || row < 0 {
            return None;
        }
        let (column, row) = (column as usize, row as usize);
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(row * self.columns + column)
    }

    pub fn tile_at(&self, column: i32, row: i32) -> Option<u8> {
        self.index_of(column, row)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// Column containing world x, unclamped.
    pub fn column_of(&self, x: i32) -> i32 {
        (x - self.geometry.origin_x).div_euclid(self.geometry.cell_width)
    }

    /// Row containing world y, unclamped.
    pub fn row_of(&self, y: i32) -> i32 {
        (y - self.geometry.origin_y).div_euclid(self.geometry.cell_height)
    }

    pub fn column_left(&self, column: i32) -> i32 {
        column * self.geometry.cell_width + self.geometry.origin_x
    }

    pub fn row_top(&self, row: i32) -> i32 {
        row * self.geometry.cell_height + self.geometry.origin_y
    }

    /// Pattern of the tiles in `column` covered by the vertical span `[y, y + height)`.
    pub fn pattern_in_column(&self, column: i32, y: i32, height: i32) -> u32 {
        if column < 0 || column >= self.columns as i32 {
            return 0;
        }
        let first = self.row_of(y).max(0);
        let last = self.row_of(y + height - 1).min(self.rows as i32 - 1);
        (first..=last).fold(0, |pattern, row| {
            pattern | self.tile_at(column, row).map_or(0, tile_bit)
        })
    }

    /// Pattern of the tiles in `row` covered by the horizontal span `[x, x + width)`.
    pub fn pattern_in_row(&self, row: i32, x: i32, width: i32) -> u32 {
        if row < 0 || row >= self.rows as i32 {
            return 0;
        }
        let first = self.column_of(x).max(0);
        let last = self.column_of(x + width - 1).min(self.columns as i32 - 1);
        (first..=last).fold(0, |pattern, column| {
            pattern | self.tile_at(column, row).map_or(0, tile_bit)
        })
    }

    pub fn find_tiles_at(&self, area: Rect) -> u32 {
        let first_row = self.row_of(area.y).max(0);
        let last_row = self.row_of(area.bottom() - 1).min(self.rows as i32 - 1);
        (first_row..=last_row).fold(0, |pattern, row| {
            pattern | self.pattern_in_row(row, area.x, area.w)
        })
    }

    pub fn check_change(&self, column: i32, row: i32, kind: u8) -> Result<(), TileMapError> {
        if self.index_of(column, row).is_none() {
            return Err(TileMapError::IndexOutOfBounds {
                column,
                row,
                columns: self.columns,
                rows: self.rows,
            });
        }
        if kind > self.kind_count {
            return Err(TileMapError::KindOutOfRange {
                kind,
                max: self.kind_count,
            });
        }
        Ok(())
    }

    pub fn change_tile(&mut self, column: i32, row: i32, kind: u8) -> Result<(), TileMapError> {
        self.check_change(column, row, kind)?;
        if let Some(index) = self.index_of(column, row) {
            self.tiles[index] = kind;
        }
        Ok(())
    }

    /// Non-empty tiles intersecting `view`, with view-relative positions.
    pub fn visible_tiles(&self, view: Rect) -> Vec<VisibleTile> {
        let first_column = self.column_of(view.x).max(0);
        let end_column = (self.column_of(view.right()) + 1).min(self.columns as i32);
        let first_row = self.row_of(view.y).max(0);
        let end_row = (self.row_of(view.bottom()) + 1).min(self.rows as i32);

        let mut visible = Vec::new();
        for row in first_row..end_row {
            for column in first_column..end_column {
                let Some(kind) = self.tile_at(column, row) else {
                    continue;
                };
                if kind == NO_TILE {
                    continue;
                }
                visible.push(VisibleTile {
                    column: column as usize,
                    row: row as usize,
                    kind,
                    screen_x: self.column_left(column) - view.x,
                    screen_y: self.row_top(row) - view.y,
                });
            }
        }
        visible
    }
}

pub fn tile_bit(kind: u8) -> u32 {
    if kind == NO_TILE {
        0
    } else {
        1u32 << (kind - 1)
    }
}
