use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::{Game, RenderFrame};

/// Draws a [`RenderFrame`] into a fixed-size pixel buffer scaled to the window.
pub struct Renderer {
    pixels: Pixels<'static>,
    buffer_width: u32,
    buffer_height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>, buffer_width: u32, buffer_height: u32) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = Pixels::new(buffer_width.max(1), buffer_height.max(1), surface)?;
        Ok(Self {
            pixels,
            buffer_width: buffer_width.max(1),
            buffer_height: buffer_height.max(1),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)?;
        Ok(())
    }

    pub fn render<G: Game>(&mut self, frame: &RenderFrame<G::Tag>, game: &G) -> Result<(), Error> {
        let (width, height) = (self.buffer_width, self.buffer_height);
        draw_frame(self.pixels.frame_mut(), width, height, frame, game);
        self.pixels.render()
    }
}

/// Background, then tiles, then sprites in list order.
pub(crate) fn draw_frame<G: Game>(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    frame: &RenderFrame<G::Tag>,
    game: &G,
) {
    fill_buffer(buffer, game.background_color());
    for tile in &frame.tiles {
        fill_rect_clipped(
            buffer,
            width,
            height,
            ScreenRect {
                x: tile.screen_x,
                y: tile.screen_y,
                w: frame.tile_width,
                h: frame.tile_height,
            },
            game.tile_color(tile.kind),
        );
    }
    for sprite in &frame.sprites {
        fill_rect_clipped(
            buffer,
            width,
            height,
            ScreenRect {
                x: sprite.screen_x,
                y: sprite.screen_y,
                w: sprite.width,
                h: sprite.height,
            },
            game.sprite_color(sprite.tag, sprite.frame),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

fn fill_buffer(buffer: &mut [u8], color: [u8; 4]) {
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

fn fill_rect_clipped(buffer: &mut [u8], width: u32, height: u32, rect: ScreenRect, color: [u8; 4]) {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.x.saturating_add(rect.w).min(width as i32);
    let y1 = rect.y.saturating_add(rect.h).min(height as i32);
    for y in y0..y1 {
        for x in x0..x1 {
            write_pixel_rgba_clipped(buffer, width as usize, x, y, color);
        }
    }
}

fn write_pixel_rgba_clipped(buffer: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > buffer.len() {
        return;
    }
    buffer[byte_offset..end].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{EntityId, SpriteDraw, VisibleTile};

    const BACKGROUND: [u8; 4] = [1, 1, 1, 255];
    const TILE: [u8; 4] = [2, 2, 2, 255];
    const SPRITE: [u8; 4] = [3, 3, 3, 255];

    struct Palette;

    impl Game for Palette {
        type Tag = ();

        fn background_color(&self) -> [u8; 4] {
            BACKGROUND
        }

        fn tile_color(&self, _kind: u8) -> [u8; 4] {
            TILE
        }

        fn sprite_color(&self, _tag: (), _frame: u32) -> [u8; 4] {
            SPRITE
        }
    }

    fn pixel(buffer: &[u8], width: u32, x: usize, y: usize) -> [u8; 4] {
        let offset = (y * width as usize + x) * 4;
        [
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]
    }

    fn frame(tiles: Vec<VisibleTile>, sprites: Vec<SpriteDraw<()>>) -> RenderFrame<()> {
        RenderFrame {
            cycle: 0,
            camera_x: 0,
            camera_y: 0,
            screen_width: 8,
            screen_height: 8,
            tile_width: 4,
            tile_height: 4,
            tiles,
            sprites,
        }
    }

    #[test]
    fn sprites_draw_over_tiles_over_background() {
        let mut buffer = vec![0u8; 8 * 8 * 4];
        let tiles = vec![VisibleTile {
            column: 0,
            row: 0,
            kind: 1,
            screen_x: 0,
            screen_y: 0,
        }];
        let sprites = vec![SpriteDraw {
            id: EntityId(0),
            tag: (),
            screen_x: 2,
            screen_y: 2,
            width: 2,
            height: 2,
            frame: 0,
        }];

        draw_frame(&mut buffer, 8, 8, &frame(tiles, sprites), &Palette);

        assert_eq!(pixel(&buffer, 8, 0, 0), TILE);
        assert_eq!(pixel(&buffer, 8, 3, 3), SPRITE);
        assert_eq!(pixel(&buffer, 8, 4, 4), BACKGROUND);
        assert_eq!(pixel(&buffer, 8, 7, 7), BACKGROUND);
    }

    #[test]
    fn partially_offscreen_rect_is_clipped() {
        let mut buffer = vec![0u8; 8 * 8 * 4];

        fill_rect_clipped(
            &mut buffer,
            8,
            8,
            ScreenRect {
                x: -3,
                y: 6,
                w: 5,
                h: 10,
            },
            SPRITE,
        );

        assert_eq!(pixel(&buffer, 8, 0, 7), SPRITE);
        assert_eq!(pixel(&buffer, 8, 1, 6), SPRITE);
        assert_eq!(pixel(&buffer, 8, 2, 6), [0, 0, 0, 0]);
        assert_eq!(pixel(&buffer, 8, 0, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_pixel_write_is_ignored() {
        let mut buffer = vec![0u8; 4];
        write_pixel_rgba_clipped(&mut buffer, 1, 5, 5, SPRITE);
        write_pixel_rgba_clipped(&mut buffer, 1, -1, 0, SPRITE);
        assert_eq!(buffer, vec![0, 0, 0, 0]);
    }
}
