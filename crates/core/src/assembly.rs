//! Output assembly: frame-number substitution and tile compositing.
//!
//! The manager's assembler runs these after every task of a job has
//! reported success. Everything here is pure over in-memory buffers; file
//! I/O stays in the caller.

use image::RgbaImage;

use crate::decompose::TileRect;
use crate::error::CoreError;

/// Zero-pad width used when a pattern carries no `#` placeholder.
pub const DEFAULT_FRAME_PAD: usize = 4;

// ---------------------------------------------------------------------------
// Frame-number substitution
// ---------------------------------------------------------------------------

/// Substitute a frame number into an output pattern.
///
/// Every run of `#` characters is replaced by the frame number zero-padded
/// to the run length, so `frame_####.png` with frame 12 becomes
/// `frame_0012.png`. A pattern without any `#` gets `_NNNN` inserted before
/// the extension (or appended when there is none).
pub fn substitute_frame_number(pattern: &str, frame: i32) -> String {
    if !pattern.contains('#') {
        let width = DEFAULT_FRAME_PAD;
        let padded = format!("{frame:0width$}");
        return match pattern.rfind('.') {
            Some(dot) => format!("{}_{padded}{}", &pattern[..dot], &pattern[dot..]),
            None => format!("{pattern}_{padded}"),
        };
    }

    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        let mut width = 1;
        while chars.peek() == Some(&'#') {
            chars.next();
            width += 1;
        }
        out.push_str(&format!("{frame:0width$}"));
    }
    out
}

// ---------------------------------------------------------------------------
// Tile compositing
// ---------------------------------------------------------------------------

/// A rendered tile paired with the rect it belongs at.
pub struct TileImage {
    pub rect: TileRect,
    pub image: RgbaImage,
}

/// Composite rendered tiles into a full frame.
///
/// Every tile image must match its rect dimensions exactly and lie inside
/// the frame; a renderer that padded or cropped a tile fails the whole
/// assembly rather than producing a subtly broken frame. Coverage is
/// checked by area, so missing or overlapping tiles are also rejected.
pub fn composite_tiles(
    frame_width: u32,
    frame_height: u32,
    tiles: &[TileImage],
) -> Result<RgbaImage, CoreError> {
    if tiles.is_empty() {
        return Err(CoreError::Assembly(
            "No tiles provided for compositing".to_string(),
        ));
    }

    let mut covered: u64 = 0;
    for tile in tiles {
        let rect = &tile.rect;
        let (w, h) = tile.image.dimensions();
        if (w, h) != (rect.width, rect.height) {
            return Err(CoreError::Assembly(format!(
                "Tile at ({}, {}) is {w}x{h} but its rect is {}x{}",
                rect.x, rect.y, rect.width, rect.height
            )));
        }
        if rect.x + rect.width > frame_width || rect.y + rect.height > frame_height {
            return Err(CoreError::Assembly(format!(
                "Tile at ({}, {}) sized {}x{} exceeds the {frame_width}x{frame_height} frame",
                rect.x, rect.y, rect.width, rect.height
            )));
        }
        covered += rect.width as u64 * rect.height as u64;
    }

    let frame_area = frame_width as u64 * frame_height as u64;
    if covered != frame_area {
        return Err(CoreError::Assembly(format!(
            "Tiles cover {covered} of {frame_area} pixels"
        )));
    }

    let mut canvas = RgbaImage::new(frame_width, frame_height);
    for tile in tiles {
        image::imageops::replace(
            &mut canvas,
            &tile.image,
            tile.rect.x as i64,
            tile.rect.y as i64,
        );
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use image::Rgba;

    // -----------------------------------------------------------------------
    // Frame-number substitution
    // -----------------------------------------------------------------------

    #[test]
    fn hash_run_is_zero_padded() {
        assert_eq!(substitute_frame_number("frame_####.png", 12), "frame_0012.png");
    }

    #[test]
    fn run_length_controls_padding() {
        assert_eq!(substitute_frame_number("f_##.png", 7), "f_07.png");
        assert_eq!(substitute_frame_number("f_######.png", 7), "f_000007.png");
    }

    #[test]
    fn frame_wider_than_run_is_not_truncated() {
        assert_eq!(substitute_frame_number("f_##.png", 1234), "f_1234.png");
    }

    #[test]
    fn multiple_runs_all_substituted() {
        assert_eq!(substitute_frame_number("##/f_####.png", 3), "03/f_0003.png");
    }

    #[test]
    fn no_placeholder_inserts_before_extension() {
        assert_eq!(substitute_frame_number("render.png", 5), "render_0005.png");
    }

    #[test]
    fn no_placeholder_no_extension_appends() {
        assert_eq!(substitute_frame_number("render", 5), "render_0005");
    }

    // -----------------------------------------------------------------------
    // Tile compositing
    // -----------------------------------------------------------------------

    fn solid(rect: TileRect, px: Rgba<u8>) -> TileImage {
        TileImage {
            image: RgbaImage::from_pixel(rect.width, rect.height, px),
            rect,
        }
    }

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn two_tiles_composite_into_frame() {
        let left = solid(TileRect { x: 0, y: 0, width: 2, height: 4 }, RED);
        let right = solid(TileRect { x: 2, y: 0, width: 2, height: 4 }, BLUE);
        let frame = composite_tiles(4, 4, &[left, right]).unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
        assert_eq!(*frame.get_pixel(0, 0), RED);
        assert_eq!(*frame.get_pixel(3, 3), BLUE);
    }

    #[test]
    fn uneven_grid_composites() {
        // 5 wide split 2 + 3, remainder in the second tile.
        let a = solid(TileRect { x: 0, y: 0, width: 2, height: 2 }, RED);
        let b = solid(TileRect { x: 2, y: 0, width: 3, height: 2 }, BLUE);
        let frame = composite_tiles(5, 2, &[a, b]).unwrap();
        assert_eq!(*frame.get_pixel(1, 0), RED);
        assert_eq!(*frame.get_pixel(2, 0), BLUE);
        assert_eq!(*frame.get_pixel(4, 1), BLUE);
    }

    #[test]
    fn no_tiles_rejected() {
        assert_matches!(composite_tiles(4, 4, &[]), Err(CoreError::Assembly(_)));
    }

    #[test]
    fn wrong_tile_dimensions_rejected() {
        let tile = TileImage {
            rect: TileRect { x: 0, y: 0, width: 4, height: 4 },
            image: RgbaImage::new(3, 4),
        };
        assert_matches!(composite_tiles(4, 4, &[tile]), Err(CoreError::Assembly(_)));
    }

    #[test]
    fn out_of_bounds_tile_rejected() {
        let tile = solid(TileRect { x: 2, y: 0, width: 4, height: 4 }, RED);
        assert_matches!(composite_tiles(4, 4, &[tile]), Err(CoreError::Assembly(_)));
    }

    #[test]
    fn incomplete_coverage_rejected() {
        let tile = solid(TileRect { x: 0, y: 0, width: 2, height: 4 }, RED);
        assert_matches!(composite_tiles(4, 4, &[tile]), Err(CoreError::Assembly(_)));
    }

    #[test]
    fn overlapping_tiles_rejected() {
        let a = solid(TileRect { x: 0, y: 0, width: 3, height: 4 }, RED);
        let b = solid(TileRect { x: 2, y: 0, width: 2, height: 4 }, BLUE);
        assert_matches!(composite_tiles(4, 4, &[a, b]), Err(CoreError::Assembly(_)));
    }
}
