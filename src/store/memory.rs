/// In-memory backing store
///
/// `MemoryStore` is the reference `SpriteStore` implementation: it keeps
/// tables of sprites as indexed pixel frames plus a palette slot table, and
/// renders previews deterministically from that data. The whole store can
/// be serialized to JSON and restored, enabling snapshot save/load without
/// any ROM plumbing.
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpriteError};
use crate::store::{FrameShape, SpriteStore, TablePointers, IMPORT_FRAMES, IMPORT_SHAPE};

/// Colors one palette slot can hold
const MAX_PALETTE_COLORS: usize = 16;

/// Slots the palette table starts with
const DEFAULT_PALETTE_SLOTS: usize = 16;

/// Where the palette table initially lives
const PALETTE_TABLE_BASE: u32 = 0x001A_0000;

/// How far a repoint moves the palette table
const REPOINT_STRIDE: u32 = 0x800;

/// One sprite: a footprint, a palette slot, and indexed pixels per frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct SpriteData {
    shape: FrameShape,
    palette: u16,
    frames: Vec<Vec<u8>>,
}

impl SpriteData {
    /// A blank sprite: every pixel indexes color 0 of the default palette
    fn blank(shape: FrameShape, frames: u16) -> Self {
        let (width, height) = shape.dimensions();
        let pixels = (width * height) as usize;
        SpriteData {
            shape,
            palette: 0,
            frames: vec![vec![0; pixels]; frames as usize],
        }
    }
}

/// One table: optional custom pointer metadata plus its sprites
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
struct TableData {
    pointers: Option<TablePointers>,
    sprites: Vec<SpriteData>,
}

/// One palette slot with a stable identifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct PaletteSlot {
    id: u16,
    colors: Vec<[u8; 4]>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    tables: Vec<TableData>,
    palettes: Vec<PaletteSlot>,
    palette_capacity: usize,
    palette_addr: u32,
    next_palette_id: u16,
}

impl MemoryStore {
    /// Create an empty store with the default (grayscale) palette in slot 0
    pub fn new() -> Self {
        let default_colors: Vec<[u8; 4]> = (0..MAX_PALETTE_COLORS as u8)
            .map(|i| {
                let v = i * 17;
                // Index 0 is the transparent color, as on the real hardware
                let alpha = if i == 0 { 0 } else { 255 };
                [v, v, v, alpha]
            })
            .collect();

        MemoryStore {
            tables: Vec::new(),
            palettes: vec![PaletteSlot {
                id: 0,
                colors: default_colors,
            }],
            palette_capacity: DEFAULT_PALETTE_SLOTS,
            palette_addr: PALETTE_TABLE_BASE,
            next_palette_id: 1,
        }
    }

    /// Append an empty table; returns its index
    pub fn add_table(&mut self) -> usize {
        self.tables.push(TableData::default());
        self.tables.len() - 1
    }

    /// Serialize the whole store to JSON
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a store from a JSON snapshot
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn sprite(&self, table: usize, sprite: usize) -> Result<&SpriteData> {
        self.tables
            .get(table)
            .ok_or(SpriteError::NoSuchTable(table))?
            .sprites
            .get(sprite)
            .ok_or(SpriteError::NoSuchSprite { table, sprite })
    }

    fn sprite_mut(&mut self, table: usize, sprite: usize) -> Result<&mut SpriteData> {
        self.tables
            .get_mut(table)
            .ok_or(SpriteError::NoSuchTable(table))?
            .sprites
            .get_mut(sprite)
            .ok_or(SpriteError::NoSuchSprite { table, sprite })
    }

    /// Collect the distinct colors of a sheet, oldest first
    fn build_palette(sheet: &RgbaImage) -> Result<Vec<[u8; 4]>> {
        let mut colors: Vec<[u8; 4]> = Vec::new();
        for px in sheet.pixels() {
            if !colors.contains(&px.0) {
                colors.push(px.0);
            }
        }
        if colors.len() > MAX_PALETTE_COLORS {
            return Err(SpriteError::TooManyColors(colors.len()));
        }
        Ok(colors)
    }

    /// Index one frame-sized region of a sheet against a palette
    fn index_region(
        sheet: &RgbaImage,
        colors: &[[u8; 4]],
        x0: u32,
        y0: u32,
        width: u32,
        height: u32,
    ) -> Vec<u8> {
        let mut indices = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let px = sheet.get_pixel(x0 + x, y0 + y).0;
                let idx = colors.iter().position(|c| *c == px).unwrap_or(0);
                indices.push(idx as u8);
            }
        }
        indices
    }

    fn check_sheet_size(sheet: &RgbaImage, want_width: u32, want_height: u32) -> Result<()> {
        if sheet.width() != want_width || sheet.height() != want_height {
            return Err(SpriteError::BadSheetSize {
                want_width,
                want_height,
                got_width: sheet.width(),
                got_height: sheet.height(),
            });
        }
        Ok(())
    }

    /// Store a sheet's palette in a fresh slot; returns the slot id
    fn alloc_palette_slot(&mut self, colors: Vec<[u8; 4]>) -> u16 {
        let id = self.next_palette_id;
        self.next_palette_id += 1;
        self.palettes.push(PaletteSlot { id, colors });
        id
    }

    /// A fixed-format import only accepts the exact required layout
    fn check_import_layout(&self, table: usize, sprite: usize) -> Result<()> {
        let data = self.sprite(table, sprite)?;
        if data.shape != IMPORT_SHAPE || data.frames.len() != IMPORT_FRAMES as usize {
            return Err(SpriteError::WrongLayout {
                shape: data.shape,
                frames: data.frames.len() as u16,
                want_shape: IMPORT_SHAPE,
                want_frames: IMPORT_FRAMES,
            });
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteStore for MemoryStore {
    fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn sprite_count(&self, table: usize) -> usize {
        self.tables.get(table).map_or(0, |t| t.sprites.len())
    }

    fn frame_shape(&self, table: usize, sprite: usize) -> Option<FrameShape> {
        self.sprite(table, sprite).ok().map(|s| s.shape)
    }

    fn frame_count(&self, table: usize, sprite: usize) -> Option<u16> {
        self.sprite(table, sprite).ok().map(|s| s.frames.len() as u16)
    }

    fn free_palette_slots(&self) -> usize {
        self.palette_capacity.saturating_sub(self.palettes.len())
    }

    fn used_palettes(&self) -> Vec<u16> {
        self.palettes.iter().map(|p| p.id).collect()
    }

    fn palette_table_addr(&self) -> u32 {
        self.palette_addr
    }

    fn add_sprite(&mut self, table: usize, shape: FrameShape, frames: u16) -> Result<()> {
        let table_data = self
            .tables
            .get_mut(table)
            .ok_or(SpriteError::NoSuchTable(table))?;
        table_data.sprites.push(SpriteData::blank(shape, frames));
        Ok(())
    }

    fn insert_sprite(
        &mut self,
        table: usize,
        position: usize,
        shape: FrameShape,
        frames: u16,
    ) -> Result<()> {
        let table_data = self
            .tables
            .get_mut(table)
            .ok_or(SpriteError::NoSuchTable(table))?;
        if position > table_data.sprites.len() {
            return Err(SpriteError::NoSuchSprite {
                table,
                sprite: position,
            });
        }
        table_data
            .sprites
            .insert(position, SpriteData::blank(shape, frames));
        Ok(())
    }

    fn resize_sprite(
        &mut self,
        table: usize,
        sprite: usize,
        shape: FrameShape,
        frames: u16,
    ) -> Result<()> {
        let data = self.sprite_mut(table, sprite)?;
        *data = SpriteData::blank(shape, frames);
        Ok(())
    }

    fn remove_sprite(&mut self, table: usize, position: usize) -> Result<()> {
        let table_data = self
            .tables
            .get_mut(table)
            .ok_or(SpriteError::NoSuchTable(table))?;
        if position >= table_data.sprites.len() {
            return Err(SpriteError::NoSuchSprite {
                table,
                sprite: position,
            });
        }
        table_data.sprites.remove(position);
        Ok(())
    }

    fn remove_table(&mut self, position: usize) -> Result<()> {
        if position >= self.tables.len() {
            return Err(SpriteError::NoSuchTable(position));
        }
        self.tables.remove(position);
        Ok(())
    }

    fn register_table(&mut self, pointers: &TablePointers) -> Result<()> {
        self.tables.push(TableData {
            pointers: Some(*pointers),
            sprites: Vec::new(),
        });
        Ok(())
    }

    fn repoint_palette_table(&mut self) -> u32 {
        self.palette_capacity += DEFAULT_PALETTE_SLOTS;
        self.palette_addr += REPOINT_STRIDE;
        tracing::info!(addr = self.palette_addr, capacity = self.palette_capacity,
            "palette table repointed");
        self.palette_addr
    }

    fn import_frames(&mut self, table: usize, sprite: usize, sheet: &RgbaImage) -> Result<()> {
        let (shape, count) = {
            let data = self.sprite(table, sprite)?;
            (data.shape, data.frames.len() as u32)
        };
        let (width, height) = shape.dimensions();
        Self::check_sheet_size(sheet, width * count, height)?;

        let colors = Self::build_palette(sheet)?;
        let frames: Vec<Vec<u8>> = (0..count)
            .map(|i| Self::index_region(sheet, &colors, i * width, 0, width, height))
            .collect();

        let slot = self.alloc_palette_slot(colors);
        let data = self.sprite_mut(table, sprite)?;
        data.palette = slot;
        data.frames = frames;
        Ok(())
    }

    fn import_pokemon_sheet(
        &mut self,
        table: usize,
        sprite: usize,
        sheet: &RgbaImage,
    ) -> Result<()> {
        self.check_import_layout(table, sprite)?;
        let (width, height) = IMPORT_SHAPE.dimensions();
        // Pokemon sheets pack the nine frames as a 3x3 grid
        Self::check_sheet_size(sheet, width * 3, height * 3)?;

        let colors = Self::build_palette(sheet)?;
        let frames: Vec<Vec<u8>> = (0..IMPORT_FRAMES as u32)
            .map(|i| {
                Self::index_region(sheet, &colors, (i % 3) * width, (i / 3) * height, width, height)
            })
            .collect();

        let slot = self.alloc_palette_slot(colors);
        let data = self.sprite_mut(table, sprite)?;
        data.palette = slot;
        data.frames = frames;
        Ok(())
    }

    fn import_overworld_sheet(
        &mut self,
        table: usize,
        sprite: usize,
        sheet: &RgbaImage,
    ) -> Result<()> {
        self.check_import_layout(table, sprite)?;
        let (width, height) = IMPORT_SHAPE.dimensions();
        // Overworld sheets lay the nine frames out in a single row
        Self::check_sheet_size(sheet, width * IMPORT_FRAMES as u32, height)?;

        let colors = Self::build_palette(sheet)?;
        let frames: Vec<Vec<u8>> = (0..IMPORT_FRAMES as u32)
            .map(|i| Self::index_region(sheet, &colors, i * width, 0, width, height))
            .collect();

        let slot = self.alloc_palette_slot(colors);
        let data = self.sprite_mut(table, sprite)?;
        data.palette = slot;
        data.frames = frames;
        Ok(())
    }

    fn palette_cleanup(&mut self) {
        let before = self.palettes.len();
        self.palettes.retain(|slot| {
            slot.id == 0
                || self
                    .tables
                    .iter()
                    .flat_map(|t| t.sprites.iter())
                    .any(|s| s.palette == slot.id)
        });
        tracing::debug!(dropped = before - self.palettes.len(), "palette cleanup");
    }

    fn frame_preview(&self, table: usize, sprite: usize, frame: u16) -> Option<RgbaImage> {
        let data = self.sprite(table, sprite).ok()?;
        let indices = data.frames.get(frame as usize)?;
        let slot = self.palettes.iter().find(|p| p.id == data.palette)?;
        let (width, height) = data.shape.dimensions();

        Some(RgbaImage::from_fn(width, height, |x, y| {
            let idx = indices[(y * width + x) as usize] as usize;
            Rgba(slot.colors.get(idx).copied().unwrap_or([0, 0, 0, 0]))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_sprite(shape: FrameShape, frames: u16) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_table();
        store.add_sprite(0, shape, frames).unwrap();
        store
    }

    #[test]
    fn test_blank_sprite_preview() {
        let store = store_with_sprite(FrameShape::S16x32, 2);

        let preview = store.frame_preview(0, 0, 0).unwrap();
        assert_eq!((preview.width(), preview.height()), (16, 32));
        // Blank pixels index the transparent default color
        assert_eq!(preview.get_pixel(0, 0).0, [0, 0, 0, 0]);

        // Frame out of range renders nothing
        assert!(store.frame_preview(0, 0, 5).is_none());
        assert!(store.frame_preview(0, 3, 0).is_none());
    }

    #[test]
    fn test_import_rejects_wrong_sheet_size() {
        let mut store = store_with_sprite(FrameShape::S16x16, 4);

        let sheet = RgbaImage::new(16, 16);
        let err = store.import_frames(0, 0, &sheet).unwrap_err();
        assert_eq!(
            err,
            SpriteError::BadSheetSize {
                want_width: 64,
                want_height: 16,
                got_width: 16,
                got_height: 16,
            }
        );
    }

    #[test]
    fn test_import_rejects_too_many_colors() {
        let mut store = store_with_sprite(FrameShape::S32x32, 1);

        // One distinct color per column: 32 colors, twice the slot size
        let sheet = RgbaImage::from_fn(32, 32, |x, _| Rgba([x as u8, 0, 0, 255]));
        assert_eq!(
            store.import_frames(0, 0, &sheet).unwrap_err(),
            SpriteError::TooManyColors(32)
        );
    }

    #[test]
    fn test_import_allocates_palette_slot() {
        let mut store = store_with_sprite(FrameShape::S16x16, 1);
        let free_before = store.free_palette_slots();

        let sheet = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        store.import_frames(0, 0, &sheet).unwrap();

        assert_eq!(store.free_palette_slots(), free_before - 1);
        assert_eq!(store.used_palettes().last(), Some(&1));

        let preview = store.frame_preview(0, 0, 0).unwrap();
        assert_eq!(preview.get_pixel(5, 5).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_repoint_extends_capacity() {
        let mut store = MemoryStore::new();
        let addr_before = store.palette_table_addr();
        let free_before = store.free_palette_slots();

        let addr = store.repoint_palette_table();
        assert_ne!(addr, addr_before);
        assert_eq!(addr, store.palette_table_addr());
        assert_eq!(store.free_palette_slots(), free_before + 16);
    }

    #[test]
    fn test_palette_cleanup_drops_orphaned_slots() {
        let mut store = store_with_sprite(FrameShape::S16x16, 1);

        let sheet_a = RgbaImage::from_pixel(16, 16, Rgba([1, 1, 1, 255]));
        let sheet_b = RgbaImage::from_pixel(16, 16, Rgba([2, 2, 2, 255]));
        store.import_frames(0, 0, &sheet_a).unwrap();
        store.import_frames(0, 0, &sheet_b).unwrap();

        // The second import orphaned slot 1
        assert_eq!(store.used_palettes(), vec![0, 1, 2]);
        store.palette_cleanup();
        assert_eq!(store.used_palettes(), vec![0, 2]);
    }

    #[test]
    fn test_resize_discards_pixels() {
        let mut store = store_with_sprite(FrameShape::S16x16, 1);
        let sheet = RgbaImage::from_pixel(16, 16, Rgba([9, 9, 9, 255]));
        store.import_frames(0, 0, &sheet).unwrap();

        store.resize_sprite(0, 0, FrameShape::S32x32, 9).unwrap();

        assert_eq!(store.frame_count(0, 0), Some(9));
        assert_eq!(store.frame_shape(0, 0), Some(FrameShape::S32x32));
        let preview = store.frame_preview(0, 0, 0).unwrap();
        assert_eq!(preview.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_json_snapshot_roundtrip() {
        let mut store = store_with_sprite(FrameShape::S16x32, 3);
        store
            .register_table(&TablePointers {
                sprite_ptrs_addr: 0x10,
                data_ptrs_addr: 0x20,
                frame_ptrs_addr: 0x30,
                frames_addr: 0x40,
            })
            .unwrap();

        let json = store.to_json().unwrap();
        let restored = MemoryStore::from_json(&json).unwrap();

        assert_eq!(store, restored);
        assert_eq!(restored.table_count(), 2);
        assert_eq!(restored.sprite_count(0), 3);
    }
}
