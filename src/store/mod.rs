/// Backing store interface
///
/// The tree model never touches sprite data directly; it goes through
/// `SpriteStore`, which owns persistent state and preview rendering. The
/// model only relies on positional addressing: table `t` of the store is
/// row `t` of the tree root, sprite `s` of a table is row `s` of that
/// table's node.
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod memory;

/// Sprite footprints the store knows how to lay out.
///
/// The numeric codes match the on-ROM table format; `S32x32` (code 2) is
/// the shape the fixed-format sheet imports require.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    S16x16,
    S16x32,
    S32x32,
    S64x64,
}

impl FrameShape {
    /// Pixel dimensions of a single frame
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameShape::S16x16 => (16, 16),
            FrameShape::S16x32 => (16, 32),
            FrameShape::S32x32 => (32, 32),
            FrameShape::S64x64 => (64, 64),
        }
    }

    /// On-ROM type code for this shape
    pub fn code(self) -> u8 {
        match self {
            FrameShape::S16x16 => 0,
            FrameShape::S16x32 => 1,
            FrameShape::S32x32 => 2,
            FrameShape::S64x64 => 3,
        }
    }
}

/// Shape the fixed-format sheet imports require
pub const IMPORT_SHAPE: FrameShape = FrameShape::S32x32;
/// Frame count the fixed-format sheet imports require
pub const IMPORT_FRAMES: u16 = 9;

/// Pointer metadata a custom table registration carries
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePointers {
    /// Address of the sprite pointer list
    pub sprite_ptrs_addr: u32,
    /// Address of the data pointer list
    pub data_ptrs_addr: u32,
    /// Address of the frame pointer list
    pub frame_ptrs_addr: u32,
    /// Address of the frame pixel bank
    pub frames_addr: u32,
}

/// The backing data store consumed by the tree model.
///
/// Tables and sprites are addressed purely by position; every mutation that
/// shifts positions is mirrored by the model renumbering its nodes.
pub trait SpriteStore {
    // ---- queries ----

    /// Number of tables in the store
    fn table_count(&self) -> usize;

    /// Number of sprites in a table (0 for a missing table)
    fn sprite_count(&self, table: usize) -> usize;

    /// Footprint of a sprite, if it exists
    fn frame_shape(&self, table: usize, sprite: usize) -> Option<FrameShape>;

    /// Frame count of a sprite, if it exists
    fn frame_count(&self, table: usize, sprite: usize) -> Option<u16>;

    /// Remaining free palette slots
    fn free_palette_slots(&self) -> usize;

    /// Identifiers of the palette slots currently in use, oldest first
    fn used_palettes(&self) -> Vec<u16>;

    /// Current address of the palette table
    fn palette_table_addr(&self) -> u32;

    // ---- mutations ----

    /// Append a blank sprite to a table
    fn add_sprite(&mut self, table: usize, shape: FrameShape, frames: u16) -> Result<()>;

    /// Insert a blank sprite at a position, shifting later sprites up
    fn insert_sprite(
        &mut self,
        table: usize,
        position: usize,
        shape: FrameShape,
        frames: u16,
    ) -> Result<()>;

    /// Change a sprite's footprint and frame count, discarding its pixels
    fn resize_sprite(
        &mut self,
        table: usize,
        sprite: usize,
        shape: FrameShape,
        frames: u16,
    ) -> Result<()>;

    /// Remove the sprite at a position, shifting later sprites down
    fn remove_sprite(&mut self, table: usize, position: usize) -> Result<()>;

    /// Remove the table at a position, shifting later tables down
    fn remove_table(&mut self, position: usize) -> Result<()>;

    /// Register a custom table from raw pointer metadata
    fn register_table(&mut self, pointers: &TablePointers) -> Result<()>;

    /// Move the palette table to a larger home; returns the new address
    fn repoint_palette_table(&mut self) -> u32;

    /// Import a horizontal strip of frames into a sprite
    fn import_frames(&mut self, table: usize, sprite: usize, sheet: &RgbaImage) -> Result<()>;

    /// Import a pokemon spritesheet (3x3 grid of 32x32 frames)
    fn import_pokemon_sheet(
        &mut self,
        table: usize,
        sprite: usize,
        sheet: &RgbaImage,
    ) -> Result<()>;

    /// Import an overworld spritesheet (row of nine 32x32 frames)
    fn import_overworld_sheet(
        &mut self,
        table: usize,
        sprite: usize,
        sheet: &RgbaImage,
    ) -> Result<()>;

    /// Drop palette slots no sprite references anymore
    fn palette_cleanup(&mut self);

    // ---- rendering ----

    /// Render one frame of a sprite as an RGBA bitmap
    fn frame_preview(&self, table: usize, sprite: usize, frame: u16) -> Option<RgbaImage>;
}
