/// Error types for store-adapter failures
///
/// Low-level tree operations report out-of-range positions with a plain
/// boolean (a violated precondition, not a recoverable fault). Everything
/// the backing store can reject flows through `SpriteError` instead and
/// propagates unchanged through the model's derived operations.
use thiserror::Error;

use crate::store::FrameShape;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpriteError {
    /// No table exists at the given index
    #[error("no table at index {0}")]
    NoSuchTable(usize),

    /// No sprite exists at (table, sprite)
    #[error("no sprite at ({table}, {sprite})")]
    NoSuchSprite { table: usize, sprite: usize },

    /// An imported sheet does not match the dimensions the target expects
    #[error("sheet is {got_width}x{got_height}, expected {want_width}x{want_height}")]
    BadSheetSize {
        want_width: u32,
        want_height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// An imported sheet uses more colors than one palette slot can hold
    #[error("sheet uses {0} colors, a palette slot holds at most 16")]
    TooManyColors(usize),

    /// A fixed-format import found a sprite with the wrong layout
    #[error("sprite is {shape:?} with {frames} frames, import needs {want_shape:?} with {want_frames}")]
    WrongLayout {
        shape: FrameShape,
        frames: u16,
        want_shape: FrameShape,
        want_frames: u16,
    },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, SpriteError>;
