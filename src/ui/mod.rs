/// Presentation-facing interfaces
///
/// The model never reaches into widgets. Everything the surrounding UI
/// needs to hear goes through these two traits: `Presenter` for user-facing
/// effects (selection, status text, confirmations, the palette selector)
/// and `ModelObserver` for the structural begin/end notifications views use
/// to keep their held indices valid.
use crate::tree::model::ModelIndex;

/// The UI surface the model notifies and queries.
///
/// The selected-table/selected-sprite pair is presentation state the model
/// updates directly after structural edits; the presenter owns it.
pub trait Presenter {
    /// The current item changed to the given index
    fn selection_changed(&mut self, index: &ModelIndex);

    /// Show transient status text
    fn show_status(&mut self, text: &str);

    /// Ask a yes/no question; destructive operations proceed only on true
    fn confirm(&mut self, question: &str) -> bool;

    /// Append one palette id to the palette selector
    fn add_palette_option(&mut self, palette_id: u16);

    /// Rebuild the palette selector from scratch
    fn reset_palette_options(&mut self, palettes: &[u16]);

    /// Re-render the palette info panel
    fn refresh_palette_info(&mut self);

    /// Re-render the whole UI
    fn refresh_all(&mut self);

    fn selected_table(&self) -> Option<usize>;
    fn set_selected_table(&mut self, table: Option<usize>);
    fn selected_sprite(&self) -> Option<usize>;
    fn set_selected_sprite(&mut self, sprite: Option<usize>);
}

/// Structural change notifications.
///
/// Every insert/remove/reset is bracketed: an observer that queries the
/// model strictly before the begin call sees the pre-mutation row counts,
/// strictly after the end call the post-mutation counts, never a partial
/// view.
pub trait ModelObserver {
    fn begin_insert_rows(&mut self, _parent: &ModelIndex, _first: usize, _last: usize) {}
    fn end_insert_rows(&mut self, _parent: &ModelIndex, _first: usize, _last: usize) {}
    fn begin_remove_rows(&mut self, _parent: &ModelIndex, _first: usize, _last: usize) {}
    fn end_remove_rows(&mut self, _parent: &ModelIndex, _first: usize, _last: usize) {}
    fn begin_model_reset(&mut self) {}
    fn end_model_reset(&mut self) {}
}
