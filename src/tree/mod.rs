/// Tree model module
///
/// This module holds the presentable tree that mirrors the backing store:
/// - Node ownership and low-level child operations (node.rs)
/// - The model controller: navigation, structural mutation, and the
///   store-facing derived operations (model.rs)
pub mod model;
pub mod node;
