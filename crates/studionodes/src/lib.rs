//! Standard node library
//!
//! Generic utility nodes for assembling and debugging workflows. Generation
//! nodes that call external services are registered by their own crates.

mod debug;
mod text;
mod time;
mod transform;

pub use debug::DebugNode;
pub use text::{TextInputNode, TextTemplateNode};
pub use time::DelayNode;
pub use transform::JsonParseNode;

use studioruntime::NodeCatalog;

/// Register all standard nodes with a catalog
pub fn register_all(catalog: &mut NodeCatalog) {
    catalog.register_all([
        debug::entry(),
        text::input_entry(),
        text::template_entry(),
        transform::json_parse_entry(),
        time::entry(),
    ]);
}

/// A catalog holding only the standard nodes
pub fn standard_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    register_all(&mut catalog);
    catalog
}
