pub mod offer;
pub mod render_context;
pub mod template;
