//! Terminal output for chat event streams

mod console;
mod renderer;

pub use console::Console;
pub use renderer::StreamRenderer;
