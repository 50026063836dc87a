mod editor;
mod preview;
mod ripgrep;

pub use editor::{editor_command, open_in_editor};
pub use preview::{preview, PreviewLine};
pub use ripgrep::{parse_output, Searcher};
