pub mod font;
pub mod layout;
pub mod render;
pub mod script;
pub mod wrap;

pub use font::{FontHandle, FontMetrics, FontResolver, measure_text_width_px};
pub use layout::{PlacedLine, RegionLayout, layout_region};
pub use script::is_dense_script;
pub use wrap::{wrap_chars, wrap_words};
