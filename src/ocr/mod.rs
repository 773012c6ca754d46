mod vision;

pub use vision::{OcrError, OcrEvent, extract_text_lines, spawn_ocr};
