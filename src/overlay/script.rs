/// True for characters wrapped at the character level rather than the
/// word level: Hangul syllables, Hangul Jamo and compatibility Jamo.
pub fn is_dense_script(ch: char) -> bool {
    matches!(
        ch as u32,
        0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F
    )
}
