use super::font::FontHandle;
use super::script::is_dense_script;

/// Character-boundary wrap for mixed-script text. Dense-script characters
/// break anywhere; runs of other non-space characters stay atomic.
/// Explicit `\n` always forces a break. Total: never returns an empty
/// sequence and never drops non-whitespace characters.
pub fn wrap_chars(text: &str, max_width: f32, font: &FontHandle) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\n' {
            lines.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }

        // One dense-script character or space at a time; anything else
        // accumulates into an atomic word.
        let unit: String = if is_dense_script(ch) || ch.is_whitespace() {
            i += 1;
            ch.to_string()
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && !is_dense_script(chars[i]) {
                i += 1;
            }
            chars[start..i].iter().collect()
        };

        let mut candidate = current.clone();
        candidate.push_str(&unit);
        if font.measure(&candidate) <= max_width {
            current = candidate;
        } else if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            if !unit.chars().all(char::is_whitespace) {
                current = unit;
            }
        } else {
            // The unit alone exceeds the width: flush it unconditionally
            // rather than dropping it.
            lines.push(unit);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(text.to_string());
    }
    lines
}

/// Word-boundary wrap for space-delimited text. Paragraph breaks (`\n`)
/// are preserved; a blank paragraph yields an explicit empty line. Words
/// accumulate greedily with single-space separators; a word wider than
/// `max_width` is flushed alone.
pub fn wrap_words(text: &str, max_width: f32, font: &FontHandle) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if font.measure(&candidate) <= max_width {
                current = candidate;
            } else if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                lines.push(word.to_string());
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(text.to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(size: f32) -> FontHandle {
        FontHandle::builtin(size)
    }

    fn joined_without_whitespace(lines: &[String]) -> String {
        lines
            .iter()
            .flat_map(|line| line.chars())
            .filter(|ch| !ch.is_whitespace())
            .collect()
    }

    #[test]
    fn dense_text_wraps_on_character_boundaries() {
        // 8 Hangul syllables, 16 px font. Estimated char width is
        // 16 * 0.6 = 9.6 px, so 100 px holds all 8 (76.8 px) on one line
        // and 50 px holds 5 per line.
        let wide = wrap_chars("가나다라마바사아", 100.0, &font(16.0));
        assert_eq!(wide, vec!["가나다라마바사아".to_string()]);

        let narrow = wrap_chars("가나다라마바사아", 50.0, &font(16.0));
        assert_eq!(
            narrow,
            vec!["가나다라마".to_string(), "바사아".to_string()]
        );
        for line in &narrow {
            assert!(font(16.0).measure(line) <= 50.0);
        }
    }

    #[test]
    fn mixed_script_keeps_latin_words_atomic() {
        // "ab" is one unit; it moves to the next line whole. At size 10
        // the estimate is 6 px per char, so 20 px holds three syllables.
        let lines = wrap_chars("가나다ab", 20.0, &font(10.0));
        assert_eq!(lines, vec!["가나다".to_string(), "ab".to_string()]);
    }

    #[test]
    fn explicit_newline_forces_break_in_char_mode() {
        let lines = wrap_chars("가나\n다라", 1000.0, &font(16.0));
        assert_eq!(lines, vec!["가나".to_string(), "다라".to_string()]);
    }

    #[test]
    fn overlong_unit_is_flushed_not_dropped() {
        let lines = wrap_chars("supercalifragilistic", 10.0, &font(16.0));
        assert_eq!(lines, vec!["supercalifragilistic".to_string()]);
    }

    #[test]
    fn blank_input_yields_single_empty_line() {
        assert_eq!(wrap_chars("", 100.0, &font(16.0)), vec![String::new()]);
        assert_eq!(wrap_chars("   ", 100.0, &font(16.0)), vec![String::new()]);
        assert_eq!(wrap_words("", 100.0, &font(16.0)), vec![String::new()]);
        assert_eq!(wrap_words("  \n ", 100.0, &font(16.0)), vec![String::new()]);
    }

    #[test]
    fn words_split_exactly_at_two_word_fit() {
        // "hello world" is 11 chars = 66 px at size 10, "hello world foo"
        // is 15 chars = 90 px. A 70 px budget fits exactly two words.
        let lines = wrap_words("hello world foo", 70.0, &font(10.0));
        assert_eq!(
            lines,
            vec!["hello world".to_string(), "foo".to_string()]
        );
    }

    #[test]
    fn blank_paragraphs_are_preserved() {
        let lines = wrap_words("first\n\nsecond", 1000.0, &font(10.0));
        assert_eq!(
            lines,
            vec![
                "first".to_string(),
                String::new(),
                "second".to_string()
            ]
        );
    }

    #[test]
    fn overlong_word_is_flushed_alone() {
        let lines = wrap_words("tiny enormousunbreakableword tiny", 40.0, &font(10.0));
        assert!(lines.contains(&"enormousunbreakableword".to_string()));
        assert_eq!(joined_without_whitespace(&lines), "tinyenormousunbreakablewordtiny");
    }

    #[test]
    fn wrapping_preserves_characters_in_order() {
        let text = "가나다 hello 라마바 world 사아";
        for width in [20.0, 50.0, 80.0, 500.0] {
            let chars = wrap_chars(text, width, &font(12.0));
            assert_eq!(joined_without_whitespace(&chars), "가나다hello라마바world사아");
            let words = wrap_words(text, width, &font(12.0));
            assert_eq!(joined_without_whitespace(&words), "가나다hello라마바world사아");
        }
    }

    #[test]
    fn wider_budget_never_increases_line_count() {
        let text = "one two three four five six seven eight nine ten";
        let mut previous = usize::MAX;
        for width in [30.0, 60.0, 90.0, 150.0, 300.0, 600.0] {
            let count = wrap_words(text, width, &font(10.0)).len();
            assert!(count <= previous, "width {width} produced more lines");
            previous = count;
        }
    }

    #[test]
    fn rewrapping_joined_output_is_stable() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let first = wrap_words(text, 80.0, &font(10.0));
        let rejoined = first.join("\n");
        let second = wrap_words(&rejoined, 80.0, &font(10.0));
        assert_eq!(first, second);

        let dense = "가나다라마바사아자차카타파하";
        let first = wrap_chars(dense, 60.0, &font(14.0));
        let second = wrap_chars(&first.join("\n"), 60.0, &font(14.0));
        assert_eq!(first, second);
    }
}
