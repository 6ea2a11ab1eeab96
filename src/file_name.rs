//! Output file naming.

/// Marker between the sanitized title and the timestamp.
pub const FILE_NAME_SUFFIX: &str = "_text_";

fn is_kept(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(&ch)
}

/// Replace every character outside ASCII alphanumerics and CJK unified ideographs with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|ch| if is_kept(ch) { ch } else { '_' })
        .collect()
}

/// `{sanitized title}_text_{unix millis}.pdf`.
pub fn output_file_name(title: &str, unix_millis: u64) -> String {
    format!(
        "{}{}{}.pdf",
        sanitize_title(title),
        FILE_NAME_SUFFIX,
        unix_millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_ascii_and_cjk() {
        assert_eq!(sanitize_title("Rust 入门: 第1章!"), "Rust_入门__第1章_");
        assert_eq!(sanitize_title("ＡＢＣ"), "___");
    }

    #[test]
    fn appends_marker_and_timestamp() {
        assert_eq!(
            output_file_name("My Post", 1_700_000_000_000),
            "My_Post_text_1700000000000.pdf"
        );
        assert_eq!(output_file_name("", 5), "_text_5.pdf");
    }
}
