/// Longest stored file name, in bytes
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Name used when nothing survives sanitation
pub const FALLBACK_FILE_NAME: &str = "uploaded-file";

/// Sanitizes a client-supplied file name so it is safe as a single path
/// component on disk, in object storage and in URLs.
///
/// Unicode letters and digits are kept along with `_`, `.` and `-`; every
/// other character is dropped. Whitespace and dash runs collapse to one `-`,
/// dot runs collapse to one `.`, and leading dots are removed so the result
/// is never hidden, never `..`, and never contains a separator or control
/// character.
pub fn sanitize_name(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(*c, '_' | '.' | '-'))
        .collect();

    let mut collapsed = String::with_capacity(kept.len());
    let mut prev: Option<char> = None;
    for c in kept.trim().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if matches!((prev, c), (Some('-'), '-') | (Some('.'), '.')) {
            continue;
        }
        collapsed.push(c);
        prev = Some(c);
    }

    let name = truncate_on_char_boundary(collapsed.trim_start_matches('.'), MAX_FILE_NAME_BYTES);
    if name.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    name.to_string()
}

fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Checks that an upload id assigned by the daemon can be used verbatim as a
/// file name inside the staging directory.
pub fn is_safe_path_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_keeps_plain_names() {
        assert_eq!(sanitize_name("brijsiyag.zip"), "brijsiyag.zip");
        assert_eq!(sanitize_name("report_2024-final.pdf"), "report_2024-final.pdf");
        assert_eq!(sanitize_name("测试.txt"), "测试.txt");
        assert_eq!(sanitize_name("日本語 ファイル.mp4"), "日本語-ファイル.mp4");
    }

    #[test]
    fn test_sanitize_name_collapses_whitespace_and_dashes() {
        assert_eq!(sanitize_name("  my   file.doc "), "my-file.doc");
        assert_eq!(sanitize_name("a - b.txt"), "a-b.txt");
        assert_eq!(sanitize_name("line\nbreak.txt"), "line-break.txt");
    }

    #[test]
    fn test_sanitize_name_strips_traversal() {
        let name = sanitize_name("../../../etc/passwd");
        assert_eq!(name, "etcpasswd");
        assert!(!name.contains('/'));

        let name = sanitize_name("..\\..\\windows\\system32");
        assert!(!name.contains('\\'));
        assert!(!name.contains(".."));

        assert_eq!(sanitize_name("archive..tar..gz"), "archive.tar.gz");
        assert_eq!(sanitize_name(".htaccess"), "htaccess");
    }

    #[test]
    fn test_sanitize_name_drops_special_characters() {
        assert_eq!(sanitize_name("test<script>.pdf"), "testscript.pdf");
        assert_eq!(sanitize_name("what?*|\"name\".txt"), "whatname.txt");
        assert_eq!(sanitize_name("nul\u{0}byte"), "nulbyte");
    }

    #[test]
    fn test_sanitize_name_falls_back_when_empty() {
        assert_eq!(sanitize_name(""), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_name("."), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_name(".."), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_name("///"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_sanitize_name_bounds_length() {
        let long = "é".repeat(300);
        let name = sanitize_name(&long);
        assert!(name.len() <= MAX_FILE_NAME_BYTES);
        assert!(name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_is_safe_path_component() {
        assert!(is_safe_path_component("xyz"));
        assert!(is_safe_path_component("0f4c2e8b1a9d+abc"));
        assert!(!is_safe_path_component(""));
        assert!(!is_safe_path_component(".."));
        assert!(!is_safe_path_component("../etc"));
        assert!(!is_safe_path_component("a\\b"));
    }
}
