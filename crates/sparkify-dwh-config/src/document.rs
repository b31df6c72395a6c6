//! Line-preserving model of the sectioned key=value config file.
//!
//! Every line is kept verbatim, including its terminator, so a document that
//! is parsed and rendered without edits is byte-identical to its input.
//! Section names are case-sensitive; keys are matched case-insensitively.

use std::fmt;

/// Parsed config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Section(&'a str),
    Entry { key: &'a str, value: &'a str },
    Other,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    /// Value of `key` in `section`; the last occurrence wins.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let mut current: Option<&str> = None;
        let mut found = None;
        for line in &self.lines {
            match classify(line) {
                LineKind::Section(name) => current = Some(name),
                LineKind::Entry { key: k, value } => {
                    if current == Some(section) && k.eq_ignore_ascii_case(key) {
                        found = Some(value);
                    }
                }
                LineKind::Other => {}
            }
        }
        found
    }

    /// Section names in file order.
    pub fn sections(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match classify(line) {
                LineKind::Section(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Replace the value of every entry whose key equals `key`, in any section.
    ///
    /// Everything after the last `=` on the line is replaced; the text up to
    /// and including that `=` and the line terminator are kept. Returns the
    /// number of lines rewritten.
    pub fn set_all(&mut self, key: &str, value: &str) -> usize {
        let mut replaced = 0;
        for line in &mut self.lines {
            let LineKind::Entry { key: k, .. } = classify(line) else {
                continue;
            };
            if !k.eq_ignore_ascii_case(key) {
                continue;
            }
            if let Some(rewritten) = replace_value(line, value) {
                *line = rewritten;
                replaced += 1;
            }
        }
        replaced
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn classify(line: &str) -> LineKind<'_> {
    let (body, _) = split_terminator(line);
    let trimmed = body.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return LineKind::Other;
    }

    if let Some(name) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return LineKind::Section(name.trim());
    }

    match body.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => LineKind::Entry {
            key: key.trim(),
            value: value.trim(),
        },
        _ => LineKind::Other,
    }
}

fn replace_value(line: &str, value: &str) -> Option<String> {
    let (body, terminator) = split_terminator(line);
    let eq = body.rfind('=')?;
    Some(format!("{}{}{}", &body[..=eq], value, terminator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let text = "; comment\r\n[AWS]\nKEY = abc\n\n[CLUSTER]\nHOST=\nDB_NAME=dev";
        let doc = ConfigDocument::parse(text);
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn test_get_is_section_scoped() {
        let doc = ConfigDocument::parse("[A]\nX=1\n[B]\nX=2\n");
        assert_eq!(doc.get("A", "X"), Some("1"));
        assert_eq!(doc.get("B", "x"), Some("2"));
        assert_eq!(doc.get("C", "X"), None);
        assert_eq!(doc.sections(), vec!["A", "B"]);
    }

    #[test]
    fn test_entries_before_any_section_are_unscoped() {
        let doc = ConfigDocument::parse("X=1\n[A]\n");
        assert_eq!(doc.get("A", "X"), None);
    }

    #[test]
    fn test_set_all_keeps_terminator() {
        let mut doc = ConfigDocument::parse("[C]\nARN = old\r\nHOST=\n");
        assert_eq!(doc.set_all("ARN", "new"), 1);
        assert_eq!(doc.set_all("HOST", "h.example.com"), 1);
        assert_eq!(doc.to_string(), "[C]\nARN =new\r\nHOST=h.example.com\n");
    }

    #[test]
    fn test_set_all_replaces_after_last_equals() {
        let mut doc = ConfigDocument::parse("[C]\nARN=a=b\nARN = old\n");
        assert_eq!(doc.set_all("ARN", "new"), 2);
        assert_eq!(doc.to_string(), "[C]\nARN=a=new\nARN =new\n");
    }

    #[test]
    fn test_set_all_requires_exact_key() {
        let mut doc = ConfigDocument::parse("[C]\nWARNOTHER=keep\nGHOST_HOST=keep\n# ARN=comment\n");
        assert_eq!(doc.set_all("ARN", "new"), 0);
        assert_eq!(doc.set_all("HOST", "new"), 0);
        assert_eq!(
            doc.to_string(),
            "[C]\nWARNOTHER=keep\nGHOST_HOST=keep\n# ARN=comment\n"
        );
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut doc = ConfigDocument::parse("[C]\nARN=old");
        doc.set_all("arn", "new");
        assert_eq!(doc.to_string(), "[C]\nARN=new");
    }
}
