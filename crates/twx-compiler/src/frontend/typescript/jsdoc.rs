//! Minimal JSDoc reader for entity and member descriptions.

use std::collections::HashMap;

/// The parts of a JSDoc block the compiler uses.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JsDoc {
    pub description: String,
    pub params: HashMap<String, String>,
    pub returns: Option<String>,
}

impl JsDoc {
    /// Parses a `/** ... */` comment. Unknown tags are ignored.
    pub fn parse(comment: &str) -> Self {
        let body = comment
            .trim()
            .trim_start_matches("/**")
            .trim_end_matches("*/");

        let mut doc = JsDoc::default();
        let mut description = Vec::new();
        let mut current: Option<(String, Vec<String>)> = None;

        for raw in body.lines() {
            let line = raw.trim().trim_start_matches('*').trim();
            if let Some(tag_line) = line.strip_prefix('@') {
                if let Some(tag) = current.take() {
                    doc.finish_tag(tag);
                }
                let (tag, rest) = tag_line.split_once(char::is_whitespace).unwrap_or((tag_line, ""));
                current = Some((tag.to_string(), vec![rest.trim().to_string()]));
            } else if let Some((_, lines)) = current.as_mut() {
                lines.push(line.to_string());
            } else {
                description.push(line.to_string());
            }
        }
        if let Some(tag) = current.take() {
            doc.finish_tag(tag);
        }

        doc.description = join_lines(&description);
        doc
    }

    fn finish_tag(&mut self, (tag, lines): (String, Vec<String>)) {
        let text = join_lines(&lines);
        match tag.as_str() {
            "param" => {
                let text = skip_type_expression(&text);
                let (name, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
                let name = name.trim_start_matches('[').trim_end_matches(']');
                let name = name.split('=').next().unwrap_or(name);
                let rest = rest.trim().trim_start_matches('-').trim();
                self.params.insert(name.to_string(), rest.to_string());
            }
            "return" | "returns" => {
                self.returns = Some(skip_type_expression(&text).trim().to_string());
            }
            _ => {}
        }
    }
}

/// Parses an optional JSDoc comment, yielding an empty doc when absent.
pub fn doc_of(comment: Option<&str>) -> JsDoc {
    comment.map(JsDoc::parse).unwrap_or_default()
}

fn skip_type_expression(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        if let Some(end) = trimmed.find('}') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}

fn join_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| l.as_str())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_params_and_return() {
        let doc = JsDoc::parse(
            r#"/**
              * Computes the total.
              * Across all rows.
              * @param rows {INFOTABLE} The rows to add.
              * @param {NUMBER} factor - Multiplier
              * @return The sum.
              */"#,
        );
        assert_eq!(doc.description, "Computes the total.\nAcross all rows.");
        assert_eq!(doc.params.get("factor").map(String::as_str), Some("Multiplier"));
        assert_eq!(doc.params.get("rows").map(String::as_str), Some("{INFOTABLE} The rows to add."));
        assert_eq!(doc.returns.as_deref(), Some("The sum."));
    }

    #[test]
    fn test_single_line() {
        let doc = JsDoc::parse("/** Just a note */");
        assert_eq!(doc.description, "Just a note");
        assert!(doc.params.is_empty());
        assert!(doc.returns.is_none());
    }
}
