//! Minimal XML element tree and serializer.

use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

/// An element with attributes kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Sets an attribute, replacing an earlier value of the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = XmlElement>) -> Self {
        self.children.extend(children.into_iter().map(XmlNode::Element));
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn cdata(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::CData(text.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Serializes as a standalone document.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
        }
        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push('>');

        let has_elements = self.children.iter().any(|c| matches!(c, XmlNode::Element(_)));
        if has_elements {
            out.push('\n');
        }
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write(out, depth + 1),
                XmlNode::Text(text) => out.push_str(&escape_text(text)),
                XmlNode::CData(text) => {
                    out.push_str("<![CDATA[");
                    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
                    out.push_str("]]>");
                }
            }
        }
        if has_elements {
            out.push_str(&indent);
        }
        let _ = writeln!(out, "</{}>", self.name);
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_document() {
        let root = XmlElement::new("Entities").child(
            XmlElement::new("Things")
                .child(XmlElement::new("Thing").attr("name", "A \"quoted\" <name>"))
                .child(XmlElement::new("code").cdata("a ]]> b")),
        );
        assert_eq!(
            root.to_document(),
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n",
                "<Entities>\n",
                "    <Things>\n",
                "        <Thing name=\"A &quot;quoted&quot; &lt;name&gt;\"/>\n",
                "        <code><![CDATA[a ]]]]><![CDATA[> b]]></code>\n",
                "    </Things>\n",
                "</Entities>\n",
            )
        );
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut element = XmlElement::new("A").attr("x", 1);
        element.set_attr("x", "2");
        assert_eq!(element.attributes, vec![("x".to_string(), "2".to_string())]);
        assert_eq!(element.attribute("x"), Some("2"));
    }
}
