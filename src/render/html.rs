//! HTML helpers shared by the render adapters and admin screens

use std::sync::OnceLock;
use regex::Regex;

/// Escape text for use in element content or a quoted attribute
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove markup tags, keeping their text content
pub fn strip_tags(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[A-Za-z/!?][^>]*>?").expect("static tag pattern"));
    tag.replace_all(text, "").into_owned()
}

/// One `<option>` of a select control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Builder for single and multiple `<select>` controls
#[derive(Debug, Clone, Default)]
pub struct SelectField {
    name: String,
    options: Vec<SelectOption>,
    selected: Vec<String>,
    multiple: bool,
    allow_empty: bool,
    class: String,
    placeholder: String,
}

impl SelectField {
    pub fn new(name: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            name: name.into(),
            options,
            ..Default::default()
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Prepend a `---` option with an empty value
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn selected<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.selected = values.into_iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn render(&self) -> String {
        let mut options = String::new();
        if self.allow_empty {
            options.push_str(r#"<option value="">---</option>"#);
        }
        // A single select only honors the first selected value
        let selected: &[String] = if self.multiple {
            &self.selected
        } else {
            &self.selected[..self.selected.len().min(1)]
        };
        for opt in &self.options {
            let mark = if selected.contains(&opt.value) { " selected" } else { "" };
            options.push_str(&format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape(&opt.value),
                mark,
                escape(&opt.label)
            ));
        }

        let id = format!("id_{}", self.name);
        if self.multiple {
            let placeholder = if self.placeholder.is_empty() {
                String::new()
            } else {
                format!(r#" data-placeholder="{}""#, escape(&self.placeholder))
            };
            format!(
                r#"<select class="{}" id="{}" name="{}[]"{} multiple>{}</select>"#,
                escape(&self.class),
                escape(&id),
                escape(&self.name),
                placeholder,
                options
            )
        } else {
            format!(
                r#"<select class="{}" id="{}" name="{}">{}</select>"#,
                escape(&self.class),
                escape(&id),
                escape(&self.name),
                options
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>Bold</b> text<br/>"), "Bold text");
        assert_eq!(strip_tags("no tags"), "no tags");
        assert_eq!(strip_tags("broken <script"), "broken ");
    }

    #[test]
    fn test_strip_tags_keeps_bare_less_than() {
        assert_eq!(strip_tags("Prices < 5 dollars"), "Prices < 5 dollars");
        assert_eq!(strip_tags("1 <2 and <!-- note --> 3"), "1 <2 and  3");
    }

    #[test]
    fn test_single_select() {
        let html = SelectField::new(
            "ref_post",
            vec![SelectOption::new("article", "Articles"), SelectOption::new("news", "News")],
        )
        .selected(["news"])
        .render();
        assert_eq!(
            html,
            r#"<select class="" id="id_ref_post" name="ref_post"><option value="article">Articles</option><option value="news" selected>News</option></select>"#
        );
    }

    #[test]
    fn test_multi_select() {
        let html = SelectField::new(
            "_ref_related",
            vec![SelectOption::new("1", "One"), SelectOption::new("2", "Two")],
        )
        .multiple()
        .class("chosen")
        .placeholder("Select articles")
        .selected([1, 2])
        .render();
        assert!(html.starts_with(r#"<select class="chosen" id="id__ref_related" name="_ref_related[]" data-placeholder="Select articles" multiple>"#));
        assert_eq!(html.matches(" selected>").count(), 2);
    }

    #[test]
    fn test_allow_empty() {
        let html = SelectField::new("x", vec![]).allow_empty().render();
        assert!(html.contains(r#"<option value="">---</option>"#));
    }
}
