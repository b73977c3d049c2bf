//! Scoped stylesheet generation for Comet UI components
//!
//! Components describe their styles as named [`Style`] values; [`scope`]
//! turns them into collision-free class names plus the CSS text to
//! inject. Class names take the form `Component-N_name`, where `N` is a
//! process-wide counter, so two components (or two versions of the same
//! component) never fight over a selector.
//!
//! This crate is pure string building; it does not touch the DOM or any
//! rendering layer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// An RGBA color rendered as `rgba(r, g, b, a)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// One style block: declarations plus nested pseudo-selector blocks
#[derive(Debug, Clone, Default)]
pub struct Style {
    declarations: Vec<(String, String)>,
    nested: Vec<(String, Style)>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a declaration
    ///
    /// Property names may be camelCase (`backgroundColor`) or already
    /// hyphenated (`background-color`); both render hyphenated.
    pub fn set(mut self, property: &str, value: impl Into<String>) -> Self {
        self.put(hyphenate(property), value.into());
        self
    }

    /// Set a pixel-valued declaration (`set_px("padding", 10)` renders `10px`)
    pub fn set_px(self, property: &str, value: i32) -> Self {
        self.set(property, format!("{}px", value))
    }

    /// Set a color-valued declaration
    pub fn set_color(self, property: &str, color: Color) -> Self {
        self.set(property, color.to_string())
    }

    /// Attach a nested block for a pseudo-selector like `:hover` or `::after`
    pub fn nested(mut self, selector: &str, style: Style) -> Self {
        self.put_nested(selector, &style);
        self
    }

    /// Merge styles left to right; on conflicts the later value wins
    pub fn merged(styles: &[Style]) -> Style {
        let mut result = Style::new();
        for style in styles {
            for (property, value) in &style.declarations {
                result.put(property.clone(), value.clone());
            }
            for (selector, nested) in &style.nested {
                result.put_nested(selector, nested);
            }
        }
        result
    }

    fn put(&mut self, property: String, value: String) {
        if let Some(entry) = self
            .declarations
            .iter_mut()
            .find(|(existing, _)| *existing == property)
        {
            entry.1 = value;
        } else {
            self.declarations.push((property, value));
        }
    }

    fn put_nested(&mut self, selector: &str, style: &Style) {
        if let Some(entry) = self
            .nested
            .iter_mut()
            .find(|(existing, _)| existing == selector)
        {
            entry.1 = Style::merged(&[entry.1.clone(), style.clone()]);
        } else {
            self.nested.push((selector.to_string(), style.clone()));
        }
    }
}

/// The output of scoping one component's styles
#[derive(Debug, Clone)]
pub struct ScopedStyles {
    /// Style name to generated class name
    pub classes: BTreeMap<String, String>,
    /// CSS text for every generated rule
    pub css: String,
}

impl ScopedStyles {
    /// Look up the generated class name for a style name
    pub fn class(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(String::as_str)
    }
}

/// Scope a component's named styles into unique class names and CSS
pub fn scope(component: &str, styles: &[(&str, Style)]) -> ScopedStyles {
    let scope_id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
    let base = format!("{}-{}", component, scope_id);

    let mut classes = BTreeMap::new();
    let mut rules = Vec::with_capacity(styles.len());
    for (name, style) in styles {
        let class_name = format!("{}_{}", base, name);
        rules.push(render_rule(&format!(".{}", class_name), style));
        classes.insert(name.to_string(), class_name);
    }

    ScopedStyles {
        classes,
        css: rules.join("\n"),
    }
}

/// Render one rule (and its nested pseudo-selector rules) as CSS text
fn render_rule(selector: &str, style: &Style) -> String {
    let mut out = format!("{} {{\n", selector);
    for (property, value) in &style.declarations {
        out.push_str(&format!("  {}: {};\n", property, value));
    }
    out.push('}');

    for (pseudo, nested) in &style.nested {
        out.push('\n');
        out.push_str(&render_rule(&format!("{}{}", selector, pseudo), nested));
    }

    out
}

/// Convert camelCase property names to their hyphenated CSS form
fn hyphenate(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    for ch in property.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_renders_rgba() {
        assert_eq!(Color::rgb(255, 128, 0).to_string(), "rgba(255, 128, 0, 1)");
        assert_eq!(
            Color::rgba(0, 0, 0, 0.5).to_string(),
            "rgba(0, 0, 0, 0.5)"
        );
    }

    #[test]
    fn test_hyphenate_camel_case() {
        assert_eq!(hyphenate("backgroundColor"), "background-color");
        assert_eq!(hyphenate("padding"), "padding");
        assert_eq!(hyphenate("border-width"), "border-width");
    }

    #[test]
    fn test_scope_generates_component_prefixed_classes() {
        let scoped = scope("ThreadList", &[("root", Style::new().set_px("padding", 8))]);

        let class = scoped.class("root").unwrap();
        assert!(class.starts_with("ThreadList-"));
        assert!(class.ends_with("_root"));
        assert!(scoped.css.contains(&format!(".{} {{", class)));
        assert!(scoped.css.contains("  padding: 8px;"));
    }

    #[test]
    fn test_scope_ids_are_unique_per_call() {
        let first = scope("Button", &[("root", Style::new())]);
        let second = scope("Button", &[("root", Style::new())]);

        assert_ne!(first.class("root"), second.class("root"));
    }

    #[test]
    fn test_nested_pseudo_selector_renders_after_base_rule() {
        let style = Style::new()
            .set_color("color", Color::rgb(20, 20, 20))
            .nested(":hover", Style::new().set("textDecoration", "underline"));
        let scoped = scope("Link", &[("anchor", style)]);

        let class = scoped.class("anchor").unwrap();
        assert!(scoped.css.contains(&format!(".{}:hover {{", class)));
        assert!(scoped.css.contains("  text-decoration: underline;"));
    }

    #[test]
    fn test_merge_later_value_wins() {
        let base = Style::new().set("color", "red").set_px("margin", 4);
        let overlay = Style::new().set("color", "blue");

        let merged = Style::merged(&[base, overlay]);
        let scoped = scope("Badge", &[("root", merged)]);

        assert!(scoped.css.contains("  color: blue;"));
        assert!(!scoped.css.contains("  color: red;"));
        assert!(scoped.css.contains("  margin: 4px;"));
    }

    #[test]
    fn test_merge_combines_nested_blocks() {
        let base = Style::new().nested(":hover", Style::new().set("color", "red"));
        let overlay = Style::new().nested(":hover", Style::new().set("cursor", "pointer"));

        let merged = Style::merged(&[base, overlay]);
        let scoped = scope("Chip", &[("root", merged)]);

        let class = scoped.class("root").unwrap();
        let hover_rules = scoped
            .css
            .matches(&format!(".{}:hover {{", class))
            .count();
        assert_eq!(hover_rules, 1);
        assert!(scoped.css.contains("  color: red;"));
        assert!(scoped.css.contains("  cursor: pointer;"));
    }
}
