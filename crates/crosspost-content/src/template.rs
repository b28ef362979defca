//! Caption template rendering.
//!
//! Supports `{{variable}}` substitution and `{{#if variable}}...{{/if}}`
//! block conditionals over a fixed context. Unknown variables and falsy
//! conditionals render as empty strings; rendering never fails.

/// The fixed set of variables a caption template can reference.
///
/// Every field renders as-is; an empty field is falsy for `{{#if}}` blocks.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub title: String,
    pub description: String,
    pub price: String,
    pub url: String,
    pub design_name: String,
    pub design_description: String,
    pub hashtags: String,
}

impl TemplateContext {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "description" => Some(&self.description),
            "price" => Some(&self.price),
            "url" => Some(&self.url),
            "design_name" => Some(&self.design_name),
            "design_description" => Some(&self.design_description),
            "hashtags" => Some(&self.hashtags),
            _ => None,
        }
    }

    fn truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }
}

/// Render a template against a context.
///
/// Conditional blocks are resolved first, then variables are substituted.
/// Runs of three or more consecutive blank lines collapse to a single blank
/// line, and the result is trimmed.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let expanded = render_conditionals(template, ctx);
    let substituted = render_variables(&expanded, ctx);
    collapse_blank_lines(&substituted).trim().to_string()
}

/// Resolve `{{#if variable}}...{{/if}}` blocks (non-nested).
///
/// A block whose variable is unknown or empty drops its body. Malformed
/// blocks (unterminated tag or missing `{{/if}}`) are left as literal text.
fn render_conditionals(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{#if ") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + "{{#if ".len()..];

        let Some(tag_end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = after_open[..tag_end].trim();
        let body_and_rest = &after_open[tag_end + 2..];

        let Some(block_end) = body_and_rest.find("{{/if}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        if ctx.truthy(var) {
            out.push_str(&body_and_rest[..block_end]);
        }
        rest = &body_and_rest[block_end + "{{/if}}".len()..];
    }

    out.push_str(rest);
    out
}

/// Substitute `{{variable}}` references. Unknown variables render empty.
/// Leftover block tags (from malformed conditionals) are left as literals.
fn render_variables(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after_open[..end].trim();
        if name.starts_with('#') || name.starts_with('/') {
            // Not a variable: a stray block tag stays as written.
            out.push_str(&rest[start..start + 2 + end + 2]);
        } else if let Some(value) = ctx.get(name) {
            out.push_str(value);
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Collapse runs of three or more newlines down to two (one blank line).
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }

    out
}
