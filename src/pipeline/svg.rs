//! SVG optimizer.
//!
//! A text-level optimizer covering the safe subset of the usual SVG cleanup
//! passes: comments, the XML declaration, doctype, metadata, editor
//! namespaces and inter-tag whitespace. Two passes are switchable:
//!
//! - `remove_view_box`: drop `viewBox` when it equals `0 0 <width> <height>`
//! - `cleanup_ids`: drop `id` attributes nothing refers to

use crate::config::SvgConfig;
use regex::{Captures, Regex};
use std::collections::HashSet;

/// Namespace prefixes written by drawing tools.
const EDITOR_PREFIXES: &str = "sodipodi|inkscape|sketch|serif";

/// Optimize an SVG document.
pub fn optimize_svg(input: &str, options: SvgConfig) -> String {
    let mut svg = input.to_string();

    svg = replace_all(&svg, r"(?s)<\?xml.*?\?>", "");
    svg = replace_all(&svg, r"(?s)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>", "");
    svg = replace_all(&svg, r"(?s)<!--.*?-->", "");
    svg = replace_all(&svg, r"(?s)<metadata\b[^>]*?/>", "");
    svg = replace_all(&svg, r"(?s)<metadata\b.*?</metadata>", "");

    let editor_self_closing = format!(r"(?s)<(?:{}):[\w.-]+\b[^>]*?/>", EDITOR_PREFIXES);
    svg = replace_all(&svg, &editor_self_closing, "");
    let editor_element =
        format!(r"(?s)<(?:{p}):[\w.-]+\b[^>]*>.*?</(?:{p}):[\w.-]+>", p = EDITOR_PREFIXES);
    svg = replace_all(&svg, &editor_element, "");
    let editor_namespace = format!(r#"\s+xmlns:(?:{})="[^"]*""#, EDITOR_PREFIXES);
    svg = replace_all(&svg, &editor_namespace, "");
    let editor_attribute = format!(r#"\s+(?:{}):[\w.-]+="[^"]*""#, EDITOR_PREFIXES);
    svg = replace_all(&svg, &editor_attribute, "");

    // Whitespace inside text content is significant.
    if !svg.contains("<text") {
        svg = replace_all(&svg, r">\s+<", "><");
    }

    if options.remove_view_box {
        svg = remove_view_box(&svg);
    }
    if options.cleanup_ids {
        svg = cleanup_ids(&svg);
    }

    svg.trim().to_string()
}

fn replace_all(text: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(text, replacement).into_owned(),
        Err(e) => {
            tracing::warn!(pattern, "invalid optimizer pattern: {}", e);
            text.to_string()
        }
    }
}

/// Remove `viewBox` from the root element when it is implied by its
/// `width` and `height`.
fn remove_view_box(svg: &str) -> String {
    let Ok(root) = Regex::new(r"(?s)<svg\b[^>]*>") else {
        return svg.to_string();
    };
    let Some(tag) = root.find(svg) else {
        return svg.to_string();
    };
    let tag_text = tag.as_str();

    let (Some(width), Some(height), Some(view_box)) = (
        attribute(tag_text, "width"),
        attribute(tag_text, "height"),
        attribute(tag_text, "viewBox"),
    ) else {
        return svg.to_string();
    };

    let parts: Vec<f64> = view_box
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    let implied = parts.len() == 4
        && parts[0] == 0.0
        && parts[1] == 0.0
        && Some(parts[2]) == px_length(&width)
        && Some(parts[3]) == px_length(&height);
    if !implied {
        return svg.to_string();
    }

    let stripped = replace_all(tag_text, r#"\s+viewBox="[^"]*""#, "");
    format!("{}{}{}", &svg[..tag.start()], stripped, &svg[tag.end()..])
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"\s{}="([^"]*)""#, regex::escape(name))).ok()?;
    re.captures(tag).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn px_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

/// Remove `id` attributes that are never referenced. Documents with styles
/// or scripts are left alone since those may refer to ids by selector.
fn cleanup_ids(svg: &str) -> String {
    if svg.contains("<style") || svg.contains("<script") {
        return svg.to_string();
    }
    let (Ok(ids), Ok(refs)) = (
        Regex::new(r#"\sid="([^"]*)""#),
        Regex::new(r##"#([A-Za-z_][\w.:-]*)"##),
    ) else {
        return svg.to_string();
    };

    let referenced: HashSet<&str> =
        refs.captures_iter(svg).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();

    ids.replace_all(svg, |caps: &Captures| {
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if referenced.contains(id) {
            caps[0].to_string()
        } else {
            String::new()
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INKSCAPE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!-- Created with Inkscape -->
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd" width="24" height="24" viewBox="0 0 24 24" inkscape:version="1.2">
  <metadata id="metadata1"><rdf:RDF></rdf:RDF></metadata>
  <sodipodi:namedview id="namedview1" pagecolor="#ffffff"/>
  <g id="layer1" inkscape:label="Layer 1">
    <path id="icon" d="M0 0h24v24H0z"/>
  </g>
</svg>
"##;

    fn defaults() -> SvgConfig {
        SvgConfig::default()
    }

    #[test]
    fn test_strips_editor_noise() {
        let out = optimize_svg(INKSCAPE, defaults());
        assert!(!out.contains("<?xml"));
        assert!(!out.contains("<!--"));
        assert!(!out.contains("DOCTYPE"));
        assert!(!out.contains("metadata"));
        assert!(!out.contains("sodipodi"));
        assert!(!out.contains("inkscape"));
        assert!(!out.contains(">\n"));
        assert!(out.starts_with("<svg"));
        assert!(out.contains(r#"d="M0 0h24v24H0z""#));
        assert!(out.len() < INKSCAPE.len());
    }

    #[test]
    fn test_remove_view_box_toggle() {
        let on = optimize_svg(INKSCAPE, defaults());
        assert!(!on.contains("viewBox"));

        let off = optimize_svg(INKSCAPE, SvgConfig { remove_view_box: false, cleanup_ids: false });
        assert!(off.contains(r#"viewBox="0 0 24 24""#));
    }

    #[test]
    fn test_view_box_kept_when_not_implied() {
        let svg = r#"<svg width="48" height="48" viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;
        assert!(optimize_svg(svg, defaults()).contains("viewBox"));

        let no_size = r#"<svg viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;
        assert!(optimize_svg(no_size, defaults()).contains("viewBox"));
    }

    #[test]
    fn test_cleanup_ids_toggle() {
        let svg = r##"<svg><defs><linearGradient id="g"/></defs><rect id="unused" fill="url(#g)"/></svg>"##;

        let kept = optimize_svg(svg, defaults());
        assert!(kept.contains(r#"id="unused""#));

        let cleaned = optimize_svg(svg, SvgConfig { remove_view_box: true, cleanup_ids: true });
        assert!(!cleaned.contains(r#"id="unused""#));
        assert!(cleaned.contains(r#"id="g""#));
    }

    #[test]
    fn test_cleanup_ids_skips_styled_documents() {
        let svg = r#"<svg><style>#a { fill: red; }</style><rect id="a"/><rect id="b"/></svg>"#;
        let out = optimize_svg(svg, SvgConfig { remove_view_box: true, cleanup_ids: true });
        assert!(out.contains(r#"id="b""#));
    }

    #[test]
    fn test_text_whitespace_preserved() {
        let svg = "<svg><text><tspan>a</tspan> <tspan>b</tspan></text></svg>";
        assert_eq!(optimize_svg(svg, defaults()), svg);
    }
}
