//! Inline source map helpers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

/// Comment syntax of the file a map is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Css,
    Js,
}

/// A fresh map over `contents` with no mappings, naming `source` as its only
/// source and embedding the content.
pub fn fresh_map(file: &str, source: &str, contents: &str) -> Value {
    json!({
        "version": 3,
        "file": file,
        "names": [],
        "mappings": "",
        "sources": [source],
        "sourcesContent": [contents],
    })
}

/// Build the trailing `sourceMappingURL` comment carrying `map_json` inline.
pub fn inline_comment(map_json: &str, syntax: Syntax) -> String {
    let data = STANDARD.encode(map_json.as_bytes());
    let url = format!("sourceMappingURL=data:application/json;charset=utf8;base64,{}", data);
    match syntax {
        Syntax::Css => format!("\n/*# {} */\n", url),
        Syntax::Js => format!("\n//# {}\n", url),
    }
}

/// Decode the map carried by an inline comment, if any.
pub fn extract_inline(contents: &str) -> Option<Value> {
    let marker = "sourceMappingURL=data:application/json;charset=utf8;base64,";
    let start = contents.rfind(marker)? + marker.len();
    let data: String = contents[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    let bytes = STANDARD.decode(data).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_map_shape() {
        let map = fresh_map("app.min.js", "app.ts", "let a=1;");
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "app.min.js");
        assert_eq!(map["mappings"], "");
        assert_eq!(map["sources"][0], "app.ts");
        assert_eq!(map["sourcesContent"][0], "let a=1;");
    }

    #[test]
    fn test_inline_comment_syntax() {
        let css = inline_comment("{}", Syntax::Css);
        assert!(css.starts_with("\n/*# sourceMappingURL=data:application/json"));
        assert!(css.ends_with(" */\n"));

        let js = inline_comment("{}", Syntax::Js);
        assert!(js.starts_with("\n//# sourceMappingURL="));
    }

    #[test]
    fn test_extract_inline_reads_back_map() {
        let map = fresh_map("a.min.js", "a.ts", "x");
        let text = format!("x{}", inline_comment(&map.to_string(), Syntax::Js));
        assert_eq!(extract_inline(&text), Some(map));
    }
}
