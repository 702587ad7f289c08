//! Host type name handling
//!
//! Host names arrive in several spellings (`List`1<T>`, reflection's
//! `List`1[[T, Assembly, ...]]`, `Outer+Inner`). Extraction normalises them
//! once; the emitter maps the normalised form to Rust identifiers.

use mbinbridge_sdk::IntWidth;

/// Normalise a host type name.
///
/// - nested separators `+` become `/`
/// - a type starting with one of `list_markers` becomes `Vec<Inner>`,
///   recursively, for both `<..>` and `[[.., assembly]]` argument forms
/// - array suffixes are kept (`Vec<T>[]` stays an array of lists)
pub fn normalize_type_name(raw: &str, list_markers: &[String]) -> String {
    let raw = raw.trim();
    if let Some(element) = raw.strip_suffix("[]") {
        return format!("{}[]", normalize_type_name(element, list_markers));
    }

    for marker in list_markers {
        let Some(rest) = raw.strip_prefix(marker.as_str()) else {
            continue;
        };
        if let Some(inner) = generic_argument(rest) {
            return format!("Vec<{}>", normalize_type_name(inner, list_markers));
        }
    }

    raw.replace('+', "/")
}

/// Single generic argument of "`1<T>", "<T>" or "`1[[T, asm]]"
fn generic_argument(rest: &str) -> Option<&str> {
    let rest = match rest.strip_prefix('`') {
        Some(arity) => arity.trim_start_matches(|c: char| c.is_ascii_digit()),
        None => rest,
    };

    if let Some(inner) = rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        return Some(inner);
    }

    let inner = rest.strip_prefix("[[")?.strip_suffix("]]")?;
    // Drop the assembly qualification after the first top-level comma
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '[' | '<' => depth += 1,
            ']' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(inner[..i].trim()),
            _ => {}
        }
    }
    Some(inner.trim())
}

/// Element type of a normalised `Vec<T>` name
pub fn list_element(type_name: &str) -> Option<&str> {
    type_name.strip_prefix("Vec<")?.strip_suffix('>')
}

/// Rust module name for a host namespace.
///
/// `prefix` is stripped first, remaining dots become underscores:
/// `libMBIN.NMS.GameComponents` -> `NMS_GameComponents`.
pub fn module_name(namespace: &str, prefix: &str) -> String {
    let stripped = namespace.strip_prefix(prefix).unwrap_or(namespace);
    type_ident(stripped)
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be raw identifiers
const NOT_RAW: &[&str] = &["self", "Self", "super", "crate", "_"];

/// A Rust identifier derived from a host name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RustIdent {
    /// Identifier as written in source (may be `r#type`)
    pub ident: String,
    /// Whether the host name has to be carried separately
    pub renamed: bool,
}

/// Identifier for a field or enum variant.
///
/// Keywords become raw identifiers; anything else that is not a valid
/// identifier is sanitised and flagged as renamed.
pub fn field_ident(name: &str) -> RustIdent {
    if NOT_RAW.contains(&name) {
        return RustIdent {
            ident: format!("{name}_"),
            renamed: true,
        };
    }
    if KEYWORDS.contains(&name) {
        return RustIdent {
            ident: format!("r#{name}"),
            renamed: false,
        };
    }

    let ident = type_ident(name);
    RustIdent {
        renamed: ident != name,
        ident,
    }
}

/// Identifier for a type or module: every non-identifier character becomes `_`
pub fn type_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if KEYWORDS.contains(&ident.as_str()) || NOT_RAW.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Enum discriminant literal for a stored value at the given width
pub fn enum_literal(width: IntWidth, value: i64) -> String {
    match width {
        IntWidth::I8 => (value as i8).to_string(),
        IntWidth::U8 => (value as u8).to_string(),
        IntWidth::I16 => (value as i16).to_string(),
        IntWidth::U16 => (value as u16).to_string(),
        IntWidth::I32 => (value as i32).to_string(),
        IntWidth::U32 => (value as u32).to_string(),
        IntWidth::I64 => value.to_string(),
        IntWidth::U64 => (value as u64).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec![
            "System.Collections.Generic.List".to_string(),
            "libMBIN.NMS.HashMap".to_string(),
        ]
    }

    #[test]
    fn test_list_markers_become_vec() {
        let m = markers();
        assert_eq!(
            normalize_type_name("System.Collections.Generic.List`1<libMBIN.NMS.Colour>", &m),
            "Vec<libMBIN.NMS.Colour>"
        );
        assert_eq!(
            normalize_type_name(
                "System.Collections.Generic.List`1[[libMBIN.NMS.GameComponents.GcBiome+Kind, libMBIN, Version=1.0.0.0, Culture=neutral]]",
                &m
            ),
            "Vec<libMBIN.NMS.GameComponents.GcBiome/Kind>"
        );
        assert_eq!(
            normalize_type_name("libMBIN.NMS.HashMap`1<System.Collections.Generic.List`1<System.Int32>>", &m),
            "Vec<Vec<System.Int32>>"
        );
        assert_eq!(normalize_type_name("System.Single[]", &m), "System.Single[]");
        assert_eq!(normalize_type_name("System.Collections.Generic.Dictionary`2<A,B>", &m), "System.Collections.Generic.Dictionary`2<A,B>");
    }

    #[test]
    fn test_module_names() {
        assert_eq!(module_name("libMBIN.NMS.GameComponents", "libMBIN."), "NMS_GameComponents");
        assert_eq!(module_name("Other.Space", "libMBIN."), "Other_Space");
    }

    #[test]
    fn test_field_idents() {
        assert_eq!(field_ident("Fuel").ident, "Fuel");
        assert_eq!(
            field_ident("type"),
            RustIdent { ident: "r#type".into(), renamed: false }
        );
        assert_eq!(
            field_ident("self"),
            RustIdent { ident: "self_".into(), renamed: true }
        );
        assert_eq!(
            field_ident("<Id>k__BackingField"),
            RustIdent { ident: "_Id_k__BackingField".into(), renamed: true }
        );
        assert_eq!(field_ident("2D").ident, "_2D");
        assert_eq!(type_ident("GcBiome/Kind"), "GcBiome_Kind");
    }

    #[test]
    fn test_enum_literals_follow_width() {
        assert_eq!(enum_literal(IntWidth::U64, -1), "18446744073709551615");
        assert_eq!(enum_literal(IntWidth::I8, -3), "-3");
        assert_eq!(enum_literal(IntWidth::U8, 255), "255");
    }
}
