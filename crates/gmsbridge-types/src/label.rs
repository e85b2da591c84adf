//! Rendering of element labels and selector tuples in diagnostics.

/// One position of a rendered key tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// A concrete element with its catalog label.
    Label(String),
    /// An unconstrained position.
    Wildcard,
    /// A concrete element whose label could not be looked up.
    Unresolved(i32),
}

/// Quote a label the way the modeling language prints it.
///
/// Labels containing a single quote are wrapped in double quotes.
pub fn quote_label(label: &str) -> String {
    let quote = if label.contains('\'') { '"' } else { '\'' };
    format!("{quote}{label}{quote}")
}

/// Render a key tuple such as `('i1','*')`.
///
/// Returns an empty string when no position is concrete: an unfiltered
/// reference is identified by the symbol name alone.
pub fn render_key_tuple(parts: &[KeyPart]) -> String {
    if parts.iter().all(|p| matches!(p, KeyPart::Wildcard)) {
        return String::new();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|part| match part {
            KeyPart::Label(label) => quote_label(label),
            KeyPart::Wildcard => "'*'".to_owned(),
            KeyPart::Unresolved(uel) => format!("UEL#{uel}"),
        })
        .collect();
    format!("({})", rendered.join(","))
}
