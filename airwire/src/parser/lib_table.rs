//! Symbol library tables (`sym-lib-table`).
//!
//! ```text
//! (sym_lib_table
//!   (lib (name "Device")(type "Legacy")(uri "${KICAD_SYMBOL_DIR}/Device.lib")(options "")(descr ""))
//! )
//! ```

use std::collections::BTreeMap;

use crate::parser::sexp::{ParseError, SExp, SExpParser};

/// File name KiCad uses for symbol library tables.
pub const SYM_LIB_TABLE: &str = "sym-lib-table";

/// Library name (lower-cased) to library file location, with environment
/// variables in the URI expanded from the process environment.
pub fn parse_sym_lib_table(content: &str) -> Result<BTreeMap<String, String>, ParseError> {
    parse_sym_lib_table_with(content, |var| std::env::var(var).ok())
}

/// Same as [`parse_sym_lib_table`] with a caller-supplied variable lookup.
pub fn parse_sym_lib_table_with<F>(
    content: &str,
    lookup: F,
) -> Result<BTreeMap<String, String>, ParseError>
where
    F: Fn(&str) -> Option<String>,
{
    let root = SExpParser::new(content).parse()?;
    let mut libs = BTreeMap::new();

    for lib in root.get_all("lib") {
        let (Some(name), Some(uri)) = (field(lib, "name"), field(lib, "uri")) else {
            continue;
        };
        libs.insert(name.to_lowercase(), expand_env_vars(uri, &lookup));
    }
    Ok(libs)
}

fn field<'a>(lib: &'a SExp, key: &str) -> Option<&'a str> {
    lib.child(key)?.as_list()?.get(1)?.as_atom()
}

/// Expand `$VAR` and `${VAR}` references. Unknown variables are left as
/// written.
pub fn expand_env_vars<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => {
                out.push_str(&value);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
