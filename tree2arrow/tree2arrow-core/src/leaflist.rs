//! Parser for leaf-list descriptors.
//!
//! A descriptor lists the leaves of a branch separated by `:`, each written as
//! `name[dim]/T` where the dimension and the type code are optional:
//!
//! | Descriptor      | Meaning                                  |
//! |-----------------|------------------------------------------|
//! | `x/F`           | one `Float_t`                            |
//! | `x/F:y/F:z/F`   | leaf list of three floats                |
//! | `arr[5]/D`      | fixed array of five doubles              |
//! | `vals[n]/F`     | floats counted by leaf `n`               |
//! | `label/C`       | null-terminated C string                 |
//!
//! A missing type code means `F`.

use crate::{
    error::SourceError,
    leaf::{LeafDef, LeafKind},
    primitive::PrimitiveType,
};

/// Parse a leaf-list descriptor into leaf definitions.
///
/// Leaf maxima and count flags are left at their defaults; the tree that owns
/// the branch fills them in.
pub fn parse_leaflist(branch: &str, leaflist: &str) -> Result<Vec<LeafDef>, SourceError> {
    let invalid = |detail: String| SourceError::InvalidLeafList {
        branch: branch.to_string(),
        leaflist: leaflist.to_string(),
        detail,
    };

    if leaflist.trim().is_empty() {
        return Err(invalid("empty descriptor".to_string()));
    }

    leaflist
        .split(':')
        .map(|item| parse_leaf(item.trim()).map_err(invalid))
        .collect()
}

fn parse_leaf(item: &str) -> Result<LeafDef, String> {
    let (head, code) = match item.rsplit_once('/') {
        Some((head, code)) => {
            let mut chars = code.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => (head, c),
                _ => return Err(format!("invalid type code '{code}' in '{item}'")),
            }
        }
        None => (item, 'F'),
    };

    let (name, dim) = match head.split_once('[') {
        Some((name, rest)) => {
            let dim = rest
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated dimension in '{item}'"))?;
            if dim.contains('[') || dim.contains(']') {
                return Err(format!("multi-dimensional leaf '{item}' is not supported"));
            }
            (name, Some(dim))
        }
        None => (head, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid leaf name '{name}'"));
    }

    let mut leaf = if code == 'C' {
        LeafDef::new(name, "Char_t").with_kind(LeafKind::CString)
    } else {
        let p = PrimitiveType::from_code(code)
            .ok_or_else(|| format!("unknown type code '{code}' in '{item}'"))?;
        LeafDef::new(name, p.leaf_type_name())
    };

    match dim {
        None => {}
        Some(d) if d.chars().all(|c| c.is_ascii_digit()) && !d.is_empty() => {
            let len: usize = d
                .parse()
                .map_err(|e| format!("invalid dimension '{d}' in '{item}': {e}"))?;
            if len == 0 {
                return Err(format!("zero-length array '{item}'"));
            }
            leaf = leaf.with_len(len);
        }
        Some(d) if !d.is_empty() && d.chars().all(|c| c.is_alphanumeric() || c == '_') => {
            leaf = leaf.with_counter(d);
        }
        Some(d) => return Err(format!("invalid dimension '{d}' in '{item}'")),
    }

    Ok(leaf)
}
