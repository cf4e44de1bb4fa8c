//! On-disk tree file codec.
//!
//! A tree file is a UTF-8 header followed by a binary body:
//!
//! ```text
//! tree2arrow-tree 1
//! tree events
//! entries 2
//! class Point x=float;y=float
//! branch n n/I
//! branch vals vals[n]/F
//! branch pos class Point
//! max n 3
//! end
//! <body>
//! ```
//!
//! The body stores, for every entry and every branch in header order, a
//! little-endian `u32` length followed by the encoded branch bytes.

use std::{
    fs,
    io::{BufWriter, Write},
    path::Path,
};

use bytes::{Buf, BufMut};
use memmap2::Mmap;

use crate::{
    error::SourceError,
    memory::{BranchSpec, MemoryTree},
    registry::{ClassDef, ClassMember},
    source::SourceTree,
};

const MAGIC: &str = "tree2arrow-tree 1";
const END: &str = "end";

/// Read tree `tree` from the file at `path`.
pub fn read_tree(path: &Path, tree: &str) -> Result<MemoryTree, SourceError> {
    let file = fs::File::open(path)?;
    let mmap = unsafe { Mmap::map(&file) }?;
    let display = path.display().to_string();
    let malformed = |detail: String| SourceError::Malformed {
        path: display.clone(),
        detail,
    };

    let mut offset = 0;
    if next_line(&mmap, &mut offset) != Some(MAGIC) {
        return Err(SourceError::NotATreeFile {
            path: display.clone(),
        });
    }

    let mut name = None;
    let mut entries = None;
    let mut classes = Vec::new();
    let mut branches = Vec::new();
    let mut maxima = Vec::new();
    loop {
        let line = next_line(&mmap, &mut offset)
            .ok_or_else(|| malformed("unterminated header".to_string()))?;
        if line == END {
            break;
        }
        let (key, rest) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "tree" => name = Some(rest.to_string()),
            "entries" => {
                entries = Some(
                    rest.parse::<usize>()
                        .map_err(|e| malformed(format!("invalid entry count '{rest}': {e}")))?,
                )
            }
            "class" => classes.push(parse_class(rest).map_err(&malformed)?),
            "branch" => {
                let (branch, spec) = rest
                    .split_once(' ')
                    .ok_or_else(|| malformed(format!("invalid branch line '{line}'")))?;
                let spec = match spec.split_once(' ') {
                    Some(("class", c)) => BranchSpec::Class(c.to_string()),
                    Some(("object", c)) => BranchSpec::Object(c.to_string()),
                    _ => BranchSpec::LeafList(spec.to_string()),
                };
                branches.push((branch.to_string(), spec));
            }
            "max" => {
                let (leaf, n) = rest
                    .split_once(' ')
                    .and_then(|(l, n)| n.parse::<usize>().ok().map(|n| (l, n)))
                    .ok_or_else(|| malformed(format!("invalid max line '{line}'")))?;
                maxima.push((leaf.to_string(), n));
            }
            _ => return Err(malformed(format!("unknown header line '{line}'"))),
        }
    }

    let name = name.ok_or_else(|| malformed("missing tree name".to_string()))?;
    if name != tree {
        return Err(SourceError::TreeNotFound {
            tree: tree.to_string(),
            path: display.clone(),
        });
    }
    let entries = entries.ok_or_else(|| malformed("missing entry count".to_string()))?;

    let mut builder = MemoryTree::builder(name);
    for (branch, spec) in branches {
        builder = match spec {
            BranchSpec::LeafList(leaflist) => builder.branch(&branch, &leaflist)?,
            BranchSpec::Class(class_name) => {
                let class = classes
                    .iter()
                    .find(|c: &&ClassDef| c.name == class_name)
                    .ok_or_else(|| malformed(format!("undeclared class '{class_name}'")))?;
                builder.class_branch(&branch, class)
            }
            BranchSpec::Object(class_name) => builder.object_branch(&branch, &class_name),
        };
    }
    let mut tree = builder.build()?;
    for (leaf, n) in maxima {
        if !tree.set_leaf_maximum(&leaf, n) {
            return Err(malformed(format!("unknown leaf '{leaf}' in max line")));
        }
    }

    let branch_count = tree.branches().len();
    let mut body = &mmap[offset..];
    for entry in 0..entries {
        let mut data = Vec::with_capacity(branch_count);
        for _ in 0..branch_count {
            if body.remaining() < 4 {
                return Err(malformed(format!("truncated entry {entry}")));
            }
            let len = body.get_u32_le() as usize;
            if body.remaining() < len {
                return Err(malformed(format!("truncated entry {entry}")));
            }
            data.push(body[..len].to_vec());
            body.advance(len);
        }
        tree.push_encoded(data)?;
    }
    if body.has_remaining() {
        return Err(malformed(format!(
            "{} trailing bytes after {entries} entries",
            body.remaining()
        )));
    }

    Ok(tree)
}

/// Write `tree` to a new file at `path`.
pub fn write_tree(path: &Path, tree: &MemoryTree) -> Result<(), SourceError> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);

    writeln!(w, "{MAGIC}")?;
    writeln!(w, "tree {}", tree.name())?;
    writeln!(w, "entries {}", tree.entry_count())?;
    for class in tree.classes() {
        let members: Vec<String> = class
            .members
            .iter()
            .map(|m| format!("{}={}", m.name, m.type_name))
            .collect();
        writeln!(w, "class {} {}", class.name, members.join(";"))?;
    }
    for (branch, spec) in tree.branches().iter().zip(tree.branch_specs()) {
        match spec {
            BranchSpec::LeafList(leaflist) => writeln!(w, "branch {} {leaflist}", branch.name)?,
            BranchSpec::Class(c) => writeln!(w, "branch {} class {c}", branch.name)?,
            BranchSpec::Object(c) => writeln!(w, "branch {} object {c}", branch.name)?,
        }
    }
    for leaf in tree.branches().iter().flat_map(|b| &b.leaves) {
        if leaf.maximum > 0 {
            writeln!(w, "max {} {}", leaf.name, leaf.maximum)?;
        }
    }
    writeln!(w, "{END}")?;

    let mut body = Vec::new();
    for entry in 0..tree.entry_count() as usize {
        for branch in 0..tree.branches().len() {
            let bytes = tree.entry_bytes(entry, branch).unwrap_or_default();
            body.put_u32_le(bytes.len() as u32);
            body.put_slice(bytes);
        }
    }
    w.write_all(&body)?;
    w.flush()?;
    Ok(())
}

fn next_line<'a>(data: &'a [u8], offset: &mut usize) -> Option<&'a str> {
    let rest = data.get(*offset..)?;
    let end = rest.iter().position(|b| *b == b'\n')?;
    *offset += end + 1;
    std::str::from_utf8(&rest[..end]).ok()
}

fn parse_class(line: &str) -> Result<ClassDef, String> {
    let (name, members) = line.split_once(' ').unwrap_or((line, ""));
    if name.is_empty() {
        return Err("class line without a name".to_string());
    }
    let members = members
        .split(';')
        .filter(|m| !m.is_empty())
        .map(|m| {
            m.split_once('=')
                .map(|(n, t)| ClassMember::new(n, t))
                .ok_or_else(|| format!("invalid member '{m}' of class '{name}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ClassDef::new(name, members))
}
