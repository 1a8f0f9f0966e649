//! Tarball serialization of snapshot trees

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use thiserror::Error;
use tracing::debug;

use crate::node::Node;

/// Extended attribute keys preserved on every archive entry
const XATTR_MODIFIED: &str = "SCHILY.xattr.ModifiedIndex";
const XATTR_CREATED: &str = "SCHILY.xattr.CreatedIndex";
const XATTR_EXPIRATION: &str = "SCHILY.xattr.Expiration";

/// Errors produced while encoding a snapshot tree
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The tree reader handed us an inconsistent node
    #[error("malformed node {key:?}: {reason}")]
    MalformedNode { key: String, reason: &'static str },
    /// Underlying buffer write failed
    #[error("archive write failed")]
    Io(#[from] io::Error),
}

/// Build the destination object name for an archive taken at `when`
pub fn archive_name(cluster_name: &str, when: DateTime<Utc>) -> String {
    format!(
        "{}-{}.tar.gz",
        cluster_name,
        when.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Serialize a snapshot tree into a gzip-compressed tar archive.
///
/// The root's own key is the archive root and is not itself emitted; entries
/// are written depth-first pre-order, each directory before its children,
/// child order exactly as the reader returned it. Entry order is therefore
/// only as deterministic as the source tree.
pub fn write_archive(root: &Node) -> Result<Vec<u8>, ArchiveError> {
    validate(root)?;

    let gzip = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(gzip);

    for child in &root.nodes {
        append_node(&mut builder, child)?;
    }

    // The tar trailer must reach the gzip stream before the gzip trailer is
    // written, or the archive comes out truncated: finish the builder first.
    let gzip = builder.into_inner()?;
    Ok(gzip.finish()?)
}

fn append_node<W: Write>(builder: &mut Builder<W>, node: &Node) -> Result<(), ArchiveError> {
    validate(node)?;
    debug!(key = %node.key, "writing archive entry");

    if node.dir {
        // Always strip the leading slash from the key.
        let name = format!("{}/", entry_name(&node.key));
        append_entry(builder, &name, EntryType::Directory, 0o555, &[], node)?;

        for child in &node.nodes {
            append_node(builder, child)?;
        }
    } else {
        append_entry(
            builder,
            entry_name(&node.key),
            EntryType::Regular,
            0o444,
            &node.value,
            node,
        )?;
    }

    Ok(())
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    name: &str,
    kind: EntryType,
    mode: u32,
    data: &[u8],
    node: &Node,
) -> Result<(), ArchiveError> {
    let xattrs = node_xattrs(node);
    builder.append_pax_extensions(xattrs.iter().map(|(key, value)| (*key, value.as_bytes())))?;

    let mut header = Header::new_ustar();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_size(data.len() as u64);
    // Zero mtime keeps identical trees byte-identical across runs.
    header.set_mtime(0);
    builder.append_data(&mut header, name, data)?;

    Ok(())
}

fn validate(node: &Node) -> Result<(), ArchiveError> {
    if node.dir && !node.value.is_empty() {
        return Err(ArchiveError::MalformedNode {
            key: node.key.clone(),
            reason: "directory carries a value",
        });
    }
    if !node.dir && !node.nodes.is_empty() {
        return Err(ArchiveError::MalformedNode {
            key: node.key.clone(),
            reason: "leaf has children",
        });
    }
    Ok(())
}

fn entry_name(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

fn node_xattrs(node: &Node) -> [(&'static str, String); 3] {
    [
        (XATTR_MODIFIED, node.modified_index.to_string()),
        (XATTR_CREATED, node.created_index.to_string()),
        (XATTR_EXPIRATION, expiration_label(node)),
    ]
}

fn expiration_label(node: &Node) -> String {
    match node.expiration {
        Some(when) => when.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;

    struct Unpacked {
        name: String,
        mode: u32,
        size: u64,
        data: Vec<u8>,
        xattrs: Vec<(String, String)>,
    }

    /// Decompress and unpack, failing on any truncation or framing error.
    fn unpack(bytes: &[u8]) -> Vec<Unpacked> {
        let mut tar_bytes = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut tar_bytes)
            .expect("gzip stream decodes cleanly");

        let mut archive = Archive::new(&tar_bytes[..]);
        let mut out = Vec::new();
        for entry in archive.entries().expect("tar stream is well-formed") {
            let mut entry = entry.expect("tar entry is readable");

            let mut xattrs = Vec::new();
            if let Some(extensions) = entry.pax_extensions().unwrap() {
                for extension in extensions {
                    let extension = extension.unwrap();
                    xattrs.push((
                        extension.key().unwrap().to_string(),
                        extension.value().unwrap().to_string(),
                    ));
                }
            }

            let name = String::from_utf8(entry.path_bytes().to_vec()).unwrap();
            let mode = entry.header().mode().unwrap();
            let size = entry.header().size().unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();

            out.push(Unpacked {
                name,
                mode,
                size,
                data,
                xattrs,
            });
        }
        out
    }

    fn sample_tree() -> Node {
        let mut a = Node::directory("/a");
        a.nodes.push(Node::leaf("/a/b", "x"));
        let mut c = Node::directory("/a/c");
        c.nodes.push(Node::leaf("/a/c/d", "y"));
        a.nodes.push(c);

        let mut root = Node::directory("/");
        root.nodes.push(a);
        root
    }

    #[test]
    fn traversal_is_preorder_with_directories_first() {
        let entries = unpack(&write_archive(&sample_tree()).unwrap());

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a/", "a/b", "a/c/", "a/c/d"]);

        assert_eq!(entries[1].size, 1);
        assert_eq!(entries[1].data, b"x");
        assert_eq!(entries[3].data, b"y");
    }

    #[test]
    fn entry_modes_and_sizes() {
        let entries = unpack(&write_archive(&sample_tree()).unwrap());

        assert_eq!(entries[0].mode, 0o555);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[1].mode, 0o444);
    }

    #[test]
    fn metadata_survives_as_extended_attributes() {
        let mut root = Node::directory("/");
        root.nodes.push(Node::leaf("/k", "v").with_indexes(3, 5));

        let entries = unpack(&write_archive(&root).unwrap());
        assert_eq!(
            entries[0].xattrs,
            vec![
                ("SCHILY.xattr.ModifiedIndex".to_string(), "5".to_string()),
                ("SCHILY.xattr.CreatedIndex".to_string(), "3".to_string()),
                ("SCHILY.xattr.Expiration".to_string(), "never".to_string()),
            ]
        );
    }

    #[test]
    fn expiration_is_rfc3339() {
        let when = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let mut root = Node::directory("/");
        root.nodes
            .push(Node::leaf("/k", "v").with_expiration(when));

        let entries = unpack(&write_archive(&root).unwrap());
        let expiration = entries[0]
            .xattrs
            .iter()
            .find(|(key, _)| key == "SCHILY.xattr.Expiration")
            .map(|(_, value)| value.as_str());
        assert_eq!(expiration, Some("2026-08-01T12:00:00Z"));
    }

    #[test]
    fn empty_tree_produces_a_decodable_archive() {
        let entries = unpack(&write_archive(&Node::directory("/")).unwrap());
        assert!(entries.is_empty());
    }

    #[test]
    fn deeply_nested_tree_decodes_cleanly() {
        let mut key = String::new();
        let mut nodes = Vec::new();
        for depth in 0..64 {
            key.push_str(&format!("/d{}", depth));
            nodes.push(Node::directory(key.clone()));
        }
        key.push_str("/leaf");
        let mut current = Node::leaf(key, "deep");
        while let Some(mut parent) = nodes.pop() {
            parent.nodes.push(current);
            current = parent;
        }
        let mut root = Node::directory("/");
        root.nodes.push(current);

        let entries = unpack(&write_archive(&root).unwrap());
        assert_eq!(entries.len(), 65);
        assert_eq!(entries.last().unwrap().data, b"deep");
    }

    #[test]
    fn root_key_is_not_emitted() {
        let mut root = Node::directory("/base");
        root.nodes.push(Node::leaf("/base/x", "1"));

        let entries = unpack(&write_archive(&root).unwrap());
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["base/x"]);
    }

    #[test]
    fn leaf_with_children_is_rejected() {
        let mut bad = Node::leaf("/k", "v");
        bad.nodes.push(Node::leaf("/k/child", "w"));
        let mut root = Node::directory("/");
        root.nodes.push(bad);

        let err = write_archive(&root).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedNode { .. }));
    }

    #[test]
    fn directory_with_value_is_rejected() {
        let mut bad = Node::directory("/d");
        bad.value = b"oops".to_vec();
        let mut root = Node::directory("/");
        root.nodes.push(bad);

        let err = write_archive(&root).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedNode { .. }));
    }

    #[test]
    fn archive_name_embeds_cluster_and_timestamp() {
        let when = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        assert_eq!(
            archive_name("prod", when),
            "prod-2026-08-01T12:00:00Z.tar.gz"
        );
    }
}
