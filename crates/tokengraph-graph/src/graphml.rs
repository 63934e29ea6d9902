//! GraphML serialisation of a [`TransferGraph`].
//!
//! Every attribute is declared once as a typed `<key>`; nodes and edges only
//! carry the `<data>` entries that apply to them.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use petgraph::visit::EdgeRef;

use crate::builder::TransferGraph;
use crate::error::GraphError;
use crate::model::{GraphNode, TransferEdge};

enum Value<'a> {
    Str(&'a str),
    Owned(String),
    Int(i64),
    Double(f64),
}

impl Value<'_> {
    fn render(&self) -> String {
        match self {
            Self::Str(s) => escape(s),
            Self::Owned(s) => escape(s),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
        }
    }
}

/// `(id, for, attr.name, attr.type)`
const KEYS: &[(&str, &str, &str, &str)] = &[
    ("label", "node", "label", "string"),
    ("address", "node", "address", "string"),
    ("description", "node", "description", "string"),
    ("nodeType", "node", "nodeType", "int"),
    ("value", "node", "value", "double"),
    ("nftId", "node", "nftId", "string"),
    ("txHash", "node", "txHash", "string"),
    ("txIndex", "node", "txIndex", "int"),
    ("symbol", "all", "symbol", "string"),
    ("transferType", "all", "transferType", "string"),
    ("timestampEstimate", "all", "timestampEstimate", "string"),
    ("appearanceIndex", "all", "appearanceIndex", "int"),
];

/// `<chain-name>.graphml`
pub fn graphml_file_name(chain_name: &str) -> String {
    format!("{chain_name}.graphml")
}

/// Escape XML special characters in text and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn node_data(node: &GraphNode) -> Vec<(&'static str, Value<'_>)> {
    let node_type = Value::Int(node.node_type() as i64);
    match node {
        GraphNode::Address(n) => vec![
            ("label", Value::Str(&n.label)),
            ("address", Value::Owned(n.address.to_checksum(None))),
            ("description", Value::Str(&n.description)),
            ("nodeType", node_type),
            ("timestampEstimate", Value::Str(&n.timestamp_estimate)),
            ("appearanceIndex", Value::Int(n.appearance_index as i64)),
        ],
        GraphNode::Movement(n) => vec![
            ("label", Value::Str(&n.label)),
            ("symbol", Value::Str(&n.symbol)),
            ("value", Value::Double(n.value)),
            ("nodeType", node_type),
            ("nftId", Value::Str(&n.nft_id)),
            ("transferType", Value::Str(n.kind.as_str())),
            ("txHash", Value::Owned(n.tx_hash.to_string())),
            ("txIndex", Value::Int(n.tx_index as i64)),
            ("timestampEstimate", Value::Str(&n.timestamp_estimate)),
            ("appearanceIndex", Value::Int(n.appearance_index as i64)),
        ],
    }
}

fn edge_data(edge: &TransferEdge) -> Vec<(&'static str, Value<'_>)> {
    vec![
        ("transferType", Value::Str(edge.kind.as_str())),
        ("symbol", Value::Str(&edge.symbol)),
        ("timestampEstimate", Value::Str(&edge.timestamp_estimate)),
        ("appearanceIndex", Value::Int(edge.appearance_index as i64)),
    ]
}

fn write_data<W: Write>(w: &mut W, data: &[(&str, Value<'_>)]) -> io::Result<()> {
    for (key, value) in data {
        writeln!(w, "      <data key=\"{key}\">{}</data>", value.render())?;
    }
    Ok(())
}

/// Write `graph` as a directed GraphML document titled `title`.
pub fn write_graphml<W: Write>(graph: &TransferGraph, title: &str, w: &mut W) -> io::Result<()> {
    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        w,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
    )?;
    writeln!(w, "  <desc>{}</desc>", escape(title))?;
    for (id, domain, name, ty) in KEYS {
        writeln!(w, r#"  <key id="{id}" for="{domain}" attr.name="{name}" attr.type="{ty}"/>"#)?;
    }
    writeln!(w, r#"  <graph id="{}" edgedefault="directed">"#, escape(title))?;

    for ix in graph.graph.node_indices() {
        writeln!(w, r#"    <node id="n{}">"#, ix.index())?;
        write_data(w, &node_data(&graph.graph[ix]))?;
        writeln!(w, "    </node>")?;
    }
    for edge in graph.graph.edge_references() {
        writeln!(
            w,
            r#"    <edge id="e{}" source="n{}" target="n{}">"#,
            edge.id().index(),
            edge.source().index(),
            edge.target().index()
        )?;
        write_data(w, &edge_data(edge.weight()))?;
        writeln!(w, "    </edge>")?;
    }

    writeln!(w, "  </graph>")?;
    writeln!(w, "</graphml>")?;
    w.flush()
}

/// Write `graph` to `dir/<chain-name>.graphml` and return the path.
pub fn write_graphml_file(graph: &TransferGraph, chain_name: &str, dir: &Path) -> Result<PathBuf, GraphError> {
    let path = dir.join(graphml_file_name(chain_name));
    let io_err = |source| GraphError::Io {
        path: path.clone(),
        source,
    };
    let file = File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write_graphml(graph, chain_name, &mut writer).map_err(io_err)?;
    tracing::info!(path = %path.display(), nodes = graph.node_count(), edges = graph.edge_count(), "GraphML written");
    Ok(path)
}
