//! Fabric documentation tables (topology and point-to-point links).

use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{IntentError, IntentResult};

/// File name token selecting the topology table
pub const TOPOLOGY_PATTERN: &str = "topology";
/// File name token selecting the point-to-point table
pub const P2P_PATTERN: &str = "p2p";

const NODE: &str = "Node";
const NODE_INTERFACE: &str = "Node Interface";
const PEER_NODE: &str = "Peer Node";
const PEER_INTERFACE: &str = "Peer Interface";
const PEER_TYPE: &str = "Peer Type";
const NODE_IP_COLUMNS: [&str; 2] = ["Leaf IP Address", "Node IP Address"];
const PEER_IP: &str = "Peer IP Address";

/// One row of a topology or p2p table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub node: String,
    pub node_interface: String,
    pub peer_node: String,
    pub peer_interface: String,
    pub peer_type: Option<String>,
    /// Address of the node end, with prefix length
    pub node_ip: Option<String>,
    /// Address of the peer end, with prefix length
    pub peer_ip: Option<String>,
    /// Every column of the row, by header
    pub columns: IndexMap<String, String>,
}

impl LinkRecord {
    /// `node-interface-peer_node-peer_interface`
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.node, self.node_interface, self.peer_node, self.peer_interface
        )
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    fn from_row(path: &Path, columns: IndexMap<String, String>) -> IntentResult<Self> {
        let required = |name: &str| {
            columns
                .get(name)
                .cloned()
                .ok_or_else(|| IntentError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };
        let optional = |name: &str| columns.get(name).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            node: required(NODE)?,
            node_interface: required(NODE_INTERFACE)?,
            peer_node: required(PEER_NODE)?,
            peer_interface: required(PEER_INTERFACE)?,
            peer_type: optional(PEER_TYPE),
            node_ip: NODE_IP_COLUMNS.iter().find_map(|c| optional(*c)),
            peer_ip: optional(PEER_IP),
            columns,
        })
    }
}

/// Rows of one fabric CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTable {
    pub path: PathBuf,
    pub records: Vec<LinkRecord>,
}

impl LinkTable {
    pub fn parse(path: &Path, reader: impl std::io::Read) -> IntentResult<Self> {
        let csv_err = |source| IntentError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers().map_err(csv_err)?.clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            let columns = headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect();
            records.push(LinkRecord::from_row(path, columns)?);
        }

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load the first CSV of `<root>/documentation/<fabric>` whose file name
/// contains `pattern`, in alphabetical order. `None` when there is none.
pub fn load_fabric_links(
    inventory_root: &Path,
    fabric: &str,
    pattern: &str,
) -> IntentResult<Option<LinkTable>> {
    let dir = inventory_root.join("documentation").join(fabric);
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "No fabric documentation directory");
        return Ok(None);
    }

    let glob_pattern = dir.join("*.csv");
    let mut candidates: Vec<PathBuf> = glob::glob(&glob_pattern.to_string_lossy())
        .map_err(|e| IntentError::Pattern(e.to_string()))?
        .filter_map(Result::ok)
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(pattern))
        })
        .collect();
    candidates.sort();

    let Some(path) = candidates.into_iter().next() else {
        debug!(dir = %dir.display(), pattern, "No matching fabric CSV");
        return Ok(None);
    };

    let file = std::fs::File::open(&path).map_err(|source| IntentError::Io {
        path: path.clone(),
        source,
    })?;
    let table = LinkTable::parse(&path, file)?;
    debug!(path = %path.display(), rows = table.len(), "Loaded fabric links");
    Ok(Some(table))
}

/// Topology and p2p tables of one fabric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FabricDocs {
    pub topology: Option<LinkTable>,
    pub p2p: Option<LinkTable>,
}

impl FabricDocs {
    /// Both tables are absent when no fabric is given
    pub fn load(inventory_root: &Path, fabric: Option<&str>) -> IntentResult<Self> {
        let Some(fabric) = fabric else {
            return Ok(Self::default());
        };
        Ok(Self {
            topology: load_fabric_links(inventory_root, fabric, TOPOLOGY_PATTERN)?,
            p2p: load_fabric_links(inventory_root, fabric, P2P_PATTERN)?,
        })
    }
}

/// Collapse VLAN ids into sorted ranges: `1,2,3,5` becomes `1-3,5`.
///
/// Entries that are not VLAN-sized numbers are ignored.
pub fn vlan_range<S: AsRef<str>>(vlans: &[S]) -> String {
    let mut ids: Vec<u16> = vlans
        .iter()
        .filter_map(|v| v.as_ref().trim().parse().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let mut ranges = Vec::new();
    let mut iter = ids.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(next) = end.checked_add(1).filter(|n| iter.peek() == Some(n)) {
            end = next;
            iter.next();
        }
        if start == end {
            ranges.push(start.to_string());
        } else {
            ranges.push(format!("{start}-{end}"));
        }
    }
    ranges.join(",")
}
