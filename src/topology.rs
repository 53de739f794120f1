use crate::errors::{LaunchError, Result};
use tracing::warn;

/// Default worker count when a node entry carries none, or carries one
/// that does not parse as a positive integer.
pub const DEFAULT_WORKERS: u32 = 1;

/// One remote node and the number of trainer workers it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub host: String,
    pub workers: u32,
}

/// Ordered mapping from host name to worker count.
///
/// Declaration order is preserved; the first entry is the primary node
/// that receives the distributed launcher invocation. Resolution
/// guarantees at least one entry and a worker count of at least 1 per
/// node, so downstream code never sees an empty or zero-worker
/// topology.
///
/// # Examples
///
/// ```
/// use trainlaunch::NodeTopology;
///
/// let specs = ["gpu-a,2".to_string(), "gpu-b".to_string()];
/// let topology = NodeTopology::resolve(&specs).unwrap();
///
/// assert_eq!(topology.primary().host, "gpu-a");
/// assert_eq!(topology.primary().workers, 2);
/// assert_eq!(topology.worker_count("gpu-b"), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct NodeTopology {
    nodes: Vec<Node>,
}

impl NodeTopology {
    /// Resolve a raw node specification list into an ordered topology.
    ///
    /// Each entry is either `"host"` or `"host,count"`. A count that is
    /// present but not a valid positive integer falls back to
    /// [`DEFAULT_WORKERS`] rather than failing the whole resolution: a
    /// single malformed entry must not abort topology construction.
    /// A host that appears twice keeps its first position and takes
    /// the later count.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::EmptyTopology` if no usable node entries
    /// are supplied.
    pub fn resolve(specs: &[String]) -> Result<Self> {
        let mut nodes: Vec<Node> = Vec::with_capacity(specs.len());

        for spec in specs {
            let (host, count) = match spec.split_once(',') {
                Some((host, raw)) => {
                    let count = match raw.trim().parse::<u32>() {
                        Ok(n) if n >= 1 => n,
                        _ => {
                            warn!(
                                entry = %spec,
                                default = DEFAULT_WORKERS,
                                "Malformed worker count, using default"
                            );
                            DEFAULT_WORKERS
                        }
                    };
                    (host.trim(), count)
                }
                None => (spec.trim(), DEFAULT_WORKERS),
            };

            if host.is_empty() {
                warn!(entry = %spec, "Skipping node entry with empty host");
                continue;
            }

            match nodes.iter_mut().find(|n| n.host == host) {
                Some(existing) => existing.workers = count,
                None => nodes.push(Node {
                    host: host.to_string(),
                    workers: count,
                }),
            }
        }

        if nodes.is_empty() {
            return Err(LaunchError::EmptyTopology);
        }

        Ok(Self { nodes })
    }

    /// The primary node: the first entry in declaration order.
    pub fn primary(&self) -> &Node {
        // resolve() guarantees at least one node.
        &self.nodes[0]
    }

    /// Worker count for a host, if it is part of the topology.
    pub fn worker_count(&self, host: &str) -> Option<u32> {
        self.nodes.iter().find(|n| n.host == host).map(|n| n.workers)
    }

    /// Whether this run needs the multi-process launcher wrapper:
    /// more than one node, or more than one worker on the primary.
    pub fn is_distributed(&self) -> bool {
        self.nodes.len() > 1 || self.primary().workers > 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}
