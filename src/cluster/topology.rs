use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::{ContainerIdentity, NodeAddress, Role};
use crate::errors::{ClusterError, ClusterResult};

/// One master and an ordered list of workers, all distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterTopology {
    master: NodeAddress,
    workers: Vec<NodeAddress>,
}

impl ClusterTopology {
    pub fn new(master: NodeAddress, workers: Vec<NodeAddress>) -> ClusterResult<Self> {
        let mut seen = HashSet::new();
        seen.insert(&master);
        for worker in &workers {
            if worker == &master {
                return Err(ClusterError::InvalidTopology(format!(
                    "master {} is also listed as a worker",
                    master
                )));
            }
            if !seen.insert(worker) {
                return Err(ClusterError::InvalidTopology(format!(
                    "worker {} is listed more than once",
                    worker
                )));
            }
        }
        Ok(Self { master, workers })
    }

    /// Validates raw caller input.
    pub fn parse<S: AsRef<str>>(master: &str, workers: &[S]) -> ClusterResult<Self> {
        let master = NodeAddress::parse(master)?;
        let workers = workers
            .iter()
            .map(|w| NodeAddress::parse(w.as_ref()))
            .collect::<ClusterResult<Vec<_>>>()?;
        Self::new(master, workers)
    }

    pub fn master(&self) -> &NodeAddress {
        &self.master
    }

    pub fn workers(&self) -> &[NodeAddress] {
        &self.workers
    }

    /// Every node with its container name, master first then workers in order.
    pub fn containers(&self) -> Vec<PlannedContainer> {
        std::iter::once((&self.master, Role::Master))
            .chain(self.workers.iter().map(|w| (w, Role::Worker)))
            .map(|(address, role)| PlannedContainer {
                address: address.clone(),
                identity: ContainerIdentity::resolve(address, role),
                role,
            })
            .collect()
    }

    /// Like [`containers`](Self::containers), but fails if two nodes would
    /// end up with the same container name.
    pub fn resolve_containers(&self) -> ClusterResult<Vec<PlannedContainer>> {
        let containers = self.containers();

        let mut claimed: HashMap<&ContainerIdentity, &NodeAddress> = HashMap::new();
        for container in &containers {
            if let Some(first) = claimed.insert(&container.identity, &container.address) {
                return Err(ClusterError::NamingCollision {
                    identity: container.identity.to_string(),
                    first: first.to_string(),
                    second: container.address.to_string(),
                });
            }
        }

        Ok(containers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedContainer {
    pub address: NodeAddress,
    pub identity: ContainerIdentity,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameResolutionEntry {
    pub address: NodeAddress,
    pub label: String,
}

impl fmt::Display for NameResolutionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.label)
    }
}

/// Lines every container gets in its hosts file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NameResolutionTable(Vec<NameResolutionEntry>);

impl NameResolutionTable {
    pub fn entries(&self) -> &[NameResolutionEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `address label` lines joined by newlines.
    pub fn render(&self) -> String {
        self.0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    }
}

/// Everything derived from a topology before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyPlan {
    containers: Vec<PlannedContainer>,
    name_resolution: NameResolutionTable,
}

impl TopologyPlan {
    pub fn plan(topology: &ClusterTopology, alias_prefix: &str) -> ClusterResult<Self> {
        let containers = topology.resolve_containers()?;

        let master = &containers[0];
        let entry = |address: &NodeAddress, label: String| NameResolutionEntry {
            address: address.clone(),
            label,
        };

        let mut entries = vec![
            entry(&master.address, format!("{}{}", alias_prefix, master.address.last_char())),
            entry(&master.address, master.identity.to_string()),
            entry(&master.address, "master".to_string()),
        ];
        entries.extend(
            containers[1..]
                .iter()
                .map(|worker| entry(&worker.address, worker.identity.to_string())),
        );

        Ok(Self {
            containers,
            name_resolution: NameResolutionTable(entries),
        })
    }

    pub fn master(&self) -> &PlannedContainer {
        &self.containers[0]
    }

    pub fn workers(&self) -> &[PlannedContainer] {
        &self.containers[1..]
    }

    /// Master first, then workers in input order.
    pub fn containers(&self) -> &[PlannedContainer] {
        &self.containers
    }

    pub fn identities(&self) -> Vec<ContainerIdentity> {
        self.containers.iter().map(|c| c.identity.clone()).collect()
    }

    pub fn name_resolution(&self) -> &NameResolutionTable {
        &self.name_resolution
    }

    /// Content of Hadoop's slaves file: worker names only, one per line.
    pub fn worker_list(&self) -> String {
        self.workers()
            .iter()
            .map(|w| w.identity.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(master: &str, workers: &[&str]) -> ClusterTopology {
        ClusterTopology::parse(master, workers).unwrap()
    }

    #[test]
    fn plans_the_reference_cluster() {
        let plan = TopologyPlan::plan(&topology("198.51.100.10", &["198.51.100.11", "198.51.100.12"]), "g4s").unwrap();

        let names: Vec<_> = plan.identities().iter().map(|i| i.to_string()).collect();
        assert_eq!(names, ["master-10", "slave-11", "slave-12"]);
        assert_eq!(plan.worker_list(), "slave-11\nslave-12");
        assert_eq!(plan.name_resolution().len(), 5);
        assert_eq!(
            plan.name_resolution().render(),
            "198.51.100.10 g4s0\n\
             198.51.100.10 master-10\n\
             198.51.100.10 master\n\
             198.51.100.11 slave-11\n\
             198.51.100.12 slave-12"
        );
    }

    #[test]
    fn table_size_tracks_worker_count() {
        let workers = ["10.0.0.21", "10.0.0.22", "10.0.0.23", "10.0.0.24"];
        for n in 0..=workers.len() {
            let plan = TopologyPlan::plan(&topology("10.0.0.20", &workers[..n]), "g4s").unwrap();
            let table = plan.name_resolution();
            assert_eq!(table.len(), 3 + n);
            let labels: Vec<_> = table.entries()[..3].iter().map(|e| e.label.as_str()).collect();
            assert_eq!(labels, ["g4s0", "master-20", "master"]);
        }
    }

    #[test]
    fn master_only_cluster_has_empty_worker_list() {
        let plan = TopologyPlan::plan(&topology("10.0.0.20", &[]), "g4s").unwrap();
        assert_eq!(plan.worker_list(), "");
        assert!(plan.workers().is_empty());
    }

    #[test]
    fn detects_naming_collisions() {
        let err = TopologyPlan::plan(&topology("10.0.0.20", &["10.0.1.21", "10.0.2.21"]), "g4s").unwrap_err();
        match err {
            ClusterError::NamingCollision { identity, first, second } => {
                assert_eq!(identity, "slave-21");
                assert_eq!(first, "10.0.1.21");
                assert_eq!(second, "10.0.2.21");
            }
            other => panic!("expected NamingCollision, got {:?}", other),
        }
    }

    #[test]
    fn master_and_worker_may_share_a_suffix() {
        // different role prefixes keep them apart
        assert!(TopologyPlan::plan(&topology("10.0.0.20", &["10.0.1.20"]), "g4s").is_ok());
    }

    #[test]
    fn rejects_duplicate_addresses() {
        assert!(matches!(
            ClusterTopology::parse("10.0.0.20", &["10.0.0.20"]),
            Err(ClusterError::InvalidTopology(_))
        ));
        assert!(matches!(
            ClusterTopology::parse("10.0.0.20", &["10.0.0.21", "10.0.0.21"]),
            Err(ClusterError::InvalidTopology(_))
        ));
    }
}
