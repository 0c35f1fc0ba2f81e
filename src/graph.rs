use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::GraphError;
use crate::map::{Map, PunterId, RiverId, SiteId};

type EdgeMatrix = HashMap<SiteId, Vec<RiverId>>;

/// Hop distance from one site to every site reachable from it.
pub type DistanceMap = HashMap<SiteId, u64>;

/// A river together with its claim metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiverState {
    pub source: SiteId,
    pub target: SiteId,
    pub owner: Option<PunterId>,
    pub option: Option<PunterId>,
}

impl RiverState {
    pub fn other_side(&self, site: SiteId) -> SiteId {
        if site == self.source {
            self.target
        } else {
            debug_assert!(site == self.target);
            self.source
        }
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_optioned(&self) -> bool {
        self.option.is_some()
    }

    /// Whether `punter` may travel this river when scoring.
    pub fn held_by(&self, punter: PunterId) -> bool {
        self.owner == Some(punter) || self.option == Some(punter)
    }
}

/// Undirected game graph. The topology is fixed at construction, only the
/// owner and option of each river change afterwards.
#[derive(Debug, Clone)]
pub struct GameGraph {
    sites: Vec<SiteId>,
    rivers: Vec<RiverState>,

    // The edges represented as an incidence matrix:
    // for every site, we keep a list of all its rivers
    // The list of edges is sorted in increasing order of
    // river.other_side(site)
    edges: EdgeMatrix,
}

impl GameGraph {
    pub fn new(map: &Map) -> GameGraph {
        let rivers: Vec<RiverState> = map
            .rivers
            .iter()
            .map(|r| RiverState {
                source: r.source,
                target: r.target,
                owner: None,
                option: None,
            })
            .collect();

        let mut edges = EdgeMatrix::new();
        for site in &map.sites {
            edges.entry(site.id).or_insert_with(Vec::new);
        }
        for (idx, river) in rivers.iter().enumerate() {
            edges.entry(river.source).or_insert_with(Vec::new).push(idx);
            edges.entry(river.target).or_insert_with(Vec::new).push(idx);
        }
        // Sort the edges of each site by the id of the other side
        for (site, site_edges) in edges.iter_mut() {
            site_edges.sort_by_key(|river| rivers[*river].other_side(*site));
        }

        GameGraph {
            sites: map.sites.iter().map(|s| s.id).collect(),
            rivers,
            edges,
        }
    }

    pub fn sites(&self) -> &[SiteId] {
        &self.sites
    }

    pub fn rivers(&self) -> &[RiverState] {
        &self.rivers
    }

    pub fn river_count(&self) -> usize {
        self.rivers.len()
    }

    pub fn river(&self, id: RiverId) -> &RiverState {
        &self.rivers[id]
    }

    pub fn find_river(&self, source: SiteId, target: SiteId) -> Option<RiverId> {
        self.edges.get(&source).and_then(|rivers| {
            rivers
                .binary_search_by_key(&target, |river| self.rivers[*river].other_side(source))
                .map(|idx| rivers[idx])
                .ok()
        })
    }

    pub fn edge_exists(&self, a: SiteId, b: SiteId) -> bool {
        self.find_river(a, b).is_some()
    }

    pub fn edge_between(&self, a: SiteId, b: SiteId) -> Result<&RiverState, GraphError> {
        self.river_id(a, b).map(|id| &self.rivers[id])
    }

    pub fn river_id(&self, a: SiteId, b: SiteId) -> Result<RiverId, GraphError> {
        self.find_river(a, b).ok_or(GraphError::NotFound(a, b))
    }

    /// Hand the river to `punter`. Rule checks are up to the caller.
    pub fn mark_owned(&mut self, a: SiteId, b: SiteId, punter: PunterId) -> Result<(), GraphError> {
        let id = self.river_id(a, b)?;
        self.rivers[id].owner = Some(punter);
        Ok(())
    }

    /// Give `punter` the option on the river. Rule checks are up to the caller.
    pub fn mark_optioned(
        &mut self,
        a: SiteId,
        b: SiteId,
        punter: PunterId,
    ) -> Result<(), GraphError> {
        let id = self.river_id(a, b)?;
        self.rivers[id].option = Some(punter);
        Ok(())
    }

    /// Distances from `from` to every reachable site, ignoring ownership.
    pub fn shortest_path_tree(&self, from: SiteId) -> DistanceMap {
        // Since all edges have the same length of 1,
        // we can compute the shortest path using a simple
        // breadth-first search algorithm.
        let mut distances = DistanceMap::with_capacity(self.sites.len());
        if !self.edges.contains_key(&from) {
            return distances;
        }
        let mut que: VecDeque<SiteId> = VecDeque::with_capacity(self.sites.len());
        distances.insert(from, 0);
        que.push_back(from);
        while let Some(site) = que.pop_front() {
            let site_dist = distances[&site];
            for ridx in &self.edges[&site] {
                let neighbor = self.rivers[*ridx].other_side(site);
                distances.entry(neighbor).or_insert_with(|| {
                    que.push_back(neighbor);
                    site_dist + 1
                });
            }
        }
        distances
    }

    /// Sites reachable from `from` crossing only rivers for which `predicate`
    /// holds. Includes `from` itself when it is a site of this graph.
    pub fn reachable_under<F>(&self, from: SiteId, predicate: F) -> HashSet<SiteId>
    where
        F: Fn(&RiverState) -> bool,
    {
        let mut visited = HashSet::new();
        if !self.edges.contains_key(&from) {
            return visited;
        }
        let mut que: VecDeque<SiteId> = VecDeque::new();
        visited.insert(from);
        que.push_back(from);
        while let Some(site) = que.pop_front() {
            for ridx in &self.edges[&site] {
                let river = &self.rivers[*ridx];
                if !predicate(river) {
                    continue;
                }
                let neighbor = river.other_side(site);
                if visited.insert(neighbor) {
                    que.push_back(neighbor);
                }
            }
        }
        visited
    }
}
