//! End-of-game scoring.
//!
//! Every site a punter connects to a mine through its own rivers (owned or
//! optioned) is worth the square of that site's distance from the mine, where
//! distance is measured on the whole map regardless of who owns what. A future
//! is worth the cube of its distance, gained if the bet came true and lost
//! otherwise.

use std::collections::HashMap;

use crate::graph::{DistanceMap, GameGraph};
use crate::map::{PunterId, SiteId};
use crate::protocol::{Future, Score};

pub type MineDistances = HashMap<SiteId, DistanceMap>;

/// Unrestricted distances from every mine, computed once per game.
pub fn mine_distances(graph: &GameGraph, mines: &[SiteId]) -> MineDistances {
    mines
        .iter()
        .map(|mine| (*mine, graph.shortest_path_tree(*mine)))
        .collect()
}

pub fn punter_score(
    graph: &GameGraph,
    mines: &[SiteId],
    distances: &MineDistances,
    punter: PunterId,
    futures: &[Future],
) -> i64 {
    let mut score: i64 = 0;
    for mine in mines {
        let dist = match distances.get(mine) {
            Some(dist) => dist,
            None => continue,
        };
        let reached = graph.reachable_under(*mine, |river| river.held_by(punter));
        for site in &reached {
            let d = dist.get(site).cloned().unwrap_or(0) as i64;
            score += d * d;
        }

        for future in futures.iter().filter(|f| f.source == *mine) {
            let d = dist.get(&future.target).cloned().unwrap_or(0) as i64;
            if reached.contains(&future.target) {
                score += d * d * d;
            } else {
                score -= d * d * d;
            }
        }
    }
    score
}

/// Scores for punters `0..punters`, in id order. `futures[p]` holds the bets of
/// punter `p`; missing entries count as no bets.
pub fn score(
    graph: &GameGraph,
    mines: &[SiteId],
    punters: usize,
    futures: &[Vec<Future>],
) -> Vec<Score> {
    let distances = mine_distances(graph, mines);
    (0..punters)
        .map(|punter| {
            let bets = futures.get(punter).map(|f| &f[..]).unwrap_or(&[]);
            Score {
                punter,
                score: punter_score(graph, mines, &distances, punter, bets),
            }
        })
        .collect()
}
