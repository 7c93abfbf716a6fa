//! Room-graph pathfinding using Dijkstra's algorithm.
//!
//! Rooms are joined by hallway chains of arbitrary length, so grid distance
//! between room tiles says nothing about traversal cost. The search therefore
//! runs with a zero heuristic. Rooms scarier than the party's current morale
//! cost more to enter, which bends routes around them while they remain
//! reachable.
//!
//! "No path" is an ordinary result (an empty vector), never an error.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::facility::{FacilityLayout, RoomId, TilePos};

/// Default cost multiplier for rooms scarier than current morale.
pub const DEFAULT_FEAR_COST_MULTIPLIER: u32 = 3;

/// Detours are accepted only when cheaper than this multiple of the direct route.
pub const DETOUR_FACTOR: u64 = 2;

/// A room as seen by the pathfinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Representative tile.
    pub position: TilePos,
    /// Fear level.
    pub fear_level: i32,
}

/// Directed half of a hallway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Destination room.
    pub to: RoomId,
    /// Cost before fear scaling.
    pub base_cost: u32,
}

/// Weighted room graph. Rebuilt from the layout for every search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonGraph {
    nodes: BTreeMap<RoomId, GraphNode>,
    adjacency: BTreeMap<RoomId, Vec<Edge>>,
}

impl DungeonGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a facility layout.
    ///
    /// Connections naming unknown rooms are skipped.
    #[must_use]
    pub fn from_layout(layout: &FacilityLayout) -> Self {
        let mut graph = Self::new();
        for room in &layout.rooms {
            graph.add_node(room.id, room.position, room.fear_level);
        }
        for conn in &layout.connections {
            graph.add_edge(conn.a, conn.b, conn.cost);
        }
        graph
    }

    /// Add or replace a room.
    pub fn add_node(&mut self, id: RoomId, position: TilePos, fear_level: i32) {
        self.nodes.insert(
            id,
            GraphNode {
                position,
                fear_level,
            },
        );
        self.adjacency.entry(id).or_default();
    }

    /// Add an undirected hallway. Returns `false` if either room is unknown.
    pub fn add_edge(&mut self, a: RoomId, b: RoomId, base_cost: u32) -> bool {
        if !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return false;
        }
        self.adjacency.entry(a).or_default().push(Edge { to: b, base_cost });
        self.adjacency.entry(b).or_default().push(Edge { to: a, base_cost });
        true
    }

    /// Look up a room.
    #[must_use]
    pub fn node(&self, id: RoomId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Outgoing hallways of a room.
    #[must_use]
    pub fn neighbors(&self, id: RoomId) -> &[Edge] {
        self.adjacency.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Number of rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph has no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cost of stepping along `edge` under `options`.
    fn step_cost(&self, edge: &Edge, options: &PathOptions) -> u64 {
        let base = u64::from(edge.base_cost);
        let fear = self.nodes.get(&edge.to).map_or(0, |n| n.fear_level);
        match options.morale {
            Some(morale) if fear > 0 && morale < fear => {
                base * u64::from(options.fear_cost_multiplier)
            }
            _ => base,
        }
    }

    /// Cheapest edge between two adjacent rooms.
    fn cheapest_edge(&self, from: RoomId, to: RoomId) -> Option<&Edge> {
        self.neighbors(from)
            .iter()
            .filter(|e| e.to == to)
            .min_by_key(|e| e.base_cost)
    }
}

/// Search options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOptions {
    /// Party morale; `None` ignores fear entirely.
    pub morale: Option<i32>,
    /// Multiplier for rooms with `fear_level > morale`.
    pub fear_cost_multiplier: u32,
    /// Rooms that may not be entered.
    pub blocked_nodes: BTreeSet<RoomId>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            morale: None,
            fear_cost_multiplier: DEFAULT_FEAR_COST_MULTIPLIER,
            blocked_nodes: BTreeSet::new(),
        }
    }
}

impl PathOptions {
    /// Options for a party with the given morale.
    #[must_use]
    pub fn with_morale(morale: i32) -> Self {
        Self {
            morale: Some(morale),
            ..Self::default()
        }
    }

    /// Builder method to block a room.
    #[must_use]
    pub fn blocking(mut self, room: RoomId) -> Self {
        self.blocked_nodes.insert(room);
        self
    }
}

/// Entry in the Dijkstra frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrontierNode {
    room: RoomId,
    cost: u64,
}

impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the cheapest pops first.
        match other.cost.cmp(&self.cost) {
            // Deterministic tie-breaking: lower room id first.
            Ordering::Equal => other.room.cmp(&self.room),
            ord => ord,
        }
    }
}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the cheapest room sequence from `start` to `goal`, both inclusive.
///
/// Returns an empty vector when either end is unknown or blocked, or when
/// no route exists.
#[must_use]
pub fn find_path(
    graph: &DungeonGraph,
    start: RoomId,
    goal: RoomId,
    options: &PathOptions,
) -> Vec<RoomId> {
    if graph.node(start).is_none() || graph.node(goal).is_none() {
        return Vec::new();
    }
    if options.blocked_nodes.contains(&start) || options.blocked_nodes.contains(&goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut frontier = BinaryHeap::new();
    let mut best: BTreeMap<RoomId, u64> = BTreeMap::new();
    let mut came_from: BTreeMap<RoomId, RoomId> = BTreeMap::new();

    best.insert(start, 0);
    frontier.push(FrontierNode {
        room: start,
        cost: 0,
    });

    while let Some(current) = frontier.pop() {
        if current.room == goal {
            return reconstruct_path(&came_from, start, goal);
        }
        if best.get(&current.room).is_some_and(|&c| current.cost > c) {
            // Stale entry.
            continue;
        }

        for edge in graph.neighbors(current.room) {
            if options.blocked_nodes.contains(&edge.to) {
                continue;
            }
            let tentative = current.cost + graph.step_cost(edge, options);
            let known = best.get(&edge.to).copied().unwrap_or(u64::MAX);
            if tentative < known {
                best.insert(edge.to, tentative);
                came_from.insert(edge.to, current.room);
                frontier.push(FrontierNode {
                    room: edge.to,
                    cost: tentative,
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct_path(came_from: &BTreeMap<RoomId, RoomId>, start: RoomId, goal: RoomId) -> Vec<RoomId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Total cost of walking `path` under `options`.
///
/// Returns `None` for an empty path or one that uses a missing hallway.
#[must_use]
pub fn path_cost(graph: &DungeonGraph, path: &[RoomId], options: &PathOptions) -> Option<u64> {
    if path.is_empty() {
        return None;
    }
    path.windows(2).try_fold(0u64, |total, pair| {
        graph
            .cheapest_edge(pair[0], pair[1])
            .map(|edge| total + graph.step_cost(edge, options))
    })
}

/// Block a room that just became impassable and search again.
///
/// The block persists in `options` for later searches.
#[must_use]
pub fn recalculate(
    graph: &DungeonGraph,
    start: RoomId,
    goal: RoomId,
    options: &mut PathOptions,
    newly_blocked: RoomId,
) -> Vec<RoomId> {
    options.blocked_nodes.insert(newly_blocked);
    tracing::debug!(%newly_blocked, %start, %goal, "Recalculating route around blocked room");
    find_path(graph, start, goal, options)
}

/// A secondary objective the route may pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Target room.
    pub room: RoomId,
    /// Higher is preferred.
    pub priority: i32,
}

/// A route to the goal, possibly via one objective.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutePlan {
    /// Rooms from start to goal inclusive; empty if the goal is unreachable.
    pub path: Vec<RoomId>,
    /// The objective room the route detours through, if any.
    pub via: Option<RoomId>,
    /// Total route cost.
    pub cost: u64,
}

/// Route to `goal`, detouring through the highest-priority waypoint whose
/// detour costs less than twice the direct route.
#[must_use]
pub fn find_with_objectives(
    graph: &DungeonGraph,
    start: RoomId,
    goal: RoomId,
    waypoints: &[Waypoint],
    options: &PathOptions,
) -> RoutePlan {
    let direct = find_path(graph, start, goal, options);
    let Some(direct_cost) = path_cost(graph, &direct, options) else {
        return RoutePlan::default();
    };

    let mut ordered: Vec<Waypoint> = waypoints.to_vec();
    // Highest priority first; lower room id breaks ties.
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.room.cmp(&b.room)));

    for waypoint in ordered {
        let first = find_path(graph, start, waypoint.room, options);
        let second = find_path(graph, waypoint.room, goal, options);
        let (Some(c1), Some(c2)) = (
            path_cost(graph, &first, options),
            path_cost(graph, &second, options),
        ) else {
            continue;
        };
        let detour_cost = c1 + c2;
        if detour_cost < DETOUR_FACTOR * direct_cost {
            let mut path = first;
            path.extend(second.into_iter().skip(1));
            return RoutePlan {
                path,
                via: Some(waypoint.room),
                cost: detour_cost,
            };
        }
    }

    RoutePlan {
        path: direct,
        via: None,
        cost: direct_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn r(id: u32) -> RoomId {
        RoomId(id)
    }

    fn graph_with(nodes: &[(u32, i32)], edges: &[(u32, u32, u32)]) -> DungeonGraph {
        let mut graph = DungeonGraph::new();
        for &(id, fear) in nodes {
            graph.add_node(r(id), TilePos::new(id as i32, 0), fear);
        }
        for &(a, b, cost) in edges {
            graph.add_edge(r(a), r(b), cost);
        }
        graph
    }

    #[test]
    fn test_trivial_edge() {
        let graph = graph_with(&[(1, 0), (2, 0)], &[(1, 2, 1)]);
        let path = find_path(&graph, r(1), r(2), &PathOptions::default());
        assert_eq!(path, vec![r(1), r(2)]);
    }

    #[test]
    fn test_disconnected_is_empty() {
        let graph = graph_with(&[(1, 0), (2, 0)], &[]);
        assert!(find_path(&graph, r(1), r(2), &PathOptions::default()).is_empty());
    }

    #[test]
    fn test_unknown_room_is_empty() {
        let graph = graph_with(&[(1, 0)], &[]);
        assert!(find_path(&graph, r(1), r(9), &PathOptions::default()).is_empty());
    }

    #[test]
    fn test_same_room() {
        let graph = graph_with(&[(1, 0)], &[]);
        assert_eq!(find_path(&graph, r(1), r(1), &PathOptions::default()), vec![r(1)]);
    }

    #[test]
    fn test_prefers_cheaper_long_route() {
        // 1 -> 2 -> 4 costs 2, 1 -> 3 -> 4 costs 20.
        let graph = graph_with(
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(1, 2, 1), (2, 4, 1), (1, 3, 10), (3, 4, 10)],
        );
        let path = find_path(&graph, r(1), r(4), &PathOptions::default());
        assert_eq!(path, vec![r(1), r(2), r(4)]);
    }

    #[test]
    fn test_fear_reroutes_low_morale() {
        // Room 2 is terrifying; room 3 is a slightly longer safe route.
        let graph = graph_with(
            &[(1, 0), (2, 5), (3, 0), (4, 0)],
            &[(1, 2, 2), (2, 4, 2), (1, 3, 3), (3, 4, 3)],
        );
        let brave = find_path(&graph, r(1), r(4), &PathOptions::with_morale(80));
        assert_eq!(brave, vec![r(1), r(2), r(4)]);

        let shaken = find_path(&graph, r(1), r(4), &PathOptions::with_morale(2));
        assert_eq!(shaken, vec![r(1), r(3), r(4)]);
    }

    #[test]
    fn test_blocked_nodes_are_avoided() {
        let graph = graph_with(
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(1, 2, 1), (2, 4, 1), (1, 3, 5), (3, 4, 5)],
        );
        let options = PathOptions::default().blocking(r(2));
        assert_eq!(find_path(&graph, r(1), r(4), &options), vec![r(1), r(3), r(4)]);
        let blocked_goal = PathOptions::default().blocking(r(4));
        assert!(find_path(&graph, r(1), r(4), &blocked_goal).is_empty());
    }

    #[test]
    fn test_recalculate_persists_block() {
        let graph = graph_with(
            &[(1, 0), (2, 0), (3, 0)],
            &[(1, 2, 1), (2, 3, 1)],
        );
        let mut options = PathOptions::default();
        let path = recalculate(&graph, r(1), r(3), &mut options, r(2));
        assert!(path.is_empty());
        assert!(options.blocked_nodes.contains(&r(2)));
    }

    #[test]
    fn test_path_cost() {
        let graph = graph_with(&[(1, 0), (2, 4), (3, 0)], &[(1, 2, 2), (2, 3, 3)]);
        let path = [r(1), r(2), r(3)];
        assert_eq!(path_cost(&graph, &path, &PathOptions::default()), Some(5));
        assert_eq!(path_cost(&graph, &path, &PathOptions::with_morale(1)), Some(9));
        assert_eq!(path_cost(&graph, &[], &PathOptions::default()), None);
        assert_eq!(path_cost(&graph, &[r(1), r(3)], &PathOptions::default()), None);
    }

    #[test]
    fn test_detour_accepted_when_cheap() {
        // Direct 1-2-3 costs 4; detour via 4 costs 2 + 3 = 5 < 8.
        let graph = graph_with(
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(1, 2, 2), (2, 3, 2), (1, 4, 2), (4, 3, 3)],
        );
        let plan = find_with_objectives(
            &graph,
            r(1),
            r(3),
            &[Waypoint { room: r(4), priority: 1 }],
            &PathOptions::default(),
        );
        assert_eq!(plan.via, Some(r(4)));
        assert_eq!(plan.path, vec![r(1), r(4), r(3)]);
        assert_eq!(plan.cost, 5);
    }

    #[test]
    fn test_detour_rejected_when_expensive() {
        // Direct costs 2; detour via 4 costs 10 + 10.
        let graph = graph_with(
            &[(1, 0), (2, 0), (4, 0)],
            &[(1, 2, 2), (1, 4, 10), (4, 2, 10)],
        );
        let plan = find_with_objectives(
            &graph,
            r(1),
            r(2),
            &[Waypoint { room: r(4), priority: 5 }],
            &PathOptions::default(),
        );
        assert_eq!(plan.via, None);
        assert_eq!(plan.path, vec![r(1), r(2)]);
    }

    #[test]
    fn test_detour_prefers_priority() {
        let graph = graph_with(
            &[(1, 0), (2, 0), (5, 0), (6, 0)],
            &[(1, 2, 4), (1, 5, 2), (5, 2, 2), (1, 6, 2), (6, 2, 3)],
        );
        let plan = find_with_objectives(
            &graph,
            r(1),
            r(2),
            &[
                Waypoint { room: r(5), priority: 1 },
                Waypoint { room: r(6), priority: 3 },
            ],
            &PathOptions::default(),
        );
        assert_eq!(plan.via, Some(r(6)));
    }

    #[test]
    fn test_unreachable_goal_gives_empty_plan() {
        let graph = graph_with(&[(1, 0), (2, 0)], &[]);
        let plan = find_with_objectives(&graph, r(1), r(2), &[], &PathOptions::default());
        assert!(plan.path.is_empty());
        assert_eq!(plan.via, None);
    }

    #[test]
    fn test_determinism() {
        let graph = graph_with(
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(1, 2, 1), (2, 4, 1), (1, 3, 1), (3, 4, 1)],
        );
        let first = find_path(&graph, r(1), r(4), &PathOptions::default());
        for _ in 0..20 {
            assert_eq!(find_path(&graph, r(1), r(4), &PathOptions::default()), first);
        }
        // Equal-cost routes resolve toward the lower room id.
        assert_eq!(first, vec![r(1), r(2), r(4)]);
    }

    proptest! {
        #[test]
        fn prop_fear_never_makes_routes_cheaper(
            fears in proptest::collection::vec(0i32..6, 6),
            edges in proptest::collection::vec((0u32..6, 0u32..6, 1u32..10), 4..14),
            morale in 0i32..6,
        ) {
            let nodes: Vec<(u32, i32)> = fears.iter().enumerate().map(|(i, &f)| (i as u32, f)).collect();
            let graph = graph_with(&nodes, &edges);
            let calm = PathOptions::default();
            let afraid = PathOptions::with_morale(morale);

            let calm_path = find_path(&graph, r(0), r(5), &calm);
            let afraid_path = find_path(&graph, r(0), r(5), &afraid);
            prop_assert_eq!(calm_path.is_empty(), afraid_path.is_empty());
            if let (Some(calm_cost), Some(afraid_cost)) = (
                path_cost(&graph, &calm_path, &calm),
                path_cost(&graph, &afraid_path, &afraid),
            ) {
                prop_assert!(afraid_cost >= calm_cost);
            }
        }
    }
}
