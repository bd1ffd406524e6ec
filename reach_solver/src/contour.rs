//! Boundary extraction over a boolean cell mask (marching squares).
//!
//! The mask is padded with one ring of empty cells so every boundary is a
//! closed loop. Vertices sit on edge midpoints between lattice points, which
//! makes every vertex shared by exactly two segments. Saddle squares are
//! resolved by separating the two set corners.

use std::collections::HashMap;

use glam::DVec2;
use serde::Serialize;

use crate::geometry::point_in_polygon;

/// One closed boundary in arm coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contour {
    /// Loop vertices; the last connects back to the first.
    pub points: Vec<DVec2>,
    /// Encloses an unset region inside a set one.
    pub is_hole: bool,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Lattice edge between two neighbouring lattice points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Edge {
    /// From `(i, j)` to `(i + 1, j)`.
    H(isize, isize),
    /// From `(i, j)` to `(i, j + 1)`.
    V(isize, isize),
}

impl Edge {
    fn midpoint(self) -> DVec2 {
        match self {
            Edge::H(i, j) => DVec2::new(i as f64 + 0.5, j as f64),
            Edge::V(i, j) => DVec2::new(i as f64, j as f64 + 0.5),
        }
    }
}

const UNLINKED: usize = usize::MAX;

struct Graph {
    index: HashMap<Edge, usize>,
    vertices: Vec<Edge>,
    links: Vec<[usize; 2]>,
}

impl Graph {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            vertices: Vec::new(),
            links: Vec::new(),
        }
    }

    fn vertex(&mut self, edge: Edge) -> usize {
        *self.index.entry(edge).or_insert_with(|| {
            self.vertices.push(edge);
            self.links.push([UNLINKED; 2]);
            self.vertices.len() - 1
        })
    }

    fn link_one(&mut self, from: usize, to: usize) {
        let slot = &mut self.links[from];
        if slot[0] == UNLINKED {
            slot[0] = to;
        } else {
            slot[1] = to;
        }
    }

    fn segment(&mut self, a: Edge, b: Edge) {
        let (ia, ib) = (self.vertex(a), self.vertex(b));
        self.link_one(ia, ib);
        self.link_one(ib, ia);
    }

    /// Walk every loop, in first-vertex order.
    fn loops(&self) -> Vec<Vec<DVec2>> {
        let mut visited = vec![false; self.vertices.len()];
        let mut out = Vec::new();
        for start in 0..self.vertices.len() {
            if visited[start] {
                continue;
            }
            let mut ring = Vec::new();
            let mut prev = UNLINKED;
            let mut cur = start;
            loop {
                visited[cur] = true;
                ring.push(self.vertices[cur].midpoint());
                let [a, b] = self.links[cur];
                let next = if a != prev { a } else { b };
                if next == start || next == UNLINKED {
                    break;
                }
                prev = cur;
                cur = next;
            }
            out.push(ring);
        }
        out
    }
}

/// Drop vertices lying on a straight run.
fn simplify(ring: Vec<DVec2>) -> Vec<DVec2> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    let mut out = Vec::with_capacity(n);
    for k in 0..n {
        let prev = ring[(k + n - 1) % n];
        let cur = ring[k];
        let next = ring[(k + 1) % n];
        if (cur - prev).perp_dot(next - cur).abs() > 1e-12 {
            out.push(cur);
        }
    }
    out
}

/// Extract closed boundaries of the set cells.
///
/// `mask` is row-major with `width` cells per row. Cell `(i, j)` sits at
/// `(i * step, (height / 2 - j) * step)`; contour vertices use the same
/// mapping.
pub fn extract(mask: &[bool], width: usize, height: usize, step: f64) -> Vec<Contour> {
    debug_assert_eq!(mask.len(), width * height);
    let (w, h) = (width as isize, height as isize);
    let at = |i: isize, j: isize| -> bool {
        i >= 0 && j >= 0 && i < w && j < h && mask[(j * w + i) as usize]
    };

    let mut graph = Graph::new();
    for j in -1..h {
        for i in -1..w {
            let code = (at(i, j) as u8)
                | (at(i + 1, j) as u8) << 1
                | (at(i + 1, j + 1) as u8) << 2
                | (at(i, j + 1) as u8) << 3;
            let top = Edge::H(i, j);
            let right = Edge::V(i + 1, j);
            let bottom = Edge::H(i, j + 1);
            let left = Edge::V(i, j);
            match code {
                0 | 15 => {}
                5 => {
                    graph.segment(top, left);
                    graph.segment(right, bottom);
                }
                10 => {
                    graph.segment(top, right);
                    graph.segment(bottom, left);
                }
                _ => {
                    let c0 = code & 1 != 0;
                    let c1 = code & 2 != 0;
                    let c2 = code & 4 != 0;
                    let c3 = code & 8 != 0;
                    let mut crossing = [top; 2];
                    let mut n = 0;
                    for (edge, crosses) in [(top, c0 != c1), (right, c1 != c2), (bottom, c3 != c2), (left, c0 != c3)] {
                        if crosses {
                            crossing[n] = edge;
                            n += 1;
                        }
                    }
                    graph.segment(crossing[0], crossing[1]);
                }
            }
        }
    }

    let rings: Vec<Vec<DVec2>> = graph.loops().into_iter().map(simplify).collect();

    let half = height as f64 / 2.0;
    rings
        .iter()
        .enumerate()
        .map(|(k, ring)| {
            let depth = rings
                .iter()
                .enumerate()
                .filter(|&(other, poly)| other != k && point_in_polygon(ring[0], poly))
                .count();
            Contour {
                points: ring
                    .iter()
                    .map(|p| DVec2::new(p.x * step, (half - p.y) * step))
                    .collect(),
                is_hole: depth % 2 == 1,
            }
        })
        .collect()
}
