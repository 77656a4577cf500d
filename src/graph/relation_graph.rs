use crate::types::Variable;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Vertex ID (position in first-seen order)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexId(pub usize);

/// Vertex: a retained variable and the variables known to be above it
#[derive(Debug, Clone)]
pub struct VarVertex {
    pub id: VertexId,
    pub var: Variable,
    /// Upper neighbours, in the order their edges were added
    pub next_vtxs: SmallVec<[VertexId; 4]>,
    /// Number of distinct lower neighbours
    pub indegree: usize,
}

impl VarVertex {
    pub fn new(id: VertexId, var: Variable) -> Self {
        Self {
            id,
            var,
            next_vtxs: SmallVec::new(),
            indegree: 0,
        }
    }
}

/// Directed `lower -> upper` graph over a fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    vertices: Vec<VarVertex>,
    index: HashMap<Variable, VertexId>,
}

impl RelationGraph {
    /// Create a graph whose vertices are `vars`, in the given order
    pub fn new(vars: impl IntoIterator<Item = Variable>) -> Self {
        let mut graph = Self::default();
        for var in vars {
            if graph.index.contains_key(&var) {
                continue;
            }
            let id = VertexId(graph.vertices.len());
            graph.index.insert(var.clone(), id);
            graph.vertices.push(VarVertex::new(id, var));
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn get_vertex(&self, var: &Variable) -> Option<&VarVertex> {
        self.index.get(var).map(|id| &self.vertices[id.0])
    }

    /// Add edge. Self-loops, duplicate edges and unknown variables are ignored.
    pub fn add_edge(&mut self, lower: &Variable, upper: &Variable) {
        let (Some(&src), Some(&dst)) = (self.index.get(lower), self.index.get(upper)) else {
            return;
        };
        if src == dst || self.vertices[src.0].next_vtxs.contains(&dst) {
            return;
        }
        self.vertices[src.0].next_vtxs.push(dst);
        self.vertices[dst.0].indegree += 1;
    }

    /// Lower variables before upper ones.
    ///
    /// A vertex without edges keeps its first-seen position. The other
    /// positions are filled, in order, by Kahn's algorithm over the vertices
    /// with edges, using a LIFO ready stack: vertices that become ready
    /// together are pushed in first-seen order and the top is emitted first.
    /// When a cycle leaves nothing ready, the earliest remaining vertex is
    /// emitted. The result depends on the edge set, not on edge order.
    pub fn ordered(&self) -> Vec<Variable> {
        let n = self.vertices.len();
        let related: Vec<bool> = self
            .vertices
            .iter()
            .map(|v| v.indegree > 0 || !v.next_vtxs.is_empty())
            .collect();

        let mut related_order = self.kahn_order(&related).into_iter();
        let mut order = Vec::with_capacity(n);
        for vertex in &self.vertices {
            let id = if related[vertex.id.0] {
                match related_order.next() {
                    Some(id) => id,
                    None => break,
                }
            } else {
                vertex.id
            };
            order.push(self.vertices[id.0].var.clone());
        }
        order
    }

    fn kahn_order(&self, related: &[bool]) -> Vec<VertexId> {
        let n = self.vertices.len();
        let total = related.iter().filter(|&&r| r).count();
        let mut indegree: Vec<usize> = self.vertices.iter().map(|v| v.indegree).collect();
        let mut emitted = vec![false; n];
        let mut stack: Vec<VertexId> = self
            .vertices
            .iter()
            .filter(|v| related[v.id.0] && v.indegree == 0)
            .map(|v| v.id)
            .collect();
        let mut order = Vec::with_capacity(total);

        while order.len() < total {
            let Some(id) = stack
                .pop()
                .or_else(|| (0..n).find(|&i| related[i] && !emitted[i]).map(VertexId))
            else {
                break;
            };
            if emitted[id.0] {
                continue;
            }
            emitted[id.0] = true;
            order.push(id);

            let mut ready: SmallVec<[VertexId; 4]> = SmallVec::new();
            for &next in &self.vertices[id.0].next_vtxs {
                if emitted[next.0] {
                    continue;
                }
                indegree[next.0] = indegree[next.0].saturating_sub(1);
                if indegree[next.0] == 0 {
                    ready.push(next);
                }
            }
            ready.sort_by_key(|id| id.0);
            stack.extend(ready);
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(vars: &[Variable]) -> Vec<&str> {
        vars.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn test_ordered_without_edges_keeps_first_seen() {
        let graph = RelationGraph::new([Variable::lt("a"), Variable::lt("b"), Variable::lt("c")]);
        assert_eq!(names(&graph.ordered()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unrelated_vertices_keep_their_position() {
        let (x, i, y, j, k) = (
            Variable::lt("x"),
            Variable::lt("I"),
            Variable::ty("y"),
            Variable::lt("J"),
            Variable::lt("K"),
        );
        let mut graph = RelationGraph::new([x, i.clone(), y, j.clone(), k.clone()]);
        graph.add_edge(&i, &k);
        graph.add_edge(&j, &k);

        // `I`, `J` and `K` fill their slots lower-first; `x` and `y` stay put
        assert_eq!(names(&graph.ordered()), vec!["x", "J", "y", "I", "K"]);
    }

    #[test]
    fn test_ordered_diamond() {
        let (i, j, k, l) = (
            Variable::lt("I"),
            Variable::lt("J"),
            Variable::lt("K"),
            Variable::lt("L"),
        );
        let mut graph = RelationGraph::new([i.clone(), j.clone(), k.clone(), l.clone()]);
        graph.add_edge(&i, &k);
        graph.add_edge(&j, &k);
        graph.add_edge(&k, &l);

        assert_eq!(names(&graph.ordered()), vec!["J", "I", "K", "L"]);
        assert_eq!(graph.get_vertex(&k).unwrap().indegree, 2);
    }

    #[test]
    fn test_ordered_breaks_cycles() {
        let (a, b, c) = (Variable::lt("a"), Variable::lt("b"), Variable::lt("c"));
        let mut graph = RelationGraph::new([a.clone(), b.clone(), c.clone()]);
        graph.add_edge(&a, &b);
        graph.add_edge(&b, &a);
        graph.add_edge(&b, &c);

        // No vertex is ready: `a` is picked first, which frees `b`, then `c`
        assert_eq!(names(&graph.ordered()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_edge_ignores_loops_and_duplicates() {
        let (a, b) = (Variable::lt("a"), Variable::lt("b"));
        let mut graph = RelationGraph::new([a.clone(), b.clone()]);
        graph.add_edge(&a, &a);
        graph.add_edge(&a, &b);
        graph.add_edge(&a, &b);
        graph.add_edge(&a, &Variable::lt("zzz"));

        assert_eq!(graph.get_vertex(&a).unwrap().next_vtxs.len(), 1);
        assert_eq!(graph.get_vertex(&b).unwrap().indegree, 1);
        assert_eq!(names(&graph.ordered()), vec!["a", "b"]);
    }
}
