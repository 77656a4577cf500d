pub mod relation_graph;

pub use relation_graph::{RelationGraph, VarVertex, VertexId};
