use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("octree has no root node")]
    EmptyOctree,

    #[error("node {node} has children at offset {offset}, outside the {len} nodes of the octree")]
    ChildOutOfBounds { node: usize, offset: u32, len: usize },

    #[error("node {node} does not exist in an octree of {len} nodes")]
    MissingNode { node: usize, len: usize },

    #[error("node {node} is reached from more than one parent")]
    Revisited { node: usize },

    #[error("traversal reached {reached} nodes, more than the {len} stored; child links do not form a tree")]
    NotATree { reached: usize, len: usize },

    #[error("{len} nodes do not fit in the 32 bit node count")]
    TooManyNodes { len: usize },

    #[error("truncated data: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("invalid grid: size {size:?} with {values} values")]
    InvalidGrid { size: [u32; 3], values: usize },

    #[error("obj line {line}: {message}")]
    Obj { line: usize, message: String },

    #[error("unable to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
