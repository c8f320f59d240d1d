pub mod error;
pub mod graph;
pub mod importer;
pub mod inspector;
pub mod introspection;
pub mod loader;
pub mod protos;
pub mod registry;
pub mod shape_inference;

pub use error::{GraphError, TensorQueryError};
pub use graph::{type_name_of, DataType, Graph, Operation, TensorSignature};
pub use inspector::inspect;
pub use introspection::{GraphIntrospection, Input, OpId, Output};
pub use loader::{load_graph_from_bytes, load_graph_from_path, load_graph_with_registry};
pub use registry::{OpRegistry, OpSignature, OutputArg, ShapeRule};
pub use shape_inference::Shape;
