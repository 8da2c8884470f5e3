pub mod backend;
pub mod frontend;
pub mod transform;

pub use backend::Backend;
pub use frontend::Frontend;
pub use transform::{optimize, Transform, TransformPipeline, TransformResult, PASS_NAMES};
