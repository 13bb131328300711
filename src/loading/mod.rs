//! Turns a stream of scene directives into a `BasicScene`, or back into
//! text.

pub mod builder;
pub mod entity;
pub mod error;
pub mod formatter;
pub mod paramdict;
pub mod parser_target;
pub mod scene;
pub mod transform_cache;

pub use builder::BasicSceneBuilder;
pub use formatter::FormattingTarget;
pub use parser_target::{replay, Directive, FileLoc, ParserTarget};
pub use scene::BasicScene;
