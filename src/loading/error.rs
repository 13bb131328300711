use std::io;

use thiserror::Error;

use super::parser_target::FileLoc;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal scene-construction errors. Recoverable problems are logged by the
/// target that detects them and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// A scope was closed by the wrong kind of End directive.
    #[error("{loc}: Mismatched nesting: open {open} from {open_loc} at {directive}")]
    MismatchedNesting {
        loc: FileLoc,
        open: &'static str,
        open_loc: FileLoc,
        directive: &'static str,
    },

    #[error("{loc}: ObjectEnd called outside of instance definition")]
    ObjectEndOutsideDefinition { loc: FileLoc },

    #[error("{loc}: ObjectBegin called inside of instance definition")]
    NestedObjectDefinition { loc: FileLoc },

    #[error("{loc}: ObjectInstance can't be called inside instance definition")]
    ObjectInstanceInsideDefinition { loc: FileLoc },

    #[error("{loc}: {name}: trying to redefine an object instance")]
    ObjectRedefined { loc: FileLoc, name: String },

    #[error("{loc}: {name}: named material redefined")]
    NamedMaterialRedefined { loc: FileLoc, name: String },

    #[error("{loc}: Named medium \"{name}\" redefined")]
    NamedMediumRedefined { loc: FileLoc, name: String },

    #[error("{loc}: Redefining texture \"{name}\"")]
    TextureRedefined { loc: FileLoc, name: String },

    #[error("{loc}: Unknown attribute target \"{target}\". Must be \"shape\", \"light\", \"material\", \"medium\", or \"texture\"")]
    UnknownAttributeTarget { loc: FileLoc, target: String },

    #[error("{loc}: {ty}: texture type unknown. Must be \"float\" or \"spectrum\"")]
    UnknownTextureType { loc: FileLoc, ty: String },

    #[error("{loc}: \"{ty}\": unknown type for parameter \"{name}\"")]
    UnknownParameterType {
        loc: FileLoc,
        ty: String,
        name: String,
    },

    /// Wrong value kind or count for a parameter.
    #[error("{loc}: parameter \"{name}\": {message}")]
    InvalidParameterValues {
        loc: FileLoc,
        name: String,
        message: String,
    },

    #[error("{loc}: {name}: unknown option")]
    UnknownOption { loc: FileLoc, name: String },

    #[error("{loc}: {value}: invalid value for option \"{name}\"")]
    InvalidOptionValue {
        loc: FileLoc,
        name: String,
        value: String,
    },

    #[error("{loc}: {name}: \"string type\" not provided in named material's parameters")]
    MissingMaterialType { loc: FileLoc, name: String },

    #[error("{loc}: {name}: material type unknown")]
    UnknownMaterial { loc: FileLoc, name: String },

    #[error("{loc}: Couldn't find {kind} texture \"{name}\"")]
    TextureNotFound {
        loc: FileLoc,
        kind: &'static str,
        name: String,
    },

    /// Old-style syntax that has no automatic translation.
    #[error("{loc}: {message}")]
    UpgradeFailed { loc: FileLoc, message: String },

    #[error("Failed to write output")]
    Io(#[from] io::Error),

    #[error("Scene construction was aborted by an earlier error")]
    Aborted,
}
