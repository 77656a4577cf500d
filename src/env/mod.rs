pub mod environment;
pub mod error;
pub mod fresh;

pub use environment::{Env, Fact, VarDecl, VarStatus};
pub use error::EnvError;
pub use fresh::NameGenerator;
