mod errors;
pub mod forms;
mod models;
pub mod rules;
pub mod services;
pub mod shell;
pub mod slots;
pub mod validator;

pub use errors::*;
pub use forms::{FormDefinition, FormRegistry};
pub use models::*;
pub use shell::*;
pub use slots::*;
pub use validator::*;
