mod env;
pub use env::Env;

mod properties;
pub use properties::Properties;

pub mod constants;
