mod env;

pub use env::Environment;
