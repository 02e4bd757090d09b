mod attributes;
mod keys;
mod simple;

pub use attributes::*;
pub use keys::*;
pub use simple::*;
