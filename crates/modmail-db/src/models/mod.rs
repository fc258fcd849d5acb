//! Database models with SQLx `FromRow` derives

mod thread;

pub use thread::ThreadModel;
