//! Test data builders

mod scene;

pub use scene::SceneMatchBuilder;
