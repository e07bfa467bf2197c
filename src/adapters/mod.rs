// Adapters layer: concrete plugin implementations. Remote backends live in their own crates.

pub mod local;
