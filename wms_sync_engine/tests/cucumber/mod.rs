mod setups;
mod steps;
mod sync_world;

pub use sync_world::SyncWorld;
