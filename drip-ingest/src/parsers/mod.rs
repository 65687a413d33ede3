pub mod profiles;
pub mod snapshot;
