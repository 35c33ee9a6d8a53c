pub mod asset;

pub use asset::Entity as Asset;
