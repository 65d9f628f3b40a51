pub mod directory;

pub use directory::{InMemoryUserDirectory, User, UserDirectory, UserProfile};
