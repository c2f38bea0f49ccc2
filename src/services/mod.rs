pub mod categories;
pub mod comments;
pub mod posts;
pub mod reactions;
pub mod tags;
pub mod users;
