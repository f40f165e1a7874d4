pub mod health;
pub mod line;

pub use health::DatabaseHealth;
pub use line::LineRecord;
