pub mod models;
pub mod reader;
pub mod writer;

pub use models::PublishedRow;
pub use reader::{modified_ns, read_table};
pub use writer::{PublishReport, RecommendationSet, TableWriter};
