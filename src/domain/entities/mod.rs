pub mod collection_view;
pub mod mirror_record;
pub mod product;
pub mod schedule;

pub use collection_view::{CollectionView, MirrorChange, MirrorEntry};
pub use mirror_record::MirrorRecord;
pub use product::{PRODUCTS_COLLECTION, Product};
pub use schedule::{SCHEDULES_COLLECTION, Schedule};
