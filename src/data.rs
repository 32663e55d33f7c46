/// Elements as they appear in the .osm file, read one at a time.
pub mod osm;
/// Flat rows as they are written to the relational tables.
pub mod records;

pub use self::records::{NodeRecord, ShapedElement, TagRecord, WayNodeRecord, WayRecord};
