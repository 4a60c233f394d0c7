//! Paged and delta collection traversal

pub mod iterator;
pub mod page;

pub use iterator::{PageIterator, PageIteratorBuilder, PageIteratorState, RequestConfigurator};
pub use page::{CollectionPage, ODataPage};
