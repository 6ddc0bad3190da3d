pub mod config;
pub mod html;
pub mod lemmatizer;
pub mod model;
pub mod store;

pub use model::{Lemma, LemmaId, NewPage, Occurrence, Page, PageId, Site, SiteId, SiteStatus};
