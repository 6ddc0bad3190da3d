use crate::model::{Lemma, LemmaId, NewPage, Occurrence, Page, PageId, Site, SiteId, SiteStatus};
use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use time::OffsetDateTime;

/// Persistent storage for sites, pages, lemmas and occurrences.
///
/// Every call commits before returning. Deleting a site removes its pages,
/// lemmas and their occurrences.
pub trait Store: Send + Sync {
    /// Creates a site row, replacing (with cascade) any site already stored under `url`.
    fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site>;
    /// Fails when the site was deleted in the meantime.
    fn update_site(&self, site: &Site) -> Result<()>;
    fn find_site(&self, id: SiteId) -> Result<Option<Site>>;
    fn find_site_by_url(&self, url: &str) -> Result<Option<Site>>;
    fn list_sites(&self) -> Result<Vec<Site>>;
    fn delete_site_cascade(&self, id: SiteId) -> Result<()>;

    fn insert_pages(&self, site_id: SiteId, pages: Vec<NewPage>) -> Result<Vec<Page>>;
    fn find_page(&self, id: PageId) -> Result<Option<Page>>;
    fn find_pages_by_site(&self, site_id: SiteId) -> Result<Vec<Page>>;
    fn count_pages(&self, site_id: SiteId) -> Result<usize>;

    /// Inserts `(form, frequency)` pairs for one site.
    fn insert_lemmas(&self, site_id: SiteId, lemmas: Vec<(String, u32)>) -> Result<Vec<Lemma>>;
    fn find_lemmas_by_site(&self, site_id: SiteId) -> Result<Vec<Lemma>>;
    fn find_lemmas_by_site_matching_forms(&self, site_id: SiteId, forms: &[String]) -> Result<Vec<Lemma>>;
    fn count_lemmas(&self, site_id: SiteId) -> Result<usize>;

    fn insert_occurrences(&self, occurrences: &[Occurrence]) -> Result<()>;
    /// Distinct pages holding an occurrence of any of `lemma_ids`, ordered by id.
    fn find_pages_by_lemma_set(&self, lemma_ids: &[LemmaId]) -> Result<Vec<Page>>;
    fn find_occurrences_by_pages_and_lemmas(&self, page_ids: &[PageId], lemma_ids: &[LemmaId]) -> Result<Vec<Occurrence>>;

    /// Drops every stored site.
    fn clear(&self) -> Result<()>;
}

/// [`Store`] over an embedded sled database.
///
/// Values are bincode; keys are big-endian ids so prefix scans group by owner:
/// `site_pages` = site ++ page, `site_lemmas` = site ++ form, `occurrences` = lemma ++ page.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    sites: sled::Tree,
    site_urls: sled::Tree,
    pages: sled::Tree,
    site_pages: sled::Tree,
    lemmas: sled::Tree,
    site_lemmas: sled::Tree,
    occurrences: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening store at {}", path.display()))?;
        Self::from_db(db)
    }

    /// Store that lives only as long as the process.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            sites: db.open_tree("sites")?,
            site_urls: db.open_tree("site_urls")?,
            pages: db.open_tree("pages")?,
            site_pages: db.open_tree("site_pages")?,
            lemmas: db.open_tree("lemmas")?,
            site_lemmas: db.open_tree("site_lemmas")?,
            occurrences: db.open_tree("occurrences")?,
            db,
        })
    }

    fn next_id(&self) -> Result<u64> {
        // sled ids start at zero; keep zero free so ids are always truthy in logs
        Ok(self.db.generate_id()? + 1)
    }

    fn commit(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(tree: &sled::Tree, id: u64) -> Result<Option<T>> {
        match tree.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn owned_ids(tree: &sled::Tree, owner: u64) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in tree.scan_prefix(owner.to_be_bytes()) {
            let (key, value) = entry?;
            // site_pages carries the id in the key, site_lemmas in the value
            let raw = if value.is_empty() { &key[8..] } else { &value[..] };
            ids.push(read_id(raw)?);
        }
        Ok(ids)
    }
}

fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

fn form_key(site_id: SiteId, form: &str) -> Vec<u8> {
    let mut key = site_id.to_be_bytes().to_vec();
    key.extend_from_slice(form.as_bytes());
    key
}

fn read_id(raw: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = raw.get(..8).and_then(|b| b.try_into().ok()).ok_or_else(|| anyhow!("corrupt id key"))?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

#[inline]
fn rank_to_bytes(rank: f32) -> [u8; 4] { rank.to_bits().to_be_bytes() }
#[inline]
fn rank_from_bytes(raw: &[u8]) -> Result<f32> {
    let bytes: [u8; 4] = raw.try_into().map_err(|_| anyhow!("corrupt rank"))?;
    Ok(f32::from_bits(u32::from_be_bytes(bytes)))
}

impl Store for SledStore {
    fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site> {
        if let Some(old) = self.find_site_by_url(url)? {
            self.delete_site_cascade(old.id)?;
        }
        let site = Site {
            id: self.next_id()?,
            url: url.to_string(),
            name: name.to_string(),
            status,
            status_time: OffsetDateTime::now_utc(),
            last_error: None,
        };
        self.sites.insert(site.id.to_be_bytes(), encode(&site)?)?;
        self.site_urls.insert(url.as_bytes(), site.id.to_be_bytes().to_vec())?;
        self.commit()?;
        Ok(site)
    }

    fn update_site(&self, site: &Site) -> Result<()> {
        if !self.sites.contains_key(site.id.to_be_bytes())? {
            bail!("site {} ({}) no longer exists", site.id, site.url);
        }
        self.sites.insert(site.id.to_be_bytes(), encode(site)?)?;
        self.commit()
    }

    fn find_site(&self, id: SiteId) -> Result<Option<Site>> {
        Self::load(&self.sites, id)
    }

    fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        match self.site_urls.get(url.as_bytes())? {
            Some(raw) => self.find_site(read_id(&raw)?),
            None => Ok(None),
        }
    }

    fn list_sites(&self) -> Result<Vec<Site>> {
        self.sites
            .iter()
            .values()
            .map(|v| -> Result<Site> { Ok(bincode::deserialize(&v?)?) })
            .collect()
    }

    fn delete_site_cascade(&self, id: SiteId) -> Result<()> {
        let Some(site) = self.find_site(id)? else {
            return Ok(());
        };
        let mut occurrence_batch = sled::Batch::default();
        let mut lemma_batch = sled::Batch::default();
        for lemma_id in Self::owned_ids(&self.site_lemmas, id)? {
            for key in self.occurrences.scan_prefix(lemma_id.to_be_bytes()).keys() {
                occurrence_batch.remove(key?);
            }
            lemma_batch.remove(lemma_id.to_be_bytes().to_vec());
        }
        let mut page_batch = sled::Batch::default();
        for page_id in Self::owned_ids(&self.site_pages, id)? {
            page_batch.remove(page_id.to_be_bytes().to_vec());
        }
        let mut site_lemma_batch = sled::Batch::default();
        for key in self.site_lemmas.scan_prefix(id.to_be_bytes()).keys() {
            site_lemma_batch.remove(key?);
        }
        let mut site_page_batch = sled::Batch::default();
        for key in self.site_pages.scan_prefix(id.to_be_bytes()).keys() {
            site_page_batch.remove(key?);
        }
        self.occurrences.apply_batch(occurrence_batch)?;
        self.lemmas.apply_batch(lemma_batch)?;
        self.site_lemmas.apply_batch(site_lemma_batch)?;
        self.pages.apply_batch(page_batch)?;
        self.site_pages.apply_batch(site_page_batch)?;
        self.sites.remove(id.to_be_bytes())?;
        if self.site_urls.get(site.url.as_bytes())?.as_deref() == Some(&id.to_be_bytes()[..]) {
            self.site_urls.remove(site.url.as_bytes())?;
        }
        self.commit()
    }

    fn insert_pages(&self, site_id: SiteId, pages: Vec<NewPage>) -> Result<Vec<Page>> {
        let mut stored = Vec::with_capacity(pages.len());
        let mut batch = sled::Batch::default();
        let mut index = sled::Batch::default();
        for p in pages {
            let page = Page { id: self.next_id()?, site_id, path: p.path, code: p.code, content: p.content };
            batch.insert(page.id.to_be_bytes().to_vec(), encode(&page)?);
            index.insert(pair_key(site_id, page.id).to_vec(), Vec::<u8>::new());
            stored.push(page);
        }
        self.pages.apply_batch(batch)?;
        self.site_pages.apply_batch(index)?;
        self.commit()?;
        Ok(stored)
    }

    fn find_page(&self, id: PageId) -> Result<Option<Page>> {
        Self::load(&self.pages, id)
    }

    fn find_pages_by_site(&self, site_id: SiteId) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for page_id in Self::owned_ids(&self.site_pages, site_id)? {
            if let Some(page) = self.find_page(page_id)? {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    fn count_pages(&self, site_id: SiteId) -> Result<usize> {
        Ok(self.site_pages.scan_prefix(site_id.to_be_bytes()).count())
    }

    fn insert_lemmas(&self, site_id: SiteId, lemmas: Vec<(String, u32)>) -> Result<Vec<Lemma>> {
        let mut stored = Vec::with_capacity(lemmas.len());
        let mut batch = sled::Batch::default();
        let mut index = sled::Batch::default();
        for (form, frequency) in lemmas {
            let lemma = Lemma { id: self.next_id()?, site_id, form, frequency };
            batch.insert(lemma.id.to_be_bytes().to_vec(), encode(&lemma)?);
            index.insert(form_key(site_id, &lemma.form), lemma.id.to_be_bytes().to_vec());
            stored.push(lemma);
        }
        self.lemmas.apply_batch(batch)?;
        self.site_lemmas.apply_batch(index)?;
        self.commit()?;
        Ok(stored)
    }

    fn find_lemmas_by_site(&self, site_id: SiteId) -> Result<Vec<Lemma>> {
        let mut lemmas = Vec::new();
        for lemma_id in Self::owned_ids(&self.site_lemmas, site_id)? {
            if let Some(lemma) = Self::load(&self.lemmas, lemma_id)? {
                lemmas.push(lemma);
            }
        }
        Ok(lemmas)
    }

    fn find_lemmas_by_site_matching_forms(&self, site_id: SiteId, forms: &[String]) -> Result<Vec<Lemma>> {
        let mut lemmas = Vec::new();
        for form in forms {
            if let Some(raw) = self.site_lemmas.get(form_key(site_id, form))? {
                if let Some(lemma) = Self::load(&self.lemmas, read_id(&raw)?)? {
                    lemmas.push(lemma);
                }
            }
        }
        Ok(lemmas)
    }

    fn count_lemmas(&self, site_id: SiteId) -> Result<usize> {
        Ok(self.site_lemmas.scan_prefix(site_id.to_be_bytes()).count())
    }

    fn insert_occurrences(&self, occurrences: &[Occurrence]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for o in occurrences {
            batch.insert(pair_key(o.lemma_id, o.page_id).to_vec(), rank_to_bytes(o.rank).to_vec());
        }
        self.occurrences.apply_batch(batch)?;
        self.commit()
    }

    fn find_pages_by_lemma_set(&self, lemma_ids: &[LemmaId]) -> Result<Vec<Page>> {
        let mut page_ids = BTreeSet::new();
        for lemma_id in lemma_ids {
            for key in self.occurrences.scan_prefix(lemma_id.to_be_bytes()).keys() {
                page_ids.insert(read_id(&key?[8..])?);
            }
        }
        let mut pages = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            if let Some(page) = self.find_page(id)? {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    fn find_occurrences_by_pages_and_lemmas(&self, page_ids: &[PageId], lemma_ids: &[LemmaId]) -> Result<Vec<Occurrence>> {
        let wanted: HashSet<PageId> = page_ids.iter().copied().collect();
        let mut found = Vec::new();
        for &lemma_id in lemma_ids {
            for entry in self.occurrences.scan_prefix(lemma_id.to_be_bytes()) {
                let (key, value) = entry?;
                let page_id = read_id(&key[8..])?;
                if wanted.contains(&page_id) {
                    found.push(Occurrence { page_id, lemma_id, rank: rank_from_bytes(&value)? });
                }
            }
        }
        Ok(found)
    }

    fn clear(&self) -> Result<()> {
        for tree in [&self.sites, &self.site_urls, &self.pages, &self.site_pages, &self.lemmas, &self.site_lemmas, &self.occurrences] {
            tree.clear()?;
        }
        self.commit()
    }
}
