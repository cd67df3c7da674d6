use crate::profile_store::ProfileStore;
use crate::record::{Projection, Record};
use crate::store::DocumentStore;
use crate::Result;

/// The persistence hooks a generic profile service calls into.
pub trait ProfileRepository {
    /// Name of the field holding the record identifier.
    fn id_field(&self) -> &str;

    fn insert(&self, record: Record) -> Result<()>;

    fn update(&self, record: Record) -> Result<()>;

    fn delete_by_id(&self, id: &str) -> Result<()>;

    fn read(&self, names: &Projection, key: &str, value: &str) -> Result<Vec<Record>>;
}

impl<S: DocumentStore> ProfileRepository for ProfileStore<S> {
    fn id_field(&self) -> &str {
        ProfileStore::id_field(self)
    }

    fn insert(&self, record: Record) -> Result<()> {
        ProfileStore::insert(self, record)
    }

    fn update(&self, record: Record) -> Result<()> {
        ProfileStore::update(self, record)
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        ProfileStore::delete_by_id(self, id)
    }

    fn read(&self, names: &Projection, key: &str, value: &str) -> Result<Vec<Record>> {
        ProfileStore::read(self, names, key, value)
    }
}

/// Convenience lookups on any ProfileRepository.
pub trait ProfileRepositoryExt: ProfileRepository {
    /// The full record with identifier `id`, if stored.
    fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        let key = self.id_field().to_string();
        Ok(self.read(&Projection::all(), &key, id)?.into_iter().next())
    }

    /// Every full record whose `field` equals `value`.
    fn find_by(&self, field: &str, value: &str) -> Result<Vec<Record>> {
        self.read(&Projection::all(), field, value)
    }
}

impl<R: ProfileRepository + ?Sized> ProfileRepositoryExt for R {}
