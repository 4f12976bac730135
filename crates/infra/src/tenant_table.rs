use std::collections::HashMap;
use std::hash::Hash;

use backoffice_core::TenantId;
use backoffice_tenancy::PlatformBypass;

/// Rows keyed by `(tenant, key)`.
///
/// Every ordinary accessor takes the tenant. Searching across tenants goes
/// through the `*_bypassing` accessors, which demand a [`PlatformBypass`].
#[derive(Debug, Clone)]
pub struct TenantTable<K, V> {
    rows: HashMap<(TenantId, K), V>,
}

impl<K, V> Default for TenantTable<K, V> {
    fn default() -> Self {
        Self { rows: HashMap::new() }
    }
}

impl<K, V> TenantTable<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, key: &K) -> Option<&V> {
        self.rows.get(&(tenant_id, key.clone()))
    }

    pub fn get_mut(&mut self, tenant_id: TenantId, key: &K) -> Option<&mut V> {
        self.rows.get_mut(&(tenant_id, key.clone()))
    }

    pub fn contains(&self, tenant_id: TenantId, key: &K) -> bool {
        self.rows.contains_key(&(tenant_id, key.clone()))
    }

    pub fn insert(&mut self, tenant_id: TenantId, key: K, value: V) -> Option<V> {
        self.rows.insert((tenant_id, key), value)
    }

    pub fn rows(&self, tenant_id: TenantId) -> impl Iterator<Item = &V> {
        self.rows
            .iter()
            .filter(move |((t, _), _)| *t == tenant_id)
            .map(|(_, v)| v)
    }

    /// Look a key up in whichever tenant owns it.
    pub fn get_bypassing(&self, _bypass: &PlatformBypass, key: &K) -> Option<(TenantId, &V)> {
        self.rows
            .iter()
            .find(|((_, k), _)| k == key)
            .map(|((t, _), v)| (*t, v))
    }

    pub fn get_mut_bypassing(&mut self, _bypass: &PlatformBypass, key: &K) -> Option<(TenantId, &mut V)> {
        self.rows
            .iter_mut()
            .find(|((_, k), _)| k == key)
            .map(|((t, _), v)| (*t, v))
    }
}
