use shared::{
    domain::{Product, ProductId},
    error::CoreError,
    keys::FAVORITE_PRODUCTS_KEY,
};
use storage::{save_json, KeyValueStore};
use tracing::{info, warn};

/// Favorited products, stored as full snapshots in favorite order.
pub struct FavoritesLibrary<S> {
    store: S,
    products: Vec<Product>,
}

impl<S: KeyValueStore> FavoritesLibrary<S> {
    pub async fn load(store: S) -> Result<Self, CoreError> {
        let raw = store
            .get(FAVORITE_PRODUCTS_KEY)
            .await
            .map_err(CoreError::storage)?;
        let products = match raw.map(|raw| serde_json::from_str::<Vec<Product>>(&raw)) {
            Some(Ok(products)) => products,
            Some(Err(err)) => {
                warn!(error = %err, "favorites are unreadable; starting empty");
                Vec::new()
            }
            None => Vec::new(),
        };
        Ok(Self { store, products })
    }

    pub fn list(&self) -> &[Product] {
        &self.products
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    /// Returns false when the product is already a favorite.
    pub async fn add(&mut self, product: Product) -> Result<bool, CoreError> {
        if self.contains(product.id) {
            return Ok(false);
        }
        let name = product.name.clone();
        self.products.push(product);
        if let Err(err) = self.persist().await {
            self.products.pop();
            return Err(err);
        }
        info!(product = %name, "product added to favorites");
        Ok(true)
    }

    /// Returns false when the product was not a favorite.
    pub async fn remove(&mut self, id: ProductId) -> Result<bool, CoreError> {
        let Some(index) = self.products.iter().position(|p| p.id == id) else {
            return Ok(false);
        };
        let removed = self.products.remove(index);
        if let Err(err) = self.persist().await {
            self.products.insert(index, removed);
            return Err(err);
        }
        info!(product_id = id.0, "product removed from favorites");
        Ok(true)
    }

    /// Returns whether the product is a favorite afterwards.
    pub async fn toggle(&mut self, product: Product) -> Result<bool, CoreError> {
        if self.contains(product.id) {
            self.remove(product.id).await?;
            Ok(false)
        } else {
            self.add(product).await?;
            Ok(true)
        }
    }

    async fn persist(&self) -> Result<(), CoreError> {
        save_json(&self.store, FAVORITE_PRODUCTS_KEY, &self.products)
            .await
            .map_err(CoreError::storage)
    }
}

#[cfg(test)]
mod tests {
    use storage::MemoryStore;

    use super::*;
    use crate::catalog::{ProductCatalog, SampleCatalog};

    fn product(id: i64) -> Product {
        SampleCatalog::new()
            .get_product_by_id(ProductId(id))
            .expect("fixture product")
    }

    #[tokio::test]
    async fn add_is_idempotent_per_product_id() {
        let store = MemoryStore::new();
        let mut favorites = FavoritesLibrary::load(store.clone()).await.expect("load");

        assert!(favorites.add(product(1)).await.expect("add"));
        assert!(!favorites.add(product(1)).await.expect("add again"));
        assert!(favorites.add(product(3)).await.expect("add"));

        let ids: Vec<i64> = favorites.list().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3]);

        let reloaded = FavoritesLibrary::load(store).await.expect("reload");
        assert_eq!(reloaded.list().len(), 2);
        assert_eq!(reloaded.list()[0].all_ingredients.len(), 20);
    }

    #[tokio::test]
    async fn remove_and_toggle() {
        let mut favorites = FavoritesLibrary::load(MemoryStore::new())
            .await
            .expect("load");
        assert!(!favorites.remove(ProductId(2)).await.expect("remove missing"));

        assert!(favorites.toggle(product(2)).await.expect("toggle on"));
        assert!(favorites.contains(ProductId(2)));
        assert!(!favorites.toggle(product(2)).await.expect("toggle off"));
        assert!(favorites.list().is_empty());
    }

    #[tokio::test]
    async fn unreadable_favorites_start_empty() {
        let store = MemoryStore::new();
        store
            .set(FAVORITE_PRODUCTS_KEY, "[{\"id\":")
            .await
            .expect("seed");
        let favorites = FavoritesLibrary::load(store).await.expect("load");
        assert!(favorites.list().is_empty());
    }
}
