//! CLI command implementations.

pub mod cart;
pub mod checkout;

use paperback_cart::{BackendClient, BackendError, Cart, ClientConfig, FileStore, ShoppingCart};

/// Open the persisted cart with an HTTP backend.
fn open_cart(config: &ClientConfig) -> Result<ShoppingCart<BackendClient>, BackendError> {
    let backend = BackendClient::new(&config.backend)?;
    let cart = Cart::open(FileStore::new(&config.data_dir));
    Ok(ShoppingCart::new(cart, backend))
}
