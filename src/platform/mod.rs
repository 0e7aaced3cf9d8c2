//! Platform storage backends for the history store.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        mod web;
        pub use web::LocalStorage;

        /// Durable store for the current platform.
        pub type DefaultStore = LocalStorage;
    } else if #[cfg(feature = "native")] {
        mod native;
        pub use native::SqliteStore;

        /// Durable store for the current platform.
        pub type DefaultStore = SqliteStore;
    }
}
