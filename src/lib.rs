pub mod backend;
pub mod config;
pub mod logging;
pub mod notifier;
pub mod release_feed;
pub mod settings_sync;
pub mod store;
pub mod update_tracker;
pub mod version;

#[cfg(feature = "desktop")]
pub mod desktop;

#[cfg(test)]
mod test_support;

#[cfg(feature = "desktop")]
pub use desktop::run;

/// Version of the running build, as published in release tags (without the `v`).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn get_app_version() -> String {
    APP_VERSION.to_string()
}
