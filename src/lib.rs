pub mod config;
pub mod device;
pub mod draft;
pub mod error;
pub mod events;
pub mod geo;
pub mod location;
pub mod metadata;
pub mod photoset;
pub mod previews;
pub mod session;
pub mod submit;
pub mod tasks {
    pub mod intake;
}
