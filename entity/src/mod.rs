pub mod event_images;
pub mod events;
