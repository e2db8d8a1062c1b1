//! Hero-poster rules for an event's gallery.
//!
//! A non-empty gallery has exactly one image flagged `is_hero`, and the
//! event's `hero_poster` is that image's filename. An empty gallery has an
//! empty `hero_poster`. Every function here leaves an event satisfying that.

use super::models::{Event, EventImage, ImageChanges};

/// Appends `image` to the gallery. It becomes the hero when flagged as one
/// or when the gallery was empty.
pub fn attach(event: &mut Event, mut image: EventImage) -> EventImage {
    image.is_hero = image.is_hero || event.images.is_empty();
    if image.is_hero {
        for other in &mut event.images {
            other.is_hero = false;
        }
        event.hero_poster.clone_from(&image.filename);
    }
    event.images.push(image.clone());
    image
}

/// Makes `image_id` the sole hero. Returns `false` if the image is not in
/// the gallery.
pub fn promote(event: &mut Event, image_id: &str) -> bool {
    let Some(filename) = event.image(image_id).map(|image| image.filename.clone()) else {
        return false;
    };
    for image in &mut event.images {
        image.is_hero = image.id == image_id;
    }
    event.hero_poster = filename;
    true
}

/// Removes `image_id` from the gallery, handing the hero role to the first
/// remaining image if the removed one held it.
pub fn detach(event: &mut Event, image_id: &str) -> Option<EventImage> {
    let index = event.images.iter().position(|image| image.id == image_id)?;
    let removed = event.images.remove(index);
    if removed.is_hero || event.hero_poster == removed.filename {
        match event.images.first().map(|image| image.id.clone()) {
            Some(next) => {
                promote(event, &next);
            }
            None => event.hero_poster.clear(),
        }
    }
    Some(removed)
}

/// Applies a partial image update. Clearing the flag on the current hero
/// moves the role to the first other image; a sole image stays hero.
pub fn apply_changes(
    event: &mut Event,
    image_id: &str,
    changes: &ImageChanges,
) -> Option<EventImage> {
    let index = event.images.iter().position(|image| image.id == image_id)?;
    if let Some(alt) = &changes.alt {
        event.images[index].alt.clone_from(alt);
    }
    match changes.is_hero {
        Some(true) => {
            promote(event, image_id);
        }
        Some(false) if event.images[index].is_hero => {
            if let Some(next) = successor(event, image_id) {
                promote(event, &next);
            }
        }
        _ => {}
    }
    Some(event.images[index].clone())
}

/// The image that takes over when `image_id` gives up the hero role.
pub fn successor(event: &Event, image_id: &str) -> Option<String> {
    event
        .images
        .iter()
        .find(|image| image.id != image_id)
        .map(|image| image.id.clone())
}

/// Repairs the hero flags of an imported event. The image named by
/// `hero_poster` wins, then the first flagged image, then the first image.
pub fn normalize(event: &mut Event) {
    let chosen = event
        .images
        .iter()
        .find(|image| !event.hero_poster.is_empty() && image.filename == event.hero_poster)
        .or_else(|| event.images.iter().find(|image| image.is_hero))
        .or_else(|| event.images.first())
        .map(|image| image.id.clone());
    match chosen {
        Some(image_id) => {
            promote(event, &image_id);
        }
        None => event.hero_poster.clear(),
    }
}

/// Describes the first violated hero rule, if any.
pub fn violation(event: &Event) -> Option<String> {
    let heroes: Vec<&EventImage> = event.images.iter().filter(|image| image.is_hero).collect();
    if event.images.is_empty() {
        return (!event.hero_poster.is_empty())
            .then(|| format!("empty gallery but hero_poster is '{}'", event.hero_poster));
    }
    match heroes.as_slice() {
        [hero] if hero.filename == event.hero_poster => None,
        [hero] => Some(format!(
            "hero image is '{}' but hero_poster is '{}'",
            hero.filename, event.hero_poster
        )),
        [] => Some("no image is flagged as hero".to_string()),
        many => Some(format!("{} images are flagged as hero", many.len())),
    }
}
