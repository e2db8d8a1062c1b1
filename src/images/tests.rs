use super::services::ImageUpload;
use crate::config::test_helpers::{Backend, setup_test_state, spring_fest};
use crate::events::hero;
use rstest::rstest;
use std::path::Path;
use tempfile::TempDir;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_save_image_writes_file_and_record(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();

    let image = state
        .images
        .save_image(
            &event.id,
            PNG_BYTES,
            "Main Stage.png",
            ImageUpload {
                alt: Some("Main stage at dusk".to_string()),
                is_hero: false,
            },
        )
        .await
        .unwrap()
        .expect("event exists");

    assert!(image.filename.starts_with("Main_Stage-"));
    assert!(image.filename.ends_with(".png"));
    assert_eq!(image.alt, "Main stage at dusk");
    assert!(image.is_hero, "first image becomes the hero");

    let path = state.images.image_path(&image.filename);
    assert_eq!(std::fs::read(&path).unwrap(), PNG_BYTES);
    let stored = state.events.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.hero_poster, image.filename);
    assert_eq!(stored.images, vec![image]);
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_same_upload_twice_gets_distinct_files(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();

    let first = state
        .images
        .save_image(&event.id, PNG_BYTES, "poster.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();
    let second = state
        .images
        .save_image(&event.id, b"second", "poster.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();

    assert_ne!(first.filename, second.filename);
    assert_eq!(files_in(state.images.images_dir()).len(), 2);
    assert_eq!(
        std::fs::read(state.images.image_path(&first.filename)).unwrap(),
        PNG_BYTES
    );
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_upload_for_unknown_event_leaves_no_file(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;

    let saved = state
        .images
        .save_image("evt_missing", PNG_BYTES, "poster.png", ImageUpload::default())
        .await
        .unwrap();

    assert_eq!(saved, None);
    assert!(files_in(state.images.images_dir()).is_empty());
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_delete_image_removes_record_then_file(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();
    let image = state
        .images
        .save_image(&event.id, PNG_BYTES, "poster.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();

    assert!(state.images.delete_image(&event.id, &image.id).await.unwrap());
    assert!(!state.images.image_path(&image.filename).exists());
    let stored = state.events.get_event(&event.id).await.unwrap().unwrap();
    assert!(stored.images.is_empty());
    assert_eq!(stored.hero_poster, "");

    assert!(!state.images.delete_image(&event.id, &image.id).await.unwrap());
    assert!(!state.images.delete_image("evt_missing", &image.id).await.unwrap());
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_delete_image_tolerates_missing_file(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();
    let image = state
        .images
        .save_image(&event.id, PNG_BYTES, "poster.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();
    std::fs::remove_file(state.images.image_path(&image.filename)).unwrap();

    assert!(state.images.delete_image(&event.id, &image.id).await.unwrap());
    assert!(
        state
            .events
            .get_event(&event.id)
            .await
            .unwrap()
            .unwrap()
            .images
            .is_empty()
    );
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_delete_event_removes_gallery_files(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();
    let keep = state.events.create_event(spring_fest()).await.unwrap();
    for name in ["a.png", "b.png"] {
        state
            .images
            .save_image(&event.id, PNG_BYTES, name, ImageUpload::default())
            .await
            .unwrap();
    }
    let kept = state
        .images
        .save_image(&keep.id, PNG_BYTES, "c.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();

    assert!(state.images.delete_event(&event.id).await.unwrap());
    assert_eq!(files_in(state.images.images_dir()), vec![kept.filename]);
    assert!(!state.images.delete_event(&event.id).await.unwrap());
}

/// Publish an event, build its gallery and shuffle the hero role around,
/// checking the public view after each step.
#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_spring_fest_gallery_lifecycle(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;

    let event = state
        .admin
        .create_event_admin(spring_fest(), Some(true))
        .await
        .unwrap();
    let public = state.events.get_visible_events().await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].title, "Spring Fest");

    let crowd = state
        .images
        .save_image(&event.id, PNG_BYTES, "crowd.jpg", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();
    let stage = state
        .images
        .save_image(
            &event.id,
            PNG_BYTES,
            "stage.jpg",
            ImageUpload {
                alt: Some("Stage".to_string()),
                is_hero: true,
            },
        )
        .await
        .unwrap()
        .unwrap();
    let food = state
        .images
        .save_image(&event.id, PNG_BYTES, "food.jpg", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();

    let detail = state
        .events
        .get_visible_event(&event.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.images.len(), 3);
    assert_eq!(detail.hero_poster, stage.filename);
    assert_eq!(hero::violation(&detail), None);

    assert!(
        state
            .events
            .set_hero_poster(&event.id, &food.id)
            .await
            .unwrap()
    );
    assert!(state.images.delete_image(&event.id, &food.id).await.unwrap());
    let detail = state.events.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(detail.hero_poster, crowd.filename);
    assert_eq!(hero::violation(&detail), None);

    state
        .admin
        .set_event_visibility(&event.id, false)
        .await
        .unwrap();
    assert!(state.events.get_visible_events().await.unwrap().is_empty());
    assert_eq!(state.events.get_visible_event(&event.id).await.unwrap(), None);

    assert!(state.images.delete_event(&event.id).await.unwrap());
    assert!(files_in(state.images.images_dir()).is_empty());
}

#[rstest]
#[case::file(Backend::File)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_spring_fest_hero_handover_and_cascade(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let state = setup_test_state(backend, dir.path()).await;
    let event = state.events.create_event(spring_fest()).await.unwrap();

    let a = state
        .images
        .save_image(
            &event.id,
            PNG_BYTES,
            "a.png",
            ImageUpload {
                alt: None,
                is_hero: true,
            },
        )
        .await
        .unwrap()
        .unwrap();
    let b = state
        .images
        .save_image(&event.id, PNG_BYTES, "b.png", ImageUpload::default())
        .await
        .unwrap()
        .unwrap();
    let stored = state.events.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.hero_poster, a.filename);

    assert!(state.images.delete_image(&event.id, &a.id).await.unwrap());
    let stored = state.events.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.hero_poster, b.filename);
    assert!(stored.image(&b.id).unwrap().is_hero);

    assert!(state.images.delete_event(&event.id).await.unwrap());
    assert_eq!(state.events.get_event(&event.id).await.unwrap(), None);
    assert!(!state.images.image_path(&a.filename).exists());
    assert!(!state.images.image_path(&b.filename).exists());
}
