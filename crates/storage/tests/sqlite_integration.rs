use quiz_core::model::{SessionStats, Video, VideoCatalog, VideoId};
use quiz_core::time::fixed_now;
use storage::repository::{StatsRepository as _, Storage, VideoCatalogRepository as _};

fn build_video(id: &str) -> Video {
    let vid = VideoId::new(id);
    Video::new(
        vid.clone(),
        Video::shorts_url(&vid),
        format!("Video {id}"),
        "Channel",
        None,
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_storage_round_trips_stats_and_catalog() {
    let storage = Storage::sqlite("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect and migrate");

    let mut stats = SessionStats::new();
    stats.tutorial_completed = true;
    stats.note_answer(true);
    stats.note_answer(false);
    stats.note_score(91);
    stats.note_streak(3);
    storage.stats.save_stats(&stats).await.expect("save stats");

    let catalog =
        VideoCatalog::from_videos(vec![build_video("abc123"), build_video("def456")], fixed_now());
    storage
        .videos
        .save_catalog(&catalog)
        .await
        .expect("save catalog");

    let loaded = storage.stats.load_stats().await.unwrap().unwrap();
    assert_eq!(loaded, stats);

    let loaded = storage.videos.load_catalog().await.unwrap().unwrap();
    assert_eq!(loaded, catalog);
    assert_eq!(loaded.len(), 2);
}

#[tokio::test]
async fn fresh_database_reports_no_persisted_state() {
    let storage = Storage::sqlite("sqlite:file:memdb_fresh?mode=memory&cache=shared")
        .await
        .expect("connect and migrate");

    assert!(storage.stats.load_stats().await.unwrap().is_none());
    assert!(storage.videos.load_catalog().await.unwrap().is_none());
}
